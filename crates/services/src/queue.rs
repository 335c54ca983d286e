use std::collections::VecDeque;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("The reading queue is empty")]
    EmptyQueue,
    #[error("{0} is already reading")]
    ReaderActive(String),
    #[error("Nobody is reading")]
    NoCurrentReader,
    #[error("{0} is not the current reader")]
    NotCurrentReader(String),
}

impl QueueError {
    pub fn code(&self) -> &'static str {
        match self {
            QueueError::EmptyQueue => "empty_queue",
            QueueError::ReaderActive(_) => "reader_active",
            QueueError::NoCurrentReader => "no_current_reader",
            QueueError::NotCurrentReader(_) => "not_current_reader",
        }
    }
}

/// Turn order for reading aloud. The current reader is never queue-resident.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingQueue {
    queue: VecDeque<String>,
    current_reader: Option<String>,
}

impl ReadingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends unless already waiting or reading. Returns whether the queue changed.
    pub fn add(&mut self, participant_id: &str) -> bool {
        if self.contains(participant_id) || self.current_reader() == Some(participant_id) {
            return false;
        }
        self.queue.push_back(participant_id.to_string());
        true
    }

    /// Removes a waiting participant. The current reader is untouched.
    pub fn remove(&mut self, participant_id: &str) -> bool {
        let before = self.queue.len();
        self.queue.retain(|p| p != participant_id);
        self.queue.len() != before
    }

    /// Promotes the head of the queue to current reader.
    pub fn start_reading(&mut self) -> Result<String, QueueError> {
        if let Some(reader) = &self.current_reader {
            return Err(QueueError::ReaderActive(reader.clone()));
        }
        let next = self.queue.pop_front().ok_or(QueueError::EmptyQueue)?;
        self.current_reader = Some(next.clone());
        Ok(next)
    }

    /// Clears the current reader. The next participant is not promoted.
    pub fn skip_reading(&mut self) -> Result<String, QueueError> {
        self.current_reader.take().ok_or(QueueError::NoCurrentReader)
    }

    /// The current reader hands the turn back after reading.
    pub fn finish_reading(&mut self, participant_id: &str) -> Result<(), QueueError> {
        match &self.current_reader {
            None => Err(QueueError::NoCurrentReader),
            Some(reader) if reader != participant_id => {
                Err(QueueError::NotCurrentReader(participant_id.to_string()))
            }
            Some(_) => {
                self.current_reader = None;
                Ok(())
            }
        }
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Drops every trace of a participant who left the session.
    pub fn participant_left(&mut self, participant_id: &str) -> bool {
        let mut changed = self.remove(participant_id);
        if self.current_reader.as_deref() == Some(participant_id) {
            self.current_reader = None;
            changed = true;
        }
        changed
    }

    pub fn contains(&self, participant_id: &str) -> bool {
        self.queue.iter().any(|p| p == participant_id)
    }

    /// 1-based position, None when not waiting.
    pub fn position(&self, participant_id: &str) -> Option<usize> {
        self.queue.iter().position(|p| p == participant_id).map(|i| i + 1)
    }

    pub fn current_reader(&self) -> Option<&str> {
        self.current_reader.as_deref()
    }

    pub fn next_reader(&self) -> Option<&str> {
        self.queue.front().map(String::as_str)
    }

    pub fn waiting(&self) -> Vec<String> {
        self.queue.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
