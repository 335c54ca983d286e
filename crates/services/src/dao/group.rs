use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::info;
use uuid::Uuid;
use vrinda_config::GroupSeed;
use vrinda_db::models::Group;

use super::base::{DaoError, DaoResult};
use crate::admission::parse_reading_time;

/// Directory of groups mirrored from the main application.
#[derive(Debug, Default)]
pub struct GroupDao {
    groups: DashMap<String, Group>,
}

impl GroupDao {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds are imported verbatim; a malformed reading time is kept and
    /// reported by admission as `invalid_reading_time`.
    pub fn from_seeds(seeds: &[GroupSeed], now: DateTime<Utc>) -> Self {
        let dao = Self::new();
        for seed in seeds {
            dao.groups.insert(
                seed.id.clone(),
                Group::new(
                    seed.id.clone(),
                    seed.name.clone(),
                    seed.reading_time.clone(),
                    seed.admin_id.clone(),
                    now,
                ),
            );
        }
        info!(count = seeds.len(), "Group directory seeded");
        dao
    }

    pub fn create(
        &self,
        id: Option<String>,
        name: String,
        reading_time: Option<String>,
        admin_id: String,
        now: DateTime<Utc>,
    ) -> DaoResult<Group> {
        if name.trim().is_empty() {
            return Err(DaoError::Validation("name must not be empty".to_string()));
        }
        let reading_time = normalize_reading_time(reading_time)?;
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());

        match self.groups.entry(id.clone()) {
            Entry::Occupied(_) => Err(DaoError::DuplicateKey(format!("group {id}"))),
            Entry::Vacant(slot) => {
                let group = Group::new(id, name, reading_time, admin_id, now);
                slot.insert(group.clone());
                Ok(group)
            }
        }
    }

    pub fn find_by_id(&self, id: &str) -> DaoResult<Group> {
        self.groups
            .get(id)
            .map(|g| g.clone())
            .ok_or(DaoError::NotFound)
    }

    pub fn set_reading_time(
        &self,
        id: &str,
        reading_time: Option<String>,
        now: DateTime<Utc>,
    ) -> DaoResult<Group> {
        let reading_time = normalize_reading_time(reading_time)?;
        let mut group = self.groups.get_mut(id).ok_or(DaoError::NotFound)?;
        group.reading_time = reading_time;
        group.updated_at = now;
        Ok(group.clone())
    }
}

fn normalize_reading_time(raw: Option<String>) -> DaoResult<Option<String>> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => {
            let t = parse_reading_time(value).map_err(|e| DaoError::Validation(e.to_string()))?;
            Ok(Some(t.format("%H:%M").to_string()))
        }
    }
}
