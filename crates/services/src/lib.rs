pub mod admission;
pub mod auth;
pub mod clock;
pub mod dao;
pub mod live;
pub mod queue;
pub mod signaling;
pub mod timer;

pub use admission::{AdmissionDecision, AdmissionPolicy, AdmissionReason, Privilege};
pub use clock::{Clock, ManualClock, SystemClock};
pub use live::{Actor, HubError, SessionHub};
pub use queue::ReadingQueue;
pub use signaling::{SignalingStore, StoreError};
pub use timer::SessionTimer;
