pub mod group;
pub mod participant;
pub mod role;
pub mod session;
pub mod signaling;

pub use group::Group;
pub use participant::Participant;
pub use role::UserRole;
pub use session::{ReadingSession, SessionStatus};
pub use signaling::{SignalKind, SignalingMessage};
