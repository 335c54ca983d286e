pub mod group;
pub mod session;
pub mod signaling;
