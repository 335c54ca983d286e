pub mod base;
pub mod group;
pub mod session;

pub use base::{DaoError, DaoResult};
pub use group::GroupDao;
pub use session::SessionDao;
