//! Database repository layer

pub mod action_repo;
pub mod service_account_repo;
pub mod session_repo;
pub mod team_repo;
pub mod user_repo;

pub use action_repo::*;
pub use service_account_repo::*;
pub use session_repo::*;
pub use team_repo::*;
pub use user_repo::*;
