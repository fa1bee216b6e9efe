//! Business logic services layer

pub mod access_service;
pub mod audit_service;
pub mod auth_service;
pub mod service_account_service;
pub mod session_service;
pub mod user_service;

pub use access_service::AccessService;
pub use audit_service::AuditService;
pub use auth_service::AuthService;
pub use service_account_service::ServiceAccountService;
pub use session_service::SessionService;
pub use user_service::UserService;
