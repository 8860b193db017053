pub mod email_service;
pub mod magic_link_service;
pub mod user_service;

pub use email_service::{create_email_service, EmailError, EmailService};
pub use magic_link_service::{MagicLinkError, MagicLinkService};
pub use user_service::{UserService, UserServiceError};
