pub mod magic_link_handlers;
pub mod user_handlers;

pub use magic_link_handlers::{authenticate_magic_link_handler, request_magic_link_handler};
pub use user_handlers::{health_handler, logout_handler, me_handler};
