pub mod magic_link;
pub mod user;

pub use magic_link::{MagicLink, MagicLinkRow, NewMagicLink};
pub use user::User;
