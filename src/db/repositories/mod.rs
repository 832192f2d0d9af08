pub mod account;
pub mod password_reset;
pub mod post;
