pub mod prelude;

pub mod accounts;
pub mod identity_schema;
pub mod password_resets;
pub mod posts;
