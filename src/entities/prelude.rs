pub use super::accounts::Entity as Accounts;
pub use super::identity_schema::Entity as IdentitySchema;
pub use super::password_resets::Entity as PasswordResets;
pub use super::posts::Entity as Posts;
