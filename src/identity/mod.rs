//! The substitutable account-holder model: its declared shape, the
//! manager bound to it, and credential hashing.

pub mod manager;
pub mod model;
pub mod password;
pub mod shape;

pub use manager::{AccountManager, ManagerError, SeaOrmAccountManager};
pub use model::{Account, IdentityModel, UnsavedAccount};
pub use password::PasswordPolicy;
pub use shape::{ACCOUNT, BUILTIN_USER, FieldKind, FieldSpec, IdentityShape, ShapeError};
