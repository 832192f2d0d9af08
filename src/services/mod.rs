pub mod auth_service;
pub use auth_service::{AuthError, AuthService};

pub mod auth_service_impl;
pub use auth_service_impl::SeaOrmAuthService;

pub mod mailer;
pub use mailer::{ConsoleMailer, Mailer, MemoryMailer, OutgoingEmail};

pub mod post_service;
pub use post_service::{PostError, PostService, SeaOrmPostService};
