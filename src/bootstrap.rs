//! Ordered startup: resolve the account model, bind its manager, forms and
//! admin, and only then materialize the schema.

use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use crate::admin::{AccountAdmin, AdminError, AdminSite};
use crate::config::Config;
use crate::db::Store;
use crate::identity::{IdentityModel, SeaOrmAccountManager, ShapeError, shape};
use crate::services::Mailer;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error(
        "'{0}' is the framework's built-in account model; set auth.user_model to the project model (e.g. \"accounts.Account\")"
    )]
    DefaultIdentityShape(&'static str),

    #[error("No admin is registered for '{0}'; register it before materializing the schema")]
    AdminNotRegistered(&'static str),

    #[error("Admin binding failed: {0}")]
    Admin(#[from] AdminError),

    /// The schema was built for another account model. Foreign keys
    /// already point at the old table, so the only way forward is a
    /// destructive reset.
    #[error(
        "auth.user_model is '{configured}' but the database was first migrated for {materialized}. \
         The account model must be settled before the first migration. \
         Rebuild the database with `quill reset-db --yes` (all data is lost)."
    )]
    ConfigurationOrdering {
        configured: String,
        materialized: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Storage unavailable: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Everything the service needs once startup has succeeded.
#[derive(Clone)]
pub struct App {
    pub config: Config,
    pub store: Store,
    pub identity: Arc<IdentityModel>,
    pub admin: Arc<AdminSite>,
    pub mailer: Arc<dyn Mailer>,
}

/// Steps one to three: resolve the binding, build the model with its
/// manager and forms, register the admin. Leaves the schema untouched.
pub async fn assemble(config: Config, mailer: Arc<dyn Mailer>) -> Result<App, BootstrapError> {
    let shape = shape::resolve(&config.auth.user_model)?;
    if shape.builtin {
        return Err(BootstrapError::DefaultIdentityShape(shape.label));
    }
    info!(model = shape.label, "Resolved account model");

    let store = Store::connect(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    let manager = Arc::new(SeaOrmAccountManager::new(
        store.clone(),
        config.security.clone(),
        shape,
    ));
    let identity = Arc::new(IdentityModel::new(shape, manager));

    let mut admin = AdminSite::new();
    admin.register(AccountAdmin::with_default_forms(Arc::clone(&identity))?)?;

    Ok(App {
        config,
        store,
        identity,
        admin: Arc::new(admin),
        mailer,
    })
}

/// Runs the full ordered startup, ending with schema materialization.
pub async fn bootstrap(config: Config, mailer: Arc<dyn Mailer>) -> Result<App, BootstrapError> {
    let app = assemble(config, mailer).await?;

    if let Err(e) = app.store.materialize(&app.identity, &app.admin).await {
        error!("Startup aborted: {e}");
        return Err(e);
    }

    Ok(app)
}
