use anyhow::Result;
use sea_orm::{
    ActiveModelTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr,
    EntityTrait, Set, SqlErr, Statement,
};
use sea_orm_migration::{MigratorTrait, SchemaManager};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::admin::AdminSite;
use crate::bootstrap::BootstrapError;
use crate::entities::{identity_schema, prelude::*};
use crate::identity::{Account, BUILTIN_USER, IdentityModel, IdentityShape, UnsavedAccount};

pub mod migrator;
pub mod repositories;

pub use repositories::account::AccountChanges;
pub use repositories::password_reset::PasswordResetEntry;
pub use repositories::post::Post;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    /// Opens the pool. The schema is left untouched until
    /// [`Store::materialize`] runs.
    pub async fn connect(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        if !db_url.contains(":memory:") {
            let path_str = db_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        info!(
            "Database connected (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    /// Builds the schema for the bound account model.
    ///
    /// Refuses to run, leaving the database untouched, when the binding is
    /// the built-in model, when the admin site has no registration for it,
    /// or when the database was already migrated for a different model.
    /// Running again for the same model only applies pending migrations.
    pub async fn materialize(
        &self,
        identity: &IdentityModel,
        admin: &AdminSite,
    ) -> Result<(), BootstrapError> {
        let shape = identity.shape();
        check_binding(shape, admin)?;
        self.check_ordering(shape).await?;

        migrator::Migrator::up(&self.conn, None).await?;
        self.stamp(shape).await?;

        info!(model = shape.label, "Schema materialized & migrations applied");
        Ok(())
    }

    /// Destructive: drops every table, then rebuilds the schema for the
    /// bound model.
    pub async fn reset_schema(
        &self,
        identity: &IdentityModel,
        admin: &AdminSite,
    ) -> Result<(), BootstrapError> {
        let shape = identity.shape();
        check_binding(shape, admin)?;

        warn!(model = shape.label, "Dropping all tables for schema reset");
        migrator::Migrator::fresh(&self.conn).await?;
        self.stamp(shape).await?;

        info!(model = shape.label, "Schema rebuilt from scratch");
        Ok(())
    }

    async fn check_ordering(&self, shape: &IdentityShape) -> Result<(), BootstrapError> {
        let manager = SchemaManager::new(&self.conn);

        if manager.has_table(BUILTIN_USER.table).await? {
            return Err(BootstrapError::ConfigurationOrdering {
                configured: shape.label.to_string(),
                materialized: BUILTIN_USER.label.to_string(),
            });
        }

        if manager.has_table("identity_schema").await? {
            let stamps = IdentitySchema::find().all(&self.conn).await?;
            if let Some(other) = stamps.into_iter().find(|s| s.model_label != shape.label) {
                return Err(BootstrapError::ConfigurationOrdering {
                    configured: shape.label.to_string(),
                    materialized: other.model_label,
                });
            }
        } else if manager.has_table("seaql_migrations").await? {
            return Err(BootstrapError::ConfigurationOrdering {
                configured: shape.label.to_string(),
                materialized: "an unrecorded account model".to_string(),
            });
        }

        Ok(())
    }

    async fn stamp(&self, shape: &IdentityShape) -> Result<(), DbErr> {
        let existing = IdentitySchema::find().all(&self.conn).await?;
        if existing.iter().any(|s| s.model_label == shape.label) {
            return Ok(());
        }

        identity_schema::ActiveModel {
            model_label: Set(shape.label.to_string()),
            materialized_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await?;

        Ok(())
    }

    /// Label the schema was materialized for, if any.
    pub async fn materialized_model(&self) -> Result<Option<String>> {
        let manager = SchemaManager::new(&self.conn);
        if !manager.has_table("identity_schema").await? {
            return Ok(None);
        }
        let stamp = IdentitySchema::find().one(&self.conn).await?;
        Ok(stamp.map(|s| s.model_label))
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn account_repo(&self) -> repositories::account::AccountRepository {
        repositories::account::AccountRepository::new(self.conn.clone())
    }

    fn post_repo(&self) -> repositories::post::PostRepository {
        repositories::post::PostRepository::new(self.conn.clone())
    }

    fn password_reset_repo(&self) -> repositories::password_reset::PasswordResetRepository {
        repositories::password_reset::PasswordResetRepository::new(self.conn.clone())
    }

    pub async fn insert_account(&self, account: UnsavedAccount) -> Result<Account> {
        self.account_repo().insert(account).await
    }

    pub async fn get_account(&self, id: i32) -> Result<Option<Account>> {
        self.account_repo().get_by_id(id).await
    }

    pub async fn get_account_by_username(&self, username: &str) -> Result<Option<Account>> {
        self.account_repo().get_by_username(username).await
    }

    pub async fn get_account_with_password(
        &self,
        username: &str,
    ) -> Result<Option<(Account, String)>> {
        self.account_repo()
            .get_by_username_with_password(username)
            .await
    }

    pub async fn get_account_password_hash(&self, id: i32) -> Result<Option<String>> {
        self.account_repo().get_password_hash(id).await
    }

    pub async fn list_active_accounts_by_email(&self, email: &str) -> Result<Vec<Account>> {
        self.account_repo().list_active_by_email(email).await
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        self.account_repo().list().await
    }

    pub async fn count_accounts(&self) -> Result<u64> {
        self.account_repo().count().await
    }

    pub async fn update_account(
        &self,
        id: i32,
        changes: AccountChanges,
    ) -> Result<Option<Account>> {
        self.account_repo().update(id, changes).await
    }

    pub async fn set_account_password_hash(&self, id: i32, password_hash: String) -> Result<()> {
        self.account_repo().set_password_hash(id, password_hash).await
    }

    pub async fn touch_last_login(&self, id: i32) -> Result<()> {
        self.account_repo().touch_last_login(id).await
    }

    pub async fn create_post(&self, author_id: i32, body: &str) -> Result<i32> {
        self.post_repo().create(author_id, body).await
    }

    pub async fn get_post(&self, id: i32) -> Result<Option<Post>> {
        self.post_repo().get(id).await
    }

    pub async fn list_recent_posts(&self, limit: u64) -> Result<Vec<Post>> {
        self.post_repo().list_recent(limit).await
    }

    pub async fn list_posts_by_author(&self, author_id: i32) -> Result<Vec<Post>> {
        self.post_repo().list_by_author(author_id).await
    }

    pub async fn create_password_reset(
        &self,
        account_id: i32,
        selector: &str,
        verifier_hash: String,
        expires_at: String,
    ) -> Result<()> {
        self.password_reset_repo()
            .create(account_id, selector, verifier_hash, expires_at)
            .await
    }

    pub async fn get_password_reset(&self, selector: &str) -> Result<Option<PasswordResetEntry>> {
        self.password_reset_repo().get_by_selector(selector).await
    }

    pub async fn mark_password_reset_used(&self, id: i32) -> Result<bool> {
        self.password_reset_repo().mark_used(id).await
    }

    pub async fn invalidate_password_resets(&self, account_id: i32) -> Result<u64> {
        self.password_reset_repo()
            .invalidate_for_account(account_id)
            .await
    }
}

fn check_binding(shape: &IdentityShape, admin: &AdminSite) -> Result<(), BootstrapError> {
    if shape.builtin {
        return Err(BootstrapError::DefaultIdentityShape(shape.label));
    }
    if !admin.is_registered(shape.label) {
        return Err(BootstrapError::AdminNotRegistered(shape.label));
    }
    Ok(())
}

/// True when the error chain holds a storage-level unique constraint
/// violation.
#[must_use]
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause.downcast_ref::<DbErr>().is_some_and(|db_err| {
            matches!(db_err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
                || db_err.to_string().contains("UNIQUE constraint failed")
        })
    })
}
