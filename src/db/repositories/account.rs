use anyhow::{Context, Result};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::entities::{accounts, prelude::*};
use crate::identity::{Account, UnsavedAccount};

/// Profile and capability columns written by an edit. The password hash
/// and timestamps are changed only through their own flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountChanges {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
}

pub struct AccountRepository {
    conn: DatabaseConnection,
}

impl AccountRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Single-row insert. Unique violations are left as `DbErr` inside the
    /// error chain so callers can tell them apart.
    pub async fn insert(&self, account: UnsavedAccount) -> Result<Account> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = accounts::ActiveModel {
            username: Set(account.username),
            password_hash: Set(account.password_hash),
            first_name: Set(account.first_name),
            last_name: Set(account.last_name),
            email: Set(account.email),
            is_staff: Set(account.is_staff),
            is_superuser: Set(account.is_superuser),
            is_active: Set(account.is_active),
            date_joined: Set(now),
            last_login: Set(None),
            ..Default::default()
        };

        let model = active.insert(&self.conn).await?;
        Ok(Account::from(model))
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<Account>> {
        let account = Accounts::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query account by ID")?;

        Ok(account.map(Account::from))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<Account>> {
        let account = Accounts::find()
            .filter(accounts::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query account by username")?;

        Ok(account.map(Account::from))
    }

    /// Get account by username with password hash (for login)
    pub async fn get_by_username_with_password(
        &self,
        username: &str,
    ) -> Result<Option<(Account, String)>> {
        let account = Accounts::find()
            .filter(accounts::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query account by username")?;

        Ok(account.map(|a| {
            let password_hash = a.password_hash.clone();
            (Account::from(a), password_hash)
        }))
    }

    pub async fn get_password_hash(&self, id: i32) -> Result<Option<String>> {
        let account = Accounts::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query account for password hash")?;

        Ok(account.map(|a| a.password_hash))
    }

    /// Active accounts whose email matches, compared case-insensitively.
    pub async fn list_active_by_email(&self, email: &str) -> Result<Vec<Account>> {
        let wanted = email.trim().to_lowercase();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let rows = Accounts::find()
            .filter(accounts::Column::IsActive.eq(true))
            .filter(Expr::expr(Func::lower(Expr::col(accounts::Column::Email))).eq(wanted))
            .order_by_asc(accounts::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to query accounts by email")?;

        Ok(rows.into_iter().map(Account::from).collect())
    }

    pub async fn list(&self) -> Result<Vec<Account>> {
        let rows = Accounts::find()
            .order_by_asc(accounts::Column::Username)
            .all(&self.conn)
            .await
            .context("Failed to list accounts")?;

        Ok(rows.into_iter().map(Account::from).collect())
    }

    pub async fn count(&self) -> Result<u64> {
        use sea_orm::PaginatorTrait;

        Accounts::find()
            .count(&self.conn)
            .await
            .context("Failed to count accounts")
    }

    /// Updates one existing row. Returns `None` when the id is unknown;
    /// never inserts.
    pub async fn update(&self, id: i32, changes: AccountChanges) -> Result<Option<Account>> {
        let Some(existing) = Accounts::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };

        let mut active: accounts::ActiveModel = existing.into();
        active.username = Set(changes.username);
        active.first_name = Set(changes.first_name);
        active.last_name = Set(changes.last_name);
        active.email = Set(changes.email);
        active.is_staff = Set(changes.is_staff);
        active.is_superuser = Set(changes.is_superuser);
        active.is_active = Set(changes.is_active);

        let model = active.update(&self.conn).await?;
        Ok(Some(Account::from(model)))
    }

    pub async fn set_password_hash(&self, id: i32, password_hash: String) -> Result<()> {
        let account = Accounts::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query account for password update")?
            .ok_or_else(|| anyhow::anyhow!("Account not found: {id}"))?;

        let mut active: accounts::ActiveModel = account.into();
        active.password_hash = Set(password_hash);
        active.update(&self.conn).await?;

        Ok(())
    }

    pub async fn touch_last_login(&self, id: i32) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();

        Accounts::update_many()
            .col_expr(
                accounts::Column::LastLogin,
                sea_orm::sea_query::Expr::value(now),
            )
            .filter(accounts::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to record last login")?;

        Ok(())
    }
}
