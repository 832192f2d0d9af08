use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::entities::{password_resets, prelude::*};

#[derive(Debug, Clone)]
pub struct PasswordResetEntry {
    pub id: i32,
    pub account_id: i32,
    pub verifier_hash: String,
    pub expires_at: String,
    pub used: bool,
}

impl From<password_resets::Model> for PasswordResetEntry {
    fn from(model: password_resets::Model) -> Self {
        Self {
            id: model.id,
            account_id: model.account_id,
            verifier_hash: model.verifier_hash,
            expires_at: model.expires_at,
            used: model.used_at.is_some(),
        }
    }
}

pub struct PasswordResetRepository {
    conn: DatabaseConnection,
}

impl PasswordResetRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(
        &self,
        account_id: i32,
        selector: &str,
        verifier_hash: String,
        expires_at: String,
    ) -> Result<()> {
        let active = password_resets::ActiveModel {
            account_id: Set(account_id),
            selector: Set(selector.to_string()),
            verifier_hash: Set(verifier_hash),
            expires_at: Set(expires_at),
            used_at: Set(None),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to store password reset")?;
        Ok(())
    }

    pub async fn get_by_selector(&self, selector: &str) -> Result<Option<PasswordResetEntry>> {
        let row = PasswordResets::find()
            .filter(password_resets::Column::Selector.eq(selector))
            .one(&self.conn)
            .await
            .context("Failed to query password reset")?;

        Ok(row.map(PasswordResetEntry::from))
    }

    /// Marks the entry used. Returns false if it was already used, so two
    /// concurrent confirmations cannot both succeed.
    pub async fn mark_used(&self, id: i32) -> Result<bool> {
        let result = PasswordResets::update_many()
            .col_expr(
                password_resets::Column::UsedAt,
                sea_orm::sea_query::Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .filter(password_resets::Column::Id.eq(id))
            .filter(password_resets::Column::UsedAt.is_null())
            .exec(&self.conn)
            .await
            .context("Failed to mark password reset used")?;

        Ok(result.rows_affected == 1)
    }

    /// Drops unused entries for an account once its password changed.
    pub async fn invalidate_for_account(&self, account_id: i32) -> Result<u64> {
        let result = PasswordResets::delete_many()
            .filter(password_resets::Column::AccountId.eq(account_id))
            .filter(password_resets::Column::UsedAt.is_null())
            .exec(&self.conn)
            .await
            .context("Failed to invalidate password resets")?;

        Ok(result.rows_affected)
    }
}
