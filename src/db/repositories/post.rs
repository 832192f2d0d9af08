use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::Serialize;

use crate::entities::{accounts, posts, prelude::*};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    pub id: i32,
    pub author_id: i32,
    pub author_username: String,
    pub body: String,
    pub created_at: String,
}

/// Repository for message board posts
pub struct PostRepository {
    conn: DatabaseConnection,
}

impl PostRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, author_id: i32, body: &str) -> Result<i32> {
        let active = posts::ActiveModel {
            author_id: Set(author_id),
            body: Set(body.to_string()),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert post")?;
        Ok(model.id)
    }

    pub async fn get(&self, id: i32) -> Result<Option<Post>> {
        let row = Posts::find_by_id(id)
            .find_also_related(Accounts)
            .one(&self.conn)
            .await
            .context("Failed to query post")?;

        Ok(row.map(|(post, author)| Self::map_post(post, author)))
    }

    /// Newest first.
    pub async fn list_recent(&self, limit: u64) -> Result<Vec<Post>> {
        let rows = Posts::find()
            .find_also_related(Accounts)
            .order_by_desc(posts::Column::Id)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to list posts")?;

        Ok(rows
            .into_iter()
            .map(|(post, author)| Self::map_post(post, author))
            .collect())
    }

    pub async fn list_by_author(&self, author_id: i32) -> Result<Vec<Post>> {
        let rows = Posts::find()
            .filter(posts::Column::AuthorId.eq(author_id))
            .find_also_related(Accounts)
            .order_by_desc(posts::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list posts by author")?;

        Ok(rows
            .into_iter()
            .map(|(post, author)| Self::map_post(post, author))
            .collect())
    }

    fn map_post(post: posts::Model, author: Option<accounts::Model>) -> Post {
        Post {
            id: post.id,
            author_id: post.author_id,
            author_username: author.map(|a| a.username).unwrap_or_default(),
            body: post.body,
            created_at: post.created_at,
        }
    }
}
