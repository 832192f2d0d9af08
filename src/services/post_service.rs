//! Message board posts.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::db::{Post, Store};
use crate::identity::Account;

pub const MAX_POST_CHARS: usize = 280;

#[derive(Debug, Error)]
pub enum PostError {
    #[error("{0}")]
    Validation(String),

    #[error("Post {0} not found")]
    NotFound(i32),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for PostError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[async_trait]
pub trait PostService: Send + Sync {
    async fn create(&self, author: &Account, body: &str) -> Result<Post, PostError>;

    /// Newest first, with author handles.
    async fn list(&self, limit: u64) -> Result<Vec<Post>, PostError>;

    async fn list_by_author(&self, author_id: i32) -> Result<Vec<Post>, PostError>;
}

pub struct SeaOrmPostService {
    store: Store,
}

impl SeaOrmPostService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

fn clean_body(body: &str) -> Result<&str, PostError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(PostError::Validation("Post body cannot be empty".to_string()));
    }
    if body.chars().count() > MAX_POST_CHARS {
        return Err(PostError::Validation(format!(
            "Post body must be at most {MAX_POST_CHARS} characters"
        )));
    }
    Ok(body)
}

#[async_trait]
impl PostService for SeaOrmPostService {
    async fn create(&self, author: &Account, body: &str) -> Result<Post, PostError> {
        let body = clean_body(body)?;
        let id = self.store.create_post(author.id, body).await?;
        info!(post_id = id, author_id = author.id, "Post created");

        self.store.get_post(id).await?.ok_or(PostError::NotFound(id))
    }

    async fn list(&self, limit: u64) -> Result<Vec<Post>, PostError> {
        Ok(self.store.list_recent_posts(limit).await?)
    }

    async fn list_by_author(&self, author_id: i32) -> Result<Vec<Post>, PostError> {
        Ok(self.store.list_posts_by_author(author_id).await?)
    }
}
