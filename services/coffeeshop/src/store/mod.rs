//! Drink persistence boundary.
//!
//! Handlers only see [`DrinkStore`]; the backend is picked in `main`.
use crate::model::{Drink, DrinkPatch, NewDrink};
use async_trait::async_trait;
use thiserror::Error;

pub mod memory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait DrinkStore: Send + Sync {
    /// All drinks ordered by id.
    async fn list_drinks(&self) -> StoreResult<Vec<Drink>>;
    async fn get_drink(&self, id: u64) -> StoreResult<Drink>;
    /// Insert a drink; titles are unique.
    async fn create_drink(&self, drink: NewDrink) -> StoreResult<Drink>;
    async fn update_drink(&self, id: u64, patch: DrinkPatch) -> StoreResult<Drink>;
    async fn delete_drink(&self, id: u64) -> StoreResult<()>;
    async fn health_check(&self) -> StoreResult<()>;
    fn backend_name(&self) -> &'static str;
}
