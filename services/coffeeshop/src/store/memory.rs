//! In-memory implementation of the drink store.
//!
//! # Purpose
//! Keeps drinks in a `BTreeMap` guarded by `tokio::sync::RwLock`. Used for
//! local development, tests, and deployments that do not need durability.
//!
//! # Durability and consistency
//! - **Not durable**: all drinks are lost on process restart.
//! - Mutations take the write lock for the whole check-then-write sequence, so
//!   title uniqueness holds under concurrent requests.
//! - Ids are assigned from a counter that starts at 1 and never reuses a value,
//!   even after deletes.
use super::{DrinkStore, StoreError, StoreResult};
use crate::model::{Drink, DrinkPatch, Ingredient, NewDrink};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Debug)]
struct Drinks {
    next_id: u64,
    items: BTreeMap<u64, Drink>,
}

impl Drinks {
    fn title_taken(&self, title: &str, except: Option<u64>) -> bool {
        self.items
            .values()
            .any(|drink| drink.title == title && Some(drink.id) != except)
    }
}

#[derive(Debug)]
pub struct InMemoryStore {
    drinks: RwLock<Drinks>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            drinks: RwLock::new(Drinks {
                next_id: 1,
                items: BTreeMap::new(),
            }),
        }
    }

    /// Store pre-populated with the sample "water" drink.
    pub async fn with_sample_drink() -> StoreResult<Self> {
        let store = Self::new();
        store
            .create_drink(NewDrink {
                title: "water".to_string(),
                recipe: vec![Ingredient {
                    name: "water".to_string(),
                    color: "blue".to_string(),
                    parts: 1,
                }],
            })
            .await?;
        Ok(store)
    }
}

#[async_trait]
impl DrinkStore for InMemoryStore {
    async fn list_drinks(&self) -> StoreResult<Vec<Drink>> {
        Ok(self.drinks.read().await.items.values().cloned().collect())
    }

    async fn get_drink(&self, id: u64) -> StoreResult<Drink> {
        self.drinks
            .read()
            .await
            .items
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("drink {id}")))
    }

    async fn create_drink(&self, drink: NewDrink) -> StoreResult<Drink> {
        let mut drinks = self.drinks.write().await;
        if drinks.title_taken(&drink.title, None) {
            return Err(StoreError::Conflict("drink title exists".into()));
        }
        let id = drinks.next_id;
        drinks.next_id += 1;
        let created = Drink {
            id,
            title: drink.title,
            recipe: drink.recipe,
        };
        drinks.items.insert(id, created.clone());
        metrics::counter!("coffee_drink_changes_total", "op" => "created").increment(1);
        metrics::gauge!("coffee_drinks_total").set(drinks.items.len() as f64);
        Ok(created)
    }

    async fn update_drink(&self, id: u64, patch: DrinkPatch) -> StoreResult<Drink> {
        let mut drinks = self.drinks.write().await;
        if let Some(title) = patch.title.as_deref()
            && drinks.title_taken(title, Some(id))
        {
            return Err(StoreError::Conflict("drink title exists".into()));
        }
        let drink = drinks
            .items
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("drink {id}")))?;
        if let Some(title) = patch.title {
            drink.title = title;
        }
        if let Some(recipe) = patch.recipe {
            drink.recipe = recipe;
        }
        let updated = drink.clone();
        metrics::counter!("coffee_drink_changes_total", "op" => "updated").increment(1);
        Ok(updated)
    }

    async fn delete_drink(&self, id: u64) -> StoreResult<()> {
        let mut drinks = self.drinks.write().await;
        if drinks.items.remove(&id).is_none() {
            return Err(StoreError::NotFound(format!("drink {id}")));
        }
        metrics::counter!("coffee_drink_changes_total", "op" => "deleted").increment(1);
        metrics::gauge!("coffee_drinks_total").set(drinks.items.len() as f64);
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
