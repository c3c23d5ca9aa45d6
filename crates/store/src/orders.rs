//! Order linkage: the externally owned order keeps a list of recipe ids.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, WashRecipeId};
use tokio::sync::RwLock;

use crate::{Result, StoreError};

/// Trait for maintaining an order's `wash_recipes` reference list.
///
/// Both operations are idempotent and return whether an order with the
/// given id exists. Updating an unknown order is a no-op, not an error.
#[async_trait]
pub trait OrderLinkage: Send + Sync {
    /// Adds the recipe id to the order's list unless it is already there.
    async fn add_recipe_ref(&self, order_id: OrderId, recipe_id: WashRecipeId) -> Result<bool>;

    /// Removes every occurrence of the recipe id from the order's list.
    async fn remove_recipe_ref(&self, order_id: OrderId, recipe_id: WashRecipeId)
    -> Result<bool>;
}

#[derive(Debug, Default)]
struct InMemoryOrderState {
    orders: HashMap<OrderId, Vec<WashRecipeId>>,
    fail_on_add: bool,
}

/// In-memory order linkage for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderLinks {
    state: Arc<RwLock<InMemoryOrderState>>,
}

impl InMemoryOrderLinks {
    /// Creates an empty order linkage service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an order with an empty recipe list and returns its id.
    pub async fn create_order(&self) -> OrderId {
        let id = OrderId::new();
        self.state.write().await.orders.insert(id, Vec::new());
        id
    }

    /// Configures the service to fail every add call.
    pub async fn set_fail_on_add(&self, fail: bool) {
        self.state.write().await.fail_on_add = fail;
    }

    /// Returns the recipe list of an order, or None if the order is unknown.
    pub async fn recipes_of(&self, order_id: OrderId) -> Option<Vec<WashRecipeId>> {
        self.state.read().await.orders.get(&order_id).cloned()
    }
}

#[async_trait]
impl OrderLinkage for InMemoryOrderLinks {
    async fn add_recipe_ref(&self, order_id: OrderId, recipe_id: WashRecipeId) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.fail_on_add {
            return Err(StoreError::Unavailable(format!(
                "order {order_id} rejected recipe link"
            )));
        }

        let Some(recipes) = state.orders.get_mut(&order_id) else {
            return Ok(false);
        };
        if !recipes.contains(&recipe_id) {
            recipes.push(recipe_id);
        }
        Ok(true)
    }

    async fn remove_recipe_ref(
        &self,
        order_id: OrderId,
        recipe_id: WashRecipeId,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(recipes) = state.orders.get_mut(&order_id) else {
            return Ok(false);
        };
        recipes.retain(|id| *id != recipe_id);
        Ok(true)
    }
}
