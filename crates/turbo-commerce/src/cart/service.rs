//! Cart backend boundary and persisted cart id.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use turbo_data::{CancellationToken, ServiceResult};

use super::model::{AddLineItemInput, Cart, CompleteCartResult, CreateCartInput, UpdateCartInput};
use crate::ids::{CartId, LineItemId};

/// Cart endpoints.
#[async_trait]
pub trait CartService: Send + Sync {
    /// Fetch a cart. `Ok(None)` means the backend has no such cart.
    async fn retrieve(&self, id: CartId, cancel: CancellationToken) -> ServiceResult<Option<Cart>>;

    async fn create(&self, input: CreateCartInput) -> ServiceResult<Cart>;

    async fn update(&self, id: &CartId, input: UpdateCartInput) -> ServiceResult<Cart>;

    async fn add_line_item(&self, id: &CartId, input: AddLineItemInput) -> ServiceResult<Cart>;

    async fn update_line_item(&self, id: &CartId, line_id: &LineItemId, quantity: u32) -> ServiceResult<Cart>;

    async fn delete_line_item(&self, id: &CartId, line_id: &LineItemId) -> ServiceResult<Cart>;

    async fn add_promotions(&self, id: &CartId, codes: Vec<String>) -> ServiceResult<Cart>;

    async fn remove_promotions(&self, id: &CartId, codes: Vec<String>) -> ServiceResult<Cart>;

    /// Attach the cart to the signed-in customer.
    async fn transfer(&self, id: &CartId) -> ServiceResult<Cart>;

    /// Turn the cart into an order.
    async fn complete(&self, id: &CartId) -> ServiceResult<CompleteCartResult>;
}

/// Durable storage for the active cart id.
pub trait CartIdStore: Send + Sync {
    fn get(&self) -> Option<CartId>;
    fn set(&self, id: &CartId);
    fn clear(&self);
}

/// Process-local cart id storage.
#[derive(Debug, Default)]
pub struct InMemoryCartIdStore {
    id: Mutex<Option<CartId>>,
}

impl InMemoryCartIdStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a persisted id.
    pub fn with_id(id: impl Into<CartId>) -> Self {
        Self {
            id: Mutex::new(Some(id.into())),
        }
    }
}

impl CartIdStore for InMemoryCartIdStore {
    fn get(&self) -> Option<CartId> {
        self.id.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set(&self, id: &CartId) {
        *self.id.lock().unwrap_or_else(PoisonError::into_inner) = Some(id.clone());
    }

    fn clear(&self) {
        *self.id.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_id_store() {
        let store = InMemoryCartIdStore::new();
        assert_eq!(store.get(), None);

        store.set(&CartId::new("cart_1"));
        assert_eq!(store.get(), Some(CartId::new("cart_1")));

        store.clear();
        assert_eq!(store.get(), None);
        assert_eq!(InMemoryCartIdStore::with_id("cart_2").get(), Some(CartId::new("cart_2")));
    }
}
