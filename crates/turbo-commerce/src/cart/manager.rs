//! Active cart orchestration.
//!
//! The manager owns the lifecycle of the one cart a visitor is building:
//!
//! ```text
//! NoCartId --create--> Creating --> Active <--> RegionMismatch --> Reconciling
//!                                     |
//!                                     +--complete--> Completing --> Completed
//! ```
//!
//! A persisted id the backend no longer knows is cleared and a fresh cart is
//! provisioned. A cart in another region than the visitor is moved when
//! `auto_update_region` is set.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};
use turbo_cache::{CacheError, CacheStore, CacheStrategy, Namespace, StrategyKind};
use turbo_data::{CancellationToken, RegionContext};
use turbo_query::QueryClient;

use super::keys;
use super::model::{AddLineItemInput, Cart, CompleteCartResult, CreateCartInput, UpdateCartInput};
use super::service::{CartIdStore, CartService};
use crate::checkout::{AddressPair, AddressValidator};
use crate::error::CommerceError;
use crate::ids::{CartId, LineItemId, RegionId};
use crate::orders::{self, Order};

/// Cart provisioning behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartOptions {
    /// Create a cart when none is persisted.
    pub auto_create: bool,
    /// Wait for a region before creating a cart.
    pub require_region: bool,
    /// Move a cart to the visitor's region when they differ.
    pub auto_update_region: bool,
}

impl Default for CartOptions {
    fn default() -> Self {
        Self {
            auto_create: true,
            require_region: true,
            auto_update_region: true,
        }
    }
}

/// Lifecycle of the active cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartState {
    NoCartId,
    Creating,
    Active,
    RegionMismatch,
    Reconciling,
    Completing,
    Completed,
}

/// Builds the create body when a mutation needs a cart first.
pub type CreateCartFn = Arc<dyn Fn(&AddLineItemInput, &RegionContext) -> CreateCartInput + Send + Sync>;

/// Write a cart under its active key. Older entries for the same id go stale.
pub(crate) fn store_cart(
    store: &CacheStore,
    namespace: &Namespace,
    strategy: &CacheStrategy,
    cart: &Cart,
) -> Result<(), CacheError> {
    store.invalidate(&keys::active_prefix(namespace, Some(&cart.id)));
    store.set_data_with(
        &keys::active(namespace, Some(&cart.id), cart.region_id.as_ref()),
        &Some(cart),
        strategy,
    )
}

/// Orchestrates the active cart.
#[derive(Clone)]
pub struct CartManager {
    service: Arc<dyn CartService>,
    ids: Arc<dyn CartIdStore>,
    store: CacheStore,
    namespace: Namespace,
    strategy: CacheStrategy,
    options: CartOptions,
    state: Arc<Mutex<CartState>>,
    provisioning: Arc<tokio::sync::Mutex<()>>,
    create_input: CreateCartFn,
    address_rules: AddressValidator,
}

impl std::fmt::Debug for CartManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartManager")
            .field("namespace", &self.namespace)
            .field("options", &self.options)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl CartManager {
    pub fn new(service: Arc<dyn CartService>, ids: Arc<dyn CartIdStore>, client: &QueryClient) -> Self {
        let state = if ids.get().is_some() {
            CartState::Active
        } else {
            CartState::NoCartId
        };
        Self {
            service,
            ids,
            store: client.store().clone(),
            namespace: client.namespace().clone(),
            strategy: client.strategy(StrategyKind::Realtime),
            options: CartOptions::default(),
            state: Arc::new(Mutex::new(state)),
            provisioning: Arc::new(tokio::sync::Mutex::new(())),
            create_input: Arc::new(|_, region| create_for_region(region)),
            address_rules: AddressValidator::default(),
        }
    }

    /// Set provisioning behavior.
    pub fn with_options(mut self, options: CartOptions) -> Self {
        self.options = options;
        self
    }

    /// Customize the create body used when adding to a missing cart.
    pub fn with_create_input(
        mut self,
        f: impl Fn(&AddLineItemInput, &RegionContext) -> CreateCartInput + Send + Sync + 'static,
    ) -> Self {
        self.create_input = Arc::new(f);
        self
    }

    /// Replace the rules checked by [`set_addresses`](Self::set_addresses).
    pub fn with_address_rules(mut self, rules: AddressValidator) -> Self {
        self.address_rules = rules;
        self
    }

    pub fn options(&self) -> CartOptions {
        self.options
    }

    pub fn state(&self) -> CartState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: CartState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != next {
            debug!(from = ?*state, to = ?next, "cart state");
            *state = next;
        }
    }

    /// The persisted cart id.
    pub fn cart_id(&self) -> Option<CartId> {
        self.ids.get()
    }

    fn require_cart_id(&self) -> Result<CartId, CommerceError> {
        self.ids.get().ok_or(CommerceError::NoActiveCart)
    }

    /// Resolve the active cart for a region.
    ///
    /// Returns `None` when no cart exists and none may be created yet.
    pub async fn active(
        &self,
        region: &RegionContext,
        cancel: &CancellationToken,
    ) -> Result<Option<Cart>, CommerceError> {
        let Some(cart_id) = self.ids.get() else {
            return self.provision(region).await;
        };

        match self.read(&cart_id, region, cancel).await {
            Ok(Some(cart)) => {
                self.set_state(CartState::Active);
                self.reconcile_region(cart, region).await.map(Some)
            }
            Ok(None) => self.recover_missing(&cart_id, region).await,
            Err(e) if e.is_not_found() => self.recover_missing(&cart_id, region).await,
            Err(e) => Err(e),
        }
    }

    async fn read(
        &self,
        cart_id: &CartId,
        region: &RegionContext,
        cancel: &CancellationToken,
    ) -> Result<Option<Cart>, CommerceError> {
        let region_id = region.region_id.as_deref().map(RegionId::from);
        let key = keys::active(&self.namespace, Some(cart_id), region_id.as_ref());
        let service = self.service.clone();
        let cart_id = cart_id.clone();
        let cart = self
            .store
            .query::<Option<Cart>, _, _>(&key, &self.strategy, cancel, move |token| {
                let service = service.clone();
                let cart_id = cart_id.clone();
                async move { service.retrieve(cart_id, token).await }
            })
            .await?;
        Ok(cart)
    }

    async fn recover_missing(
        &self,
        cart_id: &CartId,
        region: &RegionContext,
    ) -> Result<Option<Cart>, CommerceError> {
        warn!(cart_id = %cart_id, "persisted cart no longer exists, clearing");
        self.forget(cart_id);
        self.provision(region).await
    }

    fn forget(&self, cart_id: &CartId) {
        if self.ids.get().as_ref() == Some(cart_id) {
            self.ids.clear();
        }
        self.store.remove(&keys::active_prefix(&self.namespace, Some(cart_id)));
        self.set_state(CartState::NoCartId);
    }

    async fn provision(&self, region: &RegionContext) -> Result<Option<Cart>, CommerceError> {
        if !self.options.auto_create {
            self.set_state(CartState::NoCartId);
            return Ok(None);
        }
        if self.options.require_region && region.region_id.is_none() {
            debug!("cart creation waits for a region");
            return Ok(None);
        }
        self.create(create_for_region(region)).await.map(Some)
    }

    // Single flight: callers racing to create share the first cart.
    async fn create(&self, input: CreateCartInput) -> Result<Cart, CommerceError> {
        let _guard = self.provisioning.lock().await;
        if let Some(cart_id) = self.ids.get() {
            let region_id = input.region_id.clone();
            let key = keys::active(&self.namespace, Some(&cart_id), region_id.as_ref());
            if let Some(Some(cart)) = self.store.get_data::<Option<Cart>>(&key)? {
                return Ok(cart);
            }
            let existing = match self.service.retrieve(cart_id.clone(), CancellationToken::new()).await {
                Ok(cart) => cart,
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e.into()),
            };
            if let Some(cart) = existing {
                self.write_back(&cart)?;
                return Ok(cart);
            }
            self.forget(&cart_id);
        }

        self.set_state(CartState::Creating);
        let cart = match self.service.create(input).await {
            Ok(cart) => cart,
            Err(e) => {
                self.set_state(CartState::NoCartId);
                return Err(e.into());
            }
        };
        self.write_back(&cart)?;
        self.set_state(CartState::Active);
        info!(cart_id = %cart.id, region_id = ?cart.region_id, "cart created");
        Ok(cart)
    }

    async fn reconcile_region(&self, cart: Cart, region: &RegionContext) -> Result<Cart, CommerceError> {
        let Some(wanted) = region.region_id.as_deref() else {
            return Ok(cart);
        };
        if cart.in_region(wanted) {
            return Ok(cart);
        }

        self.set_state(CartState::RegionMismatch);
        if !self.options.auto_update_region {
            return Ok(cart);
        }

        self.set_state(CartState::Reconciling);
        info!(cart_id = %cart.id, from = ?cart.region_id, to = wanted, "moving cart to region");
        match self.service.update(&cart.id, UpdateCartInput::region(wanted)).await {
            Ok(updated) => {
                self.write_back(&updated)?;
                self.set_state(CartState::Active);
                Ok(updated)
            }
            Err(e) => {
                self.set_state(CartState::RegionMismatch);
                Err(e.into())
            }
        }
    }

    /// Persist the id and cache the cart. Entries for a replaced id are removed.
    fn write_back(&self, cart: &Cart) -> Result<(), CommerceError> {
        let previous = self.ids.get();
        if previous.as_ref() != Some(&cart.id) {
            if let Some(previous) = previous {
                let removed = self
                    .store
                    .remove(&keys::active_prefix(&self.namespace, Some(&previous)));
                debug!(from = %previous, to = %cart.id, removed, "cart id changed");
            }
            self.ids.set(&cart.id);
        }
        store_cart(&self.store, &self.namespace, &self.strategy, cart)?;
        Ok(())
    }

    /// Add a variant, creating a cart first when allowed.
    pub async fn add_item(&self, input: AddLineItemInput, region: &RegionContext) -> Result<Cart, CommerceError> {
        if input.quantity == 0 {
            return Err(CommerceError::Validation("quantity must be at least 1".to_string()));
        }

        let cart_id = match self.ids.get() {
            Some(id) => id,
            None if self.options.auto_create => self.create((self.create_input)(&input, region)).await?.id,
            None => return Err(CommerceError::NoActiveCart),
        };

        let cart = self.service.add_line_item(&cart_id, input).await?;
        self.write_back(&cart)?;
        Ok(cart)
    }

    /// Change a line quantity. Zero removes the line.
    pub async fn update_item(&self, line_id: &LineItemId, quantity: u32) -> Result<Cart, CommerceError> {
        if quantity == 0 {
            return self.remove_item(line_id).await;
        }
        let cart_id = self.require_cart_id()?;
        let cart = self.service.update_line_item(&cart_id, line_id, quantity).await?;
        self.write_back(&cart)?;
        Ok(cart)
    }

    pub async fn remove_item(&self, line_id: &LineItemId) -> Result<Cart, CommerceError> {
        let cart_id = self.require_cart_id()?;
        let cart = self.service.delete_line_item(&cart_id, line_id).await?;
        self.write_back(&cart)?;
        Ok(cart)
    }

    /// Update cart fields.
    pub async fn update(&self, input: UpdateCartInput) -> Result<Cart, CommerceError> {
        let cart_id = self.require_cart_id()?;
        let cart = self.service.update(&cart_id, input).await?;
        self.write_back(&cart)?;
        Ok(cart)
    }

    /// Validate and set the shipping and billing addresses.
    ///
    /// Invalid addresses fail before any backend call.
    pub async fn set_addresses(&self, addresses: &AddressPair) -> Result<Cart, CommerceError> {
        let (shipping, billing, email) = addresses.resolve(&self.address_rules)?;
        self.update(UpdateCartInput {
            email,
            shipping_address: Some(shipping),
            billing_address: Some(billing),
            ..Default::default()
        })
        .await
    }

    /// Apply promotion codes. Blank codes are dropped.
    pub async fn apply_promotions(&self, codes: &[&str]) -> Result<Cart, CommerceError> {
        let codes = clean_codes(codes)?;
        let cart_id = self.require_cart_id()?;
        let cart = self.service.add_promotions(&cart_id, codes).await?;
        self.write_back(&cart)?;
        Ok(cart)
    }

    pub async fn remove_promotions(&self, codes: &[&str]) -> Result<Cart, CommerceError> {
        let codes = clean_codes(codes)?;
        let cart_id = self.require_cart_id()?;
        let cart = self.service.remove_promotions(&cart_id, codes).await?;
        self.write_back(&cart)?;
        Ok(cart)
    }

    /// Attach the cart to the signed-in customer.
    pub async fn transfer(&self) -> Result<Cart, CommerceError> {
        let cart_id = self.require_cart_id()?;
        let cart = self.service.transfer(&cart_id).await?;
        self.write_back(&cart)?;
        info!(cart_id = %cart.id, customer_id = ?cart.customer_id, "cart transferred");
        Ok(cart)
    }

    /// Complete the cart.
    ///
    /// On success the persisted id is cleared, cart entries are removed and
    /// orders go stale. A refusal keeps the cart and returns
    /// [`CommerceError::Completion`].
    pub async fn complete(&self) -> Result<Order, CommerceError> {
        let cart_id = self.require_cart_id()?;
        self.set_state(CartState::Completing);

        let result = match self.service.complete(&cart_id).await {
            Ok(result) => result,
            Err(e) => {
                self.set_state(CartState::Active);
                return Err(e.into());
            }
        };

        match result {
            CompleteCartResult::Order { order } => {
                self.ids.clear();
                self.store.remove(&keys::all(&self.namespace));
                self.store.invalidate(&orders::keys(&self.namespace).all());
                self.set_state(CartState::Completed);
                info!(cart_id = %cart_id, order_id = %order.id, "cart completed");
                Ok(order)
            }
            CompleteCartResult::Cart { cart, error } => {
                warn!(cart_id = %cart.id, %error, "cart completion refused");
                self.write_back(&cart)?;
                self.set_state(CartState::Active);
                Err(CommerceError::Completion {
                    cart_id: cart.id,
                    message: error,
                })
            }
        }
    }
}

fn create_for_region(region: &RegionContext) -> CreateCartInput {
    CreateCartInput::for_region(
        region.region_id.as_deref().map(RegionId::from),
        region.country_code.clone(),
    )
}

fn clean_codes(codes: &[&str]) -> Result<Vec<String>, CommerceError> {
    let codes: Vec<String> = codes
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    if codes.is_empty() {
        return Err(CommerceError::Validation("no promotion codes given".to_string()));
    }
    Ok(codes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::{InMemoryCartIdStore, LineItem};
    use crate::checkout::Address;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use turbo_data::{ServiceError, ServiceResult};

    #[derive(Default)]
    struct FakeCarts {
        carts: Mutex<HashMap<CartId, Cart>>,
        next_id: AtomicUsize,
        creates: AtomicUsize,
        updates: AtomicUsize,
        retrieves: AtomicUsize,
        refuse_completion: bool,
        missing_as_error: bool,
    }

    impl FakeCarts {
        fn seeded(cart: Cart) -> Self {
            let fake = Self::default();
            fake.carts.lock().unwrap().insert(cart.id.clone(), cart);
            fake
        }

        fn mutate(&self, id: &CartId, f: impl FnOnce(&mut Cart)) -> ServiceResult<Cart> {
            let mut carts = self.carts.lock().unwrap();
            let cart = carts
                .get_mut(id)
                .ok_or_else(|| ServiceError::not_found(format!("cart {id}")))?;
            f(cart);
            Ok(cart.clone())
        }
    }

    #[async_trait]
    impl CartService for FakeCarts {
        async fn retrieve(&self, id: CartId, _cancel: CancellationToken) -> ServiceResult<Option<Cart>> {
            self.retrieves.fetch_add(1, Ordering::SeqCst);
            match self.carts.lock().unwrap().get(&id).cloned() {
                None if self.missing_as_error => Err(ServiceError::not_found(format!("cart {id}"))),
                cart => Ok(cart),
            }
        }

        async fn create(&self, input: CreateCartInput) -> ServiceResult<Cart> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            let mut cart = Cart::new(format!("cart_new_{n}"));
            cart.region_id = input.region_id;
            self.carts.lock().unwrap().insert(cart.id.clone(), cart.clone());
            Ok(cart)
        }

        async fn update(&self, id: &CartId, input: UpdateCartInput) -> ServiceResult<Cart> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            self.mutate(id, |cart| {
                if input.region_id.is_some() {
                    cart.region_id = input.region_id;
                }
                if input.email.is_some() {
                    cart.email = input.email;
                }
                if input.shipping_address.is_some() {
                    cart.shipping_address = input.shipping_address;
                }
                if input.billing_address.is_some() {
                    cart.billing_address = input.billing_address;
                }
            })
        }

        async fn add_line_item(&self, id: &CartId, input: AddLineItemInput) -> ServiceResult<Cart> {
            self.mutate(id, |cart| {
                let n = cart.items.len() + 1;
                cart.items.push(LineItem {
                    id: format!("li_{n}").into(),
                    variant_id: input.variant_id,
                    product_id: None,
                    title: String::new(),
                    quantity: input.quantity,
                    unit_price: 1000,
                });
            })
        }

        async fn update_line_item(&self, id: &CartId, line_id: &LineItemId, quantity: u32) -> ServiceResult<Cart> {
            self.mutate(id, |cart| {
                if let Some(line) = cart.items.iter_mut().find(|l| &l.id == line_id) {
                    line.quantity = quantity;
                }
            })
        }

        async fn delete_line_item(&self, id: &CartId, line_id: &LineItemId) -> ServiceResult<Cart> {
            self.mutate(id, |cart| cart.items.retain(|l| &l.id != line_id))
        }

        async fn add_promotions(&self, id: &CartId, codes: Vec<String>) -> ServiceResult<Cart> {
            self.mutate(id, |cart| cart.promo_codes.extend(codes))
        }

        async fn remove_promotions(&self, id: &CartId, codes: Vec<String>) -> ServiceResult<Cart> {
            self.mutate(id, |cart| cart.promo_codes.retain(|c| !codes.contains(c)))
        }

        async fn transfer(&self, id: &CartId) -> ServiceResult<Cart> {
            self.mutate(id, |cart| cart.customer_id = Some("cus_1".into()))
        }

        async fn complete(&self, id: &CartId) -> ServiceResult<CompleteCartResult> {
            let cart = self.mutate(id, |_| {})?;
            if self.refuse_completion {
                return Ok(CompleteCartResult::Cart {
                    cart,
                    error: "payment not authorized".to_string(),
                });
            }
            self.carts.lock().unwrap().remove(id);
            Ok(CompleteCartResult::Order {
                order: Order::new("order_1"),
            })
        }
    }

    fn manager(service: Arc<FakeCarts>, ids: InMemoryCartIdStore) -> (CartManager, Arc<InMemoryCartIdStore>, QueryClient) {
        let client = QueryClient::default();
        let ids = Arc::new(ids);
        (CartManager::new(service, ids.clone(), &client), ids, client)
    }

    fn eu() -> RegionContext {
        RegionContext::new("reg_eu").with_country("de")
    }

    #[tokio::test]
    async fn test_first_read_creates_once_and_persists() {
        let service = Arc::new(FakeCarts::default());
        let (carts, ids, _) = manager(service.clone(), InMemoryCartIdStore::new());
        let cancel = CancellationToken::new();
        let region = eu();

        let (first, second) = tokio::join!(carts.active(&region, &cancel), carts.active(&region, &cancel));
        let first = first.unwrap().unwrap();
        let second = second.unwrap().unwrap();

        assert_eq!(service.creates.load(Ordering::SeqCst), 1);
        assert_eq!(first.id, second.id);
        assert_eq!(ids.get(), Some(first.id.clone()));
        assert_eq!(first.region_id, Some(RegionId::new("reg_eu")));
        assert_eq!(carts.state(), CartState::Active);
    }

    #[tokio::test]
    async fn test_waits_for_region() {
        let service = Arc::new(FakeCarts::default());
        let (carts, _, _) = manager(service.clone(), InMemoryCartIdStore::new());

        let cart = carts
            .active(&RegionContext::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(cart, None);
        assert_eq!(service.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_auto_create() {
        let service = Arc::new(FakeCarts::default());
        let (carts, _, _) = manager(service.clone(), InMemoryCartIdStore::new());
        let carts = carts.with_options(CartOptions {
            auto_create: false,
            ..Default::default()
        });

        assert_eq!(carts.active(&eu(), &CancellationToken::new()).await.unwrap(), None);
        let err = carts.add_item(AddLineItemInput::new("var_a", 1), &eu()).await.unwrap_err();
        assert!(matches!(err, CommerceError::NoActiveCart));
        assert_eq!(service.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_cart_is_replaced() {
        let service = Arc::new(FakeCarts::default());
        let (carts, ids, client) = manager(service.clone(), InMemoryCartIdStore::with_id("cart_gone"));

        let cart = carts.active(&eu(), &CancellationToken::new()).await.unwrap().unwrap();

        assert_ne!(cart.id.as_str(), "cart_gone");
        assert_eq!(ids.get(), Some(cart.id.clone()));
        assert_eq!(service.creates.load(Ordering::SeqCst), 1);
        let stale = keys::active_prefix(client.namespace(), Some(&CartId::new("cart_gone")));
        assert!(client.store().keys().iter().all(|k| !k.starts_with(&stale)));
    }

    #[tokio::test]
    async fn test_not_found_error_is_replaced() {
        let service = Arc::new(FakeCarts {
            missing_as_error: true,
            ..FakeCarts::default()
        });
        let (carts, ids, client) = manager(service.clone(), InMemoryCartIdStore::with_id("cart_gone"));

        let cart = carts.active(&eu(), &CancellationToken::new()).await.unwrap().unwrap();

        assert_ne!(cart.id.as_str(), "cart_gone");
        assert_eq!(ids.get(), Some(cart.id.clone()));
        assert_eq!(service.creates.load(Ordering::SeqCst), 1);
        assert_eq!(carts.state(), CartState::Active);
        let stale = keys::active_prefix(client.namespace(), Some(&CartId::new("cart_gone")));
        assert!(client.store().keys().iter().all(|k| !k.starts_with(&stale)));
    }

    #[tokio::test]
    async fn test_create_recovers_from_not_found_error() {
        let service = Arc::new(FakeCarts {
            missing_as_error: true,
            ..FakeCarts::default()
        });
        let (carts, ids, _) = manager(service.clone(), InMemoryCartIdStore::with_id("cart_gone"));

        let cart = carts.create(create_for_region(&eu())).await.unwrap();

        assert_ne!(cart.id.as_str(), "cart_gone");
        assert_eq!(ids.get(), Some(cart.id));
        assert_eq!(service.retrieves.load(Ordering::SeqCst), 1);
        assert_eq!(service.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_region_mismatch_moves_cart() {
        let service = Arc::new(FakeCarts::seeded(Cart::new("cart_1").with_region("reg_us")));
        let (carts, _, _) = manager(service.clone(), InMemoryCartIdStore::with_id("cart_1"));
        let cancel = CancellationToken::new();

        let cart = carts.active(&eu(), &cancel).await.unwrap().unwrap();
        assert_eq!(cart.region_id, Some(RegionId::new("reg_eu")));
        assert_eq!(service.updates.load(Ordering::SeqCst), 1);
        assert_eq!(carts.state(), CartState::Active);

        // the moved cart is cached under the new region
        carts.active(&eu(), &cancel).await.unwrap();
        assert_eq!(service.updates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_region_mismatch_left_alone() {
        let service = Arc::new(FakeCarts::seeded(Cart::new("cart_1").with_region("reg_us")));
        let (carts, _, _) = manager(service.clone(), InMemoryCartIdStore::with_id("cart_1"));
        let carts = carts.with_options(CartOptions {
            auto_update_region: false,
            ..Default::default()
        });

        let cart = carts.active(&eu(), &CancellationToken::new()).await.unwrap().unwrap();
        assert_eq!(cart.region_id, Some(RegionId::new("reg_us")));
        assert_eq!(carts.state(), CartState::RegionMismatch);
        assert_eq!(service.updates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_add_item_creates_cart() {
        let service = Arc::new(FakeCarts::default());
        let (carts, ids, _) = manager(service.clone(), InMemoryCartIdStore::new());
        let carts = carts.with_create_input(|item, region| {
            let mut input = CreateCartInput::for_region(region.region_id.as_deref().map(RegionId::from), None);
            input.email = Some(format!("guest+{}@example.com", item.variant_id));
            input
        });

        let cart = carts.add_item(AddLineItemInput::new("var_a", 2), &eu()).await.unwrap();
        assert_eq!(cart.item_count(), 2);
        assert_eq!(ids.get(), Some(cart.id));
        assert_eq!(service.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_line_item_changes() {
        let service = Arc::new(FakeCarts::seeded(Cart::new("cart_1").with_region("reg_eu")));
        let (carts, _, _) = manager(service, InMemoryCartIdStore::with_id("cart_1"));

        let cart = carts.add_item(AddLineItemInput::new("var_a", 1), &eu()).await.unwrap();
        let line = cart.items[0].id.clone();

        let cart = carts.update_item(&line, 3).await.unwrap();
        assert_eq!(cart.item_count(), 3);

        let cart = carts.update_item(&line, 0).await.unwrap();
        assert!(cart.is_empty());

        let err = carts.add_item(AddLineItemInput::new("var_a", 0), &eu()).await.unwrap_err();
        assert!(matches!(err, CommerceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_mutations_write_through() {
        let service = Arc::new(FakeCarts::seeded(Cart::new("cart_1").with_region("reg_eu")));
        let (carts, _, _) = manager(service.clone(), InMemoryCartIdStore::with_id("cart_1"));
        let cancel = CancellationToken::new();

        carts.active(&eu(), &cancel).await.unwrap();
        carts.apply_promotions(&["SUMMER", " "]).await.unwrap();

        let cart = carts.active(&eu(), &cancel).await.unwrap().unwrap();
        assert_eq!(cart.promo_codes, ["SUMMER"]);
        assert_eq!(service.retrieves.load(Ordering::SeqCst), 1);

        let cart = carts.remove_promotions(&["SUMMER"]).await.unwrap();
        assert!(cart.promo_codes.is_empty());
        assert!(carts.apply_promotions(&["  "]).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_address_makes_no_call() {
        let service = Arc::new(FakeCarts::seeded(Cart::new("cart_1")));
        let (carts, _, _) = manager(service.clone(), InMemoryCartIdStore::with_id("cart_1"));

        let mut shipping = Address::new("Jane", "Smith", "1 Main St", "Berlin", "DE", "10115");
        shipping.city.clear();
        let err = carts.set_addresses(&AddressPair::same_as_shipping(shipping)).await.unwrap_err();

        assert!(matches!(err, CommerceError::Validation(_)));
        assert_eq!(service.updates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_custom_address_rules() {
        let service = Arc::new(FakeCarts::seeded(Cart::new("cart_1")));
        let (carts, _, _) = manager(service.clone(), InMemoryCartIdStore::with_id("cart_1"));
        let carts = carts.with_address_rules(AddressValidator::new(|address| {
            if address.country_code == "de" {
                Vec::new()
            } else {
                vec![format!("no delivery to '{}'", address.country_code)]
            }
        }));

        let shipping = Address::new("Jane", "Smith", "1 Main St", "Paris", "FR", "75001");
        let err = carts.set_addresses(&AddressPair::same_as_shipping(shipping)).await.unwrap_err();
        assert!(matches!(err, CommerceError::Validation(msg) if msg == "shipping no delivery to 'fr'"));
        assert_eq!(service.updates.load(Ordering::SeqCst), 0);

        // the custom rules replace the standard ones
        let mut shipping = Address::new("Jane", "Smith", "1 Main St", "Berlin", "DE", "10115");
        shipping.city.clear();
        carts.set_addresses(&AddressPair::same_as_shipping(shipping)).await.unwrap();
        assert_eq!(service.updates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_set_addresses_same_as_shipping() {
        let service = Arc::new(FakeCarts::seeded(Cart::new("cart_1")));
        let (carts, _, _) = manager(service, InMemoryCartIdStore::with_id("cart_1"));

        let shipping = Address::new("Jane", "Smith", "1 Main St", "Berlin", "DE", "10115");
        let cart = carts
            .set_addresses(&AddressPair::same_as_shipping(shipping).with_email("jane@example.com"))
            .await
            .unwrap();

        assert_eq!(cart.shipping_address, cart.billing_address);
        assert_eq!(cart.shipping_address.map(|a| a.country_code).as_deref(), Some("de"));
        assert_eq!(cart.email.as_deref(), Some("jane@example.com"));
    }

    #[tokio::test]
    async fn test_transfer() {
        let service = Arc::new(FakeCarts::seeded(Cart::new("cart_1")));
        let (carts, _, _) = manager(service, InMemoryCartIdStore::with_id("cart_1"));
        let cart = carts.transfer().await.unwrap();
        assert_eq!(cart.customer_id.map(|c| c.into_inner()).as_deref(), Some("cus_1"));
    }

    #[tokio::test]
    async fn test_complete_clears_cart() {
        let service = Arc::new(FakeCarts::seeded(Cart::new("cart_1").with_region("reg_eu")));
        let (carts, ids, client) = manager(service, InMemoryCartIdStore::with_id("cart_1"));
        let cancel = CancellationToken::new();
        carts.active(&eu(), &cancel).await.unwrap();

        let orders_key = orders::keys(client.namespace()).lists();
        client.store().set_data(&orders_key, &Vec::<Order>::new()).unwrap();

        let order = carts.complete().await.unwrap();
        assert_eq!(order.id.as_str(), "order_1");
        assert_eq!(ids.get(), None);
        assert_eq!(carts.state(), CartState::Completed);
        assert!(client.store().keys().iter().all(|k| !k.starts_with(&keys::all(client.namespace()))));
        assert!(client.store().snapshot(&orders_key).unwrap().invalidated);
    }

    #[tokio::test]
    async fn test_refused_completion_keeps_cart() {
        let service = Arc::new(FakeCarts {
            refuse_completion: true,
            ..FakeCarts::seeded(Cart::new("cart_1"))
        });
        let (carts, ids, _) = manager(service, InMemoryCartIdStore::with_id("cart_1"));

        let err = carts.complete().await.unwrap_err();
        assert!(matches!(
            err,
            CommerceError::Completion { ref cart_id, ref message }
                if cart_id.as_str() == "cart_1" && message == "payment not authorized"
        ));
        assert_eq!(ids.get(), Some(CartId::new("cart_1")));
        assert_eq!(carts.state(), CartState::Active);
    }

    #[tokio::test]
    async fn test_mutation_without_cart() {
        let (carts, _, _) = manager(Arc::new(FakeCarts::default()), InMemoryCartIdStore::new());
        assert!(matches!(carts.transfer().await, Err(CommerceError::NoActiveCart)));
        assert!(matches!(carts.complete().await, Err(CommerceError::NoActiveCart)));
    }
}
