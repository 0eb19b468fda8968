//! Signed-in customer profile and address book.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use turbo_cache::{CacheStore, CacheStrategy, Namespace, QueryKey, StrategyKind};
use turbo_data::{CancellationToken, ServiceResult};
use turbo_query::QueryClient;

use super::keys;
use super::model::{Customer, CustomerAddress, UpdateCustomerInput};
use crate::checkout::{Address, AddressValidator};
use crate::error::CommerceError;
use crate::ids::AddressId;
use crate::sync::{CacheSync, SyncEvent};

/// Customer endpoints for the signed-in session.
#[async_trait]
pub trait CustomerService: Send + Sync {
    /// The signed-in customer.
    async fn retrieve(&self, cancel: CancellationToken) -> ServiceResult<Option<Customer>>;

    async fn update(&self, input: UpdateCustomerInput) -> ServiceResult<Customer>;

    async fn list_addresses(&self, cancel: CancellationToken) -> ServiceResult<Vec<CustomerAddress>>;

    async fn create_address(&self, address: Address) -> ServiceResult<Customer>;

    async fn update_address(&self, id: &AddressId, address: Address) -> ServiceResult<Customer>;

    async fn delete_address(&self, id: &AddressId) -> ServiceResult<Customer>;
}

/// Profile and address book operations.
#[derive(Clone)]
pub struct CustomerManager {
    service: Arc<dyn CustomerService>,
    store: CacheStore,
    namespace: Namespace,
    strategy: CacheStrategy,
    sync: CacheSync,
    address_rules: AddressValidator,
}

impl std::fmt::Debug for CustomerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomerManager")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl CustomerManager {
    pub fn new(service: Arc<dyn CustomerService>, client: &QueryClient) -> Self {
        Self {
            service,
            store: client.store().clone(),
            namespace: client.namespace().clone(),
            strategy: client.strategy(StrategyKind::UserData),
            sync: CacheSync::standard(client.store().clone(), client.namespace()),
            address_rules: AddressValidator::default(),
        }
    }

    /// Use a different synchronizer.
    pub fn with_sync(mut self, sync: CacheSync) -> Self {
        self.sync = sync;
        self
    }

    /// Replace the rules checked before saving an address.
    pub fn with_address_rules(mut self, rules: AddressValidator) -> Self {
        self.address_rules = rules;
        self
    }

    /// The signed-in customer. `None` for anonymous sessions.
    pub async fn profile(&self, cancel: &CancellationToken) -> Result<Option<Customer>, CommerceError> {
        let key = keys::profile(&self.namespace);
        let service = self.service.clone();
        let result = self
            .store
            .query::<Option<Customer>, _, _>(&key, &self.strategy, cancel, move |token| {
                let service = service.clone();
                async move { service.retrieve(token).await }
            })
            .await
            .map_err(CommerceError::from);
        absent_as(result, None)
    }

    /// Update the profile. Empty updates are rejected without a call.
    pub async fn update_profile(&self, input: UpdateCustomerInput) -> Result<Customer, CommerceError> {
        if input.is_empty() {
            return Err(CommerceError::Validation("no profile fields to update".to_string()));
        }
        let customer = self.service.update(input).await?;
        self.sync.apply(SyncEvent::CustomerProfileUpdated);
        self.write_profile(&customer)?;
        info!(customer_id = %customer.id, "customer profile updated");
        Ok(customer)
    }

    /// Saved addresses. Empty for anonymous sessions.
    pub async fn addresses(&self, cancel: &CancellationToken) -> Result<Vec<CustomerAddress>, CommerceError> {
        let key = keys::addresses(&self.namespace);
        let service = self.service.clone();
        let result = self
            .store
            .query::<Vec<CustomerAddress>, _, _>(&key, &self.strategy, cancel, move |token| {
                let service = service.clone();
                async move { service.list_addresses(token).await }
            })
            .await
            .map_err(CommerceError::from);
        absent_as(result, Vec::new())
    }

    /// Save a new address. Invalid addresses fail before any call.
    pub async fn create_address(&self, address: &Address) -> Result<Customer, CommerceError> {
        let address = self.address_rules.validate(address, "address")?;
        let customer = self.service.create_address(address).await?;
        self.after_address_write(&customer)?;
        Ok(customer)
    }

    pub async fn update_address(&self, id: &AddressId, address: &Address) -> Result<Customer, CommerceError> {
        let address = self.address_rules.validate(address, "address")?;
        let customer = self.service.update_address(id, address).await?;
        self.after_address_write(&customer)?;
        Ok(customer)
    }

    pub async fn delete_address(&self, id: &AddressId) -> Result<Customer, CommerceError> {
        let customer = self.service.delete_address(id).await?;
        self.after_address_write(&customer)?;
        Ok(customer)
    }

    /// Update `id` when given, creating the address if the backend no longer
    /// has it.
    pub async fn upsert_address(
        &self,
        id: Option<&AddressId>,
        address: &Address,
    ) -> Result<Customer, CommerceError> {
        let Some(id) = id else {
            return self.create_address(address).await;
        };
        match self.update_address(id, address).await {
            Err(e) if e.is_not_found() => {
                debug!(address_id = %id, "address gone, creating instead");
                self.create_address(address).await
            }
            other => other,
        }
    }

    fn after_address_write(&self, customer: &Customer) -> Result<(), CommerceError> {
        self.store.invalidate(&keys::addresses(&self.namespace));
        self.write_profile(customer)
    }

    fn write_profile(&self, customer: &Customer) -> Result<(), CommerceError> {
        let key: QueryKey = keys::profile(&self.namespace);
        self.store.set_data_with(&key, &Some(customer), &self.strategy)?;
        Ok(())
    }
}

// not-found and 401/403 read as "nothing there" for session-scoped data
pub(crate) fn absent_as<T>(result: Result<T, CommerceError>, empty: T) -> Result<T, CommerceError> {
    match result {
        Err(e) if e.is_not_found() || e.is_unauthorized() => Ok(empty),
        other => other,
    }
}
