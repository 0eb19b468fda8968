//! Checkout orchestration: shipping prices, shipping method and payment.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};
use turbo_cache::{CacheStore, CacheStrategy, KeyPart, Namespace, QueryKey, StrategyKind};
use turbo_data::CancellationToken;
use turbo_query::{DomainKeys, QueryClient};

use super::payment::{PaymentCollection, PaymentProvider};
use super::service::CheckoutService;
use super::shipping::{shipping_price_map, ShippingOption};
use crate::cart::{self, Cart};
use crate::error::CommerceError;
use crate::ids::{CartId, PaymentProviderId, RegionId, ShippingOptionId};

pub const DOMAIN: &str = "checkout";

/// Drives the delivery and payment steps for a cart.
#[derive(Clone)]
pub struct CheckoutManager {
    service: Arc<dyn CheckoutService>,
    store: CacheStore,
    namespace: Namespace,
    keys: DomainKeys,
    realtime: CacheStrategy,
    providers: CacheStrategy,
}

impl std::fmt::Debug for CheckoutManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutManager")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl CheckoutManager {
    pub fn new(service: Arc<dyn CheckoutService>, client: &QueryClient) -> Self {
        Self {
            service,
            store: client.store().clone(),
            namespace: client.namespace().clone(),
            keys: client.keys(DOMAIN),
            realtime: client.strategy(StrategyKind::Realtime),
            providers: client.strategy(StrategyKind::SemiStatic),
        }
    }

    /// Key for a cart's shipping options.
    pub fn shipping_options_key(&self, cart_id: &CartId) -> Result<QueryKey, CommerceError> {
        Ok(self.keys.scoped("shipping-options", &[cart_id.as_str().into()])?)
    }

    /// Key for one calculated price. Varies with the provider data.
    pub fn shipping_price_key(
        &self,
        cart_id: &CartId,
        option_id: &ShippingOptionId,
        data: &Value,
    ) -> Result<QueryKey, CommerceError> {
        Ok(self.keys.scoped(
            "shipping-price",
            &[
                cart_id.as_str().into(),
                option_id.as_str().into(),
                KeyPart::from_serialize(data)?,
            ],
        )?)
    }

    /// Shipping options for a cart.
    pub async fn shipping_options(
        &self,
        cart_id: &CartId,
        cancel: &CancellationToken,
    ) -> Result<Vec<ShippingOption>, CommerceError> {
        let key = self.shipping_options_key(cart_id)?;
        let service = self.service.clone();
        let cart_id = cart_id.clone();
        let options = self
            .store
            .query::<Vec<ShippingOption>, _, _>(&key, &self.realtime, cancel, move |token| {
                let service = service.clone();
                let cart_id = cart_id.clone();
                async move { service.list_shipping_options(cart_id, token).await }
            })
            .await?;
        Ok(options)
    }

    /// Calculated amount for one option. Flat options return their own amount.
    pub async fn calculated_price(
        &self,
        cart_id: &CartId,
        option: &ShippingOption,
        cancel: &CancellationToken,
    ) -> Result<Option<i64>, CommerceError> {
        if !option.is_calculated() {
            return Ok(option.amount);
        }

        let key = self.shipping_price_key(cart_id, &option.id, &option.data)?;
        let service = self.service.clone();
        let (cart_id, option_id, data) = (cart_id.clone(), option.id.clone(), option.data.clone());
        let priced = self
            .store
            .query::<ShippingOption, _, _>(&key, &self.realtime, cancel, move |token| {
                let service = service.clone();
                let (cart_id, option_id, data) = (cart_id.clone(), option_id.clone(), data.clone());
                async move {
                    service
                        .calculate_shipping_option(cart_id, option_id, data, token)
                        .await
                }
            })
            .await?;
        Ok(priced.amount)
    }

    /// Price every option. Calculated options are priced concurrently; a
    /// failed calculation is logged and its option left out.
    pub async fn shipping_prices(
        &self,
        cart_id: &CartId,
        options: &[ShippingOption],
        cancel: &CancellationToken,
    ) -> BTreeMap<ShippingOptionId, i64> {
        let pending = options
            .iter()
            .filter(|option| option.is_calculated())
            .map(|option| async move { (&option.id, self.calculated_price(cart_id, option, cancel).await) });

        let mut calculated = HashMap::new();
        for (option_id, result) in join_all(pending).await {
            match result {
                Ok(Some(amount)) => {
                    calculated.insert(option_id.clone(), amount);
                }
                Ok(None) => debug!(cart_id = %cart_id, option_id = %option_id, "no calculated price"),
                Err(error) => {
                    warn!(cart_id = %cart_id, option_id = %option_id, %error, "shipping price calculation failed")
                }
            }
        }

        shipping_price_map(options, &calculated)
    }

    /// Attach a shipping method and write the returned cart through.
    pub async fn set_shipping_method(
        &self,
        cart_id: &CartId,
        option_id: &ShippingOptionId,
        data: Value,
    ) -> Result<Cart, CommerceError> {
        let cart = self.service.add_shipping_method(cart_id, option_id, data).await?;
        cart::store_cart(&self.store, &self.namespace, &self.realtime, &cart)?;
        info!(cart_id = %cart.id, option_id = %option_id, "shipping method set");
        Ok(cart)
    }

    /// Payment providers for a region.
    pub async fn payment_providers(
        &self,
        region_id: &RegionId,
        cancel: &CancellationToken,
    ) -> Result<Vec<PaymentProvider>, CommerceError> {
        let key = self.keys.scoped("payment-providers", &[region_id.as_str().into()])?;
        let service = self.service.clone();
        let region_id = region_id.clone();
        let providers = self
            .store
            .query::<Vec<PaymentProvider>, _, _>(&key, &self.providers, cancel, move |token| {
                let service = service.clone();
                let region_id = region_id.clone();
                async move { service.list_payment_providers(region_id, token).await }
            })
            .await?;
        Ok(providers.into_iter().filter(|p| p.is_enabled).collect())
    }

    /// Payment needs a known cart with at least one shipping method.
    pub fn can_initiate_payment(&self, cart: Option<&Cart>) -> bool {
        cart.is_some_and(|cart| !cart.id.as_str().is_empty() && cart.has_shipping_method())
    }

    /// Start a payment session and mark every cart entry stale.
    pub async fn initiate_payment(
        &self,
        cart: &Cart,
        provider_id: &PaymentProviderId,
        data: Value,
    ) -> Result<PaymentCollection, CommerceError> {
        if !self.can_initiate_payment(Some(cart)) {
            return Err(CommerceError::ShippingRequired(cart.id.clone()));
        }

        let collection = self
            .service
            .initiate_payment_session(cart, provider_id, data)
            .await?;
        let stale = self.store.invalidate(&cart::keys::all(&self.namespace));
        info!(cart_id = %cart.id, provider_id = %provider_id, stale, "payment session initiated");
        Ok(collection)
    }
}
