use async_trait::async_trait;
use serde_json::Value;
use turbo_data::{CancellationToken, ServiceResult};

use super::payment::{PaymentCollection, PaymentProvider};
use super::shipping::ShippingOption;
use crate::cart::Cart;
use crate::ids::{CartId, PaymentProviderId, RegionId, ShippingOptionId};

/// Checkout endpoints.
#[async_trait]
pub trait CheckoutService: Send + Sync {
    /// Options available to the cart.
    async fn list_shipping_options(
        &self,
        cart_id: CartId,
        cancel: CancellationToken,
    ) -> ServiceResult<Vec<ShippingOption>>;

    /// Price a calculated option for the cart. The returned option carries
    /// the amount.
    async fn calculate_shipping_option(
        &self,
        cart_id: CartId,
        option_id: ShippingOptionId,
        data: Value,
        cancel: CancellationToken,
    ) -> ServiceResult<ShippingOption>;

    async fn add_shipping_method(
        &self,
        cart_id: &CartId,
        option_id: &ShippingOptionId,
        data: Value,
    ) -> ServiceResult<Cart>;

    async fn list_payment_providers(
        &self,
        region_id: RegionId,
        cancel: CancellationToken,
    ) -> ServiceResult<Vec<PaymentProvider>>;

    async fn initiate_payment_session(
        &self,
        cart: &Cart,
        provider_id: &PaymentProviderId,
        data: Value,
    ) -> ServiceResult<PaymentCollection>;
}
