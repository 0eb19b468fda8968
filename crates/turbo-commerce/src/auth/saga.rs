//! Customer registration with compensating rollback.
//!
//! Registration spans four backend calls. Once the first has created an
//! identity, a later failure would leave a signed-in session with no
//! customer behind it, so the saga logs the session out again before
//! returning the original error.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info};
use turbo_cache::{CacheStore, CacheStrategy, Namespace};
use turbo_data::ServiceError;

use super::keys;
use super::service::{AuthOutcome, AuthService, RegistrationInput};
use crate::customer::Customer;
use crate::error::CommerceError;
use crate::sync::{CacheSync, SyncEvent};

/// Registration steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationStep {
    Register,
    Login,
    CreateCustomer,
    Refresh,
}

impl RegistrationStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStep::Register => "register",
            RegistrationStep::Login => "login",
            RegistrationStep::CreateCustomer => "create_customer",
            RegistrationStep::Refresh => "refresh",
        }
    }
}

impl fmt::Display for RegistrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives rollback logouts that failed.
pub trait CompensationReporter: Send + Sync {
    /// `original` is the error the caller gets. `logout` is the rollback's own failure.
    fn report(&self, step: RegistrationStep, original: &CommerceError, logout: &ServiceError);
}

/// Reports through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl CompensationReporter for TracingReporter {
    fn report(&self, step: RegistrationStep, original: &CommerceError, logout: &ServiceError) {
        error!(
            step = step.as_str(),
            original = %original,
            error = %logout,
            "registration rollback logout failed"
        );
    }
}

/// Runs registration: register, login, create customer, refresh.
#[derive(Clone)]
pub struct RegistrationSaga {
    service: Arc<dyn AuthService>,
    store: CacheStore,
    namespace: Namespace,
    strategy: CacheStrategy,
    sync: CacheSync,
    reporter: Arc<dyn CompensationReporter>,
}

impl fmt::Debug for RegistrationSaga {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationSaga")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl RegistrationSaga {
    pub fn new(
        service: Arc<dyn AuthService>,
        store: CacheStore,
        namespace: Namespace,
        strategy: CacheStrategy,
        sync: CacheSync,
    ) -> Self {
        Self {
            service,
            store,
            namespace,
            strategy,
            sync,
            reporter: Arc::new(TracingReporter),
        }
    }

    /// Replace the rollback failure reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn CompensationReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Register a customer.
    ///
    /// A failure in the first step is returned as is. A failure in any later
    /// step, or a non-token answer, triggers one logout before the original
    /// error is returned.
    pub async fn run(&self, input: &RegistrationInput) -> Result<Customer, CommerceError> {
        input.credentials.validate()?;

        let registered = self.service.register(&input.credentials).await?;
        let customer = match self.after_register(registered, input).await {
            Ok(customer) => customer,
            Err((step, error)) => {
                self.compensate(step, &error).await;
                return Err(error);
            }
        };

        self.sync.apply(SyncEvent::Register);
        self.store
            .set_data_with(&keys::customer(&self.namespace), &Some(&customer), &self.strategy)?;
        info!(customer_id = %customer.id, "customer registered");
        Ok(customer)
    }

    async fn after_register(
        &self,
        registered: AuthOutcome,
        input: &RegistrationInput,
    ) -> Result<Customer, (RegistrationStep, CommerceError)> {
        use RegistrationStep::*;

        registered.into_token().map_err(|e| (Register, e))?;

        let session = self
            .service
            .login(&input.credentials)
            .await
            .map_err(|e| (Login, e.into()))?;
        session.into_token().map_err(|e| (Login, e))?;

        let customer = self
            .service
            .create_customer(&input.customer)
            .await
            .map_err(|e| (CreateCustomer, e.into()))?;

        self.service.refresh().await.map_err(|e| (Refresh, e.into()))?;
        Ok(customer)
    }

    async fn compensate(&self, step: RegistrationStep, original: &CommerceError) {
        debug!(step = step.as_str(), error = %original, "rolling back registration");
        if let Err(logout) = self.service.logout().await {
            self.reporter.report(step, original, &logout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::{FakeAuth, RecordingReporter};
    use crate::orders;
    use std::sync::atomic::Ordering;
    use turbo_cache::StrategyKind;
    use turbo_query::QueryClient;

    fn saga(service: Arc<FakeAuth>, reporter: Arc<RecordingReporter>) -> (RegistrationSaga, QueryClient) {
        let client = QueryClient::default();
        let sync = CacheSync::standard(client.store().clone(), client.namespace());
        let saga = RegistrationSaga::new(
            service,
            client.store().clone(),
            client.namespace().clone(),
            client.strategy(StrategyKind::UserData),
            sync,
        )
        .with_reporter(reporter);
        (saga, client)
    }

    fn input() -> RegistrationInput {
        RegistrationInput::new("jane@example.com", "hunter2").with_name("Jane", "Smith")
    }

    #[tokio::test]
    async fn test_success_runs_every_step() {
        let service = Arc::new(FakeAuth::default());
        let (saga, client) = saga(service.clone(), Arc::new(RecordingReporter::default()));
        let orders_key = orders::keys(client.namespace()).lists();
        client.store().set_data(&orders_key, &Vec::<u8>::new()).unwrap();

        let customer = saga.run(&input()).await.unwrap();

        assert_eq!(customer.first_name.as_deref(), Some("Jane"));
        assert_eq!(service.steps(), ["register", "login", "create_customer", "refresh"]);
        assert_eq!(service.logouts.load(Ordering::SeqCst), 0);
        assert!(client.store().snapshot(&orders_key).unwrap().invalidated);

        let cached: Option<Option<Customer>> = client
            .store()
            .get_data(&keys::customer(client.namespace()))
            .unwrap();
        assert_eq!(cached.flatten(), Some(customer));
    }

    #[tokio::test]
    async fn test_profile_failure_rolls_back_once() {
        let service = Arc::new(FakeAuth::failing_at(RegistrationStep::CreateCustomer));
        let reporter = Arc::new(RecordingReporter::default());
        let (saga, client) = saga(service.clone(), reporter.clone());

        let err = saga.run(&input()).await.unwrap_err();

        assert_eq!(err.service_error().and_then(ServiceError::status), Some(422));
        assert_eq!(service.logouts.load(Ordering::SeqCst), 1);
        assert!(reporter.reports().is_empty());
        assert!(!client.store().contains(&keys::customer(client.namespace())));
    }

    #[tokio::test]
    async fn test_failed_rollback_is_reported_not_returned() {
        let service = Arc::new(FakeAuth {
            logout_fails: true,
            ..FakeAuth::failing_at(RegistrationStep::Refresh)
        });
        let reporter = Arc::new(RecordingReporter::default());
        let (saga, _) = saga(service.clone(), reporter.clone());

        let err = saga.run(&input()).await.unwrap_err();

        assert_eq!(err.service_error().and_then(ServiceError::status), Some(422));
        assert_eq!(service.logouts.load(Ordering::SeqCst), 1);
        assert_eq!(reporter.reports(), [(RegistrationStep::Refresh, 503)]);
    }

    #[tokio::test]
    async fn test_redirect_is_unsupported_and_rolled_back() {
        let service = Arc::new(FakeAuth {
            register_outcome: AuthOutcome::Redirect {
                location: "https://idp.example.com".to_string(),
            },
            ..Default::default()
        });
        let (saga, _) = saga(service.clone(), Arc::new(RecordingReporter::default()));

        let err = saga.run(&input()).await.unwrap_err();

        assert!(matches!(err, CommerceError::UnsupportedAuthFlow(_)));
        assert_eq!(service.steps(), ["register"]);
        assert_eq!(service.logouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_register_failure_has_nothing_to_undo() {
        let service = Arc::new(FakeAuth::failing_at(RegistrationStep::Register));
        let (saga, _) = saga(service.clone(), Arc::new(RecordingReporter::default()));

        assert!(saga.run(&input()).await.is_err());
        assert_eq!(service.logouts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_credentials_make_no_call() {
        let service = Arc::new(FakeAuth::default());
        let (saga, _) = saga(service.clone(), Arc::new(RecordingReporter::default()));

        let err = saga
            .run(&RegistrationInput::new("not-an-email", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Validation(_)));
        assert!(service.steps().is_empty());
    }
}
