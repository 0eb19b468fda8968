//! Session operations.

use std::sync::Arc;

use tracing::info;
use turbo_cache::{CacheStore, CacheStrategy, Namespace, StrategyKind};
use turbo_data::CancellationToken;
use turbo_query::QueryClient;

use super::keys;
use super::saga::{CompensationReporter, RegistrationSaga};
use super::service::{AuthService, Credentials, RegistrationInput};
use crate::customer::{absent_as, Customer};
use crate::error::CommerceError;
use crate::sync::{CacheSync, SyncEvent};

/// Login, logout, registration and the signed-in customer.
#[derive(Clone)]
pub struct AuthManager {
    service: Arc<dyn AuthService>,
    store: CacheStore,
    namespace: Namespace,
    strategy: CacheStrategy,
    sync: CacheSync,
    saga: RegistrationSaga,
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("namespace", &self.namespace)
            .field("saga", &self.saga)
            .finish_non_exhaustive()
    }
}

impl AuthManager {
    pub fn new(service: Arc<dyn AuthService>, client: &QueryClient) -> Self {
        let store = client.store().clone();
        let namespace = client.namespace().clone();
        let strategy = client.strategy(StrategyKind::UserData);
        let sync = CacheSync::standard(store.clone(), &namespace);
        let saga = RegistrationSaga::new(
            service.clone(),
            store.clone(),
            namespace.clone(),
            strategy.clone(),
            sync.clone(),
        );
        Self {
            service,
            store,
            namespace,
            strategy,
            sync,
            saga,
        }
    }

    /// Replace the rollback failure reporter used by registration.
    pub fn with_reporter(mut self, reporter: Arc<dyn CompensationReporter>) -> Self {
        self.saga = self.saga.with_reporter(reporter);
        self
    }

    /// Sign in. Session data in the cache goes stale.
    pub async fn login(&self, credentials: &Credentials) -> Result<(), CommerceError> {
        credentials.validate()?;
        self.service.login(credentials).await?.into_token()?;
        let report = self.sync.apply(SyncEvent::Login);
        info!(stale = report.invalidated, "customer signed in");
        Ok(())
    }

    /// Sign out. Auth entries are dropped and session data goes stale.
    pub async fn logout(&self) -> Result<(), CommerceError> {
        self.service.logout().await?;
        let report = self.sync.apply(SyncEvent::Logout);
        info!(removed = report.removed, stale = report.invalidated, "customer signed out");
        Ok(())
    }

    /// Register and sign in a new customer.
    pub async fn register(&self, input: &RegistrationInput) -> Result<Customer, CommerceError> {
        self.saga.run(input).await
    }

    /// The signed-in customer. `None` for anonymous sessions.
    pub async fn current_customer(&self, cancel: &CancellationToken) -> Result<Option<Customer>, CommerceError> {
        let key = keys::customer(&self.namespace);
        let service = self.service.clone();
        let result = self
            .store
            .query::<Option<Customer>, _, _>(&key, &self.strategy, cancel, move |token| {
                let service = service.clone();
                async move { service.current_customer(token).await }
            })
            .await
            .map_err(CommerceError::from);
        absent_as(result, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::FakeAuth;
    use crate::auth::AuthOutcome;
    use crate::{customer, orders};
    use std::sync::atomic::Ordering;

    fn manager(service: Arc<FakeAuth>) -> (AuthManager, QueryClient) {
        let client = QueryClient::default();
        (AuthManager::new(service, &client), client)
    }

    #[tokio::test]
    async fn test_login_invalidates_session_keys() {
        let (auth, client) = manager(Arc::new(FakeAuth::default()));
        let ns = client.namespace();
        let store = client.store();

        let watched = [
            keys::customer(ns),
            customer::keys::profile(ns),
            orders::keys(ns).lists(),
        ];
        for key in &watched {
            store.set_data(key, &serde_json::Value::Null).unwrap();
        }

        auth.login(&Credentials::new("jane@example.com", "hunter2")).await.unwrap();

        for key in &watched {
            assert!(store.snapshot(key).unwrap().invalidated, "{key} should be stale");
        }
    }

    #[tokio::test]
    async fn test_login_rejects_challenge() {
        let service = Arc::new(FakeAuth {
            login_outcome: AuthOutcome::Challenge {
                kind: "totp".to_string(),
            },
            ..Default::default()
        });
        let (auth, client) = manager(service);
        let key = keys::customer(client.namespace());
        client.store().set_data(&key, &serde_json::Value::Null).unwrap();

        let err = auth
            .login(&Credentials::new("jane@example.com", "hunter2"))
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::UnsupportedAuthFlow(msg) if msg == "totp challenge"));
        assert!(!client.store().snapshot(&key).unwrap().invalidated);
    }

    #[tokio::test]
    async fn test_current_customer() {
        let service = Arc::new(FakeAuth::default());
        let (auth, _) = manager(service.clone());
        let cancel = CancellationToken::new();

        assert_eq!(auth.current_customer(&cancel).await.unwrap(), None);

        service.signed_in.store(true, Ordering::SeqCst);
        auth.login(&Credentials::new("jane@example.com", "hunter2")).await.unwrap();
        let customer = auth.current_customer(&cancel).await.unwrap();
        assert_eq!(customer.map(|c| c.email), Some("jane@example.com".to_string()));
    }

    #[tokio::test]
    async fn test_logout_drops_auth_entries() {
        let service = Arc::new(FakeAuth::default());
        service.signed_in.store(true, Ordering::SeqCst);
        let (auth, client) = manager(service.clone());

        auth.current_customer(&CancellationToken::new()).await.unwrap();
        assert!(client.store().contains(&keys::customer(client.namespace())));

        auth.logout().await.unwrap();
        assert!(!client.store().contains(&keys::customer(client.namespace())));
        assert_eq!(service.logouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_register_through_manager() {
        let (auth, client) = manager(Arc::new(FakeAuth::default()));
        let customer = auth
            .register(&RegistrationInput::new("jane@example.com", "hunter2"))
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        assert_eq!(auth.current_customer(&cancel).await.unwrap(), Some(customer));
        assert!(client.store().contains(&keys::customer(client.namespace())));
    }
}
