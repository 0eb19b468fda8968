use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use turbo_data::{CancellationToken, ServiceResult};

use crate::checkout::is_plausible_email;
use crate::customer::{CreateCustomerInput, Customer};
use crate::error::CommerceError;

/// Email and password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Reject blank passwords and malformed emails before any call.
    pub fn validate(&self) -> Result<(), CommerceError> {
        let mut errors = Vec::new();
        if !is_plausible_email(self.email.trim()) {
            errors.push(format!("email '{}' is not valid", self.email.trim()));
        }
        if self.password.is_empty() {
            errors.push("password is required".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(CommerceError::Validation(errors.join("; ")))
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// What the backend answered to a register or login call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// A plain session token. The only outcome this client supports.
    Token(String),
    /// Continue at an external location, e.g. an OAuth provider.
    Redirect { location: String },
    /// A multi-step challenge such as a one-time code.
    Challenge { kind: String },
}

impl AuthOutcome {
    /// The session token, or an unsupported-flow error.
    pub fn into_token(self) -> Result<String, CommerceError> {
        match self {
            AuthOutcome::Token(token) => Ok(token),
            AuthOutcome::Redirect { location } => {
                Err(CommerceError::UnsupportedAuthFlow(format!("redirect to {location}")))
            }
            AuthOutcome::Challenge { kind } => {
                Err(CommerceError::UnsupportedAuthFlow(format!("{kind} challenge")))
            }
        }
    }
}

/// Everything needed to register a customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationInput {
    pub credentials: Credentials,
    pub customer: CreateCustomerInput,
}

impl RegistrationInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        let credentials = Credentials::new(email, password);
        let customer = CreateCustomerInput {
            email: credentials.email.clone(),
            ..Default::default()
        };
        Self { credentials, customer }
    }

    pub fn with_name(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        self.customer.first_name = Some(first_name.into());
        self.customer.last_name = Some(last_name.into());
        self
    }
}

/// Auth endpoints. The service holds the session; callers only see outcomes.
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, credentials: &Credentials) -> ServiceResult<AuthOutcome>;

    async fn login(&self, credentials: &Credentials) -> ServiceResult<AuthOutcome>;

    async fn create_customer(&self, input: &CreateCustomerInput) -> ServiceResult<Customer>;

    /// Refresh the session so it carries the new customer.
    async fn refresh(&self) -> ServiceResult<()>;

    async fn logout(&self) -> ServiceResult<()>;

    /// The customer behind the current session.
    async fn current_customer(&self, cancel: CancellationToken) -> ServiceResult<Option<Customer>>;
}
