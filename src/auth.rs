use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::broadcast;
use validator::{Validate, ValidationError};

use crate::models::internal::{AuthEvent, Session, UserIdentity};
use crate::storage::gateway::{GatewayError, IdentityProvider};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email(message = "a valid email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "passwords_match", skip_on_field_errors = false))]
pub struct SignUpRequest {
    #[validate(email(message = "a valid email is required"))]
    pub email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
    pub confirm_password: String,
}

fn passwords_match(request: &SignUpRequest) -> Result<(), ValidationError> {
    if request.password != request.confirm_password {
        let mut error = ValidationError::new("password_mismatch");
        error.message = Some("passwords do not match".into());
        return Err(error);
    }
    Ok(())
}

/// Joins the messages of a validation failure.
fn describe(errors: &validator::ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .errors()
        .values()
        .filter_map(|kind| match kind {
            validator::ValidationErrorsKind::Field(list) => list.first().cloned(),
            _ => None,
        })
        .filter_map(|e| e.message.map(|m| m.to_string()))
        .collect();
    messages.sort();
    messages.join("; ")
}

/// Credential checks in front of the identity provider. Nothing reaches the
/// provider unless the request validates locally.
#[derive(Clone)]
pub struct AuthService {
    provider: Arc<dyn IdentityProvider>,
}

impl AuthService {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    pub async fn sign_in(&self, mut request: SignInRequest) -> Result<Session, AuthError> {
        request.email = request.email.trim().to_string();
        request
            .validate()
            .map_err(|e| AuthError::Validation(describe(&e)))?;

        let session = self
            .provider
            .sign_in_with_password(&request.email, &request.password)
            .await?;
        Ok(session)
    }

    /// Registers a new account. The provider may withhold the user until the
    /// email address is confirmed, in which case `None` is returned.
    pub async fn sign_up(
        &self,
        mut request: SignUpRequest,
    ) -> Result<Option<UserIdentity>, AuthError> {
        request.email = request.email.trim().to_string();
        request
            .validate()
            .map_err(|e| AuthError::Validation(describe(&e)))?;

        let user = self
            .provider
            .sign_up(&request.email, &request.password)
            .await?;
        if user.is_some() {
            tracing::info!("Account created for {}", request.email);
        }
        Ok(user)
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.provider.sign_out().await?;
        Ok(())
    }

    /// Auth state changes (sign-in / sign-out).
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.provider.subscribe()
    }
}
