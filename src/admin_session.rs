use super::identity_service::{IdentityProvider, ProviderError};
use async_trait::async_trait;
use std::sync::Arc;

/// Hands out a bearer token with admin privileges on the identity provider.
#[async_trait]
pub trait AdminCredentials: Send + Sync {
  async fn admin_token(&self) -> Result<String, ProviderError>;
}

/// Logs in as the admin user on every call. Nothing is cached.
pub struct FreshAdminSession {
  provider: Arc<dyn IdentityProvider>,
  username: String,
  password: String,
}

impl FreshAdminSession {
  pub fn new(provider: Arc<dyn IdentityProvider>, username: String, password: String) -> Self {
    FreshAdminSession {
      provider,
      username,
      password,
    }
  }
}

#[async_trait]
impl AdminCredentials for FreshAdminSession {
  async fn admin_token(&self) -> Result<String, ProviderError> {
    let tokens = self.provider.login(&self.username, &self.password).await?;
    Ok(tokens.access_token)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_support::FakeProvider;

  #[tokio::test]
  async fn every_call_logs_in_again() {
    let provider = Arc::new(FakeProvider::default());
    let session = FreshAdminSession::new(provider.clone(), "admin@test.com".into(), "test".into());

    assert_eq!(session.admin_token().await.unwrap(), "token-admin@test.com");
    assert_eq!(session.admin_token().await.unwrap(), "token-admin@test.com");

    assert_eq!(provider.calls("login"), 2);
  }

  #[tokio::test]
  async fn rejected_admin_login_propagates() {
    let provider = Arc::new(FakeProvider::default());
    provider.fail("login", 401);
    let session = FreshAdminSession::new(provider, "admin@test.com".into(), "wrong".into());

    let err = session.admin_token().await.unwrap_err();

    assert!(matches!(err, ProviderError::Status { status: 401, .. }));
  }
}
