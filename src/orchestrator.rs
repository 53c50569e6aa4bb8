use super::admin_session::AdminCredentials;
use super::booking_service::{DeletionGuard, GuardError};
use super::db_types::{Group, NewVerification, Verification};
use super::identity_service::{
  Attributes, Credential, IdentityProvider, LoginTokens, ProviderError, UserRepresentation,
  UserUpdate,
};
use super::notification_service::{
  NotificationPublisher, UserCreatedNotification, USER_CREATED_TOPIC,
};
use super::response::{AccountError, UserProfile};
use super::utils::CodeGenerator;
use super::verification_service::{StoreError, VerificationStore};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

fn report_admin_err(e: ProviderError) -> AccountError {
  error!(error = %e, "cannot log in as identity provider admin");
  if e.is_transport() {
    AccountError::IdentityProviderUnavailable(e.to_string())
  } else {
    AccountError::AdminAuthFailed(e.to_string())
  }
}

fn report_provider_err(e: ProviderError) -> AccountError {
  error!(error = %e, "identity provider call failed");
  match e {
    ProviderError::Conflict => AccountError::DuplicateUser,
    ProviderError::Transport(_) => AccountError::IdentityProviderUnavailable(e.to_string()),
    other => AccountError::ProviderRejected(other.to_string()),
  }
}

fn report_store_err(e: StoreError) -> AccountError {
  error!(error = %e, "verification store call failed");
  AccountError::PersistenceFailure(e.to_string())
}

fn report_guard_err(e: GuardError) -> AccountError {
  error!(error = %e, "deletion eligibility check failed");
  AccountError::EligibilityCheckFailed(e.to_string())
}

#[derive(Clone, Debug)]
pub struct NewAccount {
  pub email: String,
  pub first_name: String,
  pub last_name: String,
  pub password: String,
  pub address: String,
  pub group: Group,
}

impl NewAccount {
  fn representation(&self) -> UserRepresentation {
    UserRepresentation {
      username: self.email.clone(),
      email: self.email.clone(),
      first_name: self.first_name.clone(),
      last_name: self.last_name.clone(),
      enabled: true,
      email_verified: false,
      attributes: Attributes::with_address(&self.address),
      groups: vec![self.group.as_str().to_owned()],
      credentials: vec![Credential::password(&self.password)],
    }
  }
}

/// Runs the account lifecycle sagas against the identity provider, the
/// verification store, the notification channel and the booking service.
///
/// Every step commits on its own. Nothing is rolled back when a later step
/// fails, and nothing is retried here.
pub struct AccountOrchestrator {
  provider: Arc<dyn IdentityProvider>,
  admin: Arc<dyn AdminCredentials>,
  store: Arc<dyn VerificationStore>,
  notifier: Arc<dyn NotificationPublisher>,
  guard: Arc<dyn DeletionGuard>,
  codes: Arc<dyn CodeGenerator>,
}

impl AccountOrchestrator {
  pub fn new(
    provider: Arc<dyn IdentityProvider>,
    admin: Arc<dyn AdminCredentials>,
    store: Arc<dyn VerificationStore>,
    notifier: Arc<dyn NotificationPublisher>,
    guard: Arc<dyn DeletionGuard>,
    codes: Arc<dyn CodeGenerator>,
  ) -> Self {
    AccountOrchestrator {
      provider,
      admin,
      store,
      notifier,
      guard,
      codes,
    }
  }

  async fn admin_token(&self) -> Result<String, AccountError> {
    self.admin.admin_token().await.map_err(report_admin_err)
  }

  #[instrument(skip_all, fields(group = %account.group))]
  pub async fn sign_up(&self, account: NewAccount) -> Result<Verification, AccountError> {
    let admin_token = self.admin_token().await?;

    let user_id = self
      .provider
      .create_user(&admin_token, &account.representation())
      .await
      .map_err(report_provider_err)?;

    // the provider account is not rolled back if this insert fails
    let verification = self
      .store
      .insert(NewVerification {
        user_id: user_id.clone(),
        first_name: account.first_name,
        last_name: account.last_name,
        address: account.address,
        code: self.codes.generate(),
      })
      .await
      .map_err(report_store_err)?;

    self.notify_user_created(&user_id, account.group).await;

    info!(user_id = %user_id, verification_id = verification.verification_id, "user signed up");
    Ok(verification)
  }

  async fn notify_user_created(&self, user_id: &str, group: Group) {
    let notification = UserCreatedNotification {
      user_id: user_id.to_owned(),
      role: group.as_str().to_owned(),
    };

    let payload = match serde_json::to_vec(&notification) {
      Ok(payload) => Bytes::from(payload),
      Err(e) => {
        warn!(user_id, error = %e, "cannot encode user created notification");
        return;
      }
    };

    if let Err(e) = self.notifier.publish(USER_CREATED_TOPIC, payload).await {
      warn!(user_id, error = %e, "user created notification not sent");
    }
  }

  #[instrument(skip(self, security_code))]
  pub async fn verify_user(
    &self,
    verification_id: i64,
    user_id: &str,
    security_code: i32,
  ) -> Result<(), AccountError> {
    let verification = self
      .store
      .get(verification_id)
      .await
      .map_err(report_store_err)?
      .ok_or(AccountError::VerificationNotFound)?;

    if verification.user_id != user_id {
      return Err(AccountError::UserMismatch);
    }

    if verification.code != security_code {
      return Err(AccountError::CodeIncorrect);
    }

    let admin_token = self.admin_token().await?;

    // update first: a failed activation must leave the record in place
    self
      .provider
      .update_user(
        &admin_token,
        &verification.user_id,
        &UserUpdate::new(
          &verification.first_name,
          &verification.last_name,
          &verification.address,
        ),
      )
      .await
      .map_err(|e| {
        error!(error = %e, "activating user failed");
        AccountError::ActivationFailed(e.to_string())
      })?;

    // a concurrent verification that deleted the record first wins
    if !self
      .store
      .delete(verification_id)
      .await
      .map_err(report_store_err)?
    {
      return Err(AccountError::VerificationNotFound);
    }

    info!(user_id, "user verified");
    Ok(())
  }

  #[instrument(skip(self))]
  pub async fn update_verification_code(
    &self,
    verification_id: i64,
  ) -> Result<Verification, AccountError> {
    let mut verification = self
      .store
      .get(verification_id)
      .await
      .map_err(report_store_err)?
      .ok_or(AccountError::VerificationNotFound)?;

    verification.code = self.codes.regenerate(verification.code);

    if !self
      .store
      .update(&verification)
      .await
      .map_err(report_store_err)?
    {
      return Err(AccountError::VerificationNotFound);
    }

    Ok(verification)
  }

  #[instrument(skip(self, password))]
  pub async fn login(&self, email: &str, password: &str) -> Result<LoginTokens, AccountError> {
    let tokens = self
      .provider
      .login(email, password)
      .await
      .map_err(|e| match e {
        ProviderError::Transport(_) => report_provider_err(e),
        _ => AccountError::AuthenticationFailed,
      })?;

    // the token is dropped unless the provider confirms the email
    let verified = match self.provider.get_user(&tokens.access_token).await {
      Ok(info) => info.email_verified,
      Err(e) if e.is_transport() => return Err(report_provider_err(e)),
      Err(e) => {
        warn!(error = %e, "cannot read profile of authenticated user");
        false
      }
    };

    if !verified {
      return Err(AccountError::AccountNotVerified);
    }

    Ok(tokens)
  }

  #[instrument(skip(self, token))]
  pub async fn delete_user(
    &self,
    token: &str,
    user_id: &str,
    group: Group,
  ) -> Result<(), AccountError> {
    let deletable = match group {
      Group::Host => self.guard.check_host_deletable(user_id).await,
      Group::Guest => self.guard.check_guest_deletable(user_id).await,
    }
    .map_err(report_guard_err)?;

    if !deletable {
      info!(user_id, "user has outstanding bookings");
      return Err(AccountError::UserCouldNotBeDeleted);
    }

    self
      .provider
      .delete_user(token, user_id)
      .await
      .map_err(|e| {
        error!(error = %e, "deleting user failed");
        AccountError::ProviderDeleteFailed(e.to_string())
      })?;

    info!(user_id, "user deleted");
    Ok(())
  }

  #[instrument(skip(self, token))]
  pub async fn update_profile(
    &self,
    token: &str,
    user_id: &str,
    first_name: &str,
    last_name: &str,
    address: &str,
  ) -> Result<(), AccountError> {
    self
      .provider
      .update_user(token, user_id, &UserUpdate::new(first_name, last_name, address))
      .await
      .map_err(report_provider_err)
  }

  #[instrument(skip(self, token, password))]
  pub async fn reset_password(
    &self,
    token: &str,
    user_id: &str,
    password: &str,
  ) -> Result<(), AccountError> {
    self
      .provider
      .reset_password(token, user_id, password)
      .await
      .map_err(report_provider_err)
  }

  pub async fn get_user(&self, token: &str) -> Result<UserProfile, AccountError> {
    let info = self
      .provider
      .get_user(token)
      .await
      .map_err(report_provider_err)?;
    Ok(info.into())
  }

  pub async fn get_user_by_id(&self, token: &str, user_id: &str) -> Result<UserProfile, AccountError> {
    let user = self
      .provider
      .get_user_by_id(token, user_id)
      .await
      .map_err(report_provider_err)?;
    Ok(user.into())
  }
}
