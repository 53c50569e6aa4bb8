use super::db_types::Verification;
use super::identity_service::{AdminUser, UserInfo};
use serde::{Deserialize, Serialize};
use warp::http::StatusCode;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
  #[error("{0}")]
  Validation(String),
  #[error("missing bearer token")]
  MissingBearerToken,
  #[error("cannot log in as identity provider admin: {0}")]
  AdminAuthFailed(String),
  #[error("identity provider unavailable: {0}")]
  IdentityProviderUnavailable(String),
  #[error("user exists with same email")]
  DuplicateUser,
  #[error("identity provider rejected request: {0}")]
  ProviderRejected(String),
  #[error("identity provider could not delete user: {0}")]
  ProviderDeleteFailed(String),
  #[error("verification store failure: {0}")]
  PersistenceFailure(String),
  #[error("verification not found")]
  VerificationNotFound,
  #[error("incorrect user for chosen verification")]
  UserMismatch,
  #[error("verification code incorrect")]
  CodeIncorrect,
  #[error("too many verification attempts")]
  TooManyAttempts,
  #[error("user activation failed: {0}")]
  ActivationFailed(String),
  #[error("login failed")]
  AuthenticationFailed,
  #[error("user account is disabled. check email for verification")]
  AccountNotVerified,
  #[error("deletion eligibility check failed: {0}")]
  EligibilityCheckFailed(String),
  #[error("user could not be deleted")]
  UserCouldNotBeDeleted,
  #[error("request timed out")]
  Timeout,
  #[error("not found")]
  RouteNotFound,
  #[error("method not allowed")]
  MethodNotAllowed,
  #[error("unknown error")]
  Unknown,
}

impl AccountError {
  pub fn kind(&self) -> &'static str {
    match self {
      AccountError::Validation(_) => "VALIDATION_ERROR",
      AccountError::MissingBearerToken => "MISSING_BEARER_TOKEN",
      AccountError::AdminAuthFailed(_) => "ADMIN_AUTH_FAILED",
      AccountError::IdentityProviderUnavailable(_) => "IDENTITY_PROVIDER_UNAVAILABLE",
      AccountError::DuplicateUser => "DUPLICATE_USER",
      AccountError::ProviderRejected(_) => "PROVIDER_REJECTED",
      AccountError::ProviderDeleteFailed(_) => "PROVIDER_DELETE_FAILED",
      AccountError::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
      AccountError::VerificationNotFound => "VERIFICATION_NOT_FOUND",
      AccountError::UserMismatch => "USER_MISMATCH",
      AccountError::CodeIncorrect => "CODE_INCORRECT",
      AccountError::TooManyAttempts => "TOO_MANY_ATTEMPTS",
      AccountError::ActivationFailed(_) => "ACTIVATION_FAILED",
      AccountError::AuthenticationFailed => "AUTHENTICATION_FAILED",
      AccountError::AccountNotVerified => "ACCOUNT_NOT_VERIFIED",
      AccountError::EligibilityCheckFailed(_) => "ELIGIBILITY_CHECK_FAILED",
      AccountError::UserCouldNotBeDeleted => "USER_COULD_NOT_BE_DELETED",
      AccountError::Timeout => "TIMEOUT",
      AccountError::RouteNotFound => "NOT_FOUND",
      AccountError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
      AccountError::Unknown => "UNKNOWN",
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      AccountError::Validation(_) | AccountError::UserMismatch | AccountError::CodeIncorrect => {
        StatusCode::BAD_REQUEST
      }
      AccountError::MissingBearerToken | AccountError::AuthenticationFailed => {
        StatusCode::UNAUTHORIZED
      }
      AccountError::AccountNotVerified => StatusCode::FORBIDDEN,
      AccountError::VerificationNotFound | AccountError::RouteNotFound => StatusCode::NOT_FOUND,
      AccountError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
      AccountError::DuplicateUser => StatusCode::CONFLICT,
      AccountError::UserCouldNotBeDeleted => StatusCode::PRECONDITION_FAILED,
      AccountError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
      AccountError::ProviderRejected(_)
      | AccountError::ProviderDeleteFailed(_)
      | AccountError::ActivationFailed(_)
      | AccountError::EligibilityCheckFailed(_) => StatusCode::BAD_GATEWAY,
      AccountError::AdminAuthFailed(_)
      | AccountError::IdentityProviderUnavailable(_)
      | AccountError::PersistenceFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
      AccountError::Timeout => StatusCode::GATEWAY_TIMEOUT,
      AccountError::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  pub fn body(&self) -> ErrorBody {
    ErrorBody {
      kind: self.kind().to_owned(),
      message: self.to_string(),
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
  pub kind: String,
  pub message: String,
}

/// What callers get to see of a pending verification. The code itself only
/// ever leaves through the verification email.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationView {
  pub id: i64,
  pub user_id: String,
}

impl From<&Verification> for VerificationView {
  fn from(verification: &Verification) -> Self {
    VerificationView {
      id: verification.verification_id,
      user_id: verification.user_id.clone(),
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
  pub id: String,
  pub first_name: String,
  pub last_name: String,
  pub email: String,
  pub address: String,
  pub email_verified: bool,
  pub group: Option<String>,
}

impl From<UserInfo> for UserProfile {
  fn from(info: UserInfo) -> Self {
    UserProfile {
      id: info.sub,
      first_name: info.given_name,
      last_name: info.family_name,
      email: info.email,
      address: info.address.unwrap_or_default(),
      email_verified: info.email_verified,
      group: info.groups.into_iter().next(),
    }
  }
}

impl From<AdminUser> for UserProfile {
  fn from(user: AdminUser) -> Self {
    UserProfile {
      address: user.attributes.first_address(),
      id: user.id,
      first_name: user.first_name,
      last_name: user.last_name,
      email: user.email,
      email_verified: user.email_verified,
      group: None,
    }
  }
}
