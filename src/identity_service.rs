use async_trait::async_trait;
use reqwest::header::{HeaderMap, LOCATION};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
  #[error("identity provider unreachable: {0}")]
  Transport(#[from] reqwest::Error),
  #[error("user exists with same email")]
  Conflict,
  #[error("{operation} failed with status {status}")]
  Status { operation: &'static str, status: u16 },
  #[error("user not created: missing id in location header")]
  MissingUserId,
}

impl ProviderError {
  pub fn is_transport(&self) -> bool {
    matches!(self, ProviderError::Transport(_))
  }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginTokens {
  pub access_token: String,
  #[serde(default)]
  pub expires_in: i64,
  #[serde(default)]
  pub refresh_expires_in: i64,
  #[serde(default)]
  pub refresh_token: String,
  #[serde(default)]
  pub token_type: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id_token: Option<String>,
  #[serde(default)]
  pub scope: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
  #[serde(default)]
  pub address: Vec<String>,
}

impl Attributes {
  pub fn with_address(address: &str) -> Self {
    Attributes {
      address: vec![address.to_owned()],
    }
  }

  pub fn first_address(&self) -> String {
    self.address.first().cloned().unwrap_or_default()
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Credential {
  #[serde(rename = "type")]
  pub kind: String,
  pub value: String,
  pub temporary: bool,
}

impl Credential {
  pub fn password(value: &str) -> Self {
    Credential {
      kind: "password".to_owned(),
      value: value.to_owned(),
      temporary: false,
    }
  }
}

/// Body of the admin create-user call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRepresentation {
  pub username: String,
  pub email: String,
  pub first_name: String,
  pub last_name: String,
  pub enabled: bool,
  pub email_verified: bool,
  pub attributes: Attributes,
  pub groups: Vec<String>,
  pub credentials: Vec<Credential>,
}

/// Body of the admin update-user call. Only profile fields are sent, the
/// email verification flag stays owned by the provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
  pub first_name: String,
  pub last_name: String,
  pub attributes: Attributes,
}

impl UserUpdate {
  pub fn new(first_name: &str, last_name: &str, address: &str) -> Self {
    UserUpdate {
      first_name: first_name.to_owned(),
      last_name: last_name.to_owned(),
      attributes: Attributes::with_address(address),
    }
  }
}

/// Admin view of a user, as returned by the users endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
  pub id: String,
  #[serde(default)]
  pub username: String,
  #[serde(default)]
  pub enabled: bool,
  #[serde(default)]
  pub email_verified: bool,
  #[serde(default)]
  pub first_name: String,
  #[serde(default)]
  pub last_name: String,
  #[serde(default)]
  pub email: String,
  #[serde(default)]
  pub attributes: Attributes,
}

/// Claims returned by the userinfo endpoint for the holder of a token.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct UserInfo {
  pub sub: String,
  #[serde(default)]
  pub email_verified: bool,
  #[serde(default)]
  pub given_name: String,
  #[serde(default)]
  pub family_name: String,
  #[serde(default)]
  pub email: String,
  #[serde(default)]
  pub address: Option<String>,
  #[serde(default)]
  pub groups: Vec<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
  async fn login(&self, username: &str, password: &str) -> Result<LoginTokens, ProviderError>;
  async fn create_user(
    &self,
    admin_token: &str,
    user: &UserRepresentation,
  ) -> Result<String, ProviderError>;
  async fn get_user(&self, token: &str) -> Result<UserInfo, ProviderError>;
  async fn get_user_by_id(&self, admin_token: &str, id: &str) -> Result<AdminUser, ProviderError>;
  async fn update_user(
    &self,
    admin_token: &str,
    id: &str,
    update: &UserUpdate,
  ) -> Result<(), ProviderError>;
  async fn delete_user(&self, admin_token: &str, id: &str) -> Result<(), ProviderError>;
  async fn reset_password(
    &self,
    admin_token: &str,
    id: &str,
    password: &str,
  ) -> Result<(), ProviderError>;
}

#[derive(Clone)]
pub struct KeycloakClient {
  client: reqwest::Client,
  base_url: String,
  realm: String,
  client_id: String,
}

impl KeycloakClient {
  pub fn new(client: reqwest::Client, base_url: &str, realm: &str, client_id: &str) -> Self {
    KeycloakClient {
      client,
      base_url: base_url.trim_end_matches('/').to_owned(),
      realm: realm.to_owned(),
      client_id: client_id.to_owned(),
    }
  }

  fn realm_url(&self) -> String {
    format!("{}/realms/{}", self.base_url, self.realm)
  }

  fn users_url(&self) -> String {
    format!("{}/admin/realms/{}/users", self.base_url, self.realm)
  }
}

fn expect_status(
  resp: reqwest::Response,
  expected: StatusCode,
  operation: &'static str,
) -> Result<reqwest::Response, ProviderError> {
  if resp.status() == expected {
    Ok(resp)
  } else {
    Err(ProviderError::Status {
      operation,
      status: resp.status().as_u16(),
    })
  }
}

// the new user's id is the last segment of the Location header
fn user_id_from_location(headers: &HeaderMap) -> Result<String, ProviderError> {
  headers
    .get(LOCATION)
    .and_then(|value| value.to_str().ok())
    .and_then(|location| location.trim_end_matches('/').rsplit('/').next())
    .filter(|id| !id.is_empty())
    .map(str::to_owned)
    .ok_or(ProviderError::MissingUserId)
}

#[async_trait]
impl IdentityProvider for KeycloakClient {
  async fn login(&self, username: &str, password: &str) -> Result<LoginTokens, ProviderError> {
    debug!(username, "requesting token");
    let resp = self
      .client
      .post(format!("{}/protocol/openid-connect/token", self.realm_url()))
      .form(&[
        ("client_id", self.client_id.as_str()),
        ("username", username),
        ("password", password),
        ("grant_type", "password"),
        ("scope", "openid"),
      ])
      .send()
      .await?;

    Ok(expect_status(resp, StatusCode::OK, "login")?.json().await?)
  }

  async fn create_user(
    &self,
    admin_token: &str,
    user: &UserRepresentation,
  ) -> Result<String, ProviderError> {
    debug!(email = %user.email, "creating user");
    let resp = self
      .client
      .post(self.users_url())
      .bearer_auth(admin_token)
      .json(user)
      .send()
      .await?;

    match resp.status() {
      StatusCode::CREATED => user_id_from_location(resp.headers()),
      StatusCode::CONFLICT => Err(ProviderError::Conflict),
      status => Err(ProviderError::Status {
        operation: "registration",
        status: status.as_u16(),
      }),
    }
  }

  async fn get_user(&self, token: &str) -> Result<UserInfo, ProviderError> {
    let resp = self
      .client
      .get(format!("{}/protocol/openid-connect/userinfo", self.realm_url()))
      .bearer_auth(token)
      .send()
      .await?;

    Ok(expect_status(resp, StatusCode::OK, "getting user")?.json().await?)
  }

  async fn get_user_by_id(&self, admin_token: &str, id: &str) -> Result<AdminUser, ProviderError> {
    let resp = self
      .client
      .get(format!("{}/{}", self.users_url(), id))
      .bearer_auth(admin_token)
      .send()
      .await?;

    Ok(expect_status(resp, StatusCode::OK, "getting user")?.json().await?)
  }

  async fn update_user(
    &self,
    admin_token: &str,
    id: &str,
    update: &UserUpdate,
  ) -> Result<(), ProviderError> {
    debug!(user_id = id, "updating user");
    let resp = self
      .client
      .put(format!("{}/{}", self.users_url(), id))
      .bearer_auth(admin_token)
      .json(update)
      .send()
      .await?;

    expect_status(resp, StatusCode::NO_CONTENT, "updating user")?;
    Ok(())
  }

  async fn delete_user(&self, admin_token: &str, id: &str) -> Result<(), ProviderError> {
    debug!(user_id = id, "deleting user");
    let resp = self
      .client
      .delete(format!("{}/{}", self.users_url(), id))
      .bearer_auth(admin_token)
      .send()
      .await?;

    expect_status(resp, StatusCode::NO_CONTENT, "deleting user")?;
    Ok(())
  }

  async fn reset_password(
    &self,
    admin_token: &str,
    id: &str,
    password: &str,
  ) -> Result<(), ProviderError> {
    let resp = self
      .client
      .put(format!("{}/{}/reset-password", self.users_url(), id))
      .bearer_auth(admin_token)
      .json(&Credential::password(password))
      .send()
      .await?;

    expect_status(resp, StatusCode::NO_CONTENT, "resetting user password")?;
    Ok(())
  }
}
