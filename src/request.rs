use super::db_types::Group;
use super::response::AccountError;
use super::utils;
use serde::Deserialize;

pub trait Validate {
  fn validate(&self) -> Result<(), AccountError>;
}

fn required(field: &str, value: &str) -> Result<(), AccountError> {
  if value.trim().is_empty() {
    Err(AccountError::Validation(format!("{} is required", field)))
  } else {
    Ok(())
  }
}

fn email(field: &str, value: &str) -> Result<(), AccountError> {
  required(field, value)?;
  match value.split_once('@') {
    Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
    _ => Err(AccountError::Validation(format!("{} is not a valid email", field))),
  }
}

fn passwords_match(password: &str, confirm_password: &str) -> Result<(), AccountError> {
  if password == confirm_password {
    Ok(())
  } else {
    Err(AccountError::Validation("password did not match".to_owned()))
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginProps {
  pub email: String,
  pub password: String,
}

impl Validate for LoginProps {
  fn validate(&self) -> Result<(), AccountError> {
    email("email", &self.email)?;
    required("password", &self.password)
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpProps {
  pub email: String,
  pub first_name: String,
  pub last_name: String,
  pub password: String,
  pub confirm_password: String,
  pub address: String,
  pub group: Group,
}

impl Validate for SignUpProps {
  fn validate(&self) -> Result<(), AccountError> {
    email("email", &self.email)?;
    required("firstName", &self.first_name)?;
    required("lastName", &self.last_name)?;
    required("password", &self.password)?;
    required("confirmPassword", &self.confirm_password)?;
    required("address", &self.address)?;
    passwords_match(&self.password, &self.confirm_password)
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyProps {
  pub verification_id: i64,
  pub user_id: String,
  pub security_code: i32,
}

impl Validate for VerifyProps {
  fn validate(&self) -> Result<(), AccountError> {
    required("userId", &self.user_id)?;
    if !utils::is_valid_code(self.security_code) {
      return Err(AccountError::Validation(
        "securityCode must be between 1000 and 9999".to_owned(),
      ));
    }
    Ok(())
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCodeAgainProps {
  pub verification_id: i64,
  pub user_email: String,
}

impl Validate for SendCodeAgainProps {
  fn validate(&self) -> Result<(), AccountError> {
    email("userEmail", &self.user_email)
  }
}

#[derive(Clone, Debug)]
pub struct GetUserProps {
  pub token: String,
}

#[derive(Clone, Debug)]
pub struct GetUserByIdProps {
  pub token: String,
  pub id: String,
}

impl Validate for GetUserByIdProps {
  fn validate(&self) -> Result<(), AccountError> {
    required("id", &self.id)
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserBody {
  pub first_name: String,
  pub last_name: String,
  pub address: String,
}

#[derive(Clone, Debug)]
pub struct UpdateUserProps {
  pub token: String,
  pub id: String,
  pub body: UpdateUserBody,
}

impl Validate for UpdateUserProps {
  fn validate(&self) -> Result<(), AccountError> {
    required("id", &self.id)?;
    required("firstName", &self.body.first_name)?;
    required("lastName", &self.body.last_name)?;
    required("address", &self.body.address)
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordBody {
  pub password: String,
  pub confirm_password: String,
}

#[derive(Clone, Debug)]
pub struct ResetPasswordProps {
  pub token: String,
  pub id: String,
  pub body: ResetPasswordBody,
}

impl Validate for ResetPasswordProps {
  fn validate(&self) -> Result<(), AccountError> {
    required("id", &self.id)?;
    required("password", &self.body.password)?;
    required("confirmPassword", &self.body.confirm_password)?;
    passwords_match(&self.body.password, &self.body.confirm_password)
  }
}

// group stays a raw path segment until validated
#[derive(Clone, Debug)]
pub struct DeleteUserProps {
  pub token: String,
  pub id: String,
  pub group: String,
}

impl DeleteUserProps {
  pub fn group(&self) -> Result<Group, AccountError> {
    self.group.parse().map_err(AccountError::Validation)
  }
}

impl Validate for DeleteUserProps {
  fn validate(&self) -> Result<(), AccountError> {
    required("id", &self.id)?;
    self.group().map(|_| ())
  }
}
