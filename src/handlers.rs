use super::attempt_limiter::AttemptLimiter;
use super::db_types::Verification;
use super::identity_service::LoginTokens;
use super::mail_service::{MailError, MailNewProps, Mailer};
use super::orchestrator::{AccountOrchestrator, NewAccount};
use super::request::{self, Validate};
use super::response::{AccountError, UserProfile, VerificationView};
use super::Config;
use reqwest::Url;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
pub struct Services {
  pub orchestrator: Arc<AccountOrchestrator>,
  pub mailer: Arc<dyn Mailer>,
  pub limiter: Arc<AttemptLimiter>,
}

fn report_mail_err(e: MailError) {
  error!(error = %e, "verification email not sent");
}

pub fn verification_link(
  site_external_url: &str,
  email: &str,
  verification: &Verification,
) -> Option<String> {
  let mut link = Url::parse(&format!(
    "{}/verify/{}",
    site_external_url, verification.verification_id
  ))
  .ok()?;
  link
    .query_pairs_mut()
    .append_pair("email", email)
    .append_pair("userId", &verification.user_id);
  Some(link.to_string())
}

// the account already exists at this point, so mail failures are only logged
pub async fn send_verification_email(
  mailer: &dyn Mailer,
  site_external_url: &str,
  target_email: &str,
  verification: &Verification,
) {
  let code_line = format!("<p>Your verification code is: <code>{}</code></p>", verification.code);
  let link_line = match verification_link(site_external_url, target_email, verification) {
    Some(link) => format!("<p>Verification link: {}</p>", link),
    None => {
      error!(site_external_url, "cannot build verification link");
      String::new()
    }
  };

  let result = mailer
    .mail_new(MailNewProps {
      request_id: verification.verification_id,
      destination: target_email.to_owned(),
      topic: "verification_code".to_owned(),
      title: format!("{}: Activate your profile.", site_external_url),
      content: [
        code_line.as_str(),
        "<p>If you did not make this request, then feel free to ignore.</p>",
        "<p>Do not share this code with others.</p>",
        link_line.as_str(),
      ]
      .join(""),
    })
    .await;

  if let Err(e) = result {
    report_mail_err(e);
  }
}

pub async fn login(
  _config: Config,
  services: Services,
  props: request::LoginProps,
) -> Result<LoginTokens, AccountError> {
  props.validate()?;
  services
    .orchestrator
    .login(&props.email, &props.password)
    .await
}

pub async fn sign_up(
  config: Config,
  services: Services,
  props: request::SignUpProps,
) -> Result<VerificationView, AccountError> {
  props.validate()?;

  let email = props.email.clone();
  let verification = services
    .orchestrator
    .sign_up(NewAccount {
      email: props.email,
      first_name: props.first_name,
      last_name: props.last_name,
      password: props.password,
      address: props.address,
      group: props.group,
    })
    .await?;

  send_verification_email(
    services.mailer.as_ref(),
    &config.site_external_url,
    &email,
    &verification,
  )
  .await;

  Ok(VerificationView::from(&verification))
}

pub async fn verify_user(
  _config: Config,
  services: Services,
  props: request::VerifyProps,
) -> Result<(), AccountError> {
  props.validate()?;
  services
    .limiter
    .attempt(
      props.verification_id,
      services
        .orchestrator
        .verify_user(props.verification_id, &props.user_id, props.security_code),
    )
    .await
}

pub async fn send_code_again(
  config: Config,
  services: Services,
  props: request::SendCodeAgainProps,
) -> Result<VerificationView, AccountError> {
  props.validate()?;

  let verification = services
    .orchestrator
    .update_verification_code(props.verification_id)
    .await?;

  send_verification_email(
    services.mailer.as_ref(),
    &config.site_external_url,
    &props.user_email,
    &verification,
  )
  .await;

  info!(verification_id = verification.verification_id, "verification code sent again");
  Ok(VerificationView::from(&verification))
}

pub async fn get_user(
  _config: Config,
  services: Services,
  props: request::GetUserProps,
) -> Result<UserProfile, AccountError> {
  services.orchestrator.get_user(&props.token).await
}

pub async fn get_user_by_id(
  _config: Config,
  services: Services,
  props: request::GetUserByIdProps,
) -> Result<UserProfile, AccountError> {
  props.validate()?;
  services
    .orchestrator
    .get_user_by_id(&props.token, &props.id)
    .await
}

pub async fn update_user(
  _config: Config,
  services: Services,
  props: request::UpdateUserProps,
) -> Result<(), AccountError> {
  props.validate()?;
  services
    .orchestrator
    .update_profile(
      &props.token,
      &props.id,
      &props.body.first_name,
      &props.body.last_name,
      &props.body.address,
    )
    .await
}

pub async fn reset_password(
  _config: Config,
  services: Services,
  props: request::ResetPasswordProps,
) -> Result<(), AccountError> {
  props.validate()?;
  services
    .orchestrator
    .reset_password(&props.token, &props.id, &props.body.password)
    .await
}

pub async fn delete_user(
  _config: Config,
  services: Services,
  props: request::DeleteUserProps,
) -> Result<(), AccountError> {
  props.validate()?;
  let group = props.group()?;
  services
    .orchestrator
    .delete_user(&props.token, &props.id, group)
    .await
}
