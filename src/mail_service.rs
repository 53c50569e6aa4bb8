use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
  #[error("mail service unreachable: {0}")]
  Transport(#[from] reqwest::Error),
  #[error("mail service returned status {0}")]
  Status(u16),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailNewProps {
  pub request_id: i64,
  pub destination: String,
  pub topic: String,
  pub title: String,
  pub content: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
  async fn mail_new(&self, props: MailNewProps) -> Result<(), MailError>;
}

#[derive(Clone)]
pub struct MailService {
  client: reqwest::Client,
  mail_service_url: String,
}

impl MailService {
  pub fn new(client: reqwest::Client, mail_service_url: &str) -> Self {
    MailService {
      client,
      mail_service_url: mail_service_url.trim_end_matches('/').to_owned(),
    }
  }
}

#[async_trait]
impl Mailer for MailService {
  async fn mail_new(&self, props: MailNewProps) -> Result<(), MailError> {
    let resp = self
      .client
      .post(format!("{}/mail/new", self.mail_service_url))
      .json(&props)
      .send()
      .await?;

    if resp.status().is_success() {
      Ok(())
    } else {
      Err(MailError::Status(resp.status().as_u16()))
    }
  }
}
