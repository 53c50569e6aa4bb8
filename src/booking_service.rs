use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum GuardError {
  #[error("booking service unreachable: {0}")]
  Transport(#[from] reqwest::Error),
  #[error("booking service returned status {0}")]
  Status(u16),
}

/// Asks the booking service whether an account still has outstanding
/// reservations that block its deletion.
#[async_trait]
pub trait DeletionGuard: Send + Sync {
  async fn check_host_deletable(&self, host_id: &str) -> Result<bool, GuardError>;
  async fn check_guest_deletable(&self, guest_id: &str) -> Result<bool, GuardError>;
}

#[derive(Debug, Deserialize)]
struct CheckDeleteResponse {
  success: bool,
}

#[derive(Clone)]
pub struct BookingService {
  client: reqwest::Client,
  booking_service_url: String,
}

impl BookingService {
  pub fn new(client: reqwest::Client, booking_service_url: &str) -> Self {
    BookingService {
      client,
      booking_service_url: booking_service_url.trim_end_matches('/').to_owned(),
    }
  }

  async fn check(&self, kind: &str, id: &str) -> Result<bool, GuardError> {
    debug!(kind, id, "checking if account can be deleted");
    let resp = self
      .client
      .get(format!(
        "{}/booking/check-delete/{}/{}",
        self.booking_service_url, kind, id
      ))
      .send()
      .await?;

    if !resp.status().is_success() {
      return Err(GuardError::Status(resp.status().as_u16()));
    }

    let body: CheckDeleteResponse = resp.json().await?;
    Ok(body.success)
  }
}

#[async_trait]
impl DeletionGuard for BookingService {
  async fn check_host_deletable(&self, host_id: &str) -> Result<bool, GuardError> {
    self.check("host", host_id).await
  }

  async fn check_guest_deletable(&self, guest_id: &str) -> Result<bool, GuardError> {
    self.check("guest", guest_id).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use httpmock::prelude::*;
  use serde_json::json;

  #[tokio::test]
  async fn host_check_reads_success_flag() {
    let server = MockServer::start_async().await;
    let mock = server
      .mock_async(|when, then| {
        when.method(GET).path("/booking/check-delete/host/u1");
        then.status(200).json_body(json!({"success": false}));
      })
      .await;

    let booking = BookingService::new(reqwest::Client::new(), &server.base_url());

    assert!(!booking.check_host_deletable("u1").await.unwrap());
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn guest_check_uses_guest_route() {
    let server = MockServer::start_async().await;
    let mock = server
      .mock_async(|when, then| {
        when.method(GET).path("/booking/check-delete/guest/g7");
        then.status(200).json_body(json!({"success": true}));
      })
      .await;

    let booking = BookingService::new(reqwest::Client::new(), &server.base_url());

    assert!(booking.check_guest_deletable("g7").await.unwrap());
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn server_error_is_reported() {
    let server = MockServer::start_async().await;
    server
      .mock_async(|when, then| {
        when.method(GET).path("/booking/check-delete/host/u1");
        then.status(500);
      })
      .await;

    let booking = BookingService::new(reqwest::Client::new(), &server.base_url());
    let err = booking.check_host_deletable("u1").await.unwrap_err();

    assert!(matches!(err, GuardError::Status(500)));
  }
}
