//! Recording fakes for the collaborators of the orchestrator.

use crate::admin_session::AdminCredentials;
use crate::booking_service::{DeletionGuard, GuardError};
use crate::db_types::{NewVerification, Verification};
use crate::identity_service::{
  AdminUser, IdentityProvider, LoginTokens, ProviderError, UserInfo, UserRepresentation,
  UserUpdate,
};
use crate::mail_service::{MailError, MailNewProps, Mailer};
use crate::notification_service::{NotificationPublisher, PublishError};
use crate::orchestrator::AccountOrchestrator;
use crate::utils::{CodeGenerator, RandomCodeGenerator};
use crate::verification_service::{StoreError, VerificationStore};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Copy, Debug)]
enum Failure {
  Status(u16),
  Conflict,
}

#[derive(Default)]
struct ProviderState {
  calls: HashMap<&'static str, usize>,
  failures: HashMap<&'static str, Failure>,
  tokens_seen: HashMap<&'static str, Vec<String>>,
  created_id: Option<String>,
  created: Vec<UserRepresentation>,
  updates: Vec<(String, UserUpdate)>,
  deleted: Vec<(String, String)>,
  email_unverified: bool,
  delay: Option<Duration>,
}

#[derive(Default)]
pub struct FakeProvider {
  state: Mutex<ProviderState>,
}

impl FakeProvider {
  pub fn calls(&self, operation: &str) -> usize {
    *self.state.lock().unwrap().calls.get(operation).unwrap_or(&0)
  }

  pub fn fail(&self, operation: &'static str, status: u16) {
    self
      .state
      .lock()
      .unwrap()
      .failures
      .insert(operation, Failure::Status(status));
  }

  pub fn fail_conflict(&self, operation: &'static str) {
    self
      .state
      .lock()
      .unwrap()
      .failures
      .insert(operation, Failure::Conflict);
  }

  pub fn create_returns(&self, id: &str) {
    self.state.lock().unwrap().created_id = Some(id.to_owned());
  }

  pub fn set_email_verified(&self, verified: bool) {
    self.state.lock().unwrap().email_unverified = !verified;
  }

  pub fn set_delay(&self, delay: Duration) {
    self.state.lock().unwrap().delay = Some(delay);
  }

  pub fn created(&self) -> Vec<UserRepresentation> {
    self.state.lock().unwrap().created.clone()
  }

  pub fn updates(&self) -> Vec<(String, UserUpdate)> {
    self.state.lock().unwrap().updates.clone()
  }

  pub fn deleted(&self) -> Vec<(String, String)> {
    self.state.lock().unwrap().deleted.clone()
  }

  pub fn admin_tokens_seen(&self, operation: &str) -> Vec<String> {
    self
      .state
      .lock()
      .unwrap()
      .tokens_seen
      .get(operation)
      .cloned()
      .unwrap_or_default()
  }

  async fn enter(&self, operation: &'static str, token: Option<&str>) -> Result<(), ProviderError> {
    let (failure, delay) = {
      let mut state = self.state.lock().unwrap();
      *state.calls.entry(operation).or_insert(0) += 1;
      if let Some(token) = token {
        state
          .tokens_seen
          .entry(operation)
          .or_default()
          .push(token.to_owned());
      }
      (state.failures.get(operation).copied(), state.delay)
    };

    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }

    match failure {
      None => Ok(()),
      Some(Failure::Conflict) => Err(ProviderError::Conflict),
      Some(Failure::Status(status)) => Err(ProviderError::Status {
        operation,
        status,
      }),
    }
  }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
  async fn login(&self, username: &str, _password: &str) -> Result<LoginTokens, ProviderError> {
    self.enter("login", None).await?;
    Ok(LoginTokens {
      access_token: format!("token-{}", username),
      token_type: "Bearer".to_owned(),
      ..Default::default()
    })
  }

  async fn create_user(
    &self,
    admin_token: &str,
    user: &UserRepresentation,
  ) -> Result<String, ProviderError> {
    self.enter("create_user", Some(admin_token)).await?;
    let mut state = self.state.lock().unwrap();
    state.created.push(user.clone());
    Ok(state.created_id.clone().unwrap_or_else(|| "u1".to_owned()))
  }

  async fn get_user(&self, token: &str) -> Result<UserInfo, ProviderError> {
    self.enter("get_user", Some(token)).await?;
    let state = self.state.lock().unwrap();
    Ok(UserInfo {
      sub: "u1".to_owned(),
      email_verified: !state.email_unverified,
      given_name: "A".to_owned(),
      family_name: "B".to_owned(),
      email: "a@x.com".to_owned(),
      address: Some("Addr".to_owned()),
      groups: vec!["host".to_owned()],
    })
  }

  async fn get_user_by_id(&self, admin_token: &str, id: &str) -> Result<AdminUser, ProviderError> {
    self.enter("get_user_by_id", Some(admin_token)).await?;
    Ok(AdminUser {
      id: id.to_owned(),
      first_name: "A".to_owned(),
      last_name: "B".to_owned(),
      email: "a@x.com".to_owned(),
      ..Default::default()
    })
  }

  async fn update_user(
    &self,
    admin_token: &str,
    id: &str,
    update: &UserUpdate,
  ) -> Result<(), ProviderError> {
    self.enter("update_user", Some(admin_token)).await?;
    self
      .state
      .lock()
      .unwrap()
      .updates
      .push((id.to_owned(), update.clone()));
    Ok(())
  }

  async fn delete_user(&self, admin_token: &str, id: &str) -> Result<(), ProviderError> {
    self.enter("delete_user", Some(admin_token)).await?;
    self
      .state
      .lock()
      .unwrap()
      .deleted
      .push((admin_token.to_owned(), id.to_owned()));
    Ok(())
  }

  async fn reset_password(
    &self,
    admin_token: &str,
    _id: &str,
    _password: &str,
  ) -> Result<(), ProviderError> {
    self.enter("reset_password", Some(admin_token)).await
  }
}

#[derive(Default)]
pub struct FakeAdmin {
  calls: Mutex<usize>,
  failing: Mutex<bool>,
}

impl FakeAdmin {
  pub fn fail(&self) {
    *self.failing.lock().unwrap() = true;
  }

  pub fn calls(&self) -> usize {
    *self.calls.lock().unwrap()
  }
}

#[async_trait]
impl AdminCredentials for FakeAdmin {
  async fn admin_token(&self) -> Result<String, ProviderError> {
    *self.calls.lock().unwrap() += 1;
    if *self.failing.lock().unwrap() {
      return Err(ProviderError::Status {
        operation: "login",
        status: 401,
      });
    }
    Ok("admin-token".to_owned())
  }
}

#[derive(Default)]
struct StoreState {
  rows: HashMap<i64, Verification>,
  next_id: i64,
  calls: HashMap<&'static str, usize>,
  fail_writes: bool,
  vanish_after_get: bool,
}

#[derive(Default)]
pub struct FakeStore {
  state: Mutex<StoreState>,
}

impl FakeStore {
  pub fn seed(&self, user_id: &str, code: i32) -> i64 {
    let mut state = self.state.lock().unwrap();
    state.next_id += 1;
    let verification_id = state.next_id;
    state.rows.insert(
      verification_id,
      Verification {
        verification_id,
        creation_time: 0,
        user_id: user_id.to_owned(),
        first_name: "First".to_owned(),
        last_name: "Last".to_owned(),
        address: "Address".to_owned(),
        code,
      },
    );
    verification_id
  }

  pub fn snapshot(&self, verification_id: i64) -> Option<Verification> {
    self.state.lock().unwrap().rows.get(&verification_id).cloned()
  }

  pub fn calls(&self, operation: &str) -> usize {
    *self.state.lock().unwrap().calls.get(operation).unwrap_or(&0)
  }

  pub fn fail_writes(&self) {
    self.state.lock().unwrap().fail_writes = true;
  }

  /// Rows are removed right after `get` hands them out, as if another
  /// request deleted them in between.
  pub fn vanish_after_get(&self) {
    self.state.lock().unwrap().vanish_after_get = true;
  }

  fn enter(&self, operation: &'static str, write: bool) -> Result<std::sync::MutexGuard<'_, StoreState>, StoreError> {
    let mut state = self.state.lock().unwrap();
    *state.calls.entry(operation).or_insert(0) += 1;
    if write && state.fail_writes {
      return Err(StoreError::Unavailable("write refused".to_owned()));
    }
    Ok(state)
  }
}

#[async_trait]
impl VerificationStore for FakeStore {
  async fn insert(&self, verification: NewVerification) -> Result<Verification, StoreError> {
    let mut state = self.enter("insert", true)?;
    state.next_id += 1;
    let stored = Verification {
      verification_id: state.next_id,
      creation_time: 0,
      user_id: verification.user_id,
      first_name: verification.first_name,
      last_name: verification.last_name,
      address: verification.address,
      code: verification.code,
    };
    state.rows.insert(stored.verification_id, stored.clone());
    Ok(stored)
  }

  async fn get(&self, verification_id: i64) -> Result<Option<Verification>, StoreError> {
    let mut state = self.enter("get", false)?;
    if state.vanish_after_get {
      return Ok(state.rows.remove(&verification_id));
    }
    Ok(state.rows.get(&verification_id).cloned())
  }

  async fn update(&self, verification: &Verification) -> Result<bool, StoreError> {
    let mut state = self.enter("update", true)?;
    match state.rows.get_mut(&verification.verification_id) {
      Some(row) => {
        row.code = verification.code;
        Ok(true)
      }
      None => Ok(false),
    }
  }

  async fn delete(&self, verification_id: i64) -> Result<bool, StoreError> {
    let mut state = self.enter("delete", true)?;
    Ok(state.rows.remove(&verification_id).is_some())
  }
}

#[derive(Default)]
pub struct FakeGuard {
  deletable: Mutex<bool>,
  failing: Mutex<bool>,
  checked: Mutex<Vec<(String, String)>>,
}

impl FakeGuard {
  pub fn set(&self, deletable: bool) {
    *self.deletable.lock().unwrap() = deletable;
  }

  pub fn fail(&self) {
    *self.failing.lock().unwrap() = true;
  }

  pub fn checked(&self) -> Vec<(String, String)> {
    self.checked.lock().unwrap().clone()
  }

  fn check(&self, kind: &str, id: &str) -> Result<bool, GuardError> {
    self
      .checked
      .lock()
      .unwrap()
      .push((kind.to_owned(), id.to_owned()));
    if *self.failing.lock().unwrap() {
      return Err(GuardError::Status(503));
    }
    Ok(*self.deletable.lock().unwrap())
  }
}

#[async_trait]
impl DeletionGuard for FakeGuard {
  async fn check_host_deletable(&self, host_id: &str) -> Result<bool, GuardError> {
    self.check("host", host_id)
  }

  async fn check_guest_deletable(&self, guest_id: &str) -> Result<bool, GuardError> {
    self.check("guest", guest_id)
  }
}

#[derive(Default)]
pub struct RecordingPublisher {
  attempts: Mutex<usize>,
  failures_left: Mutex<usize>,
  published: Mutex<Vec<(String, Bytes)>>,
}

impl RecordingPublisher {
  pub fn fail_next(&self, count: usize) {
    *self.failures_left.lock().unwrap() = count;
  }

  pub fn attempts(&self) -> usize {
    *self.attempts.lock().unwrap()
  }

  pub fn published(&self) -> Vec<(String, Bytes)> {
    self.published.lock().unwrap().clone()
  }
}

#[async_trait]
impl NotificationPublisher for RecordingPublisher {
  async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), PublishError> {
    *self.attempts.lock().unwrap() += 1;
    let mut failures_left = self.failures_left.lock().unwrap();
    if *failures_left > 0 {
      *failures_left -= 1;
      return Err(PublishError::Nats("connection refused".to_owned()));
    }
    self
      .published
      .lock()
      .unwrap()
      .push((topic.to_owned(), payload));
    Ok(())
  }
}

#[derive(Default)]
pub struct RecordingMailer {
  sent: Mutex<Vec<MailNewProps>>,
  failing: Mutex<bool>,
}

impl RecordingMailer {
  pub fn fail(&self) {
    *self.failing.lock().unwrap() = true;
  }

  pub fn sent(&self) -> Vec<MailNewProps> {
    self.sent.lock().unwrap().clone()
  }
}

#[async_trait]
impl Mailer for RecordingMailer {
  async fn mail_new(&self, props: MailNewProps) -> Result<(), MailError> {
    if *self.failing.lock().unwrap() {
      return Err(MailError::Status(502));
    }
    self.sent.lock().unwrap().push(props);
    Ok(())
  }
}

/// Hands out the given codes in order, repeating the last one.
pub struct SequenceCodes {
  codes: Vec<i32>,
  next: Mutex<usize>,
}

impl SequenceCodes {
  pub fn new(codes: Vec<i32>) -> Self {
    SequenceCodes {
      codes,
      next: Mutex::new(0),
    }
  }
}

impl CodeGenerator for SequenceCodes {
  fn generate(&self) -> i32 {
    let mut next = self.next.lock().unwrap();
    let code = self.codes[(*next).min(self.codes.len() - 1)];
    *next += 1;
    code
  }
}

pub struct Harness {
  pub orchestrator: Arc<AccountOrchestrator>,
  pub provider: Arc<FakeProvider>,
  pub admin: Arc<FakeAdmin>,
  pub store: Arc<FakeStore>,
  pub publisher: Arc<RecordingPublisher>,
  pub guard: Arc<FakeGuard>,
}

impl Harness {
  pub fn new() -> Self {
    Harness::build(Arc::new(RandomCodeGenerator))
  }

  pub fn with_codes(codes: Vec<i32>) -> Self {
    Harness::build(Arc::new(SequenceCodes::new(codes)))
  }

  fn build(codes: Arc<dyn CodeGenerator>) -> Self {
    let provider = Arc::new(FakeProvider::default());
    let admin = Arc::new(FakeAdmin::default());
    let store = Arc::new(FakeStore::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let guard = Arc::new(FakeGuard::default());

    let orchestrator = Arc::new(AccountOrchestrator::new(
      provider.clone(),
      admin.clone(),
      store.clone(),
      publisher.clone(),
      guard.clone(),
      codes,
    ));

    Harness {
      orchestrator,
      provider,
      admin,
      store,
      publisher,
      guard,
    }
  }
}
