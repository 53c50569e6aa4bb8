use super::response::AccountError;
use super::utils::current_time_millis;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

static FIFTEEN_MINUTES: i64 = 15 * 60 * 1000;

#[derive(Clone, Copy, Debug, Default)]
struct Failures {
  count: u32,
  in_flight: u32,
  last_failure_time: i64,
}

/// Caps guesses against a single verification code.
///
/// Wraps verify attempts from the outside; the orchestrator itself keeps no
/// counters. An attempt holds a slot from before the store is read until it
/// resolves, so concurrent guesses count against the limit too. Failures
/// expire fifteen minutes after the last one.
pub struct AttemptLimiter {
  max_attempts: u32,
  failures: Mutex<HashMap<i64, Failures>>,
}

// releases the in-flight slot, also when the attempt is dropped unfinished
struct Slot<'a> {
  limiter: &'a AttemptLimiter,
  verification_id: i64,
}

impl Drop for Slot<'_> {
  fn drop(&mut self) {
    self.limiter.release(self.verification_id);
  }
}

impl AttemptLimiter {
  pub fn new(max_attempts: u32) -> Self {
    AttemptLimiter {
      max_attempts,
      failures: Mutex::new(HashMap::new()),
    }
  }

  /// Runs `verify` unless the verification is locked out. The future is
  /// dropped unpolled when it is.
  pub async fn attempt<F>(&self, verification_id: i64, verify: F) -> Result<(), AccountError>
  where
    F: Future<Output = Result<(), AccountError>>,
  {
    let slot = match self.reserve(verification_id) {
      Some(slot) => slot,
      None => {
        warn!(verification_id, "verification locked after too many attempts");
        return Err(AccountError::TooManyAttempts);
      }
    };

    let result = verify.await;
    match &result {
      Ok(()) | Err(AccountError::VerificationNotFound) => self.clear(verification_id),
      Err(AccountError::CodeIncorrect) | Err(AccountError::UserMismatch) => {
        self.record_failure(verification_id)
      }
      Err(_) => {}
    }
    drop(slot);
    result
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<i64, Failures>> {
    self.failures.lock().unwrap_or_else(|e| e.into_inner())
  }

  fn reserve(&self, verification_id: i64) -> Option<Slot<'_>> {
    let now = current_time_millis();
    let mut failures = self.lock();
    failures.retain(|_, f| {
      if f.last_failure_time + FIFTEEN_MINUTES <= now {
        f.count = 0;
      }
      f.count > 0 || f.in_flight > 0
    });

    let entry = failures.entry(verification_id).or_default();
    if entry.count + entry.in_flight >= self.max_attempts {
      return None;
    }
    entry.in_flight += 1;

    Some(Slot {
      limiter: self,
      verification_id,
    })
  }

  fn release(&self, verification_id: i64) {
    let mut failures = self.lock();
    if let Some(f) = failures.get_mut(&verification_id) {
      f.in_flight = f.in_flight.saturating_sub(1);
      if f.count == 0 && f.in_flight == 0 {
        failures.remove(&verification_id);
      }
    }
  }

  // recorded before the slot is released so the limit never dips in between
  fn record_failure(&self, verification_id: i64) {
    let mut failures = self.lock();
    let entry = failures.entry(verification_id).or_default();
    entry.count += 1;
    entry.last_failure_time = current_time_millis();
  }

  fn clear(&self, verification_id: i64) {
    self.lock().remove(&verification_id);
  }
}
