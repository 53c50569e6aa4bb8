use rand::{thread_rng, Rng};
use std::time::{SystemTime, UNIX_EPOCH};

pub const MIN_VERIFICATION_CODE: i32 = 1000;
pub const MAX_VERIFICATION_CODE: i32 = 9999;

pub fn current_time_millis() -> i64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|since_the_epoch| since_the_epoch.as_millis() as i64)
    .unwrap_or(0)
}

pub fn is_valid_code(code: i32) -> bool {
  (MIN_VERIFICATION_CODE..=MAX_VERIFICATION_CODE).contains(&code)
}

/// Source of the 4 digit codes mailed to users during signup.
pub trait CodeGenerator: Send + Sync {
  fn generate(&self) -> i32;

  /// Draws codes until one differs from `previous`. A generator that keeps
  /// repeating itself gets stepped to the neighbouring code instead.
  fn regenerate(&self, previous: i32) -> i32 {
    for _ in 0..16 {
      let code = self.generate();
      if code != previous {
        return code;
      }
    }

    if previous >= MAX_VERIFICATION_CODE {
      MIN_VERIFICATION_CODE
    } else {
      previous + 1
    }
  }
}

// thread_rng is a ChaCha based CSPRNG reseeded from the OS
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
  fn generate(&self) -> i32 {
    thread_rng().gen_range(MIN_VERIFICATION_CODE..=MAX_VERIFICATION_CODE)
  }
}

pub fn strip_bearer(header: &str) -> Option<&str> {
  let token = header
    .strip_prefix("Bearer ")
    .or_else(|| header.strip_prefix("bearer "))?
    .trim();

  if token.is_empty() {
    None
  } else {
    Some(token)
  }
}
