use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verification {
  pub verification_id: i64,
  pub creation_time: i64,
  pub user_id: String,
  pub first_name: String,
  pub last_name: String,
  pub address: String,
  pub code: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewVerification {
  pub user_id: String,
  pub first_name: String,
  pub last_name: String,
  pub address: String,
  pub code: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Group {
  Host,
  Guest,
}

impl Group {
  pub fn as_str(&self) -> &'static str {
    match self {
      Group::Host => "host",
      Group::Guest => "guest",
    }
  }
}

impl fmt::Display for Group {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Group {
  type Err = String;

  fn from_str(s: &str) -> Result<Group, String> {
    match s {
      "host" => Ok(Group::Host),
      "guest" => Ok(Group::Guest),
      other => Err(format!("invalid group: {}", other)),
    }
  }
}
