use super::db_types::{NewVerification, Verification};
use super::utils::current_time_millis;
use super::Db;
use async_trait::async_trait;
use tokio_postgres::GenericClient;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("verification store: {0}")]
  Postgres(#[from] tokio_postgres::Error),
  #[error("verification store unavailable: {0}")]
  Unavailable(String),
}

/// Keyed repository of pending verifications.
///
/// `update` and `delete` report whether a row was touched, so callers can
/// tell a lost race against a concurrent delete from a success.
#[async_trait]
pub trait VerificationStore: Send + Sync {
  async fn insert(&self, verification: NewVerification) -> Result<Verification, StoreError>;
  async fn get(&self, verification_id: i64) -> Result<Option<Verification>, StoreError>;
  async fn update(&self, verification: &Verification) -> Result<bool, StoreError>;
  async fn delete(&self, verification_id: i64) -> Result<bool, StoreError>;
}

pub const SCHEMA: &str = "
  CREATE TABLE IF NOT EXISTS verification_t(
    verification_id BIGSERIAL PRIMARY KEY,
    creation_time BIGINT NOT NULL,
    user_id TEXT NOT NULL,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    address TEXT NOT NULL,
    code INTEGER NOT NULL
  );
";

impl From<tokio_postgres::row::Row> for Verification {
  // select * from verification_t only, otherwise it will fail
  fn from(row: tokio_postgres::row::Row) -> Verification {
    Verification {
      verification_id: row.get("verification_id"),
      creation_time: row.get("creation_time"),
      user_id: row.get("user_id"),
      first_name: row.get("first_name"),
      last_name: row.get("last_name"),
      address: row.get("address"),
      code: row.get("code"),
    }
  }
}

pub async fn ensure_schema(con: &tokio_postgres::Client) -> Result<(), tokio_postgres::Error> {
  con.batch_execute(SCHEMA).await
}

pub async fn add(
  con: &mut impl GenericClient,
  verification: NewVerification,
) -> Result<Verification, tokio_postgres::Error> {
  let creation_time = current_time_millis();

  let verification_id = con
    .query_one(
      "INSERT INTO
       verification_t(
         creation_time,
         user_id,
         first_name,
         last_name,
         address,
         code
       )
       VALUES($1, $2, $3, $4, $5, $6)
       RETURNING verification_id
      ",
      &[
        &creation_time,
        &verification.user_id,
        &verification.first_name,
        &verification.last_name,
        &verification.address,
        &verification.code,
      ],
    )
    .await?
    .get(0);

  Ok(Verification {
    verification_id,
    creation_time,
    user_id: verification.user_id,
    first_name: verification.first_name,
    last_name: verification.last_name,
    address: verification.address,
    code: verification.code,
  })
}

pub async fn get_by_verification_id(
  con: &mut impl GenericClient,
  verification_id: i64,
) -> Result<Option<Verification>, tokio_postgres::Error> {
  let result = con
    .query_opt(
      "SELECT * FROM verification_t WHERE verification_id=$1",
      &[&verification_id],
    )
    .await?
    .map(|row| row.into());

  Ok(result)
}

pub async fn update_code(
  con: &mut impl GenericClient,
  verification_id: i64,
  code: i32,
) -> Result<bool, tokio_postgres::Error> {
  let count = con
    .execute(
      "UPDATE verification_t SET code=$2 WHERE verification_id=$1",
      &[&verification_id, &code],
    )
    .await?;

  Ok(count != 0)
}

pub async fn delete_by_verification_id(
  con: &mut impl GenericClient,
  verification_id: i64,
) -> Result<bool, tokio_postgres::Error> {
  let count = con
    .execute(
      "DELETE FROM verification_t WHERE verification_id=$1",
      &[&verification_id],
    )
    .await?;

  Ok(count != 0)
}

#[derive(Clone)]
pub struct PgVerificationStore {
  db: Db,
}

impl PgVerificationStore {
  pub fn new(db: Db) -> Self {
    PgVerificationStore { db }
  }
}

#[async_trait]
impl VerificationStore for PgVerificationStore {
  async fn insert(&self, verification: NewVerification) -> Result<Verification, StoreError> {
    let con = &mut *self.db.lock().await;
    if con.is_closed() {
      return Err(StoreError::Unavailable("connection closed".to_owned()));
    }
    Ok(add(con, verification).await?)
  }

  async fn get(&self, verification_id: i64) -> Result<Option<Verification>, StoreError> {
    let con = &mut *self.db.lock().await;
    if con.is_closed() {
      return Err(StoreError::Unavailable("connection closed".to_owned()));
    }
    Ok(get_by_verification_id(con, verification_id).await?)
  }

  async fn update(&self, verification: &Verification) -> Result<bool, StoreError> {
    let con = &mut *self.db.lock().await;
    if con.is_closed() {
      return Err(StoreError::Unavailable("connection closed".to_owned()));
    }
    Ok(update_code(con, verification.verification_id, verification.code).await?)
  }

  async fn delete(&self, verification_id: i64) -> Result<bool, StoreError> {
    let con = &mut *self.db.lock().await;
    if con.is_closed() {
      return Err(StoreError::Unavailable("connection closed".to_owned()));
    }
    Ok(delete_by_verification_id(con, verification_id).await?)
  }
}
