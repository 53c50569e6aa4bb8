use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_postgres::{Client, NoTls};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use warp::Filter;

mod utils;

mod api;
mod db_types;
mod handlers;
mod request;
mod response;

mod attempt_limiter;
mod orchestrator;

// collaborators
mod admin_session;
mod booking_service;
mod identity_service;
mod mail_service;
mod notification_service;
mod verification_service;

#[cfg(test)]
mod test_support;

static SERVICE_NAME: &str = "auth-service";

static OUTBOX_CAPACITY: usize = 1024;

#[derive(Parser, Clone)]
struct Opts {
  #[clap(long, env = "PORT")]
  port: u16,
  #[clap(long, env = "SITE_EXTERNAL_URL")]
  site_external_url: String,
  #[clap(long, env = "DATABASE_URL")]
  database_url: String,
  #[clap(long, env = "IDENTITY_PROVIDER_URL")]
  identity_provider_url: String,
  #[clap(long, env = "IDENTITY_PROVIDER_REALM")]
  identity_provider_realm: String,
  #[clap(long, env = "IDENTITY_PROVIDER_CLIENT_ID")]
  identity_provider_client_id: String,
  #[clap(long, env = "ADMIN_USERNAME")]
  admin_username: String,
  #[clap(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
  admin_password: String,
  #[clap(long, env = "BOOKING_SERVICE_URL")]
  booking_service_url: String,
  #[clap(long, env = "MAIL_SERVICE_URL")]
  mail_service_url: String,
  #[clap(long, env = "NATS_URL")]
  nats_url: String,
  #[clap(long, env = "REQUEST_TIMEOUT_SECS", default_value = "10")]
  request_timeout_secs: u64,
  #[clap(long, env = "MAX_VERIFICATION_ATTEMPTS", default_value = "5")]
  max_verification_attempts: u32,
}

pub type Db = Arc<Mutex<Client>>;

#[derive(Clone)]
pub struct Config {
  pub site_external_url: String,
  pub request_timeout: Duration,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let Opts {
    port,
    site_external_url,
    database_url,
    identity_provider_url,
    identity_provider_realm,
    identity_provider_client_id,
    admin_username,
    admin_password,
    booking_service_url,
    mail_service_url,
    nats_url,
    request_timeout_secs,
    max_verification_attempts,
  } = Opts::parse();

  let (client, connection) = loop {
    match tokio_postgres::connect(&database_url, NoTls).await {
      Ok(v) => break v,
      Err(e) => error!(error = %e, "could not connect to database, retrying in 5s"),
    }

    tokio::time::sleep(Duration::from_secs(5)).await;
  };

  // The connection object performs the actual communication with the database,
  // so spawn it off to run on its own.
  tokio::spawn(async move {
    if let Err(e) = connection.await {
      error!(error = %e, "database connection error");
    }
  });

  verification_service::ensure_schema(&client).await?;
  let db: Db = Arc::new(Mutex::new(client));

  let request_timeout = Duration::from_secs(request_timeout_secs);
  let http = reqwest::Client::builder().timeout(request_timeout).build()?;

  let provider: Arc<dyn identity_service::IdentityProvider> =
    Arc::new(identity_service::KeycloakClient::new(
      http.clone(),
      &identity_provider_url,
      &identity_provider_realm,
      &identity_provider_client_id,
    ));

  let admin = Arc::new(admin_session::FreshAdminSession::new(
    provider.clone(),
    admin_username,
    admin_password,
  ));

  let nats = async_nats::ConnectOptions::new()
    .retry_on_initial_connect()
    .connect(nats_url.as_str())
    .await?;
  let (outbox, _outbox_worker) = notification_service::Outbox::start(
    Arc::new(notification_service::NatsPublisher::new(nats)),
    OUTBOX_CAPACITY,
    Duration::from_millis(200),
  );

  let orchestrator = orchestrator::AccountOrchestrator::new(
    provider,
    admin,
    Arc::new(verification_service::PgVerificationStore::new(db)),
    Arc::new(outbox),
    Arc::new(booking_service::BookingService::new(
      http.clone(),
      &booking_service_url,
    )),
    Arc::new(utils::RandomCodeGenerator),
  );

  let services = handlers::Services {
    orchestrator: Arc::new(orchestrator),
    mailer: Arc::new(mail_service::MailService::new(http, &mail_service_url)),
    limiter: Arc::new(attempt_limiter::AttemptLimiter::new(
      max_verification_attempts,
    )),
  };

  let api = api::api(
    Config {
      site_external_url,
      request_timeout,
    },
    services,
  );

  let log = warp::log::custom(|info| {
    info!(
      method = %info.method(),
      path = info.path(),
      status = info.status().as_u16(),
      elapsed_ms = info.elapsed().as_millis() as u64,
      "request"
    );
  });

  info!(port, "{} listening", SERVICE_NAME);
  warp::serve(api.with(log)).run(([0, 0, 0, 0], port)).await;

  Ok(())
}
