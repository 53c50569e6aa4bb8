use super::handlers::{self, Services};
use super::request;
use super::response::AccountError;
use super::utils;
use super::Config;
use super::SERVICE_NAME;
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use tracing::error;
use warp::http::StatusCode;
use warp::Filter;

static HEALTH_CHECK_MESSAGE: &str = "AUTH SERVICE IS HEALTHY";

/// Combines filters with Filter::or, boxing after every step so the nested
/// filter types stay small enough to compile quickly.
/// https://github.com/seanmonstar/warp/issues/507#issuecomment-615974062
macro_rules! combine {
  ($x:expr, $($y:expr),+) => {{
      let filter = ($x).boxed();
      $( let filter = (filter.or($y)).boxed(); )+
      filter
  }}
}

/// Every route of the service, with rejections rendered as JSON errors.
pub fn api(
  config: Config,
  services: Services,
) -> impl Filter<Extract = impl warp::Reply, Error = Infallible> + Clone {
  api_info()
    .or(health())
    .or(combine!(
      adapter(
        config.clone(),
        services.clone(),
        warp::path!("auth" / "login")
          .and(warp::post())
          .and(warp::body::json()),
        StatusCode::OK,
        handlers::login,
      ),
      adapter(
        config.clone(),
        services.clone(),
        warp::path!("auth" / "signup")
          .and(warp::post())
          .and(warp::body::json()),
        StatusCode::CREATED,
        handlers::sign_up,
      ),
      adapter(
        config.clone(),
        services.clone(),
        warp::path!("auth" / "verify")
          .and(warp::put())
          .and(warp::body::json()),
        StatusCode::OK,
        handlers::verify_user,
      ),
      adapter(
        config.clone(),
        services.clone(),
        warp::path!("auth" / "send-code-again")
          .and(warp::post())
          .and(warp::body::json()),
        StatusCode::OK,
        handlers::send_code_again,
      ),
      adapter(
        config.clone(),
        services.clone(),
        warp::path!("user")
          .and(warp::get())
          .and(bearer())
          .map(|token: String| request::GetUserProps { token }),
        StatusCode::OK,
        handlers::get_user,
      ),
      adapter(
        config.clone(),
        services.clone(),
        warp::path!("user" / String)
          .and(warp::get())
          .and(bearer())
          .map(|id: String, token: String| request::GetUserByIdProps { token, id }),
        StatusCode::OK,
        handlers::get_user_by_id,
      ),
      adapter(
        config.clone(),
        services.clone(),
        warp::path!("user" / String)
          .and(warp::put())
          .and(bearer())
          .and(warp::body::json())
          .map(|id: String, token: String, body: request::UpdateUserBody| {
            request::UpdateUserProps { token, id, body }
          }),
        StatusCode::OK,
        handlers::update_user,
      ),
      adapter(
        config.clone(),
        services.clone(),
        warp::path!("user" / String / "reset-password")
          .and(warp::put())
          .and(bearer())
          .and(warp::body::json())
          .map(|id: String, token: String, body: request::ResetPasswordBody| {
            request::ResetPasswordProps { token, id, body }
          }),
        StatusCode::OK,
        handlers::reset_password,
      ),
      adapter(
        config,
        services,
        warp::path!("user" / String / String)
          .and(warp::delete())
          .and(bearer())
          .map(|id: String, group: String, token: String| {
            request::DeleteUserProps { token, id, group }
          }),
        StatusCode::OK,
        handlers::delete_user,
      )
    ))
    .recover(handle_rejection)
}

fn api_info() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
  let mut info = HashMap::new();
  info.insert("version", env!("CARGO_PKG_VERSION"));
  info.insert("name", SERVICE_NAME);
  warp::path!("info").map(move || warp::reply::json(&info))
}

fn health() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
  warp::path!("auth" / "health")
    .and(warp::get())
    .map(|| warp::reply::json(&HEALTH_CHECK_MESSAGE))
}

// extracts the caller's token from the Authorization header
fn bearer() -> impl Filter<Extract = (String,), Error = warp::Rejection> + Clone {
  warp::header::optional::<String>("authorization").and_then(
    |header: Option<String>| async move {
      header
        .as_deref()
        .and_then(utils::strip_bearer)
        .map(str::to_owned)
        .ok_or_else(|| account_error(AccountError::MissingBearerToken))
    },
  )
}

// this function adapts a handler function to a warp filter
// it accepts an initial filter that extracts the handler's props
fn adapter<PropsType, ResponseType, F>(
  config: Config,
  services: Services,
  filter: impl Filter<Extract = (PropsType,), Error = warp::Rejection> + Clone,
  success: StatusCode,
  handler: fn(Config, Services, PropsType) -> F,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone
where
  F: Future<Output = Result<ResponseType, AccountError>> + Send,
  PropsType: Send,
  ResponseType: Send + serde::ser::Serialize,
{
  // lets you pass in an arbitrary parameter
  fn with<T: Clone + Send>(t: T) -> impl Filter<Extract = (T,), Error = Infallible> + Clone {
    warp::any().map(move || t.clone())
  }

  filter
    .and(with(config))
    .and(with(services))
    .and_then(move |props, config: Config, services| async move {
      // dropping the handler future on timeout cancels every downstream call
      let request_timeout = config.request_timeout;
      match tokio::time::timeout(request_timeout, handler(config, services, props)).await {
        Ok(result) => result.map_err(account_error),
        Err(_) => Err(account_error(AccountError::Timeout)),
      }
    })
    .map(move |x| warp::reply::with_status(warp::reply::json(&x), success))
}

// This function receives a `Rejection` and tries to return a custom
// value, otherwise simply passes the rejection along.
async fn handle_rejection(err: warp::Rejection) -> Result<impl warp::Reply, Infallible> {
  let account_err = if err.is_not_found() {
    AccountError::RouteNotFound
  } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
    AccountError::Validation(e.to_string())
  } else if let Some(AccountErrorRejection(e)) = err.find() {
    e.clone()
  } else if let Some(e) = err.find::<warp::reject::UnsupportedMediaType>() {
    AccountError::Validation(e.to_string())
  } else if let Some(e) = err.find::<warp::reject::PayloadTooLarge>() {
    AccountError::Validation(e.to_string())
  } else if let Some(e) = err.find::<warp::reject::LengthRequired>() {
    AccountError::Validation(e.to_string())
  } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
    AccountError::MethodNotAllowed
  } else {
    // We should have expected this... Just log and say its a 500
    error!(rejection = ?err, "intercepted unknown error kind");
    AccountError::Unknown
  };

  Ok(warp::reply::with_status(
    warp::reply::json(&account_err.body()),
    account_err.status(),
  ))
}

#[derive(Debug)]
pub struct AccountErrorRejection(pub AccountError);
impl warp::reject::Reject for AccountErrorRejection {}

fn account_error(account_error: AccountError) -> warp::reject::Rejection {
  warp::reject::custom(AccountErrorRejection(account_error))
}
