//! HTTP Basic authentication middleware.
//!
//! Valid credentials attach an [`Owner`] to the request. Invalid or missing
//! credentials are not rejected here; routes that need an owner reject with
//! 401 themselves, which keeps `/healthz` open.

use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::{Request, State},
  http::{HeaderMap, HeaderValue, StatusCode, header},
  middleware::Next,
  response::Response,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use gongbu_api::Owner;
use gongbu_core::model::OwnerId;

use crate::UserConfig;

/// Resolve Basic credentials in `headers` to the matching user's owner id.
pub fn verify_basic(headers: &HeaderMap, users: &[UserConfig]) -> Option<OwnerId> {
  let encoded = headers
    .get(header::AUTHORIZATION)?
    .to_str()
    .ok()?
    .strip_prefix("Basic ")?;

  let decoded = B64.decode(encoded).ok()?;
  let creds = std::str::from_utf8(&decoded).ok()?;
  let (username, password) = creds.split_once(':')?;

  let user = users.iter().find(|u| u.username == username)?;
  let parsed_hash = PasswordHash::new(&user.password_hash).ok()?;
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .ok()?;

  Some(user.owner_id)
}

pub async fn authenticate(
  State(users): State<Arc<Vec<UserConfig>>>,
  mut req: Request,
  next: Next,
) -> Response {
  if let Some(owner) = verify_basic(req.headers(), &users) {
    req.extensions_mut().insert(Owner(owner));
  }

  let mut res = next.run(req).await;
  if res.status() == StatusCode::UNAUTHORIZED {
    res.headers_mut().insert(
      header::WWW_AUTHENTICATE,
      HeaderValue::from_static("Basic realm=\"gongbu\""),
    );
  }
  res
}
