//! The authenticated-owner extractor.

use axum::{extract::FromRequestParts, http::request::Parts};
use gongbu_core::model::OwnerId;

use crate::error::ApiError;

/// The user a request acts for.
///
/// An authentication layer in front of the router inserts this as a request
/// extension; handlers that take it reject with 401 `UNAUTHENTICATED` when it
/// is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner(pub OwnerId);

impl<St> FromRequestParts<St> for Owner
where
  St: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &St,
  ) -> Result<Self, Self::Rejection> {
    parts
      .extensions
      .get::<Owner>()
      .copied()
      .ok_or(ApiError::Unauthenticated)
  }
}
