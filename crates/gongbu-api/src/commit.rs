//! `POST /commit`: materialise reviewed practice sentences as a named list.

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
  http::StatusCode,
};
use chrono::NaiveDate;
use gongbu_core::{
  practice::{CommitRequest, CommitSentence},
  store::LessonStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, auth::Owner, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct CommitBody {
  /// Ties the sentences to an imported document owned by the caller.
  #[serde(default)]
  pub document_id:  Option<Uuid>,
  #[serde(default)]
  pub session_date: Option<NaiveDate>,
  /// List name; blank or absent picks the next `Practice List <n>`.
  #[serde(default)]
  pub name:         Option<String>,
  #[serde(default)]
  pub sentences:    Vec<CommitSentence>,
}

#[derive(Debug, Serialize)]
pub struct CommitResponse {
  pub ok:            bool,
  pub list_id:       Uuid,
  pub list_name:     String,
  pub items_created: usize,
}

pub async fn handler<S, P, B>(
  State(state): State<AppState<S, P, B>>,
  Owner(owner): Owner,
  body: Result<Json<CommitBody>, JsonRejection>,
) -> Result<(StatusCode, Json<CommitResponse>), ApiError>
where
  S: LessonStore,
{
  let Json(body) = body?;

  let outcome = state
    .store
    .commit_practice(CommitRequest {
      owner,
      document_id: body.document_id,
      session_date: body.session_date,
      list_name: body.name,
      sentences: body.sentences,
    })
    .await
    .map_err(ApiError::store)?;

  Ok((
    StatusCode::CREATED,
    Json(CommitResponse {
      ok:            true,
      list_id:       outcome.list_id,
      list_name:     outcome.list_name,
      items_created: outcome.items_created,
    }),
  ))
}
