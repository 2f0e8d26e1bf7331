//! API error type and [`axum::response::IntoResponse`] implementation.

use std::sync::Arc;

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use checker_core::Error;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Engine(#[from] Error),

  /// A failed pool sync, possibly shared with coalesced callers.
  #[error(transparent)]
  Sync(Arc<Error>),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Engine(e) => status_of(e),
      // An upstream that could not be reached during a sync is the
      // gateway's problem, not ours.
      ApiError::Sync(e) => match &**e {
        Error::Transport(_) => StatusCode::BAD_GATEWAY,
        other => status_of(other),
      },
    }
  }
}

fn status_of(error: &Error) -> StatusCode {
  match error {
    Error::NotFound(_) => StatusCode::NOT_FOUND,
    Error::Validation(_) | Error::UnknownAnswerCode(_) => StatusCode::BAD_REQUEST,
    Error::Unauthorized(_) => StatusCode::FORBIDDEN,
    Error::IsNull(_)
    | Error::Aborted(_)
    | Error::Transport(_)
    | Error::Parse(_)
    | Error::Store(_)
    | Error::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn engine_errors_map_to_statuses() {
    let cases = [
      (Error::NotFound("pool".into()), StatusCode::NOT_FOUND),
      (Error::Validation("bad".into()), StatusCode::BAD_REQUEST),
      (Error::UnknownAnswerCode(7), StatusCode::BAD_REQUEST),
      (Error::Unauthorized("nope".into()), StatusCode::FORBIDDEN),
      (Error::Parse("garbled".into()), StatusCode::INTERNAL_SERVER_ERROR),
      (Error::Transport("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (error, status) in cases {
      assert_eq!(ApiError::from(error).status(), status);
    }
  }

  #[test]
  fn sync_transport_failure_is_bad_gateway() {
    let err = ApiError::Sync(Arc::new(Error::Transport("indexer down".into())));
    assert_eq!(err.status(), StatusCode::BAD_GATEWAY);

    let err = ApiError::Sync(Arc::new(Error::NotFound("pool".into())));
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
  }
}
