//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::domain::{DailyUsage, FlashcardScore, QuizScore};

/// Error envelope returned with every non-2xx response.
#[derive(Debug, Serialize)]
pub struct ErrorOut {
  pub error: String,
}

/// A handler failure mapped to a status code. Every failure in this API is
/// recoverable from the client's point of view: discard, show the message,
/// let the user retry.
#[derive(Debug)]
pub struct ApiError {
  pub status: StatusCode,
  pub message: String,
}

impl ApiError {
  /// Input rejected before any store or network call.
  pub fn validation(message: impl Into<String>) -> Self {
    Self { status: StatusCode::BAD_REQUEST, message: message.into() }
  }

  pub fn unauthorized(message: impl Into<String>) -> Self {
    Self { status: StatusCode::UNAUTHORIZED, message: message.into() }
  }

  pub fn conflict(message: impl Into<String>) -> Self {
    Self { status: StatusCode::CONFLICT, message: message.into() }
  }

  /// A dependency (model, checkout, store) failed; the session survives.
  pub fn upstream(message: impl Into<String>) -> Self {
    Self { status: StatusCode::BAD_GATEWAY, message: message.into() }
  }

  /// The model replied but the reply did not parse into a valid item.
  pub fn malformed(message: impl Into<String>) -> Self {
    Self { status: StatusCode::UNPROCESSABLE_ENTITY, message: message.into() }
  }

  pub fn internal(message: impl Into<String>) -> Self {
    Self { status: StatusCode::INTERNAL_SERVER_ERROR, message: message.into() }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> axum::response::Response {
    (self.status, Json(ErrorOut { error: self.message })).into_response()
  }
}

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
}

//
// Auth
//

#[derive(Debug, Deserialize)]
pub struct CredentialsIn {
  pub email: String,
  pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionOut {
  pub token: String,
  pub email: String,
  pub pro: bool,
}

#[derive(Debug, Deserialize)]
pub struct TokenIn {
  pub token: String,
}

#[derive(Serialize)]
pub struct AckOut {
  pub ok: bool,
}

//
// Q&A chat
//

#[derive(Debug, Deserialize)]
pub struct AskIn {
  pub token: String,
  #[serde(default)]
  pub topic: Option<String>,
  pub question: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AskOut {
  Ok { answer: String },
  LimitReached { mode: String, cap: u32, upgrade_url: Option<String> },
}

//
// Quiz mode
//

#[derive(Debug, Deserialize)]
pub struct QuizNewIn {
  pub token: String,
  #[serde(default)]
  pub topic: Option<String>,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QuizNewOut {
  Ok {
    question: String,
    /// Option text keyed by letter A–D. The correct letter stays server-side
    /// until the answer is submitted.
    options: std::collections::BTreeMap<char, String>,
  },
  LimitReached { mode: String, cap: u32, upgrade_url: Option<String> },
}

#[derive(Debug, Deserialize)]
pub struct QuizAnswerIn {
  pub token: String,
  pub selected: String,
}

#[derive(Debug, Serialize)]
pub struct QuizAnswerOut {
  pub correct: bool,
  pub correct_option: char,
  pub correct_text: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub explanation: Option<String>,
  pub quiz_score: QuizScore,
}

//
// Flashcard mode
//

#[derive(Debug, Deserialize)]
pub struct FlashcardNewIn {
  pub token: String,
  #[serde(default)]
  pub topic: Option<String>,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FlashcardNewOut {
  Ok { question: String },
  LimitReached { mode: String, cap: u32, upgrade_url: Option<String> },
}

#[derive(Serialize)]
pub struct FlashcardRevealOut {
  pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct FlashcardReviewIn {
  pub token: String,
  pub got_it: bool,
}

#[derive(Debug, Serialize)]
pub struct FlashcardReviewOut {
  pub flashcard_score: FlashcardScore,
}

//
// Progress
//

#[derive(Debug, Deserialize)]
pub struct ProgressQuery {
  pub token: String,
}

#[derive(Serialize)]
pub struct ProgressOut {
  pub email: String,
  pub pro: bool,
  pub quiz_score: QuizScore,
  pub flashcard_score: FlashcardScore,
  pub daily_usage: DailyUsage,
}

//
// Billing
//

#[derive(Serialize)]
pub struct CheckoutOut {
  /// Absent when checkout is unconfigured or the provider call failed; the
  /// client hides the upgrade button instead of erroring.
  pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookOut {
  pub received: bool,
}
