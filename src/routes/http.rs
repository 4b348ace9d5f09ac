//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; logs include parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::{Query, State},
  http::HeaderMap,
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::billing::WebhookEvent;
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { ok: true })
}

#[instrument(level = "info", skip(state, body), fields(%body.email))]
pub async fn http_signup(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CredentialsIn>,
) -> Result<Json<SessionOut>, ApiError> {
  let out = sign_up(&state, &body.email, &body.password).await?;
  info!(target: "tutor", email = %out.email, "HTTP signup completed");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(%body.email))]
pub async fn http_login(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CredentialsIn>,
) -> Result<Json<SessionOut>, ApiError> {
  let out = log_in(&state, &body.email, &body.password).await?;
  info!(target: "tutor", email = %out.email, pro = out.pro, "HTTP login completed");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_logout(
  State(state): State<Arc<AppState>>,
  Json(body): Json<TokenIn>,
) -> impl IntoResponse {
  Json(log_out(&state, &body.token).await)
}

#[instrument(level = "info", skip(state, body), fields(topic = ?body.topic, question_len = body.question.len()))]
pub async fn http_ask(
  State(state): State<Arc<AppState>>,
  Json(body): Json<AskIn>,
) -> Result<Json<AskOut>, ApiError> {
  let out = ask_tutor(&state, &body.token, body.topic, &body.question).await?;
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(topic = ?body.topic))]
pub async fn http_quiz_new(
  State(state): State<Arc<AppState>>,
  Json(body): Json<QuizNewIn>,
) -> Result<Json<QuizNewOut>, ApiError> {
  let out = new_quiz(&state, &body.token, body.topic).await?;
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(%body.selected))]
pub async fn http_quiz_answer(
  State(state): State<Arc<AppState>>,
  Json(body): Json<QuizAnswerIn>,
) -> Result<Json<QuizAnswerOut>, ApiError> {
  let out = answer_quiz(&state, &body.token, &body.selected).await?;
  info!(target: "tutor", correct = out.correct, "HTTP quiz answer graded");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(topic = ?body.topic))]
pub async fn http_flashcard_new(
  State(state): State<Arc<AppState>>,
  Json(body): Json<FlashcardNewIn>,
) -> Result<Json<FlashcardNewOut>, ApiError> {
  let out = new_flashcard(&state, &body.token, body.topic).await?;
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_flashcard_reveal(
  State(state): State<Arc<AppState>>,
  Json(body): Json<TokenIn>,
) -> Result<Json<FlashcardRevealOut>, ApiError> {
  let out = reveal_flashcard(&state, &body.token).await?;
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(got_it = body.got_it))]
pub async fn http_flashcard_review(
  State(state): State<Arc<AppState>>,
  Json(body): Json<FlashcardReviewIn>,
) -> Result<Json<FlashcardReviewOut>, ApiError> {
  let out = review_flashcard(&state, &body.token, body.got_it).await?;
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, q))]
pub async fn http_progress(
  State(state): State<Arc<AppState>>,
  Query(q): Query<ProgressQuery>,
) -> Result<Json<ProgressOut>, ApiError> {
  let out = progress(&state, &q.token).await?;
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_progress_reset(
  State(state): State<Arc<AppState>>,
  Json(body): Json<TokenIn>,
) -> Result<Json<AckOut>, ApiError> {
  let out = reset_progress(&state, &body.token).await?;
  info!(target: "tutor", "HTTP progress reset");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_checkout(
  State(state): State<Arc<AppState>>,
  Json(body): Json<TokenIn>,
) -> Result<Json<CheckoutOut>, ApiError> {
  let out = checkout_link(&state, &body.token).await?;
  info!(target: "tutor", has_url = out.url.is_some(), "HTTP checkout link served");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, headers, body), fields(kind = %body.kind))]
pub async fn http_webhook(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<WebhookEvent>,
) -> Result<Json<WebhookOut>, ApiError> {
  let signature = headers.get("stripe-signature").and_then(|v| v.to_str().ok());
  let out = apply_webhook(&state, signature, body).await?;
  Ok(Json(out))
}
