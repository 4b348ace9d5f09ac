//! Core behaviors behind the HTTP handlers.
//!
//! This includes:
//!   - Account signup/login/logout and session resolution
//!   - The usage gate shared by all three tutor modes
//!   - Q&A turns, quiz generation/grading, flashcard generation/review
//!   - Progress reporting/reset and the checkout upgrade path
//!
//! Generation endpoints follow one shape: resolve the session, pass the
//! usage gate, call the model, parse, stash the item in the session. A parse
//! failure discards the attempt and tells the client to regenerate; retry is
//! never attempted here.

use tracing::{error, instrument, warn};

use crate::auth::{hash_password, verify_password, SessionCtx, DEFAULT_COST};
use crate::domain::{ChatMessage, Mode};
use crate::parser::{parse_flashcard, parse_quiz};
use crate::protocol::*;
use crate::state::AppState;
use crate::store::{today_str, ConsumeOutcome};
use crate::util::{is_valid_email, trunc_for_log};

const DEFAULT_QA_TOPIC: &str = "Math";
const DEFAULT_GENERATION_TOPIC: &str = "General";

//
// Accounts & sessions
//

#[instrument(level = "info", skip(state, password), fields(%email))]
pub async fn sign_up(state: &AppState, email: &str, password: &str) -> Result<SessionOut, ApiError> {
  // Validation failures are rejected before any store access.
  if !is_valid_email(email) {
    return Err(ApiError::validation("Please enter a valid email address."));
  }
  if password.is_empty() {
    return Err(ApiError::validation("Password must not be empty."));
  }

  let hash = hash_password(password, DEFAULT_COST)
    .map_err(|e| ApiError::internal(format!("password hashing failed: {e}")))?;
  state
    .store
    .create_user(email, hash, &today_str())
    .await
    .map_err(ApiError::conflict)?;

  let token = state.sessions.open(email, false).await;
  Ok(SessionOut { token, email: email.to_string(), pro: false })
}

#[instrument(level = "info", skip(state, password), fields(%email))]
pub async fn log_in(state: &AppState, email: &str, password: &str) -> Result<SessionOut, ApiError> {
  let doc = state
    .store
    .fetch(email)
    .await
    .ok_or_else(|| ApiError::unauthorized("Login failed: invalid email or password."))?;

  let ok = verify_password(password, &doc.password_hash)
    .map_err(|e| ApiError::internal(format!("password verification failed: {e}")))?;
  if !ok {
    return Err(ApiError::unauthorized("Login failed: invalid email or password."));
  }

  let token = state.sessions.open(email, doc.pro).await;
  Ok(SessionOut { token, email: email.to_string(), pro: doc.pro })
}

#[instrument(level = "info", skip_all)]
pub async fn log_out(state: &AppState, token: &str) -> AckOut {
  AckOut { ok: state.sessions.close(token).await }
}

async fn require_session(state: &AppState, token: &str) -> Result<SessionCtx, ApiError> {
  state
    .sessions
    .get(token)
    .await
    .ok_or_else(|| ApiError::unauthorized("Not logged in."))
}

//
// Usage gate
//

/// Everything the client needs to render the upgrade path after a denial.
pub struct LimitInfo {
  pub mode: Mode,
  pub cap: u32,
  pub upgrade_url: Option<String>,
}

/// Count this request, or report the hit cap. The upgrade link is created at
/// denial time; a checkout failure only suppresses the link.
async fn gate(state: &AppState, ctx: &SessionCtx, mode: Mode) -> Result<Option<LimitInfo>, ApiError> {
  let outcome = state
    .store
    .try_consume(&ctx.email, mode, &state.limits, &today_str())
    .await
    .map_err(ApiError::internal)?;

  match outcome {
    ConsumeOutcome::Allowed { .. } => Ok(None),
    ConsumeOutcome::Denied { cap } => {
      let upgrade_url = upgrade_link(state, &ctx.email).await;
      Ok(Some(LimitInfo { mode, cap, upgrade_url }))
    }
  }
}

async fn upgrade_link(state: &AppState, email: &str) -> Option<String> {
  let checkout = state.checkout.as_ref()?;
  match checkout.create_checkout_session(email).await {
    Ok(url) => Some(url),
    Err(e) => {
      error!(target: "tutor", %email, error = %e, "Failed to create checkout session; suppressing upgrade link.");
      None
    }
  }
}

//
// Q&A chat
//

#[instrument(level = "info", skip(state, token, question), fields(question_len = question.len()))]
pub async fn ask_tutor(
  state: &AppState,
  token: &str,
  topic: Option<String>,
  question: &str,
) -> Result<AskOut, ApiError> {
  let ctx = require_session(state, token).await?;
  let question = question.trim();
  if question.is_empty() {
    return Err(ApiError::validation("Question must not be empty."));
  }

  if let Some(limit) = gate(state, &ctx, Mode::Qa).await? {
    return Ok(AskOut::LimitReached {
      mode: limit.mode.label().to_string(),
      cap: limit.cap,
      upgrade_url: limit.upgrade_url,
    });
  }

  let client = state
    .anthropic
    .as_ref()
    .ok_or_else(|| ApiError::upstream("Model service is not configured."))?;

  let topic = topic.unwrap_or_else(|| DEFAULT_QA_TOPIC.to_string());
  let user_msg = ChatMessage::user(question);
  state.sessions.push_history(token, user_msg.clone()).await;

  let mut history = ctx.messages;
  history.push(user_msg);

  match client.tutor_reply(&state.prompts, &topic, &history).await {
    Ok(answer) => {
      state.sessions.push_history(token, ChatMessage::assistant(answer.clone())).await;
      Ok(AskOut::Ok { answer })
    }
    Err(e) => {
      error!(target: "tutor", email = %ctx.email, error = %e, "Tutor reply failed");
      Err(ApiError::upstream(format!("Error generating response: {e}")))
    }
  }
}

//
// Quiz mode
//

#[instrument(level = "info", skip(state, token))]
pub async fn new_quiz(state: &AppState, token: &str, topic: Option<String>) -> Result<QuizNewOut, ApiError> {
  let ctx = require_session(state, token).await?;

  if let Some(limit) = gate(state, &ctx, Mode::Quiz).await? {
    return Ok(QuizNewOut::LimitReached {
      mode: limit.mode.label().to_string(),
      cap: limit.cap,
      upgrade_url: limit.upgrade_url,
    });
  }

  let client = state
    .anthropic
    .as_ref()
    .ok_or_else(|| ApiError::upstream("Model service is not configured."))?;
  let topic = topic.unwrap_or_else(|| DEFAULT_GENERATION_TOPIC.to_string());

  let raw = client
    .quiz_text(&state.prompts, &topic)
    .await
    .map_err(|e| ApiError::upstream(format!("Error generating quiz: {e}")))?;

  match parse_quiz(&raw) {
    Ok(item) => {
      let question = item.question.clone();
      let options = item.options.clone();
      state.sessions.set_quiz(token, item).await;
      Ok(QuizNewOut::Ok { question, options })
    }
    Err(e) => {
      warn!(target: "tutor", email = %ctx.email, %topic, raw = %trunc_for_log(e.raw(), 200), "Discarding malformed quiz completion");
      Err(ApiError::malformed("Failed to parse quiz question. Please generate a new one."))
    }
  }
}

#[instrument(level = "info", skip(state, token), fields(%selected))]
pub async fn answer_quiz(state: &AppState, token: &str, selected: &str) -> Result<QuizAnswerOut, ApiError> {
  let ctx = require_session(state, token).await?;

  let selected = selected.trim().to_uppercase();
  let letter = match (selected.chars().next(), selected.chars().count()) {
    (Some(c @ 'A'..='D'), 1) => c,
    _ => return Err(ApiError::validation("Selection must be one of A, B, C or D.")),
  };

  let item = state
    .sessions
    .take_quiz(token)
    .await
    .ok_or_else(|| ApiError::validation("No active quiz question. Generate one first."))?;

  let correct = letter == item.correct_option;
  let quiz_score = state
    .store
    .record_quiz_answer(&ctx.email, correct)
    .await
    .map_err(ApiError::internal)?;

  let correct_text = item.options.get(&item.correct_option).cloned().unwrap_or_default();
  Ok(QuizAnswerOut {
    correct,
    correct_option: item.correct_option,
    correct_text,
    explanation: item.explanation,
    quiz_score,
  })
}

//
// Flashcard mode
//

#[instrument(level = "info", skip(state, token))]
pub async fn new_flashcard(
  state: &AppState,
  token: &str,
  topic: Option<String>,
) -> Result<FlashcardNewOut, ApiError> {
  let ctx = require_session(state, token).await?;

  if let Some(limit) = gate(state, &ctx, Mode::Flashcard).await? {
    return Ok(FlashcardNewOut::LimitReached {
      mode: limit.mode.label().to_string(),
      cap: limit.cap,
      upgrade_url: limit.upgrade_url,
    });
  }

  let client = state
    .anthropic
    .as_ref()
    .ok_or_else(|| ApiError::upstream("Model service is not configured."))?;
  let topic = topic.unwrap_or_else(|| DEFAULT_GENERATION_TOPIC.to_string());

  let raw = client
    .flashcard_text(&state.prompts, &topic)
    .await
    .map_err(|e| ApiError::upstream(format!("Error creating flashcard: {e}")))?;

  match parse_flashcard(&raw) {
    Ok(card) => {
      let question = card.question.clone();
      state.sessions.set_flashcard(token, card).await;
      Ok(FlashcardNewOut::Ok { question })
    }
    Err(e) => {
      warn!(target: "tutor", email = %ctx.email, %topic, raw = %trunc_for_log(e.raw(), 200), "Discarding malformed flashcard completion");
      Err(ApiError::malformed("Failed to parse flashcard. Please generate a new one."))
    }
  }
}

#[instrument(level = "info", skip_all)]
pub async fn reveal_flashcard(state: &AppState, token: &str) -> Result<FlashcardRevealOut, ApiError> {
  require_session(state, token).await?;
  let answer = state
    .sessions
    .flashcard_answer(token)
    .await
    .ok_or_else(|| ApiError::validation("No active flashcard. Generate one first."))?;
  Ok(FlashcardRevealOut { answer })
}

#[instrument(level = "info", skip(state, token), fields(%got_it))]
pub async fn review_flashcard(
  state: &AppState,
  token: &str,
  got_it: bool,
) -> Result<FlashcardReviewOut, ApiError> {
  let ctx = require_session(state, token).await?;

  state
    .sessions
    .take_flashcard(token)
    .await
    .ok_or_else(|| ApiError::validation("No active flashcard. Generate one first."))?;

  let flashcard_score = state
    .store
    .record_flashcard_review(&ctx.email, got_it)
    .await
    .map_err(ApiError::internal)?;
  Ok(FlashcardReviewOut { flashcard_score })
}

//
// Progress & billing
//

#[instrument(level = "info", skip_all)]
pub async fn progress(state: &AppState, token: &str) -> Result<ProgressOut, ApiError> {
  let ctx = require_session(state, token).await?;
  let doc = state
    .store
    .fetch(&ctx.email)
    .await
    .ok_or_else(|| ApiError::internal(format!("missing user document for {}", ctx.email)))?;

  // Present counters as of today even if nothing consumed them yet.
  let mut daily_usage = doc.daily_usage;
  daily_usage.roll_over(&today_str());

  Ok(ProgressOut {
    email: ctx.email,
    pro: ctx.pro,
    quiz_score: doc.quiz_score,
    flashcard_score: doc.flashcard_score,
    daily_usage,
  })
}

#[instrument(level = "info", skip_all)]
pub async fn reset_progress(state: &AppState, token: &str) -> Result<AckOut, ApiError> {
  let ctx = require_session(state, token).await?;
  state.sessions.clear_progress(token).await;
  state.store.reset_scores(&ctx.email).await;
  Ok(AckOut { ok: true })
}

#[instrument(level = "info", skip_all)]
pub async fn checkout_link(state: &AppState, token: &str) -> Result<CheckoutOut, ApiError> {
  let ctx = require_session(state, token).await?;
  Ok(CheckoutOut { url: upgrade_link(state, &ctx.email).await })
}

#[instrument(level = "info", skip_all, fields(kind = %event.kind))]
pub async fn apply_webhook(
  state: &AppState,
  signature: Option<&str>,
  event: crate::billing::WebhookEvent,
) -> Result<WebhookOut, ApiError> {
  let checkout = state
    .checkout
    .as_ref()
    .ok_or_else(|| ApiError::unauthorized("Billing is not configured."))?;
  if !checkout.verify_webhook(signature) {
    return Err(ApiError::unauthorized("Webhook signature mismatch."));
  }

  if let Some(email) = event.completed_email() {
    state.store.mark_pro(email).await;
    state.sessions.set_pro_for_email(email).await;
  }
  Ok(WebhookOut { received: true })
}
