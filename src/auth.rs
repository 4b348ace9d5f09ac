//! Accounts and session lifecycle.
//!
//! Passwords are bcrypt-hashed at signup and verified at login. A login or
//! signup opens a `SessionCtx` keyed by an opaque UUID token; the context
//! carries everything scoped to one sitting (conversation history, the quiz
//! or flashcard currently on screen) and is torn down at logout. Scores and
//! usage counters live in the user store, not here.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{ChatMessage, FlashcardItem, QuizItem};

pub use bcrypt::{hash as hash_password, verify as verify_password, DEFAULT_COST};

/// Per-sitting state, created at login/signup and dropped at logout.
#[derive(Clone, Debug)]
pub struct SessionCtx {
  pub token: String,
  pub email: String,
  pub pro: bool,
  pub messages: Vec<ChatMessage>,
  pub current_quiz: Option<QuizItem>,
  pub current_flashcard: Option<FlashcardItem>,
}

impl SessionCtx {
  fn new(token: String, email: String, pro: bool) -> Self {
    Self {
      token,
      email,
      pro,
      messages: Vec::new(),
      current_quiz: None,
      current_flashcard: None,
    }
  }
}

#[derive(Clone, Default)]
pub struct Sessions {
  inner: Arc<RwLock<HashMap<String, SessionCtx>>>,
}

impl Sessions {
  pub fn new() -> Self {
    Self::default()
  }

  /// Open a fresh session and return its token.
  #[instrument(level = "info", skip(self), fields(%email, %pro))]
  pub async fn open(&self, email: &str, pro: bool) -> String {
    let ctx = SessionCtx::new(Uuid::new_v4().to_string(), email.to_string(), pro);
    let token = ctx.token.clone();
    self.inner.write().await.insert(token.clone(), ctx);
    info!(target: "tutor", %email, "Session opened");
    token
  }

  pub async fn get(&self, token: &str) -> Option<SessionCtx> {
    self.inner.read().await.get(token).cloned()
  }

  /// Tear the session down. Returns false for an unknown token.
  #[instrument(level = "info", skip(self, token))]
  pub async fn close(&self, token: &str) -> bool {
    let removed = self.inner.write().await.remove(token);
    if let Some(ctx) = &removed {
      info!(target: "tutor", email = %ctx.email, "Session closed");
    }
    removed.is_some()
  }

  /// Append one conversation turn.
  pub async fn push_history(&self, token: &str, msg: ChatMessage) -> bool {
    let mut sessions = self.inner.write().await;
    match sessions.get_mut(token) {
      Some(ctx) => {
        ctx.messages.push(msg);
        true
      }
      None => false,
    }
  }

  pub async fn set_quiz(&self, token: &str, item: QuizItem) -> bool {
    let mut sessions = self.inner.write().await;
    match sessions.get_mut(token) {
      Some(ctx) => {
        ctx.current_quiz = Some(item);
        true
      }
      None => false,
    }
  }

  /// Remove and return the quiz on screen; answering consumes it.
  pub async fn take_quiz(&self, token: &str) -> Option<QuizItem> {
    self.inner.write().await.get_mut(token).and_then(|ctx| ctx.current_quiz.take())
  }

  pub async fn set_flashcard(&self, token: &str, item: FlashcardItem) -> bool {
    let mut sessions = self.inner.write().await;
    match sessions.get_mut(token) {
      Some(ctx) => {
        ctx.current_flashcard = Some(item);
        true
      }
      None => false,
    }
  }

  /// The answer of the card on screen, without consuming it; reveal may be
  /// followed by a self-assessed review.
  pub async fn flashcard_answer(&self, token: &str) -> Option<String> {
    self
      .inner
      .read()
      .await
      .get(token)
      .and_then(|ctx| ctx.current_flashcard.as_ref().map(|c| c.answer.clone()))
  }

  /// Remove and return the card on screen; reviewing consumes it.
  pub async fn take_flashcard(&self, token: &str) -> Option<FlashcardItem> {
    self.inner.write().await.get_mut(token).and_then(|ctx| ctx.current_flashcard.take())
  }

  /// Clear everything a progress reset wipes: history and on-screen items.
  pub async fn clear_progress(&self, token: &str) -> bool {
    let mut sessions = self.inner.write().await;
    match sessions.get_mut(token) {
      Some(ctx) => {
        ctx.messages.clear();
        ctx.current_quiz = None;
        ctx.current_flashcard = None;
        true
      }
      None => false,
    }
  }

  /// Flip the pro flag on every live session of this user (webhook path).
  pub async fn set_pro_for_email(&self, email: &str) {
    let mut sessions = self.inner.write().await;
    for ctx in sessions.values_mut() {
      if ctx.email == email {
        ctx.pro = true;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::BTreeMap;

  fn quiz_item() -> QuizItem {
    QuizItem {
      question: "q".into(),
      options: BTreeMap::from([('A', "1".into()), ('B', "2".into()), ('C', "3".into()), ('D', "4".into())]),
      correct_option: 'A',
      explanation: None,
    }
  }

  #[tokio::test]
  async fn session_lifecycle() {
    let sessions = Sessions::new();
    let token = sessions.open("a@b.com", false).await;

    let ctx = sessions.get(&token).await.unwrap();
    assert_eq!(ctx.email, "a@b.com");
    assert!(!ctx.pro);
    assert!(ctx.messages.is_empty());

    assert!(sessions.close(&token).await);
    assert!(sessions.get(&token).await.is_none());
    assert!(!sessions.close(&token).await);
  }

  #[tokio::test]
  async fn quiz_is_consumed_by_take() {
    let sessions = Sessions::new();
    let token = sessions.open("a@b.com", false).await;

    assert!(sessions.set_quiz(&token, quiz_item()).await);
    assert!(sessions.take_quiz(&token).await.is_some());
    assert!(sessions.take_quiz(&token).await.is_none());
  }

  #[tokio::test]
  async fn flashcard_reveal_does_not_consume() {
    let sessions = Sessions::new();
    let token = sessions.open("a@b.com", false).await;
    let card = FlashcardItem { question: "q".into(), answer: "a".into() };

    assert!(sessions.set_flashcard(&token, card).await);
    assert_eq!(sessions.flashcard_answer(&token).await.as_deref(), Some("a"));
    assert_eq!(sessions.flashcard_answer(&token).await.as_deref(), Some("a"));
    assert!(sessions.take_flashcard(&token).await.is_some());
    assert!(sessions.flashcard_answer(&token).await.is_none());
  }

  #[tokio::test]
  async fn clear_progress_wipes_session_scoped_state() {
    let sessions = Sessions::new();
    let token = sessions.open("a@b.com", false).await;
    sessions.push_history(&token, ChatMessage::user("hi")).await;
    sessions.set_quiz(&token, quiz_item()).await;

    assert!(sessions.clear_progress(&token).await);
    let ctx = sessions.get(&token).await.unwrap();
    assert!(ctx.messages.is_empty());
    assert!(ctx.current_quiz.is_none());
  }

  #[tokio::test]
  async fn webhook_pro_flag_reaches_live_sessions() {
    let sessions = Sessions::new();
    let t1 = sessions.open("a@b.com", false).await;
    let t2 = sessions.open("other@b.com", false).await;

    sessions.set_pro_for_email("a@b.com").await;
    assert!(sessions.get(&t1).await.unwrap().pro);
    assert!(!sessions.get(&t2).await.unwrap().pro);
  }

  #[tokio::test]
  async fn unknown_token_mutations_are_noops() {
    let sessions = Sessions::new();
    assert!(!sessions.push_history("nope", ChatMessage::user("x")).await);
    assert!(!sessions.set_quiz("nope", quiz_item()).await);
    assert!(!sessions.clear_progress("nope").await);
  }

  #[test]
  fn password_hash_round_trip() {
    // Low cost keeps the test fast; production paths use DEFAULT_COST.
    let hashed = hash_password("hunter2", 4).unwrap();
    assert!(verify_password("hunter2", &hashed).unwrap());
    assert!(!verify_password("wrong", &hashed).unwrap());
  }
}
