//! In-memory user document store with merge-style writes.
//!
//! Documents are keyed by email. Writers update one field group at a time and
//! leave the rest of the document alone, the way the original deployment
//! merge-wrote into its hosted document store. The daily-usage gate is a
//! single check-and-increment under one write lock, so two concurrent
//! requests can never both pass the cap check.

use std::{collections::HashMap, sync::Arc};

use chrono::Local;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::config::DailyLimits;
use crate::domain::{DailyUsage, FlashcardScore, Mode, QuizScore, UserDoc};

/// Today's date as `%Y-%m-%d` in local time; the usage-reset calendar day.
pub fn today_str() -> String {
  Local::now().format("%Y-%m-%d").to_string()
}

/// Outcome of the usage gate for one request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsumeOutcome {
  /// The request was counted; `used` is the count after the increment.
  Allowed { used: u32 },
  /// The cap was already reached; nothing was incremented.
  Denied { cap: u32 },
}

#[derive(Clone, Default)]
pub struct UserStore {
  docs: Arc<RwLock<HashMap<String, UserDoc>>>,
}

impl UserStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Create a user document; rejects an email that already has one.
  #[instrument(level = "debug", skip(self, password_hash), fields(%email))]
  pub async fn create_user(&self, email: &str, password_hash: String, today: &str) -> Result<(), String> {
    let mut docs = self.docs.write().await;
    if docs.contains_key(email) {
      return Err(format!("account already exists for {}", email));
    }
    docs.insert(email.to_string(), UserDoc::new(password_hash, today));
    info!(target: "tutor", %email, "User document created");
    Ok(())
  }

  pub async fn fetch(&self, email: &str) -> Option<UserDoc> {
    self.docs.read().await.get(email).cloned()
  }

  /// Merge-write: flip the pro flag, preserving everything else.
  #[instrument(level = "info", skip(self), fields(%email))]
  pub async fn mark_pro(&self, email: &str) -> bool {
    let mut docs = self.docs.write().await;
    match docs.get_mut(email) {
      Some(doc) => {
        doc.pro = true;
        info!(target: "tutor", %email, "User upgraded to pro");
        true
      }
      None => {
        warn!(target: "tutor", %email, "Pro upgrade for unknown user ignored");
        false
      }
    }
  }

  /// Atomic usage gate: roll the counters over to today, then either count
  /// this request or deny it. Pro users are counted but never denied; a
  /// denial marks the mode's limit_hit flag and does not increment.
  #[instrument(level = "debug", skip(self, limits), fields(%email, ?mode))]
  pub async fn try_consume(
    &self,
    email: &str,
    mode: Mode,
    limits: &DailyLimits,
    today: &str,
  ) -> Result<ConsumeOutcome, String> {
    let mut docs = self.docs.write().await;
    let doc = docs
      .get_mut(email)
      .ok_or_else(|| format!("unknown user: {}", email))?;

    doc.daily_usage.roll_over(today);
    let cap = limits.cap(mode);
    if !doc.pro && doc.daily_usage.count(mode) >= cap {
      doc.daily_usage.mark_limit_hit(mode);
      return Ok(ConsumeOutcome::Denied { cap });
    }
    doc.daily_usage.increment(mode);
    Ok(ConsumeOutcome::Allowed { used: doc.daily_usage.count(mode) })
  }

  pub async fn usage(&self, email: &str) -> Option<DailyUsage> {
    self.docs.read().await.get(email).map(|d| d.daily_usage.clone())
  }

  /// Record one graded quiz answer and return the updated score.
  #[instrument(level = "debug", skip(self), fields(%email, %correct))]
  pub async fn record_quiz_answer(&self, email: &str, correct: bool) -> Result<QuizScore, String> {
    let mut docs = self.docs.write().await;
    let doc = docs
      .get_mut(email)
      .ok_or_else(|| format!("unknown user: {}", email))?;
    doc.quiz_score.total += 1;
    if correct {
      doc.quiz_score.correct += 1;
    }
    Ok(doc.quiz_score)
  }

  /// Record one flashcard self-assessment and return the updated score.
  #[instrument(level = "debug", skip(self), fields(%email, %got_it))]
  pub async fn record_flashcard_review(&self, email: &str, got_it: bool) -> Result<FlashcardScore, String> {
    let mut docs = self.docs.write().await;
    let doc = docs
      .get_mut(email)
      .ok_or_else(|| format!("unknown user: {}", email))?;
    if got_it {
      doc.flashcard_score.got_it += 1;
    } else {
      doc.flashcard_score.missed += 1;
    }
    Ok(doc.flashcard_score)
  }

  /// Zero both score groups; usage counters are left alone.
  #[instrument(level = "info", skip(self), fields(%email))]
  pub async fn reset_scores(&self, email: &str) -> bool {
    let mut docs = self.docs.write().await;
    match docs.get_mut(email) {
      Some(doc) => {
        doc.quiz_score = QuizScore::default();
        doc.flashcard_score = FlashcardScore::default();
        true
      }
      None => false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const TODAY: &str = "2026-08-06";
  const TOMORROW: &str = "2026-08-07";

  async fn store_with_user(email: &str) -> UserStore {
    let store = UserStore::new();
    store.create_user(email, "hash".into(), TODAY).await.unwrap();
    store
  }

  #[tokio::test]
  async fn duplicate_signup_is_rejected() {
    let store = store_with_user("a@b.com").await;
    assert!(store.create_user("a@b.com", "other".into(), TODAY).await.is_err());
  }

  #[tokio::test]
  async fn denial_at_cap_does_not_increment() {
    let store = store_with_user("a@b.com").await;
    let limits = DailyLimits::default();

    for used in 1..=limits.quiz {
      let out = store.try_consume("a@b.com", Mode::Quiz, &limits, TODAY).await.unwrap();
      assert_eq!(out, ConsumeOutcome::Allowed { used });
    }
    // At the cap: denied, counter frozen, flag set.
    let out = store.try_consume("a@b.com", Mode::Quiz, &limits, TODAY).await.unwrap();
    assert_eq!(out, ConsumeOutcome::Denied { cap: limits.quiz });
    let usage = store.usage("a@b.com").await.unwrap();
    assert_eq!(usage.quiz_count, limits.quiz);
    assert!(usage.limit_hit.quiz);
    assert!(!usage.limit_hit.qa);
  }

  #[tokio::test]
  async fn modes_are_counted_independently() {
    let store = store_with_user("a@b.com").await;
    let limits = DailyLimits::default();
    store.try_consume("a@b.com", Mode::Qa, &limits, TODAY).await.unwrap();
    store.try_consume("a@b.com", Mode::Flashcard, &limits, TODAY).await.unwrap();
    let usage = store.usage("a@b.com").await.unwrap();
    assert_eq!((usage.qa_count, usage.quiz_count, usage.flashcard_count), (1, 0, 1));
  }

  #[tokio::test]
  async fn pro_users_are_counted_but_never_denied() {
    let store = store_with_user("pro@b.com").await;
    store.mark_pro("pro@b.com").await;
    let limits = DailyLimits::default();
    for _ in 0..20 {
      let out = store.try_consume("pro@b.com", Mode::Quiz, &limits, TODAY).await.unwrap();
      assert!(matches!(out, ConsumeOutcome::Allowed { .. }));
    }
    assert_eq!(store.usage("pro@b.com").await.unwrap().quiz_count, 20);
  }

  #[tokio::test]
  async fn new_day_rolls_counters_over() {
    let store = store_with_user("a@b.com").await;
    let limits = DailyLimits::default();
    for _ in 0..limits.quiz {
      store.try_consume("a@b.com", Mode::Quiz, &limits, TODAY).await.unwrap();
    }
    assert!(matches!(
      store.try_consume("a@b.com", Mode::Quiz, &limits, TODAY).await.unwrap(),
      ConsumeOutcome::Denied { .. }
    ));

    // Next day: counters and flags start over and the request is allowed.
    let out = store.try_consume("a@b.com", Mode::Quiz, &limits, TOMORROW).await.unwrap();
    assert_eq!(out, ConsumeOutcome::Allowed { used: 1 });
    let usage = store.usage("a@b.com").await.unwrap();
    assert_eq!(usage.last_reset, TOMORROW);
    assert!(!usage.limit_hit.quiz);
  }

  #[tokio::test]
  async fn concurrent_requests_cannot_exceed_the_cap() {
    let store = store_with_user("a@b.com").await;
    let limits = DailyLimits::default();
    let mut handles = Vec::new();
    for _ in 0..16 {
      let store = store.clone();
      handles.push(tokio::spawn(async move {
        store.try_consume("a@b.com", Mode::Quiz, &limits, TODAY).await.unwrap()
      }));
    }
    let mut allowed = 0;
    for h in handles {
      if matches!(h.await.unwrap(), ConsumeOutcome::Allowed { .. }) {
        allowed += 1;
      }
    }
    assert_eq!(allowed, limits.quiz);
    assert_eq!(store.usage("a@b.com").await.unwrap().quiz_count, limits.quiz);
  }

  #[tokio::test]
  async fn scores_accumulate_and_reset_preserves_usage() {
    let store = store_with_user("a@b.com").await;
    let limits = DailyLimits::default();
    store.try_consume("a@b.com", Mode::Quiz, &limits, TODAY).await.unwrap();

    store.record_quiz_answer("a@b.com", true).await.unwrap();
    let score = store.record_quiz_answer("a@b.com", false).await.unwrap();
    assert_eq!(score, QuizScore { correct: 1, total: 2 });

    store.record_flashcard_review("a@b.com", true).await.unwrap();
    let fc = store.record_flashcard_review("a@b.com", false).await.unwrap();
    assert_eq!(fc, FlashcardScore { got_it: 1, missed: 1 });

    assert!(store.reset_scores("a@b.com").await);
    let doc = store.fetch("a@b.com").await.unwrap();
    assert_eq!(doc.quiz_score, QuizScore::default());
    assert_eq!(doc.flashcard_score, FlashcardScore::default());
    // Daily usage survives a progress reset.
    assert_eq!(doc.daily_usage.quiz_count, 1);
  }

  #[tokio::test]
  async fn mark_pro_preserves_other_fields() {
    let store = store_with_user("a@b.com").await;
    store.record_quiz_answer("a@b.com", true).await.unwrap();
    assert!(store.mark_pro("a@b.com").await);
    let doc = store.fetch("a@b.com").await.unwrap();
    assert!(doc.pro);
    assert_eq!(doc.quiz_score.correct, 1);
    assert_eq!(doc.password_hash, "hash");
  }

  #[tokio::test]
  async fn unknown_user_operations_fail_cleanly() {
    let store = UserStore::new();
    let limits = DailyLimits::default();
    assert!(store.try_consume("ghost@b.com", Mode::Qa, &limits, TODAY).await.is_err());
    assert!(store.record_quiz_answer("ghost@b.com", true).await.is_err());
    assert!(!store.mark_pro("ghost@b.com").await);
    assert!(!store.reset_scores("ghost@b.com").await);
  }
}
