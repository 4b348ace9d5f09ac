//! Domain models used by the backend: study artifacts, scores, usage counters,
//! and the per-user document persisted in the store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Which tutor mode a request belongs to. Each mode has its own daily cap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
  Qa,
  Quiz,
  Flashcard,
}

impl Mode {
  /// Human-facing label, used in limit/upgrade messages.
  pub fn label(&self) -> &'static str {
    match self {
      Mode::Qa => "Q&A",
      Mode::Quiz => "Quiz",
      Mode::Flashcard => "Flashcards",
    }
  }
}

/// A parsed multiple-choice quiz question.
/// Invariant: `options` holds exactly the keys A–D and `correct_option` is one of them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuizItem {
  pub question: String,
  pub options: BTreeMap<char, String>,
  pub correct_option: char,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub explanation: Option<String>,
}

/// A parsed flashcard. Both fields are non-empty after trimming.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardItem {
  pub question: String,
  pub answer: String,
}

/// One role/content turn of the Q&A conversation, in the wire shape the
/// completion service expects ("user" / "assistant").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
  pub role: String,
  pub content: String,
}

impl ChatMessage {
  pub fn user(content: impl Into<String>) -> Self {
    Self { role: "user".into(), content: content.into() }
  }
  pub fn assistant(content: impl Into<String>) -> Self {
    Self { role: "assistant".into(), content: content.into() }
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizScore {
  pub correct: u32,
  pub total: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardScore {
  pub got_it: u32,
  pub missed: u32,
}

/// Per-mode "the cap was hit today" flags, cleared on daily reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitFlags {
  pub qa: bool,
  pub quiz: bool,
  pub flashcard: bool,
}

/// Daily usage counters. `last_reset` is a `%Y-%m-%d` date in local time;
/// whenever it disagrees with today, all counters and flags start over.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyUsage {
  pub qa_count: u32,
  pub quiz_count: u32,
  pub flashcard_count: u32,
  pub last_reset: String,
  pub limit_hit: LimitFlags,
}

impl DailyUsage {
  pub fn fresh(today: &str) -> Self {
    Self {
      qa_count: 0,
      quiz_count: 0,
      flashcard_count: 0,
      last_reset: today.to_string(),
      limit_hit: LimitFlags::default(),
    }
  }

  /// Start a new calendar day if the stored date is stale.
  pub fn roll_over(&mut self, today: &str) {
    if self.last_reset != today {
      *self = DailyUsage::fresh(today);
    }
  }

  pub fn count(&self, mode: Mode) -> u32 {
    match mode {
      Mode::Qa => self.qa_count,
      Mode::Quiz => self.quiz_count,
      Mode::Flashcard => self.flashcard_count,
    }
  }

  pub fn increment(&mut self, mode: Mode) {
    match mode {
      Mode::Qa => self.qa_count += 1,
      Mode::Quiz => self.quiz_count += 1,
      Mode::Flashcard => self.flashcard_count += 1,
    }
  }

  pub fn mark_limit_hit(&mut self, mode: Mode) {
    match mode {
      Mode::Qa => self.limit_hit.qa = true,
      Mode::Quiz => self.limit_hit.quiz = true,
      Mode::Flashcard => self.limit_hit.flashcard = true,
    }
  }
}

/// The per-user document held in the store, merge-written field by field.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserDoc {
  pub password_hash: String,
  pub pro: bool,
  pub quiz_score: QuizScore,
  pub flashcard_score: FlashcardScore,
  pub daily_usage: DailyUsage,
}

impl UserDoc {
  pub fn new(password_hash: String, today: &str) -> Self {
    Self {
      password_hash,
      pro: false,
      quiz_score: QuizScore::default(),
      flashcard_score: FlashcardScore::default(),
      daily_usage: DailyUsage::fresh(today),
    }
  }
}
