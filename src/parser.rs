//! Extracting typed study artifacts from model completions.
//!
//! The completion service is asked for a fixed line-oriented template
//! (`**Question:** ...`, `**A.** ...`, `**Answer:** B`, ...) but nothing
//! guarantees it complies: fields may be missing, reordered, duplicated, or
//! the whole reply may be unrelated prose. Parsing is a single trim-and-match
//! pass over lines into an accumulator, followed by a validity check. Lines
//! matching no marker are ignored; a repeated marker overwrites the earlier
//! capture. Total over every input, no panics.

use std::collections::BTreeMap;
use std::fmt;

use crate::domain::{FlashcardItem, QuizItem};

pub const QUESTION_MARKER: &str = "**Question:**";
pub const OPTION_MARKERS: [(char, &str); 4] =
  [('A', "**A.**"), ('B', "**B.**"), ('C', "**C.**"), ('D', "**D.**")];
pub const ANSWER_MARKER: &str = "**Answer:**";
pub const EXPLANATION_MARKER: &str = "**Explanation:**";

/// A completion that did not yield a valid item. Carries the raw text for
/// diagnostics; the caller discards the attempt and asks for a regeneration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError {
  MalformedQuiz { raw: String },
  MalformedFlashcard { raw: String },
}

impl ParseError {
  pub fn raw(&self) -> &str {
    match self {
      ParseError::MalformedQuiz { raw } | ParseError::MalformedFlashcard { raw } => raw,
    }
  }
}

impl fmt::Display for ParseError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ParseError::MalformedQuiz { .. } => write!(f, "malformed quiz response"),
      ParseError::MalformedFlashcard { .. } => write!(f, "malformed flashcard response"),
    }
  }
}

impl std::error::Error for ParseError {}

/// Parse a quiz completion into a `QuizItem`.
///
/// Valid when the question is non-empty, all four options were seen, and the
/// answer letter (upper-cased after trimming) is exactly one of A–D. Marker
/// tokens are matched case-sensitively; captured text is kept verbatim apart
/// from surrounding whitespace.
pub fn parse_quiz(raw: &str) -> Result<QuizItem, ParseError> {
  let mut question = String::new();
  let mut options: BTreeMap<char, String> = BTreeMap::new();
  let mut answer = String::new();
  let mut explanation = String::new();

  for line in raw.lines() {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix(QUESTION_MARKER) {
      question = rest.trim().to_string();
      continue;
    }
    let mut matched = false;
    for (letter, marker) in OPTION_MARKERS {
      if let Some(rest) = line.strip_prefix(marker) {
        options.insert(letter, rest.trim().to_string());
        matched = true;
        break;
      }
    }
    if matched {
      continue;
    }
    if let Some(rest) = line.strip_prefix(ANSWER_MARKER) {
      answer = rest.trim().to_uppercase();
    } else if let Some(rest) = line.strip_prefix(EXPLANATION_MARKER) {
      explanation = rest.trim().to_string();
    }
  }

  let correct_option = single_letter(&answer);
  match correct_option {
    Some(letter) if !question.is_empty() && options.len() == OPTION_MARKERS.len() => {
      Ok(QuizItem {
        question,
        options,
        correct_option: letter,
        explanation: if explanation.is_empty() { None } else { Some(explanation) },
      })
    }
    _ => Err(ParseError::MalformedQuiz { raw: raw.to_string() }),
  }
}

/// Parse a flashcard completion into a `FlashcardItem`.
/// Valid when both fields are present and non-empty after trimming.
pub fn parse_flashcard(raw: &str) -> Result<FlashcardItem, ParseError> {
  let mut question = String::new();
  let mut answer = String::new();

  for line in raw.lines() {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix(QUESTION_MARKER) {
      question = rest.trim().to_string();
    } else if let Some(rest) = line.strip_prefix(ANSWER_MARKER) {
      answer = rest.trim().to_string();
    }
  }

  if question.is_empty() || answer.is_empty() {
    return Err(ParseError::MalformedFlashcard { raw: raw.to_string() });
  }
  Ok(FlashcardItem { question, answer })
}

/// The already-upper-cased answer capture must be exactly one of A–D.
fn single_letter(answer: &str) -> Option<char> {
  let mut chars = answer.chars();
  match (chars.next(), chars.next()) {
    (Some(c @ 'A'..='D'), None) => Some(c),
    _ => None,
  }
}
