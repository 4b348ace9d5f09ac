//! Loading tutor configuration (prompts + limits + checkout settings) from
//! TOML, and resolving secrets through a fixed precedence chain.
//!
//! Configuration is read once at startup from `TUTOR_CONFIG_PATH`; every
//! section is optional and falls back to defaults. Secrets resolve per key:
//! secrets file (`TUTOR_SECRETS_PATH`) → config file `[secrets]` table →
//! environment variable.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::Mode;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct TutorConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub limits: DailyLimits,
  #[serde(default)]
  pub checkout: CheckoutCfg,
  #[serde(default)]
  pub secrets: SecretTable,
}

/// Prompt templates sent to the completion service. The quiz and flashcard
/// templates are the literal format contracts the response parser expects;
/// override them in TOML only if the markers stay intact.
#[derive(Clone, Debug, Deserialize)]
pub struct Prompts {
  pub qa_system_template: String,
  pub quiz_user_template: String,
  pub flashcard_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      qa_system_template: "You are a tutor helping with the subject: {topic}.".into(),
      quiz_user_template: "Create a multiple choice quiz question on the topic of '{topic}'. \
        It should be suitable for students and formatted exactly as:\n\n\
        Format your response EXACTLY as follows:\n\n\
        **Question:** [Your question here]\n\
        **A.** [Option A]\n\
        **B.** [Option B]\n\
        **C.** [Option C]\n\
        **D.** [Option D]\n\
        **Answer:** [Letter only - A, B, C, or D]\n\
        **Explanation:** [Brief explanation of why this answer is correct]"
        .into(),
      flashcard_user_template: "Create an educational flashcard on the topic of '{topic}' \
        for a student studying computer science, mathematics, or general academic subjects. \
        Format your response EXACTLY as follows:\n\n\
        **Question:** [Clear, concise question]\n\
        **Answer:** [Comprehensive answer with explanation]"
        .into(),
    }
  }
}

/// Daily free-tier caps per mode. Pro users bypass them.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct DailyLimits {
  pub qa: u32,
  pub quiz: u32,
  pub flashcard: u32,
}

impl Default for DailyLimits {
  fn default() -> Self {
    Self { qa: 5, quiz: 3, flashcard: 5 }
  }
}

impl DailyLimits {
  pub fn cap(&self, mode: Mode) -> u32 {
    match mode {
      Mode::Qa => self.qa,
      Mode::Quiz => self.quiz,
      Mode::Flashcard => self.flashcard,
    }
  }
}

/// Checkout-session settings for the pro upgrade.
#[derive(Clone, Debug, Deserialize)]
pub struct CheckoutCfg {
  pub product_name: String,
  pub currency: String,
  /// Price in the currency's smallest unit (cents).
  pub unit_amount: u32,
  pub success_url: String,
  pub cancel_url: String,
}

impl Default for CheckoutCfg {
  fn default() -> Self {
    Self {
      product_name: "Tutor Pro Plan".into(),
      currency: "usd".into(),
      unit_amount: 1500,
      success_url: "https://tutor.example.com?session=success".into(),
      cancel_url: "https://tutor.example.com?session=cancel".into(),
    }
  }
}

/// Secret values as they appear in a TOML table (secrets file or the
/// `[secrets]` section of the config file).
#[derive(Clone, Debug, Deserialize, Default)]
pub struct SecretTable {
  #[serde(default)]
  pub anthropic_api_key: Option<String>,
  #[serde(default)]
  pub stripe_secret_key: Option<String>,
  #[serde(default)]
  pub stripe_webhook_secret: Option<String>,
}

/// Secrets after precedence resolution. Absent values disable the
/// corresponding client rather than failing startup.
#[derive(Clone, Debug, Default)]
pub struct Secrets {
  pub anthropic_api_key: Option<String>,
  pub stripe_secret_key: Option<String>,
  pub stripe_webhook_secret: Option<String>,
}

impl Secrets {
  /// Resolve each secret: secrets file → config `[secrets]` → environment.
  pub fn resolve(config: &TutorConfig) -> Self {
    let file = load_secret_table_from_env();
    Self {
      anthropic_api_key: resolve_secret(
        "ANTHROPIC_API_KEY",
        file.anthropic_api_key.as_deref(),
        config.secrets.anthropic_api_key.as_deref(),
      ),
      stripe_secret_key: resolve_secret(
        "STRIPE_SECRET_KEY",
        file.stripe_secret_key.as_deref(),
        config.secrets.stripe_secret_key.as_deref(),
      ),
      stripe_webhook_secret: resolve_secret(
        "STRIPE_WEBHOOK_SECRET",
        file.stripe_webhook_secret.as_deref(),
        config.secrets.stripe_webhook_secret.as_deref(),
      ),
    }
  }
}

fn resolve_secret(env_key: &str, from_file: Option<&str>, from_config: Option<&str>) -> Option<String> {
  let (value, source) = if let Some(v) = from_file {
    (Some(v.to_string()), "secrets_file")
  } else if let Some(v) = from_config {
    (Some(v.to_string()), "config_file")
  } else if let Ok(v) = std::env::var(env_key) {
    (Some(v), "env")
  } else {
    (None, "unset")
  };

  if value.is_some() {
    info!(target: "tutor_backend", key = env_key, %source, "Secret resolved");
  }
  value
}

/// Attempt to load the secrets table from TUTOR_SECRETS_PATH.
/// On any parsing/IO error, returns an empty table.
fn load_secret_table_from_env() -> SecretTable {
  let Ok(path) = std::env::var("TUTOR_SECRETS_PATH") else {
    return SecretTable::default();
  };
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<SecretTable>(&s) {
      Ok(table) => {
        info!(target: "tutor_backend", %path, "Loaded secrets file (TOML)");
        table
      }
      Err(e) => {
        error!(target: "tutor_backend", %path, error = %e, "Failed to parse secrets file");
        SecretTable::default()
      }
    },
    Err(e) => {
      error!(target: "tutor_backend", %path, error = %e, "Failed to read secrets file");
      SecretTable::default()
    }
  }
}

/// Attempt to load `TutorConfig` from TUTOR_CONFIG_PATH. On any parsing/IO
/// error, returns None and the caller falls back to defaults.
pub fn load_tutor_config_from_env() -> Option<TutorConfig> {
  let path = std::env::var("TUTOR_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<TutorConfig>(&s) {
      Ok(cfg) => {
        info!(target: "tutor_backend", %path, "Loaded tutor config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "tutor_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "tutor_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_limits_match_free_tier() {
    let limits = DailyLimits::default();
    assert_eq!(limits.cap(Mode::Qa), 5);
    assert_eq!(limits.cap(Mode::Quiz), 3);
    assert_eq!(limits.cap(Mode::Flashcard), 5);
  }

  #[test]
  fn default_quiz_template_carries_every_marker() {
    let p = Prompts::default();
    for marker in ["**Question:**", "**A.**", "**B.**", "**C.**", "**D.**", "**Answer:**", "**Explanation:**"] {
      assert!(p.quiz_user_template.contains(marker), "missing {marker}");
    }
    assert!(p.flashcard_user_template.contains("**Question:**"));
    assert!(p.flashcard_user_template.contains("**Answer:**"));
  }

  #[test]
  fn partial_toml_falls_back_per_section() {
    let cfg: TutorConfig = toml::from_str(
      r#"
      [limits]
      qa = 2
      quiz = 1
      flashcard = 9

      [secrets]
      anthropic_api_key = "sk-from-config"
      "#,
    )
    .unwrap();
    assert_eq!(cfg.limits.qa, 2);
    assert_eq!(cfg.limits.flashcard, 9);
    assert_eq!(cfg.checkout.unit_amount, 1500);
    assert_eq!(cfg.secrets.anthropic_api_key.as_deref(), Some("sk-from-config"));
    assert!(cfg.prompts.qa_system_template.contains("{topic}"));
  }

  #[test]
  fn secret_precedence_prefers_file_over_config() {
    let v = resolve_secret("TUTOR_TEST_UNSET_KEY", Some("from-file"), Some("from-config"));
    assert_eq!(v.as_deref(), Some("from-file"));
    let v = resolve_secret("TUTOR_TEST_UNSET_KEY", None, Some("from-config"));
    assert_eq!(v.as_deref(), Some("from-config"));
    let v = resolve_secret("TUTOR_TEST_UNSET_KEY", None, None);
    assert_eq!(v, None);
  }
}
