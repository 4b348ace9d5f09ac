//! Application state: user store, live sessions, prompts, and the optional
//! model/checkout clients.
//!
//! Everything a handler needs arrives through this struct; nothing is read
//! from ambient globals after startup. Configuration and secrets are resolved
//! exactly once here, then the constructed clients are shared behind `Arc`
//! by the router.

use tracing::{info, instrument};

use crate::anthropic::Anthropic;
use crate::auth::Sessions;
use crate::billing::Checkout;
use crate::config::{load_tutor_config_from_env, DailyLimits, Prompts, Secrets};
use crate::store::UserStore;

#[derive(Clone)]
pub struct AppState {
  pub store: UserStore,
  pub sessions: Sessions,
  pub anthropic: Option<Anthropic>,
  pub checkout: Option<Checkout>,
  pub prompts: Prompts,
  pub limits: DailyLimits,
}

impl AppState {
  /// Build state from env: load config, resolve secrets, construct clients.
  #[instrument(level = "info", skip_all)]
  pub fn new() -> Self {
    let cfg = load_tutor_config_from_env().unwrap_or_default();
    let secrets = Secrets::resolve(&cfg);

    let anthropic = Anthropic::from_secrets(&secrets);
    if let Some(client) = &anthropic {
      info!(target: "tutor_backend", base_url = %client.base_url, model = %client.model, "Anthropic enabled.");
    } else {
      info!(target: "tutor_backend", "Anthropic disabled (no ANTHROPIC_API_KEY). Generation endpoints will refuse.");
    }

    let checkout = Checkout::from_secrets(&secrets, cfg.checkout.clone());
    if let Some(client) = &checkout {
      info!(target: "tutor_backend", product = %client.cfg.product_name, amount = client.cfg.unit_amount, "Checkout enabled.");
    } else {
      info!(target: "tutor_backend", "Checkout disabled (no STRIPE_SECRET_KEY). Upgrade links will be suppressed.");
    }

    info!(
      target: "tutor_backend",
      qa = cfg.limits.qa,
      quiz = cfg.limits.quiz,
      flashcard = cfg.limits.flashcard,
      "Daily free-tier limits"
    );

    Self {
      store: UserStore::new(),
      sessions: Sessions::new(),
      anthropic,
      checkout,
      prompts: cfg.prompts,
      limits: cfg.limits,
    }
  }
}
