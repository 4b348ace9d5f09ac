//! Stripe Checkout integration: create upgrade sessions, apply webhook events.
//!
//! Only two calls exist: a form-POST creating a checkout session for the pro
//! upgrade, and the completed-checkout webhook that flips the user's pro
//! flag. A failed checkout call never propagates past the caller; the
//! upgrade link is simply suppressed.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::USER_AGENT;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::config::{CheckoutCfg, Secrets};

/// Event type that marks a completed upgrade payment.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

#[derive(Clone)]
pub struct Checkout {
  client: reqwest::Client,
  secret_key: String,
  webhook_secret: Option<String>,
  base_url: String,
  pub cfg: CheckoutCfg,
}

impl Checkout {
  /// Construct the client from resolved secrets; returns None without a key.
  pub fn from_secrets(secrets: &Secrets, cfg: CheckoutCfg) -> Option<Self> {
    let secret_key = secrets.stripe_secret_key.clone()?;
    let base_url =
      std::env::var("STRIPE_BASE_URL").unwrap_or_else(|_| "https://api.stripe.com".into());
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .ok()?;

    Some(Self {
      client,
      secret_key,
      webhook_secret: secrets.stripe_webhook_secret.clone(),
      base_url,
      cfg,
    })
  }

  /// Create a checkout session for this user and return its URL.
  #[instrument(level = "info", skip(self), fields(%email, amount = self.cfg.unit_amount))]
  pub async fn create_checkout_session(&self, email: &str) -> Result<String, String> {
    let url = format!("{}/v1/checkout/sessions", self.base_url);

    let amount = self.cfg.unit_amount.to_string();
    let form: Vec<(&str, &str)> = vec![
      ("mode", "payment"),
      ("success_url", &self.cfg.success_url),
      ("cancel_url", &self.cfg.cancel_url),
      ("payment_method_types[0]", "card"),
      ("line_items[0][price_data][currency]", &self.cfg.currency),
      ("line_items[0][price_data][product_data][name]", &self.cfg.product_name),
      ("line_items[0][price_data][unit_amount]", &amount),
      ("line_items[0][quantity]", "1"),
      ("metadata[email]", email),
    ];

    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "tutor-backend/0.1")
      .bearer_auth(&self.secret_key)
      .form(&form)
      .send()
      .await
      .map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_stripe_error(&body).unwrap_or(body);
      return Err(format!("Stripe HTTP {}: {}", status, msg));
    }

    let session: SessionResp = res.json().await.map_err(|e| e.to_string())?;
    let url = session.url.ok_or_else(|| "checkout session carried no URL".to_string())?;
    info!(target: "tutor", %email, "Checkout session created");
    Ok(url)
  }

  /// Shared-secret check on incoming webhook calls. With no secret
  /// configured, every call is accepted.
  pub fn verify_webhook(&self, provided: Option<&str>) -> bool {
    match &self.webhook_secret {
      Some(expected) => provided == Some(expected.as_str()),
      None => true,
    }
  }
}

#[derive(Deserialize)]
struct SessionResp {
  #[serde(default)]
  url: Option<String>,
}

/// Try to extract a clean error message from a Stripe error body.
fn extract_stripe_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap {
    error: EObj,
  }
  #[derive(Deserialize)]
  struct EObj {
    message: String,
  }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}

// --- Webhook DTOs ---

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
  #[serde(rename = "type")]
  pub kind: String,
  pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
  pub object: WebhookObject,
}

#[derive(Debug, Deserialize)]
pub struct WebhookObject {
  #[serde(default)]
  pub customer_email: Option<String>,
  #[serde(default)]
  pub metadata: HashMap<String, String>,
}

impl WebhookEvent {
  /// The paying user's email, if this event is a completed checkout.
  pub fn completed_email(&self) -> Option<&str> {
    if self.kind != CHECKOUT_COMPLETED {
      return None;
    }
    self
      .data
      .object
      .customer_email
      .as_deref()
      .or_else(|| self.data.object.metadata.get("email").map(String::as_str))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn completed_event_yields_email() {
    let event: WebhookEvent = serde_json::from_str(
      r#"{"type":"checkout.session.completed","data":{"object":{"customer_email":"a@b.com"}}}"#,
    )
    .unwrap();
    assert_eq!(event.completed_email(), Some("a@b.com"));
  }

  #[test]
  fn metadata_email_is_the_fallback() {
    let event: WebhookEvent = serde_json::from_str(
      r#"{"type":"checkout.session.completed","data":{"object":{"metadata":{"email":"m@b.com"}}}}"#,
    )
    .unwrap();
    assert_eq!(event.completed_email(), Some("m@b.com"));
  }

  #[test]
  fn other_event_kinds_are_ignored() {
    let event: WebhookEvent = serde_json::from_str(
      r#"{"type":"invoice.paid","data":{"object":{"customer_email":"a@b.com"}}}"#,
    )
    .unwrap();
    assert_eq!(event.completed_email(), None);
  }

  #[test]
  fn webhook_secret_comparison() {
    let secrets = Secrets {
      anthropic_api_key: None,
      stripe_secret_key: Some("sk_test_123".into()),
      stripe_webhook_secret: Some("whsec_abc".into()),
    };
    let checkout = Checkout::from_secrets(&secrets, CheckoutCfg::default()).unwrap();
    assert!(checkout.verify_webhook(Some("whsec_abc")));
    assert!(!checkout.verify_webhook(Some("wrong")));
    assert!(!checkout.verify_webhook(None));

    let open = Secrets { stripe_secret_key: Some("sk_test_123".into()), ..Secrets::default() };
    let checkout = Checkout::from_secrets(&open, CheckoutCfg::default()).unwrap();
    assert!(checkout.verify_webhook(None));
  }

  #[test]
  fn stripe_error_extraction() {
    let body = r#"{"error":{"message":"No such price","type":"invalid_request_error"}}"#;
    assert_eq!(extract_stripe_error(body).as_deref(), Some("No such price"));
    assert_eq!(extract_stripe_error("<html>"), None);
  }
}
