//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Minimal email shape check: `local@host.tld` with non-empty parts and a
/// single `@`. Rejected addresses never reach the user store.
pub fn is_valid_email(email: &str) -> bool {
  let Some((local, domain)) = email.split_once('@') else {
    return false;
  };
  if local.is_empty() || domain.contains('@') {
    return false;
  }
  match domain.rsplit_once('.') {
    Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
    None => false,
  }
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut end = max;
  while end > 0 && !s.is_char_boundary(end) {
    end -= 1;
  }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fill_template_replaces_all_occurrences() {
    let out = fill_template("{topic} and {topic} again, {other}", &[("topic", "Math"), ("other", "x")]);
    assert_eq!(out, "Math and Math again, x");
  }

  #[test]
  fn fill_template_leaves_unknown_keys() {
    assert_eq!(fill_template("keep {missing}", &[]), "keep {missing}");
  }

  #[test]
  fn email_accepts_plain_addresses() {
    assert!(is_valid_email("student@example.com"));
    assert!(is_valid_email("a.b+tag@sub.example.org"));
  }

  #[test]
  fn email_rejects_malformed_addresses() {
    assert!(!is_valid_email(""));
    assert!(!is_valid_email("no-at-sign"));
    assert!(!is_valid_email("@example.com"));
    assert!(!is_valid_email("user@nodot"));
    assert!(!is_valid_email("user@.com"));
    assert!(!is_valid_email("user@host."));
    assert!(!is_valid_email("a@b@c.com"));
  }

  #[test]
  fn trunc_respects_char_boundaries() {
    let s = "日本語テキスト";
    let out = trunc_for_log(s, 4);
    assert!(out.starts_with('日'));
    assert!(out.contains("bytes total"));
    assert_eq!(trunc_for_log("short", 100), "short");
  }
}
