//! Log Redaction Layer
//!
//! Scrubs phone numbers, URL credentials, and bearer tokens from strings prior
//! to logging.

use regex::Regex;
use std::sync::LazyLock;

static TELEPHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+?[0-9][0-9\-. ]{6,}[0-9]").unwrap());
static URL_CREDENTIALS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?P<scheme>[a-zA-Z][a-zA-Z0-9+.\-]*://)[^/\s:@]+:[^/\s@]+@").unwrap());
static API_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Bearer\s+[a-zA-Z0-9\-\._~+/]+=*").unwrap());

/// Mask a phone number down to its last four digits.
///
/// Any channel prefix such as `whatsapp:` is kept so log lines still show the
/// origin of a message.
pub fn mask_phone(sender: &str) -> String {
    let (prefix, number) = match sender.rsplit_once(':') {
        Some((p, n)) => (format!("{p}:"), n),
        None => (String::new(), sender),
    };
    let digits: Vec<char> = number.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() <= 4 {
        return format!("{prefix}***");
    }
    let tail: String = digits[digits.len() - 4..].iter().collect();
    format!("{prefix}***{tail}")
}

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = URL_CREDENTIALS_RE.replace_all(input, "${scheme}[REDACTED]@");
    let redacted = API_KEY_RE.replace_all(&redacted, "[REDACTED_TOKEN]");
    TELEPHONE_RE
        .replace_all(&redacted, |caps: &regex::Captures| mask_phone(&caps[0]))
        .into_owned()
}
