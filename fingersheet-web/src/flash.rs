//! One-shot flash messages carried in a signed cookie
//!
//! Cookie value: `<payload>.<signature>`, both URL-safe base64 without
//! padding. The payload is a JSON list of strings; the signature is
//! SHA-256 over the secret key, a `.` and the payload. Cookies that fail
//! verification are treated as empty.
//!
//! Browsers drop cookies over roughly 4KB, so the queue is bounded: long
//! messages are shortened and the oldest entries go first.

use axum::http::header::COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use tracing::warn;

pub const FLASH_COOKIE: &str = "flash";

/// Most messages kept in the queue
pub const MAX_FLASH_MESSAGES: usize = 5;
/// Longest message kept, in characters
pub const MAX_FLASH_MESSAGE_LEN: usize = 300;
/// Upper bound on the encoded cookie value
const MAX_FLASH_VALUE_LEN: usize = 3800;

fn signature(secret: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b".");
    hasher.update(payload.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

fn same_bytes(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Sign and encode `messages` as a cookie value
pub fn encode_flash(secret: &str, messages: &[String]) -> String {
    let json = serde_json::to_vec(messages).unwrap_or_else(|_| b"[]".to_vec());
    let payload = URL_SAFE_NO_PAD.encode(json);
    let sig = signature(secret, &payload);
    format!("{}.{}", payload, sig)
}

/// Verify and decode a cookie value
pub fn decode_flash(secret: &str, value: &str) -> Option<Vec<String>> {
    let (payload, sig) = value.split_once('.')?;
    if !same_bytes(signature(secret, payload).as_bytes(), sig.as_bytes()) {
        warn!("Ignoring flash cookie with bad signature");
        return None;
    }
    let json = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&json).ok()
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Messages queued by earlier responses
pub fn take_flash(headers: &HeaderMap, secret: &str) -> Vec<String> {
    cookie_value(headers, FLASH_COOKIE)
        .and_then(|value| decode_flash(secret, value))
        .unwrap_or_default()
}

fn shorten(message: &str) -> String {
    match message.char_indices().nth(MAX_FLASH_MESSAGE_LEN) {
        Some((end, _)) => format!("{}...", &message[..end]),
        None => message.to_string(),
    }
}

/// Encode the newest messages that fit in one cookie
fn encode_bounded(secret: &str, messages: &[String]) -> String {
    let start = messages.len().saturating_sub(MAX_FLASH_MESSAGES);
    let mut kept: Vec<String> = messages[start..].iter().map(|m| shorten(m)).collect();
    loop {
        let value = encode_flash(secret, &kept);
        if value.len() <= MAX_FLASH_VALUE_LEN || kept.len() <= 1 {
            return value;
        }
        kept.remove(0);
    }
}

/// `Set-Cookie` value replacing the queue with `messages`
pub fn set_flash_cookie(secret: &str, messages: &[String]) -> HeaderValue {
    if messages.len() > MAX_FLASH_MESSAGES {
        warn!("Dropping {} old flash messages", messages.len() - MAX_FLASH_MESSAGES);
    }
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        FLASH_COOKIE,
        encode_bounded(secret, messages)
    );
    // base64 and the fixed attributes are always valid header characters
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| clear_flash_cookie())
}

/// `Set-Cookie` value removing the queue
pub fn clear_flash_cookie() -> HeaderValue {
    HeaderValue::from_static("flash=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax")
}

/// Append `message` to the queue found in `headers`
pub fn push_flash(headers: &HeaderMap, secret: &str, message: impl Into<String>) -> HeaderValue {
    let mut messages = take_flash(headers, secret);
    messages.push(message.into());
    set_flash_cookie(secret, &messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_cookie(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn test_encode_decode() {
        let messages = vec!["No selected file".to_string(), "Ünïcode <b>".to_string()];
        let value = encode_flash("secret", &messages);
        assert_eq!(decode_flash("secret", &value), Some(messages));
    }

    #[test]
    fn test_wrong_secret_or_tampering_rejected() {
        let value = encode_flash("secret", &["hello".to_string()]);
        assert_eq!(decode_flash("other", &value), None);

        let forged_payload = URL_SAFE_NO_PAD.encode(br#"["forged"]"#);
        let (_, sig) = value.split_once('.').unwrap();
        assert_eq!(decode_flash("secret", &format!("{}.{}", forged_payload, sig)), None);
        assert_eq!(decode_flash("secret", "garbage"), None);
    }

    #[test]
    fn test_take_flash_finds_cookie_among_others() {
        let value = encode_flash("k", &["one".to_string()]);
        let headers = request_with_cookie(&format!("theme=dark; flash={}; lang=en", value));
        assert_eq!(take_flash(&headers, "k"), vec!["one".to_string()]);
        assert!(take_flash(&HeaderMap::new(), "k").is_empty());
    }

    #[test]
    fn test_push_appends() {
        let value = encode_flash("k", &["first".to_string()]);
        let headers = request_with_cookie(&format!("flash={}", value));
        let cookie = push_flash(&headers, "k", "second");

        let set = cookie.to_str().unwrap();
        let new_value = set
            .strip_prefix("flash=")
            .and_then(|rest| rest.split(';').next())
            .unwrap();
        assert_eq!(
            decode_flash("k", new_value),
            Some(vec!["first".to_string(), "second".to_string()])
        );
    }

    #[test]
    fn test_queue_stays_within_cookie_limit() {
        let mut headers = HeaderMap::new();
        let mut cookie = clear_flash_cookie();
        for i in 0..20 {
            let message = format!("{} {}", i, "\"\u{1}é".repeat(400));
            cookie = push_flash(&headers, "k", message);
            let set = cookie.to_str().unwrap();
            let value = set.split(';').next().unwrap();
            headers = request_with_cookie(value);
        }

        let set = cookie.to_str().unwrap();
        assert!(set.len() < 4096);

        let messages = take_flash(&headers, "k");
        assert!(!messages.is_empty() && messages.len() <= MAX_FLASH_MESSAGES);
        let newest = messages.last().unwrap();
        assert!(newest.starts_with("19 "));
        assert!(newest.ends_with("..."));
        assert_eq!(newest.chars().count(), MAX_FLASH_MESSAGE_LEN + 3);
    }

    #[test]
    fn test_short_messages_untouched() {
        assert_eq!(shorten("Invalid file type"), "Invalid file type");
        let exact = "x".repeat(MAX_FLASH_MESSAGE_LEN);
        assert_eq!(shorten(&exact), exact);
    }
}
