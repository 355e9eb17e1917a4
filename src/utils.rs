//! Utility functions for gateway operations.
//!
//! Pure helpers for credential encoding, the push password formula, timestamp
//! and phone-number formatting, and client-token generation.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Encodes `consumer_key:consumer_secret` for HTTP basic auth.
///
/// # Examples
///
/// ```
/// use mpesa_gateway::utils::basic_auth_string;
///
/// let encoded = basic_auth_string("key", "secret");
/// assert_eq!(encoded, "a2V5OnNlY3JldA==");
/// ```
pub fn basic_auth_string(consumer_key: &str, consumer_secret: &str) -> String {
    BASE64.encode(format!("{consumer_key}:{consumer_secret}"))
}

/// Computes the STK push password: Base64 of shortcode + passkey + timestamp.
///
/// Deterministic for identical inputs; any changed input changes the output.
pub fn push_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    BASE64.encode(format!("{shortcode}{passkey}{timestamp}"))
}

/// Current UTC time in the `YYYYMMDDHHmmss` format Daraja expects.
pub fn daraja_timestamp() -> String {
    chrono::Utc::now().format("%Y%m%d%H%M%S").to_string()
}

/// Strips the leading trunk digit from a billing phone number.
///
/// Callers are expected to supply a number with the trunk prefix; no further
/// validation is performed, so a number without it goes upstream as-is.
///
/// # Examples
///
/// ```
/// use mpesa_gateway::utils::normalize_phone;
///
/// assert_eq!(normalize_phone("0712345678"), "712345678");
/// ```
pub fn normalize_phone(phone: &str) -> String {
    phone.strip_prefix('0').unwrap_or(phone).to_string()
}

/// Coerces an amount to the whole number Daraja accepts.
///
/// Fractional amounts are truncated, not rounded: `100.99` becomes `100`.
pub fn whole_amount(amount: f64) -> u64 {
    amount.trunc() as u64
}

/// Generates a random client token usable as an idempotency id or account
/// reference.
///
/// # Examples
///
/// ```
/// use mpesa_gateway::utils::generate_client_token;
///
/// let token = generate_client_token();
/// assert_eq!(token.len(), 32); // 16 random bytes, hex encoded
/// ```
pub fn generate_client_token() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: [u8; 16] = rng.gen();
    hex::encode(bytes)
}
