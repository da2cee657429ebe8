//! Pusher HTTP API request signing and webhook signature checks.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use sha2::Sha256;

use crate::error::AppError;
use crate::webhook::WebhookPayload;

type HmacSha256 = Hmac<Sha256>;

pub const AUTH_VERSION: &str = "1.0";

/// Constant-time comparison to prevent timing attacks
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Hex-encoded HMAC-SHA256 of `message`.
pub fn hmac_hex(secret: &str, message: &[u8]) -> Result<String, hmac::digest::InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn body_md5(body: &[u8]) -> String {
    hex::encode(Md5::digest(body))
}

/// Authentication query parameters for one API request.
///
/// The string to sign is `METHOD\nPATH\nk=v&k=v` over the parameters sorted
/// by key, values unescaped.
pub fn signed_query(
    method: &str,
    path: &str,
    key: &str,
    secret: &str,
    timestamp: i64,
    body: Option<&[u8]>,
) -> Result<Vec<(String, String)>, hmac::digest::InvalidLength> {
    let mut params = BTreeMap::new();
    params.insert("auth_key".to_string(), key.to_string());
    params.insert("auth_timestamp".to_string(), timestamp.to_string());
    params.insert("auth_version".to_string(), AUTH_VERSION.to_string());
    if let Some(body) = body {
        params.insert("body_md5".to_string(), body_md5(body));
    }

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    let to_sign = format!("{}\n{}\n{}", method.to_uppercase(), path, query);
    let signature = hmac_hex(secret, to_sign.as_bytes())?;

    let mut signed: Vec<(String, String)> = params.into_iter().collect();
    signed.push(("auth_signature".to_string(), signature));
    Ok(signed)
}

/// Check a webhook delivery and parse its body.
///
/// The key must be the app key and the signature the hex HMAC-SHA256 of the
/// raw body under the app secret.
pub fn validate_webhook(
    app_key: &str,
    secret: &str,
    key: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
) -> Result<WebhookPayload, AppError> {
    let key = key.ok_or_else(|| AppError::Auth("missing webhook key".to_string()))?;
    if !constant_time_eq(key.as_bytes(), app_key.as_bytes()) {
        return Err(AppError::Auth("unknown webhook key".to_string()));
    }

    let signature =
        signature.ok_or_else(|| AppError::Auth("missing webhook signature".to_string()))?;
    let expected = hmac_hex(secret, body)
        .map_err(|_| AppError::Configuration("invalid pusher secret".to_string()))?;
    if !constant_time_eq(signature.trim().to_lowercase().as_bytes(), expected.as_bytes()) {
        return Err(AppError::Auth("invalid webhook signature".to_string()));
    }

    serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("malformed webhook body: {}", e)))
}
