use chrono::{DateTime, Utc};
use tokio::task::spawn_blocking;
use uuid::Uuid;

use crate::error::AppError;

pub fn random_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// `next` only ever points back into this site.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(next)
            if next.starts_with('/')
                && !next.starts_with("//")
                && !next.contains('\\')
                && !next.chars().any(char::is_control) =>
        {
            next
        }
        _ => "/",
    }
}

pub fn login_url(next: &str) -> String {
    format!("/accounts/login/?next={}", encode_query_value(next))
}

pub fn encode_query_value(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }

    encoded
}

/// Quota period, one per calendar month in UTC.
pub fn period_of(time: DateTime<Utc>) -> String {
    time.format("%Y-%m").to_string()
}

pub fn current_period() -> String {
    period_of(Utc::now())
}

/// `12900` -> `12,900`
pub fn group_thousands(value: u32) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    grouped
}

pub async fn hash_password(password: String) -> Result<String, AppError> {
    spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| AppError::InternalError(Box::new(e)))?
        .map_err(|e| AppError::InternalError(Box::new(e)))
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::InternalError(Box::new(e)))?
        .map_err(|e| AppError::InternalError(Box::new(e)))
}
