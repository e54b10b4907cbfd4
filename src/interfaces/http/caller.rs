//! Caller identity forwarded by the authentication layer in front of Kotiz.

use super::error::ApiError;
use crate::domain::{Caller, Role, UserId};
use crate::error::KotizError;
use axum::http::HeaderMap;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, ApiError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => value.to_str().map(|v| Some(v.trim())).map_err(|_| {
            KotizError::Validation(format!("Header {} is not valid text", name)).into()
        }),
    }
}

/// Reads the caller, if any. A role without a user id is ignored.
pub fn optional_caller(headers: &HeaderMap) -> Result<Option<Caller>, ApiError> {
    let Some(raw_id) = header(headers, USER_ID_HEADER)? else {
        return Ok(None);
    };
    let user_id = raw_id
        .parse::<u64>()
        .map(UserId)
        .map_err(|_| KotizError::Validation(format!("Invalid {} header", USER_ID_HEADER)))?;
    let role = match header(headers, USER_ROLE_HEADER)? {
        None => Role::User,
        Some(raw) if raw.eq_ignore_ascii_case("user") => Role::User,
        Some(raw) if raw.eq_ignore_ascii_case("admin") => Role::Admin,
        Some(_) => {
            return Err(
                KotizError::Validation(format!("Invalid {} header", USER_ROLE_HEADER)).into(),
            );
        }
    };
    Ok(Some(Caller { user_id, role }))
}

pub fn require_caller(headers: &HeaderMap) -> Result<Caller, ApiError> {
    optional_caller(headers)?.ok_or_else(ApiError::unauthenticated)
}
