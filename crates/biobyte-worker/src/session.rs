//! Session token transport: the `token` cookie, with `Authorization: Bearer`
//! as a fallback for API clients.

use crate::jwt::Claims;

pub const TOKEN_COOKIE: &str = "token";
pub const TOKEN_EXP_COOKIE: &str = "token_exp";

/// Value of cookie `name` in a `Cookie` request header.
pub fn cookie_value(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| k.trim() == name)
        .map(|(_, v)| v.trim().trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}

pub fn bearer_token(authorization: &str) -> Option<String> {
    let (scheme, rest) = authorization.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// The one place a session token is pulled from a request: cookie first, then bearer.
pub fn extract_token(cookie_header: Option<&str>, authorization: Option<&str>) -> Option<String> {
    cookie_header
        .and_then(|h| cookie_value(h, TOKEN_COOKIE))
        .or_else(|| authorization.and_then(bearer_token))
}

/// `Set-Cookie` values issued on login.
pub fn login_cookies(token: &str, claims: &Claims, ttl_secs: i64) -> [String; 2] {
    [
        format!(
            "{TOKEN_COOKIE}={token}; Path=/; Max-Age={ttl_secs}; HttpOnly; Secure; SameSite=Lax"
        ),
        format!(
            "{TOKEN_EXP_COOKIE}={}; Path=/; Max-Age={ttl_secs}; Secure; SameSite=Lax",
            claims.exp
        ),
    ]
}

/// `Set-Cookie` values that expire both session cookies.
pub fn logout_cookies() -> [String; 2] {
    [
        format!("{TOKEN_COOKIE}=; Path=/; Max-Age=0; HttpOnly; Secure; SameSite=Lax"),
        format!("{TOKEN_EXP_COOKIE}=; Path=/; Max-Age=0; Secure; SameSite=Lax"),
    ]
}
