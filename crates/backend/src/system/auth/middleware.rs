use axum::{
    body::Body,
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};

use crate::shared::config::config;
use crate::shared::error::ApiError;

/// Middleware: общий bearer-токен процесса на всех /api/* маршрутах.
///
/// Пустой AUTH_TOKEN выключает гейт; статика и /health не гейтятся.
pub async fn require_token(req: Request<Body>, next: Next) -> Response {
    let expected = &config().secrets.auth_token;
    if expected.is_empty() || !req.uri().path().starts_with("/api/") {
        return next.run(req).await;
    }

    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    let Some(presented) = auth_header.strip_prefix("Bearer ") else {
        return ApiError::Unauthorized.into_response();
    };

    if !tokens_match(presented, expected) {
        return ApiError::InvalidToken.into_response();
    }

    next.run(req).await
}

/// Сравнение дайджестов вместо прямого сравнения строк,
/// чтобы исход не зависел от позиции первого расхождения.
fn tokens_match(presented: &str, expected: &str) -> bool {
    Sha256::digest(presented.as_bytes()) == Sha256::digest(expected.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("secret-token", "secret-token"));
        assert!(!tokens_match("secret-token", "other-token"));
        assert!(!tokens_match("", "secret-token"));
        assert!(!tokens_match("secret-token2", "secret-token"));
    }
}
