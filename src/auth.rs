/// Shared-secret extractors for the download gate and the admin surface
use crate::{context::AppContext, error::GateError};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use constant_time_eq::constant_time_eq;

/// Header carrying the public download secret
pub const DOWNLOAD_SECRET_HEADER: &str = "x-api-secret";

/// Header carrying the admin API key
pub const ADMIN_KEY_HEADER: &str = "x-api-key";

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Compare a presented secret against the configured one
pub fn secrets_match(provided: &str, expected: &str) -> bool {
    !expected.is_empty() && constant_time_eq(provided.as_bytes(), expected.as_bytes())
}

/// Proof that the request carried the download secret
#[derive(Debug, Clone, Copy)]
pub struct DownloadSecret;

#[async_trait]
impl FromRequestParts<AppContext> for DownloadSecret {
    type Rejection = GateError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        match header_value(&parts.headers, DOWNLOAD_SECRET_HEADER) {
            Some(secret) if secrets_match(secret, &state.config.auth.download_secret) => {
                Ok(DownloadSecret)
            }
            _ => {
                tracing::warn!("download rejected: invalid or missing secret");
                Err(GateError::Authentication(
                    "Invalid or missing secret key".to_string(),
                ))
            }
        }
    }
}

/// Admin authentication, checked before any handler logic runs
#[derive(Debug, Clone, Copy)]
pub struct AdminKey;

#[async_trait]
impl FromRequestParts<AppContext> for AdminKey {
    type Rejection = GateError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let key = header_value(&parts.headers, ADMIN_KEY_HEADER)
            .ok_or_else(|| GateError::Authentication("Missing admin API key".to_string()))?;

        if !secrets_match(key, &state.config.auth.admin_api_key) {
            tracing::warn!(path = %parts.uri.path(), "admin request rejected");
            return Err(GateError::Authentication("Invalid admin API key".to_string()));
        }

        Ok(AdminKey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secrets_match() {
        assert!(secrets_match("s3cret", "s3cret"));
        assert!(!secrets_match("s3cre", "s3cret"));
        assert!(!secrets_match("S3CRET", "s3cret"));
        assert!(!secrets_match("", "s3cret"));
        // An unset secret never matches, not even an empty header
        assert!(!secrets_match("", ""));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::HeaderName::from_bytes(b"X-Api-Secret").unwrap(),
            "abc".parse().unwrap(),
        );
        assert_eq!(header_value(&headers, DOWNLOAD_SECRET_HEADER), Some("abc"));
        assert_eq!(header_value(&headers, ADMIN_KEY_HEADER), None);
    }
}
