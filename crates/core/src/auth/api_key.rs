use async_trait::async_trait;

use super::{AuthError, AuthRequest, Authenticator, Identity};

/// Gate requests on a shared API key.
///
/// The key is read from `Authorization: Bearer <key>` (scheme is
/// case-insensitive) or from `X-API-Key`.
pub struct ApiKeyAuthenticator {
    expected_key: String,
    user_id: String,
}

impl ApiKeyAuthenticator {
    pub fn new(api_key: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            expected_key: api_key.into(),
            user_id: user_id.into(),
        }
    }

    fn presented_key<'a>(&self, request: &'a AuthRequest) -> Option<&'a str> {
        let bearer = request.header("authorization").and_then(|value| {
            let (scheme, token) = value.split_once(' ')?;
            scheme
                .eq_ignore_ascii_case("bearer")
                .then_some(token.trim())
        });
        bearer.or_else(|| request.header("x-api-key").map(str::trim))
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let presented = self
            .presented_key(request)
            .ok_or(AuthError::NotAuthenticated)?;

        if !constant_time_eq(presented.as_bytes(), self.expected_key.as_bytes()) {
            tracing::warn!(source_ip = %request.source_ip, "Rejected request with wrong API key");
            return Err(AuthError::InvalidCredentials("Invalid API key".to_string()));
        }

        Ok(Identity {
            user_id: self.user_id.clone(),
            method: self.method_name(),
        })
    }

    fn method_name(&self) -> &'static str {
        "api_key"
    }
}

/// Length leaks; contents do not.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
