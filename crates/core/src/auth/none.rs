use async_trait::async_trait;

use super::{AuthError, AuthRequest, Authenticator, Identity};

/// Accepts every request as the session owner.
///
/// Must be selected explicitly in config; there is no implicit fallback.
pub struct NoneAuthenticator {
    user_id: String,
}

impl NoneAuthenticator {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

#[async_trait]
impl Authenticator for NoneAuthenticator {
    async fn authenticate(&self, _request: &AuthRequest) -> Result<Identity, AuthError> {
        Ok(Identity {
            user_id: self.user_id.clone(),
            method: self.method_name(),
        })
    }

    fn method_name(&self) -> &'static str {
        "none"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    #[tokio::test]
    async fn test_accepts_bare_request() {
        let auth = NoneAuthenticator::new("local");
        let request = AuthRequest::new(IpAddr::from([127, 0, 0, 1]));

        let identity = auth.authenticate(&request).await.unwrap();

        assert_eq!(identity.user_id, "local");
        assert_eq!(identity.method, "none");
    }
}
