//! Common test utilities for API testing with mocks.
//!
//! Builds the full router in-process with mock providers injected, so
//! requests run without network access or a bound socket.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use prospector_core::config::{AuthConfig, DatabaseConfig, ServerConfig};
use prospector_core::testing::{MockEnricher, MockExtractor, MockMailbox};
use prospector_core::{
    ApiKeyAuthenticator, AuthMethod, Authenticator, Config, DispatchLoop, EnrichmentPipeline,
    LeadCollection, NoneAuthenticator, PipelineConfig, SessionContext,
};
use prospector_server::api::{create_router, WsBroadcaster};
use prospector_server::state::AppState;

/// Re-export fixtures for test convenience
pub use prospector_core::testing::fixtures;

/// In-process application with controllable mocks.
pub struct TestFixture {
    pub router: Router,
    pub extractor: Arc<MockExtractor>,
    pub enricher: Arc<MockEnricher>,
    pub mailbox: Arc<MockMailbox>,
    pub session: Arc<SessionContext>,
    pub leads: Arc<LeadCollection>,
    pub pipeline: Arc<EnrichmentPipeline>,
    pub dispatch: Arc<DispatchLoop>,
    /// Holds the database path referenced by the config.
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Knobs for [`TestFixture::with_config`].
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub quota: u32,
    pub senders: Vec<String>,
    pub extracted: usize,
    pub api_key: Option<String>,
    /// Simulated latency of each enrichment call.
    pub enrich_delay: Option<Duration>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            quota: 10,
            senders: Vec::new(),
            extracted: 3,
            api_key: None,
            enrich_delay: None,
        }
    }
}

impl TestConfig {
    pub fn with_senders(mut self, senders: &[&str]) -> Self {
        self.senders = senders.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_quota(mut self, quota: u32) -> Self {
        self.quota = quota;
        self
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn with_enrich_delay(mut self, delay: Duration) -> Self {
        self.enrich_delay = Some(delay);
        self
    }
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let auth = match &test_config.api_key {
            Some(key) => AuthConfig {
                method: AuthMethod::ApiKey,
                api_key: Some(key.clone()),
            },
            None => AuthConfig {
                method: AuthMethod::None,
                api_key: None,
            },
        };
        let config = Config {
            auth,
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0,
            },
            database: DatabaseConfig {
                path: temp_dir.path().join("test.db"),
            },
            llm: Default::default(),
            mailbox: Default::default(),
            retry: Default::default(),
            pipeline: PipelineConfig {
                max_leads: 5,
                pacing_delay_ms: 0,
                ..Default::default()
            },
            dispatch: Default::default(),
            session: Default::default(),
        };

        let authenticator: Arc<dyn Authenticator> = match &test_config.api_key {
            Some(key) => Arc::new(ApiKeyAuthenticator::new(key.clone(), "test-user")),
            None => Arc::new(NoneAuthenticator::new("test-user")),
        };

        let senders: Vec<&str> = test_config.senders.iter().map(String::as_str).collect();
        let session = Arc::new(SessionContext::new(fixtures::session(
            test_config.quota,
            &senders,
        )));
        let leads = Arc::new(LeadCollection::new());

        let extractor = Arc::new(MockExtractor::returning(fixtures::extracted(
            test_config.extracted,
        )));
        let enricher = Arc::new(match test_config.enrich_delay {
            Some(delay) => MockEnricher::new().with_delay(delay),
            None => MockEnricher::new(),
        });
        let mailbox = Arc::new(MockMailbox::new());

        let pipeline = Arc::new(EnrichmentPipeline::new(
            config.pipeline.clone(),
            Arc::clone(&extractor) as _,
            Arc::clone(&enricher) as _,
            Arc::clone(&leads),
        ));
        let dispatch = Arc::new(DispatchLoop::new(
            config.dispatch.clone(),
            config.retry.clone(),
            Arc::clone(&leads),
            Arc::clone(&session),
            Arc::clone(&mailbox) as _,
        ));

        let state = Arc::new(AppState::new(
            config,
            "0123456789abcdef".to_string(),
            authenticator,
            Arc::clone(&session),
            Arc::clone(&leads),
            Arc::clone(&pipeline),
            Arc::clone(&dispatch),
            WsBroadcaster::default(),
        ));

        Self {
            router: create_router(state),
            extractor,
            enricher,
            mailbox,
            session,
            leads,
            pipeline,
            dispatch,
            temp_dir,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body), None).await
    }

    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None, None).await
    }

    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body), None).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None, None).await
    }

    /// GET with an `Authorization: Bearer` header.
    pub async fn get_with_token(&self, path: &str, token: &str) -> TestResponse {
        self.request("GET", path, None, Some(token)).await
    }

    /// Wait until no pipeline run is active.
    pub async fn wait_for_pipeline(&self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.pipeline.is_running() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("pipeline run did not finish in time");
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            request_builder = request_builder.header("Authorization", format!("Bearer {}", token));
        }

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body_bytes).into_owned()))
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
