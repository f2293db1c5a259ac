pub mod dispatch;
pub mod handlers;
pub mod leads;
pub mod middleware;
pub mod pipeline;
pub mod routes;
pub mod session;
pub mod ws;

pub use routes::create_router;
pub use ws::{spawn_event_bridge, WsBroadcaster, WsMessage};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use prospector_core::testing::{fixtures, MockEnricher, MockExtractor, MockMailbox};
    use prospector_core::{
        load_config_from_str, Authenticator, DispatchLoop, EnrichmentPipeline, LeadCollection,
        SessionContext,
    };

    use super::WsBroadcaster;
    use crate::state::AppState;

    /// Application state backed by mocks, guarded by the given authenticator.
    pub(crate) fn state_with_authenticator(
        authenticator: Arc<dyn Authenticator>,
    ) -> Arc<AppState> {
        let config = load_config_from_str("[auth]\nmethod = \"none\"\n")
            .expect("minimal config should parse");
        let session = Arc::new(SessionContext::new(fixtures::session(10, &[])));
        let leads = Arc::new(LeadCollection::new());
        let pipeline = Arc::new(EnrichmentPipeline::new(
            config.pipeline.clone(),
            Arc::new(MockExtractor::returning(fixtures::extracted(2))),
            Arc::new(MockEnricher::new()),
            Arc::clone(&leads),
        ));
        let dispatch = Arc::new(DispatchLoop::new(
            config.dispatch.clone(),
            config.retry.clone(),
            Arc::clone(&leads),
            Arc::clone(&session),
            Arc::new(MockMailbox::new()),
        ));

        Arc::new(AppState::new(
            config,
            "test".to_string(),
            authenticator,
            session,
            leads,
            pipeline,
            dispatch,
            WsBroadcaster::default(),
        ))
    }
}
