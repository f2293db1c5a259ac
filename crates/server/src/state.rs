use std::sync::Arc;

use prospector_core::{
    Authenticator, Config, DispatchLoop, EnrichmentPipeline, LeadCollection, SanitizedConfig,
    SessionContext,
};

use crate::api::WsBroadcaster;

/// Shared application state
pub struct AppState {
    config: Config,
    config_hash: String,
    authenticator: Arc<dyn Authenticator>,
    session: Arc<SessionContext>,
    leads: Arc<LeadCollection>,
    pipeline: Arc<EnrichmentPipeline>,
    dispatch: Arc<DispatchLoop>,
    ws_broadcaster: WsBroadcaster,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        config_hash: String,
        authenticator: Arc<dyn Authenticator>,
        session: Arc<SessionContext>,
        leads: Arc<LeadCollection>,
        pipeline: Arc<EnrichmentPipeline>,
        dispatch: Arc<DispatchLoop>,
        ws_broadcaster: WsBroadcaster,
    ) -> Self {
        Self {
            config,
            config_hash,
            authenticator,
            session,
            leads,
            pipeline,
            dispatch,
            ws_broadcaster,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    /// Short fingerprint of the loaded configuration.
    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub fn leads(&self) -> &Arc<LeadCollection> {
        &self.leads
    }

    pub fn pipeline(&self) -> &Arc<EnrichmentPipeline> {
        &self.pipeline
    }

    pub fn dispatch(&self) -> &Arc<DispatchLoop> {
        &self.dispatch
    }

    pub fn ws_broadcaster(&self) -> &WsBroadcaster {
        &self.ws_broadcaster
    }
}
