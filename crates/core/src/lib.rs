pub mod auth;
pub mod config;
pub mod dispatch;
pub mod lead;
pub mod llm;
pub mod mailbox;
pub mod metrics;
pub mod pipeline;
pub mod prospect;
pub mod retry;
pub mod session;
pub mod store;
pub mod testing;

pub use auth::{
    create_authenticator, ApiKeyAuthenticator, AuthError, AuthRequest, Authenticator, Identity,
    NoneAuthenticator,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthMethod, Config, ConfigError,
    SanitizedConfig, SessionConfig,
};
pub use dispatch::{
    rotate_cursor, DispatchConfig, DispatchError, DispatchEvent, DispatchLogEntry, DispatchLoop,
    DispatchOutcome, DispatchStatus, LogLevel, RotationError,
};
pub use lead::{
    AutomationStatus, FunnelStatus, Lead, LeadCollection, LeadEvent, LeadPatch, ProcessingStatus,
};
pub use llm::{create_llm_client, LlmClient, LlmConfig, LlmError, LlmProvider};
pub use mailbox::{create_mailbox, Mailbox, MailboxConfig, MailboxError, OutgoingEmail};
pub use pipeline::{
    EnrichmentPipeline, PipelineConfig, PipelineError, PipelineEvent, PipelinePhase,
    PipelineRequest, PipelineStatus, PipelineSummary,
};
pub use prospect::{
    LeadEnricher, LeadExtractor, LlmLeadEnricher, LlmLeadExtractor, ProspectError, RetryObserver,
};
pub use retry::{with_retry, RetryNotice, RetryPolicy, Retryable};
pub use session::{
    SenderCredential, SenderProfile, SenderStatus, Session, SessionContext, SessionEvent,
};
pub use store::{
    MemoryStateStore, SqliteStateStore, StateStore, StateStoreExt, StoreError, LEADS_KEY,
    SESSION_KEY,
};
