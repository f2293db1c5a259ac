//! Per-user session state: sender profile, credit balance, sender pool and
//! rotation cursor.

mod context;
mod types;

pub use context::SessionContext;
pub use types::{SenderCredential, SenderProfile, SenderStatus, Session, SessionEvent};
