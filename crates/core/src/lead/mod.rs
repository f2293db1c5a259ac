//! Lead records and the shared collection they live in.

mod collection;
mod types;

pub use collection::{LeadCollection, LeadEvent};
pub use types::{
    is_plausible_email, AutomationStatus, FunnelStatus, Lead, LeadPatch, ProcessingStatus,
    SocialLinks, PLACEHOLDER,
};
