//! Shared data model, error taxonomy, and configuration for the contact
//! engagement and segmentation engine.

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{CompileError, CrmError, CrmResult, TransitionError, ValidationError};
pub use types::{
    CampaignTargetingEdge, Contact, ContactStatus, Interaction, InteractionType, UnknownStatus,
};
