use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ─── Interactions ───────────────────────────────────────────────────────────

/// Kinds of touchpoints recorded on a contact's timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    EmailSent,
    EmailOpen,
    EmailClick,
    SocialTouch,
    Note,
    EventInvite,
    EventAttend,
    LandingPageVisit,
    Task,
    Call,
}

impl InteractionType {
    pub const COUNT: usize = 10;

    /// Every variant in declaration order. This is the tie-break order for rankings.
    pub const ALL: [InteractionType; Self::COUNT] = [
        InteractionType::EmailSent,
        InteractionType::EmailOpen,
        InteractionType::EmailClick,
        InteractionType::SocialTouch,
        InteractionType::Note,
        InteractionType::EventInvite,
        InteractionType::EventAttend,
        InteractionType::LandingPageVisit,
        InteractionType::Task,
        InteractionType::Call,
    ];

    /// Position in [`InteractionType::ALL`].
    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// Whether the contact initiated this interaction.
    pub fn is_inbound(self) -> bool {
        matches!(
            self,
            InteractionType::EmailOpen
                | InteractionType::EmailClick
                | InteractionType::SocialTouch
                | InteractionType::EventAttend
                | InteractionType::LandingPageVisit
                | InteractionType::Call
        )
    }

    /// Weight used when no explicit weight map is configured.
    pub fn default_weight(self) -> f64 {
        match self {
            // Outbound / bookkeeping
            InteractionType::EmailSent => 1.0,
            InteractionType::Note => 0.5,
            InteractionType::Task => 2.0,
            // Responsive
            InteractionType::EmailOpen => 3.0,
            InteractionType::EmailClick => 5.0,
            InteractionType::SocialTouch => 3.0,
            InteractionType::LandingPageVisit => 4.0,
            InteractionType::EventInvite => 8.0,
            // High-value
            InteractionType::EventAttend => 15.0,
            InteractionType::Call => 15.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InteractionType::EmailSent => "email_sent",
            InteractionType::EmailOpen => "email_open",
            InteractionType::EmailClick => "email_click",
            InteractionType::SocialTouch => "social_touch",
            InteractionType::Note => "note",
            InteractionType::EventInvite => "event_invite",
            InteractionType::EventAttend => "event_attend",
            InteractionType::LandingPageVisit => "landing_page_visit",
            InteractionType::Task => "task",
            InteractionType::Call => "call",
        }
    }
}

impl fmt::Display for InteractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable entry of a contact's interaction ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub contact_id: Uuid,
    #[serde(rename = "type")]
    pub interaction_type: InteractionType,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Interaction {
    pub fn new(
        contact_id: Uuid,
        interaction_type: InteractionType,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            contact_id,
            interaction_type,
            timestamp,
            metadata: HashMap::new(),
        }
    }
}

// ─── Contacts ───────────────────────────────────────────────────────────────

/// Lifecycle status of a contact.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    #[default]
    Lead,
    Customer,
    Partner,
    Investor,
    Other,
}

impl ContactStatus {
    pub const ALL: [ContactStatus; 5] = [
        ContactStatus::Lead,
        ContactStatus::Customer,
        ContactStatus::Partner,
        ContactStatus::Investor,
        ContactStatus::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContactStatus::Lead => "lead",
            ContactStatus::Customer => "customer",
            ContactStatus::Partner => "partner",
            ContactStatus::Investor => "investor",
            ContactStatus::Other => "other",
        }
    }
}

impl fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown contact status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for ContactStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ContactStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Snapshot of a contact as read from persistence.
///
/// `engagement_score` is a cached, derived value owned by the caller. `version`
/// backs optimistic concurrency for status changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub email: String,
    pub status: ContactStatus,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub engagement_score: f64,
    #[serde(default)]
    pub company_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Contact {
    pub fn new(email: impl Into<String>, status: ContactStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into().trim().to_lowercase(),
            status,
            tags: BTreeSet::new(),
            engagement_score: 0.0,
            company_id: None,
            created_at: Utc::now(),
            version: 0,
        }
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.insert(tag.trim().to_lowercase());
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.engagement_score = if score.is_finite() {
            score.clamp(0.0, 100.0)
        } else {
            0.0
        };
        self
    }

    pub fn with_company(mut self, company_id: Uuid) -> Self {
        self.company_id = Some(company_id);
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        let normalized = tag.trim().to_lowercase();
        self.tags.iter().any(|t| t.to_lowercase() == normalized)
    }

    /// Lowercased text after the last `@`, if any.
    pub fn email_domain(&self) -> Option<String> {
        self.email
            .rsplit_once('@')
            .map(|(_, domain)| domain.trim().to_lowercase())
            .filter(|domain| !domain.is_empty())
    }

    /// Engagement score of 50 or more.
    pub fn is_engaged(&self) -> bool {
        self.engagement_score >= 50.0
    }

    /// A customer whose engagement has dropped below 30.
    pub fn is_at_risk(&self) -> bool {
        self.status == ContactStatus::Customer && self.engagement_score < 30.0
    }
}

// ─── Campaign targeting ─────────────────────────────────────────────────────

/// One campaign reaching one contact, with outcome flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignTargetingEdge {
    pub contact_id: Uuid,
    pub campaign_id: Uuid,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub opened: bool,
    #[serde(default)]
    pub clicked: bool,
    #[serde(default)]
    pub converted: bool,
}
