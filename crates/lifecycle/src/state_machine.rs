use crm_core::{Contact, ContactStatus, TransitionError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// How a `(from, to)` status pair is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionRule {
    Allowed,
    RequiresConfirmation,
    Forbidden,
}

/// Describes the rule for a single status pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: ContactStatus,
    pub to: ContactStatus,
    pub rule: TransitionRule,
    pub reason: String,
}

/// Explicit transition table. Pairs without an entry are forbidden, and a
/// status moving to itself is always allowed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionTable {
    transitions: Vec<StateTransition>,
}

const SELF_TRANSITION_REASON: &str = "status unchanged";
const UNLISTED_REASON: &str = "not permitted by the transition table";

impl TransitionTable {
    /// The founder-CRM lifecycle rules.
    pub fn standard() -> Self {
        use ContactStatus::*;
        use TransitionRule::*;

        let mut table = Self::default();

        // Lead ->
        for to in [Customer, Partner, Investor, Other] {
            table = table.with_rule(Lead, to, Allowed, "lead qualification");
        }

        // Customer ->
        table = table
            .with_rule(Customer, Lead, RequiresConfirmation, "demotes a customer back to lead")
            .with_rule(Customer, Partner, Allowed, "customer became a strategic partner")
            .with_rule(Customer, Investor, Allowed, "customer invested")
            .with_rule(Customer, Other, RequiresConfirmation, "removes customer classification");

        // Partner / Investor ->
        for from in [Partner, Investor] {
            for to in ContactStatus::ALL.into_iter().filter(|to| *to != from) {
                table = table.with_rule(
                    from,
                    to,
                    RequiresConfirmation,
                    "changes a high-value relationship",
                );
            }
        }

        // Other ->
        for to in [Lead, Customer, Partner, Investor] {
            table = table.with_rule(Other, to, Allowed, "re-qualification");
        }

        table
    }

    /// Adds or replaces the rule for `(from, to)`, leaving every other entry untouched.
    pub fn with_rule(
        mut self,
        from: ContactStatus,
        to: ContactStatus,
        rule: TransitionRule,
        reason: impl Into<String>,
    ) -> Self {
        let entry = StateTransition {
            from,
            to,
            rule,
            reason: reason.into(),
        };
        match self
            .transitions
            .iter_mut()
            .find(|t| t.from == from && t.to == to)
        {
            Some(existing) => *existing = entry,
            None => self.transitions.push(entry),
        }
        self
    }

    fn entry(&self, from: ContactStatus, to: ContactStatus) -> Option<&StateTransition> {
        self.transitions
            .iter()
            .find(|t| t.from == from && t.to == to)
    }

    pub fn classify(&self, from: ContactStatus, to: ContactStatus) -> TransitionRule {
        if from == to {
            return TransitionRule::Allowed;
        }
        self.entry(from, to)
            .map_or(TransitionRule::Forbidden, |t| t.rule)
    }

    /// Human-readable reason attached to the rule for `(from, to)`.
    pub fn explain(&self, from: ContactStatus, to: ContactStatus) -> &str {
        if from == to {
            return SELF_TRANSITION_REASON;
        }
        self.entry(from, to)
            .map_or(UNLISTED_REASON, |t| t.reason.as_str())
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

/// Record handed to the timeline logger after an applied status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub contact_id: Uuid,
    pub from: ContactStatus,
    pub to: ContactStatus,
    pub version: u64,
}

/// Returns the change between two snapshots of the same contact, if the status moved.
pub fn status_change(before: &Contact, after: &Contact) -> Option<StatusChange> {
    (before.id == after.id && before.status != after.status).then(|| StatusChange {
        contact_id: after.id,
        from: before.status,
        to: after.status,
        version: after.version,
    })
}

/// Guards contact status changes with a [`TransitionTable`].
#[derive(Debug, Clone)]
pub struct ContactStateMachine {
    table: TransitionTable,
}

impl ContactStateMachine {
    pub fn new(table: TransitionTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    /// Returns `true` if the move would succeed with the given confirmation flag.
    pub fn can_transition(&self, from: ContactStatus, to: ContactStatus, confirmed: bool) -> bool {
        match self.table.classify(from, to) {
            TransitionRule::Allowed => true,
            TransitionRule::RequiresConfirmation => confirmed,
            TransitionRule::Forbidden => false,
        }
    }

    /// Attempts to move `contact` to `new_status`.
    ///
    /// The version check runs first, so a stale `expected_version` yields
    /// `Conflict` even when the transition itself would be valid. On success a
    /// new contact value is returned with its version incremented; a
    /// self-transition returns the contact unchanged.
    pub fn attempt(
        &self,
        contact: &Contact,
        new_status: ContactStatus,
        confirmed: bool,
        expected_version: u64,
    ) -> Result<Contact, TransitionError> {
        let from = contact.status;

        if contact.version != expected_version {
            warn!(
                contact_id = %contact.id,
                expected = expected_version,
                actual = contact.version,
                "Stale contact version"
            );
            metrics::counter!("lifecycle.transition.rejected", "reason" => "conflict").increment(1);
            return Err(TransitionError::Conflict {
                expected: expected_version,
                actual: contact.version,
            });
        }

        let reason = self.table.explain(from, new_status).to_string();
        match self.table.classify(from, new_status) {
            TransitionRule::Forbidden => {
                metrics::counter!("lifecycle.transition.rejected", "reason" => "forbidden")
                    .increment(1);
                return Err(TransitionError::Forbidden {
                    from,
                    to: new_status,
                    reason,
                });
            }
            TransitionRule::RequiresConfirmation if !confirmed => {
                metrics::counter!("lifecycle.transition.rejected", "reason" => "unconfirmed")
                    .increment(1);
                return Err(TransitionError::ConfirmationRequired {
                    from,
                    to: new_status,
                    reason,
                });
            }
            _ => {}
        }

        if from == new_status {
            return Ok(contact.clone());
        }

        let mut updated = contact.clone();
        updated.status = new_status;
        updated.version = contact.version.saturating_add(1);

        info!(
            contact_id = %contact.id,
            from = %from,
            to = %new_status,
            version = updated.version,
            "Contact status changed"
        );
        metrics::counter!("lifecycle.transition.applied").increment(1);

        Ok(updated)
    }
}

impl Default for ContactStateMachine {
    fn default() -> Self {
        Self::new(TransitionTable::standard())
    }
}

/// Applies a transition using the standard table.
pub fn attempt_transition(
    contact: &Contact,
    new_status: ContactStatus,
    confirmed: bool,
    expected_version: u64,
) -> Result<Contact, TransitionError> {
    ContactStateMachine::default().attempt(contact, new_status, confirmed, expected_version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ContactStatus::*;

    fn contact(status: ContactStatus, version: u64) -> Contact {
        let mut c = Contact::new("founder@example.com", status);
        c.version = version;
        c
    }

    #[test]
    fn test_standard_table_classification() {
        let table = TransitionTable::standard();

        assert_eq!(table.classify(Lead, Customer), TransitionRule::Allowed);
        assert_eq!(table.classify(Lead, Other), TransitionRule::Allowed);
        assert_eq!(table.classify(Customer, Lead), TransitionRule::RequiresConfirmation);
        assert_eq!(table.classify(Customer, Partner), TransitionRule::Allowed);
        assert_eq!(table.classify(Customer, Investor), TransitionRule::Allowed);
        assert_eq!(table.classify(Customer, Other), TransitionRule::RequiresConfirmation);
        for to in [Lead, Customer, Investor, Other] {
            assert_eq!(table.classify(Partner, to), TransitionRule::RequiresConfirmation);
        }
        for to in [Lead, Customer, Partner, Other] {
            assert_eq!(table.classify(Investor, to), TransitionRule::RequiresConfirmation);
        }
        for to in [Lead, Customer, Partner, Investor] {
            assert_eq!(table.classify(Other, to), TransitionRule::Allowed);
        }
    }

    #[test]
    fn test_self_transition_always_allowed() {
        let table = TransitionTable::default();
        for status in ContactStatus::ALL {
            assert_eq!(table.classify(status, status), TransitionRule::Allowed);
        }

        let c = contact(Investor, 4);
        let same = attempt_transition(&c, Investor, false, 4).unwrap();
        assert_eq!(same, c);
    }

    #[test]
    fn test_classification_is_order_independent() {
        let table = TransitionTable::standard();
        let pairs: Vec<_> = ContactStatus::ALL
            .iter()
            .flat_map(|&f| ContactStatus::ALL.iter().map(move |&t| (f, t)))
            .collect();
        let forward: Vec<_> = pairs.iter().map(|&(f, t)| table.classify(f, t)).collect();

        for (i, &(f, t)) in pairs.iter().enumerate().rev() {
            assert_eq!(table.classify(f, t), forward[i], "{f} -> {t}");
        }
    }

    #[test]
    fn test_demotion_requires_confirmation() {
        let c = contact(Customer, 7);

        let err = attempt_transition(&c, Lead, false, 7).unwrap_err();
        assert!(matches!(err, TransitionError::ConfirmationRequired { .. }));

        let updated = attempt_transition(&c, Lead, true, 7).unwrap();
        assert_eq!(updated.status, Lead);
        assert_eq!(updated.version, 8);
        // The input snapshot is untouched.
        assert_eq!(c.status, Customer);
    }

    #[test]
    fn test_version_mismatch_is_conflict_even_when_valid() {
        let c = contact(Lead, 3);
        assert_eq!(
            attempt_transition(&c, Customer, false, 2),
            Err(TransitionError::Conflict {
                expected: 2,
                actual: 3
            })
        );
        // Also for a self-transition.
        assert!(attempt_transition(&c, Lead, true, 9).unwrap_err().is_conflict());
    }

    #[test]
    fn test_forbidden_never_succeeds() {
        let table = TransitionTable::standard().with_rule(
            Lead,
            Investor,
            TransitionRule::Forbidden,
            "investors are onboarded through the investor workflow",
        );
        let machine = ContactStateMachine::new(table);
        let c = contact(Lead, 0);

        for confirmed in [false, true] {
            let err = machine.attempt(&c, Investor, confirmed, 0).unwrap_err();
            assert!(matches!(err, TransitionError::Forbidden { .. }));
            assert!(err.to_string().contains("investor workflow"));
        }
        // Other rules were not disturbed.
        assert!(machine.attempt(&c, Partner, false, 0).is_ok());
    }

    #[test]
    fn test_unlisted_pair_is_forbidden() {
        let machine = ContactStateMachine::new(TransitionTable::default());
        assert!(!machine.can_transition(Lead, Customer, true));
        assert!(machine.can_transition(Lead, Lead, false));
    }

    #[test]
    fn test_status_change_record() {
        let before = contact(Lead, 0);
        let after = attempt_transition(&before, Customer, false, 0).unwrap();

        let change = status_change(&before, &after).unwrap();
        assert_eq!(change.from, Lead);
        assert_eq!(change.to, Customer);
        assert_eq!(change.version, 1);
        assert!(status_change(&after, &after).is_none());
    }
}
