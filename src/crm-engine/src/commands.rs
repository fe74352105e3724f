//! Subcommand handlers. Each reads JSON input files and returns a
//! serializable result; printing is left to `main`.

use chrono::{DateTime, Utc};
use crm_core::{
    AppConfig, CampaignTargetingEdge, Contact, ContactStatus, CrmError, CrmResult, Interaction,
    TransitionError,
};
use crm_engagement::{evaluate, EngagementConfig, EngagementScore};
use crm_lifecycle::{status_change, ConflictRetry, ContactStateMachine, StatusChange};
use crm_reporting::{aggregate_by_campaign, report, FunnelReport};
use crm_segmentation::{ParameterizedQuery, SegmentCompiler, SegmentDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

fn read_json<T: DeserializeOwned>(path: &Path) -> CrmResult<T> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[derive(Debug, Serialize)]
pub struct ContactScore {
    pub contact_id: Uuid,
    #[serde(flatten)]
    pub engagement: EngagementScore,
}

/// Scores every contact present in the interaction ledger, ordered by contact id.
pub fn score(
    config: &AppConfig,
    interactions: &Path,
    now: Option<DateTime<Utc>>,
    top: Option<usize>,
) -> CrmResult<Vec<ContactScore>> {
    let engagement = EngagementConfig::from_settings(&config.engagement)?;
    let ledger: Vec<Interaction> = read_json(interactions)?;
    let now = now.unwrap_or_else(Utc::now);
    let top_n = top.unwrap_or(config.engagement.top_types);

    let mut by_contact: BTreeMap<Uuid, Vec<Interaction>> = BTreeMap::new();
    for interaction in ledger {
        by_contact
            .entry(interaction.contact_id)
            .or_default()
            .push(interaction);
    }

    info!(contacts = by_contact.len(), now = %now, "Scoring interaction ledger");

    Ok(by_contact
        .into_iter()
        .map(|(contact_id, interactions)| ContactScore {
            contact_id,
            engagement: evaluate(&interactions, &engagement, now, top_n),
        })
        .collect())
}

#[derive(Debug, Serialize)]
pub struct TransitionOutcome {
    pub contact: Contact,
    pub change: Option<StatusChange>,
}

/// Applies a status change to the contact stored at `path` and writes the
/// result back.
///
/// On a version conflict the file is re-read. The retry rebases onto the
/// fresh version only while the contact still has the status seen on the
/// first read; once another writer has moved the status, the conflict is
/// returned to the caller.
pub fn transition(
    config: &AppConfig,
    path: &Path,
    to: ContactStatus,
    expected_version: u64,
    confirmed: bool,
) -> CrmResult<TransitionOutcome> {
    apply_transition(
        config,
        || read_json(path),
        |updated, read_version| write_contact(path, updated, read_version),
        to,
        expected_version,
        confirmed,
    )
}

fn apply_transition<L, S>(
    config: &AppConfig,
    mut load: L,
    mut store: S,
    to: ContactStatus,
    expected_version: u64,
    confirmed: bool,
) -> CrmResult<TransitionOutcome>
where
    L: FnMut() -> CrmResult<Contact>,
    S: FnMut(&Contact, u64) -> CrmResult<()>,
{
    let machine = ContactStateMachine::default();
    let retry = ConflictRetry::from_config(&config.lifecycle);
    let mut seen_status = None;
    let mut expected = expected_version;

    retry.run(|attempt| -> CrmResult<TransitionOutcome> {
        let current = load()?;
        match seen_status {
            None => seen_status = Some(current.status),
            Some(status) if attempt > 1 && status == current.status => {
                expected = current.version;
            }
            Some(_) => {}
        }

        let updated = machine.attempt(&current, to, confirmed, expected)?;
        if updated.version != current.version {
            store(&updated, current.version)?;
        }
        Ok(TransitionOutcome {
            change: status_change(&current, &updated),
            contact: updated,
        })
    })
}

/// Writes `contact` to `path` unless the stored version moved past `read_version`.
fn write_contact(path: &Path, contact: &Contact, read_version: u64) -> CrmResult<()> {
    let stored: Contact = read_json(path)?;
    if stored.version != read_version {
        return Err(TransitionError::Conflict {
            expected: read_version,
            actual: stored.version,
        }
        .into());
    }
    std::fs::write(path, serde_json::to_string_pretty(contact)?)?;
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct SegmentOutcome {
    pub query: ParameterizedQuery,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matching: Option<Vec<Uuid>>,
}

/// Compiles a segment definition, optionally evaluating it against a contact list.
pub fn segment(
    config: &AppConfig,
    definition: &Path,
    contacts: Option<&Path>,
) -> CrmResult<SegmentOutcome> {
    let definition: SegmentDefinition = read_json(definition)?;
    let compiled = SegmentCompiler::from_config(&config.segmentation).compile(&definition)?;

    let matching = contacts
        .map(|path| {
            let contacts: Vec<Contact> = read_json(path)?;
            Ok::<_, CrmError>(compiled.filter(&contacts).iter().map(|c| c.id).collect())
        })
        .transpose()?;

    Ok(SegmentOutcome {
        query: compiled.to_parameterized(),
        matching,
    })
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum FunnelOutcome {
    Overall(FunnelReport),
    ByCampaign(Vec<FunnelReport>),
}

pub fn funnel(edges: &Path, by_campaign: bool) -> CrmResult<FunnelOutcome> {
    let edges: Vec<CampaignTargetingEdge> = read_json(edges)?;
    Ok(if by_campaign {
        FunnelOutcome::ByCampaign(aggregate_by_campaign(&edges))
    } else {
        FunnelOutcome::Overall(report(&edges))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use crm_core::InteractionType;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn json_file(value: &impl Serialize) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(value).unwrap().as_bytes())
            .unwrap();
        file
    }

    #[test]
    fn test_score_groups_by_contact() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let ledger = vec![
            Interaction::new(b, InteractionType::Call, now),
            Interaction::new(a, InteractionType::EmailOpen, now),
            Interaction::new(a, InteractionType::EmailClick, now - Duration::days(30)),
        ];
        let file = json_file(&ledger);

        let scores = score(&AppConfig::default(), file.path(), Some(now), None).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].contact_id, a);
        assert!((scores[0].engagement.score - 5.5).abs() < 1e-9);
        assert_eq!(scores[1].contact_id, b);
        assert!((scores[1].engagement.score - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_transition_persists_updated_contact() {
        let contact = Contact::new("founder@example.com", ContactStatus::Lead);
        let file = json_file(&contact);

        let outcome = transition(
            &AppConfig::default(),
            file.path(),
            ContactStatus::Customer,
            0,
            false,
        )
        .unwrap();
        assert_eq!(outcome.contact.status, ContactStatus::Customer);
        assert_eq!(outcome.contact.version, 1);
        let change = outcome.change.unwrap();
        assert_eq!(change.from, ContactStatus::Lead);
        assert_eq!(change.to, ContactStatus::Customer);

        let stored: Contact = read_json(file.path()).unwrap();
        assert_eq!(stored, outcome.contact);
    }

    #[test]
    fn test_transition_rebases_when_status_unchanged() {
        // Another writer bumped the version (e.g. a tag edit) but kept the status.
        let mut contact = Contact::new("founder@example.com", ContactStatus::Lead);
        contact.version = 1;
        let file = json_file(&contact);

        let outcome = transition(
            &AppConfig::default(),
            file.path(),
            ContactStatus::Customer,
            0,
            false,
        )
        .unwrap();
        assert_eq!(outcome.contact.status, ContactStatus::Customer);
        assert_eq!(outcome.contact.version, 2);
        let stored: Contact = read_json(file.path()).unwrap();
        assert_eq!(stored.version, 2);
    }

    #[test]
    fn test_transition_retries_against_changing_store() {
        let base = Contact::new("founder@example.com", ContactStatus::Lead);
        let mut v1 = base.clone();
        v1.version = 1;
        let mut v2 = base.clone();
        v2.version = 2;
        let mut reads = vec![v2, v1];
        let mut loads = 0;
        let mut stored = None;

        let outcome = apply_transition(
            &AppConfig::default(),
            || {
                loads += 1;
                let next = if reads.len() > 1 { reads.pop() } else { reads.last().cloned() };
                Ok(next.unwrap())
            },
            |updated, read_version| {
                stored = Some((updated.clone(), read_version));
                Ok(())
            },
            ContactStatus::Customer,
            0,
            false,
        )
        .unwrap();

        // Stale first read, then a fresh read at version 2 that succeeds.
        assert_eq!(loads, 2);
        assert_eq!(outcome.contact.version, 3);
        let (written, read_version) = stored.unwrap();
        assert_eq!(written.status, ContactStatus::Customer);
        assert_eq!(read_version, 2);
    }

    #[test]
    fn test_transition_conflict_when_status_moved() {
        let base = Contact::new("founder@example.com", ContactStatus::Lead);
        let mut moved = base.clone();
        moved.status = ContactStatus::Investor;
        moved.version = 5;
        let mut first = Some(base);
        let mut loads = 0;

        let err = apply_transition(
            &AppConfig::default(),
            || {
                loads += 1;
                let mut stale = first.take().unwrap_or_else(|| moved.clone());
                stale.version = stale.version.max(1);
                Ok(stale)
            },
            |_, _| Ok(()),
            ContactStatus::Customer,
            0,
            false,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            CrmError::Transition(TransitionError::Conflict {
                expected: 0,
                actual: 5
            })
        ));
        assert_eq!(loads, 4);
    }

    #[test]
    fn test_write_is_refused_when_store_moved() {
        let mut contact = Contact::new("founder@example.com", ContactStatus::Lead);
        contact.version = 4;
        let file = json_file(&contact);

        let err = write_contact(file.path(), &contact, 3).unwrap_err();
        assert!(matches!(
            err,
            CrmError::Transition(TransitionError::Conflict {
                expected: 3,
                actual: 4
            })
        ));
    }

    #[test]
    fn test_segment_lists_matching_ids() {
        let definition = json!({
            "logic": "and",
            "filters": [
                { "filter": { "field": "status", "operator": "equals", "value": "lead" } },
                { "filter": { "field": "engagement_score", "operator": "gte", "value": 50 } }
            ]
        });
        let hot = Contact::new("a@acme.io", ContactStatus::Lead).with_score(80.0);
        let cold = Contact::new("b@acme.io", ContactStatus::Lead).with_score(10.0);
        let def_file = json_file(&definition);
        let contacts_file = json_file(&vec![hot.clone(), cold]);

        let outcome = segment(
            &AppConfig::default(),
            def_file.path(),
            Some(contacts_file.path()),
        )
        .unwrap();
        assert_eq!(outcome.query.text, "(status = $1 AND engagement_score >= $2)");
        assert_eq!(outcome.matching, Some(vec![hot.id]));
    }

    #[test]
    fn test_segment_rejects_unknown_field() {
        let definition = json!({
            "filters": [{ "filter": { "field": "password", "operator": "equals", "value": "x" } }]
        });
        let file = json_file(&definition);

        let err = segment(&AppConfig::default(), file.path(), None).unwrap_err();
        assert!(matches!(err, CrmError::Compile(_)));
    }

    #[test]
    fn test_funnel_on_missing_file_is_io_error() {
        let err = funnel(Path::new("/nonexistent/edges.json"), false).unwrap_err();
        assert!(matches!(err, CrmError::Io(_)));
    }
}
