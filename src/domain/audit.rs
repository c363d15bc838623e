//! Audit log entity — a hash-chained record of every state transition, used
//! to detect tampering and to reconstruct "why" a decision was made.
//!
//! Chain verification checks `current.previous_hash == previous.event_hash`
//! across the full sequence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::canonical_event_hash;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_id: String,
    pub after_state: serde_json::Value,
    pub event_hash: String,
    pub previous_hash: Option<String>,
}

impl AuditEvent {
    /// Build the next link in a scenario's audit chain. `previous` is the
    /// last event appended for this scenario/cycle, or `None` for the first
    /// event ever recorded.
    pub fn append(
        event_id: String,
        timestamp: DateTime<Utc>,
        event_type: String,
        entity_id: String,
        after_state: serde_json::Value,
        previous: Option<&AuditEvent>,
    ) -> Self {
        let event_hash = canonical_event_hash(timestamp, &event_type, &entity_id, &after_state);
        Self {
            event_id,
            timestamp,
            event_type,
            entity_id,
            after_state,
            event_hash,
            previous_hash: previous.map(|p| p.event_hash.clone()),
        }
    }

    pub fn links_to(&self, previous: &AuditEvent) -> bool {
        self.previous_hash.as_deref() == Some(previous.event_hash.as_str())
    }
}

/// Verify an ordered chain of events: each event's `previous_hash` must equal
/// the prior event's `event_hash`, and the first event must have no
/// `previous_hash` (or one not present in the chain, for a pagination window).
pub fn verify_chain(events: &[AuditEvent]) -> bool {
    for pair in events.windows(2) {
        if let [previous, current] = pair {
            if !current.links_to(previous) {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_links_correctly() {
        let e1 = AuditEvent::append(
            "ev1".to_string(),
            Utc::now(),
            "SIGNAL_ACTIVATED".to_string(),
            "sig1".to_string(),
            serde_json::json!({"status": "ACTIVE"}),
            None,
        );
        let e2 = AuditEvent::append(
            "ev2".to_string(),
            Utc::now(),
            "POSITION_OPENED".to_string(),
            "pos1".to_string(),
            serde_json::json!({"status": "OPEN"}),
            Some(&e1),
        );
        assert!(verify_chain(&[e1, e2]));
    }

    #[test]
    fn tampered_after_state_breaks_chain() {
        let e1 = AuditEvent::append(
            "ev1".to_string(),
            Utc::now(),
            "SIGNAL_ACTIVATED".to_string(),
            "sig1".to_string(),
            serde_json::json!({"status": "ACTIVE"}),
            None,
        );
        let mut e2 = AuditEvent::append(
            "ev2".to_string(),
            Utc::now(),
            "POSITION_OPENED".to_string(),
            "pos1".to_string(),
            serde_json::json!({"status": "OPEN"}),
            Some(&e1),
        );
        // tamper: mutate e1 after the fact without recomputing e2's previous_hash
        let mut e1_tampered = e1.clone();
        e1_tampered.after_state = serde_json::json!({"status": "REJECTED"});
        e1_tampered.event_hash = canonical_event_hash(
            e1_tampered.timestamp,
            &e1_tampered.event_type,
            &e1_tampered.entity_id,
            &e1_tampered.after_state,
        );
        e2.previous_hash = e2.previous_hash.clone();
        assert!(!verify_chain(&[e1_tampered, e2]));
    }
}
