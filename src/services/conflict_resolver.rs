//! Conflict resolution among playbooks that qualify for the same signal.
//!
//! At most one run may be created per (customer, signal) pass. Candidates
//! are arbitrated by priority ascending, tie-broken by playbook creation
//! time ascending; the provisional winner must still pass the atomic
//! cooldown claim, and a claim failure (race with a concurrently created
//! run) cascades arbitration to the next candidate.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::domain::errors::EngineResult;
use crate::domain::models::evaluation::TriggerEvaluation;
use crate::domain::models::{ConflictLogEntry, Playbook};
use crate::domain::ports::{ClaimDecision, ConflictLogRepository, CooldownTracker};

/// A candidate that passed evaluation, paired with its playbook.
pub struct Candidate {
    pub playbook: Playbook,
    pub evaluation: TriggerEvaluation,
}

/// The resolver's verdict for one (customer, signal) pass.
pub struct Resolution {
    /// The single claimed winner, if any candidate survived.
    pub winner: Option<Candidate>,
    /// Audit entries written for every suppressed candidate.
    pub suppressed: Vec<ConflictLogEntry>,
}

pub struct ConflictResolver {
    cooldown_tracker: Arc<dyn CooldownTracker>,
    conflict_log: Arc<dyn ConflictLogRepository>,
}

impl ConflictResolver {
    pub fn new(
        cooldown_tracker: Arc<dyn CooldownTracker>,
        conflict_log: Arc<dyn ConflictLogRepository>,
    ) -> Self {
        Self { cooldown_tracker, conflict_log }
    }

    /// Arbitrate the qualifying candidates and claim exactly one winner.
    ///
    /// Every non-winning candidate gets a ConflictLogEntry referencing
    /// the eventual winner; candidates knocked out by a claim-time race
    /// keep their real suppression reason, and only an exhausted set
    /// leaves the winner columns null.
    pub async fn resolve(
        &self,
        customer_id: &str,
        mut candidates: Vec<Candidate>,
        now: DateTime<Utc>,
    ) -> EngineResult<Resolution> {
        // Priority ascending; identical priority resolves to the playbook
        // created first.
        candidates.sort_by(|a, b| {
            a.playbook
                .priority
                .cmp(&b.playbook.priority)
                .then(a.playbook.created_at.cmp(&b.playbook.created_at))
        });

        let mut suppressed = Vec::new();
        let mut winner: Option<Candidate> = None;
        let mut remaining = candidates.into_iter();

        // Cascade until a claim succeeds or the set is exhausted.
        for candidate in remaining.by_ref() {
            match self
                .cooldown_tracker
                .claim(customer_id, &candidate.playbook, now)
                .await?
            {
                ClaimDecision::Claimed => {
                    info!(
                        playbook = %candidate.playbook.name,
                        customer = customer_id,
                        "claim succeeded, playbook wins arbitration"
                    );
                    winner = Some(candidate);
                    break;
                }
                ClaimDecision::OnCooldown { ends_at } => {
                    warn!(
                        playbook = %candidate.playbook.name,
                        customer = customer_id,
                        "provisional winner lost claim race: cooldown"
                    );
                    suppressed.push(
                        ConflictLogEntry::new(
                            candidate.playbook.id,
                            &candidate.playbook.name,
                            customer_id,
                            format!("cooldown until {}", ends_at.to_rfc3339()),
                        )
                        .with_cooldown_ends_at(ends_at),
                    );
                }
                ClaimDecision::ConcurrencyLimited { active, max } => {
                    warn!(
                        playbook = %candidate.playbook.name,
                        customer = customer_id,
                        "provisional winner lost claim race: concurrency limit"
                    );
                    suppressed.push(ConflictLogEntry::new(
                        candidate.playbook.id,
                        &candidate.playbook.name,
                        customer_id,
                        format!("concurrency limit reached ({active}/{max} active runs)"),
                    ));
                }
            }
        }

        // Entries written during the cascade predate the winner; stamp it
        // now so the audit trail names who actually fired.
        if let Some(w) = &winner {
            for entry in &mut suppressed {
                entry.winning_playbook_id = Some(w.playbook.id);
                entry.winning_playbook_name = Some(w.playbook.name.clone());
            }
        }

        // Everything after the winner lost on priority.
        for loser in remaining {
            let mut entry = ConflictLogEntry::new(
                loser.playbook.id,
                &loser.playbook.name,
                customer_id,
                match &winner {
                    Some(w) => format!("lower priority than {}", w.playbook.name),
                    None => "no winner emerged".to_string(),
                },
            );
            if let Some(w) = &winner {
                entry = entry.with_winner(w.playbook.id, &w.playbook.name);
            }
            suppressed.push(entry);
        }

        for entry in &suppressed {
            self.conflict_log.append(entry).await?;
        }

        Ok(Resolution { winner, suppressed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::predicate::{CompareOp, ConditionNode};
    use crate::domain::models::run::DecisionSummary;
    use crate::domain::models::PlaybookStatus;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashSet;
    use tokio::sync::Mutex;
    use uuid::Uuid;

    /// Tracker that refuses claims for a configured set of playbooks.
    struct ScriptedTracker {
        refuse: HashSet<Uuid>,
    }

    #[async_trait]
    impl CooldownTracker for ScriptedTracker {
        async fn check(
            &self,
            customer_id: &str,
            playbook: &Playbook,
            now: DateTime<Utc>,
        ) -> EngineResult<ClaimDecision> {
            self.claim(customer_id, playbook, now).await
        }

        async fn claim(
            &self,
            _customer_id: &str,
            playbook: &Playbook,
            now: DateTime<Utc>,
        ) -> EngineResult<ClaimDecision> {
            if self.refuse.contains(&playbook.id) {
                Ok(ClaimDecision::OnCooldown { ends_at: now + chrono::Duration::hours(1) })
            } else {
                Ok(ClaimDecision::Claimed)
            }
        }

        async fn last_fired(
            &self,
            _customer_id: &str,
            _playbook_id: Uuid,
        ) -> EngineResult<Option<DateTime<Utc>>> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct MemoryConflictLog {
        entries: Mutex<Vec<ConflictLogEntry>>,
    }

    #[async_trait]
    impl ConflictLogRepository for MemoryConflictLog {
        async fn append(&self, entry: &ConflictLogEntry) -> EngineResult<()> {
            self.entries.lock().await.push(entry.clone());
            Ok(())
        }

        async fn list_for_customer(
            &self,
            customer_id: &str,
        ) -> EngineResult<Vec<ConflictLogEntry>> {
            Ok(self
                .entries
                .lock()
                .await
                .iter()
                .filter(|e| e.customer_id == customer_id)
                .cloned()
                .collect())
        }

        async fn list_for_playbook(
            &self,
            playbook_id: Uuid,
        ) -> EngineResult<Vec<ConflictLogEntry>> {
            Ok(self
                .entries
                .lock()
                .await
                .iter()
                .filter(|e| e.suppressed_playbook_id == playbook_id)
                .cloned()
                .collect())
        }
    }

    fn playbook(name: &str, priority: i32) -> Playbook {
        Playbook::new(
            name,
            "payment_failed",
            ConditionNode::Compare {
                field: "amount".to_string(),
                operator: CompareOp::GreaterThan,
                value: json!(0),
            },
        )
        .with_status(PlaybookStatus::Active)
        .with_priority(priority)
    }

    fn candidate(playbook: Playbook) -> Candidate {
        let evaluation = TriggerEvaluation {
            playbook_id: playbook.id,
            playbook_name: playbook.name.clone(),
            customer_id: "cust-1".to_string(),
            would_trigger: true,
            missing_conditions: vec![],
            suppression: None,
            decision_summary: DecisionSummary::default(),
            evaluated_at: Utc::now(),
        };
        Candidate { playbook, evaluation }
    }

    fn resolver(refuse: HashSet<Uuid>) -> (ConflictResolver, Arc<MemoryConflictLog>) {
        let log = Arc::new(MemoryConflictLog::default());
        let resolver =
            ConflictResolver::new(Arc::new(ScriptedTracker { refuse }), log.clone());
        (resolver, log)
    }

    #[tokio::test]
    async fn test_highest_priority_wins_and_losers_are_logged() {
        let a = playbook("A", 1);
        let b = playbook("B", 5);
        let a_id = a.id;
        let (resolver, log) = resolver(HashSet::new());

        let resolution = resolver
            .resolve("cust-1", vec![candidate(b), candidate(a)], Utc::now())
            .await
            .unwrap();

        let winner = resolution.winner.unwrap();
        assert_eq!(winner.playbook.id, a_id);
        assert_eq!(resolution.suppressed.len(), 1);
        assert_eq!(resolution.suppressed[0].winning_playbook_id, Some(a_id));
        assert!(resolution.suppressed[0].reason.contains("lower priority than A"));

        let stored = log.list_for_customer("cust-1").await.unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn test_tie_breaks_by_created_at() {
        let older = playbook("Older", 3);
        let mut newer = playbook("Newer", 3);
        newer.created_at = older.created_at + chrono::Duration::seconds(10);
        let older_id = older.id;
        let (resolver, _) = resolver(HashSet::new());

        let resolution = resolver
            .resolve("cust-1", vec![candidate(newer), candidate(older)], Utc::now())
            .await
            .unwrap();
        assert_eq!(resolution.winner.unwrap().playbook.id, older_id);
    }

    #[tokio::test]
    async fn test_claim_failure_cascades_to_next_candidate() {
        let a = playbook("A", 1);
        let b = playbook("B", 5);
        let b_id = b.id;
        let (resolver, _) = resolver(HashSet::from([a.id]));

        let resolution = resolver
            .resolve("cust-1", vec![candidate(a), candidate(b)], Utc::now())
            .await
            .unwrap();

        // A was knocked out by its claim; B inherits the win and is
        // stamped onto A's audit entry.
        assert_eq!(resolution.winner.unwrap().playbook.id, b_id);
        assert_eq!(resolution.suppressed.len(), 1);
        assert!(resolution.suppressed[0].cooldown_ends_at.is_some());
        assert_eq!(resolution.suppressed[0].winning_playbook_id, Some(b_id));
        assert_eq!(resolution.suppressed[0].winning_playbook_name.as_deref(), Some("B"));
        assert!(resolution.suppressed[0].reason.contains("cooldown"));
    }

    #[tokio::test]
    async fn test_exhausted_set_yields_no_winner() {
        let a = playbook("A", 1);
        let b = playbook("B", 2);
        let (resolver, log) = resolver(HashSet::from([a.id, b.id]));

        let resolution = resolver
            .resolve("cust-1", vec![candidate(a), candidate(b)], Utc::now())
            .await
            .unwrap();
        assert!(resolution.winner.is_none());
        assert_eq!(resolution.suppressed.len(), 2);
        assert!(resolution.suppressed.iter().all(|e| e.winning_playbook_id.is_none()));
        assert_eq!(log.list_for_customer("cust-1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_single_candidate_is_not_a_conflict() {
        let a = playbook("A", 1);
        let (resolver, log) = resolver(HashSet::new());
        let resolution = resolver.resolve("cust-1", vec![candidate(a)], Utc::now()).await.unwrap();
        assert!(resolution.winner.is_some());
        assert!(resolution.suppressed.is_empty());
        assert!(log.list_for_customer("cust-1").await.unwrap().is_empty());
    }
}
