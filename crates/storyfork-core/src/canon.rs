//! Canonical-branch promotion.
//!
//! Every like re-evaluates which child of a parent is the "main canon" branch.
//! A branch takes the title only once it has at least
//! [`PROMOTION_THRESHOLD`] likes **and** strictly more likes than every
//! sibling, so ties always favour the incumbent.
//!
//! The read of the target and of its whole sibling set, and the writes to the
//! target and the demoted sibling, happen in one store transaction. Siblings
//! are read before any write in that transaction and include the target's own
//! pre-like row; since that row holds `new_likes - 1` it never decides the
//! comparison.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::error::{ErrorCode, StoreError};
use crate::model::{Contribution, ContributionPatch, DocId};
use crate::store::StoryStore;

/// Likes a non-root branch needs before it can be promoted.
pub const PROMOTION_THRESHOLD: u64 = 5;

/// Tunables for the promotion rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromotionPolicy {
    pub threshold: u64,
}

impl Default for PromotionPolicy {
    fn default() -> Self {
        Self {
            threshold: PROMOTION_THRESHOLD,
        }
    }
}

/// What a single like should do to canonical flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Flags stay as they are.
    Keep,
    /// The target becomes canonical, demoting the named sibling if any.
    Promote { demote: Option<DocId> },
}

/// Result of an accepted like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LikeOutcome {
    pub story_id: DocId,
    pub contribution_id: DocId,
    pub likes: u64,
    pub promoted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demoted: Option<DocId>,
}

/// Decide whether `target`, about to reach `new_likes`, takes the canonical
/// flag from its siblings.
///
/// `siblings` is the full sibling set as read before the like is written
/// (it may include the target itself).
#[must_use]
pub fn evaluate(
    policy: PromotionPolicy,
    target: &Contribution,
    new_likes: u64,
    siblings: &[Contribution],
) -> Verdict {
    if target.is_root() || new_likes < policy.threshold {
        return Verdict::Keep;
    }

    let max_likes = siblings.iter().map(|s| s.likes_count).max().unwrap_or(0);
    let incumbent = siblings.iter().find(|s| s.is_canonical).map(|s| &s.id);
    let already_canonical = target.is_canonical || incumbent == Some(&target.id);

    if new_likes > max_likes && !already_canonical {
        Verdict::Promote {
            demote: incumbent.filter(|id| **id != target.id).cloned(),
        }
    } else {
        Verdict::Keep
    }
}

/// Record one like on a contribution and return its new like count.
///
/// # Errors
///
/// [`StoreError::NotFound`] if the contribution does not exist in the story;
/// any other store error is passed through unchanged.
pub fn record_like<S: StoryStore>(
    store: &S,
    story_id: &str,
    contribution_id: &str,
) -> Result<u64, StoreError> {
    record_like_with(store, PromotionPolicy::default(), story_id, contribution_id)
        .map(|outcome| outcome.likes)
}

/// Like [`record_like`] with an explicit policy, reporting flag changes.
///
/// # Errors
///
/// [`StoreError::NotFound`] if the contribution does not exist in the story;
/// any other store error is passed through unchanged.
pub fn record_like_with<S: StoryStore>(
    store: &S,
    policy: PromotionPolicy,
    story_id: &str,
    contribution_id: &str,
) -> Result<LikeOutcome, StoreError> {
    let outcome = store.run_transaction(|tx| {
        let target = tx
            .get_contribution(story_id, contribution_id)?
            .ok_or_else(|| StoreError::contribution_not_found(contribution_id))?;
        let likes = target.likes_count.saturating_add(1);

        let verdict = match target.parent_contribution_id.as_deref() {
            Some(parent) if likes >= policy.threshold => {
                let siblings = tx.query_children(story_id, Some(parent))?;
                evaluate(policy, &target, likes, &siblings)
            }
            _ => Verdict::Keep,
        };

        let mut patch = ContributionPatch::likes(likes);
        let demoted = match verdict {
            Verdict::Keep => None,
            Verdict::Promote { demote } => {
                // Demote first so no intermediate state has two champions.
                if let Some(ref loser) = demote {
                    tx.update_contribution(story_id, loser, &ContributionPatch::canonical(false))?;
                }
                patch.is_canonical = Some(true);
                demote
            }
        };
        tx.update_contribution(story_id, contribution_id, &patch)?;

        Ok(LikeOutcome {
            story_id: target.story_id.clone(),
            contribution_id: target.id.clone(),
            likes,
            promoted: patch.is_canonical == Some(true),
            demoted,
        })
    })?;

    if outcome.promoted {
        tracing::info!(
            story_id,
            contribution_id,
            likes = outcome.likes,
            demoted = outcome.demoted.as_deref().unwrap_or("-"),
            "branch promoted to canon"
        );
    } else {
        tracing::debug!(story_id, contribution_id, likes = outcome.likes, "like recorded");
    }
    Ok(outcome)
}

/// A broken canon invariant found by [`check_invariants`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("story has no root contribution")]
    MissingRoot,
    #[error("story has {count} root contributions")]
    MultipleRoots { count: usize },
    #[error("root contribution {id} is not canonical")]
    RootNotCanonical { id: DocId },
    #[error("parent {parent} has {count} canonical children: {ids:?}")]
    MultipleCanonical {
        parent: DocId,
        count: usize,
        ids: Vec<DocId>,
    },
    #[error("contribution {id} points at missing parent {parent}")]
    DanglingParent { id: DocId, parent: DocId },
}

impl InvariantViolation {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::InvariantViolated
    }
}

/// Check the canon invariants over one story's full contribution set.
///
/// # Errors
///
/// Returns every violation found; an empty story reports
/// [`InvariantViolation::MissingRoot`].
pub fn check_invariants(contributions: &[Contribution]) -> Result<(), Vec<InvariantViolation>> {
    let mut violations = Vec::new();

    let roots: Vec<&Contribution> = contributions.iter().filter(|c| c.is_root()).collect();
    match roots.as_slice() {
        [] => violations.push(InvariantViolation::MissingRoot),
        [root] => {
            if !root.is_canonical {
                violations.push(InvariantViolation::RootNotCanonical {
                    id: root.id.clone(),
                });
            }
        }
        many => violations.push(InvariantViolation::MultipleRoots { count: many.len() }),
    }

    let ids: BTreeSet<&DocId> = contributions.iter().map(|c| &c.id).collect();
    let mut canonical_by_parent: BTreeMap<&DocId, Vec<DocId>> = BTreeMap::new();
    for c in contributions {
        let Some(parent) = c.parent_contribution_id.as_ref() else {
            continue;
        };
        if !ids.contains(parent) {
            violations.push(InvariantViolation::DanglingParent {
                id: c.id.clone(),
                parent: parent.clone(),
            });
        }
        if c.is_canonical {
            canonical_by_parent
                .entry(parent)
                .or_default()
                .push(c.id.clone());
        }
    }
    for (parent, ids) in canonical_by_parent {
        if ids.len() > 1 {
            violations.push(InvariantViolation::MultipleCanonical {
                parent: parent.clone(),
                count: ids.len(),
                ids,
            });
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::{InvariantViolation, PromotionPolicy, Verdict, check_invariants, evaluate};
    use crate::model::{Contribution, DocId, Identity};

    fn node(id: &str, parent: Option<&str>, likes: u64, canonical: bool) -> Contribution {
        Contribution {
            id: DocId::new_unchecked(id),
            story_id: DocId::new_unchecked("s"),
            content: id.into(),
            author: Identity::anonymous(),
            created_at_us: 0,
            parent_contribution_id: parent.map(DocId::new_unchecked),
            likes_count: likes,
            is_canonical: canonical,
            tags: None,
        }
    }

    fn policy() -> PromotionPolicy {
        PromotionPolicy::default()
    }

    #[test]
    fn below_threshold_never_promotes() {
        let x = node("x", Some("r"), 3, false);
        let siblings = vec![x.clone(), node("y", Some("r"), 0, false)];
        assert_eq!(evaluate(policy(), &x, 4, &siblings), Verdict::Keep);
    }

    #[test]
    fn reaching_threshold_with_clear_lead_promotes() {
        let x = node("x", Some("r"), 4, false);
        let siblings = vec![x.clone(), node("y", Some("r"), 0, false)];
        assert_eq!(
            evaluate(policy(), &x, 5, &siblings),
            Verdict::Promote { demote: None }
        );
    }

    #[test]
    fn tie_keeps_incumbent() {
        let a = node("a", Some("r"), 5, true);
        let b = node("b", Some("r"), 4, false);
        let siblings = vec![a, b.clone()];
        assert_eq!(evaluate(policy(), &b, 5, &siblings), Verdict::Keep);
    }

    #[test]
    fn strict_overtake_demotes_incumbent() {
        let a = node("a", Some("r"), 5, true);
        let b = node("b", Some("r"), 5, false);
        let siblings = vec![a, b.clone()];
        assert_eq!(
            evaluate(policy(), &b, 6, &siblings),
            Verdict::Promote {
                demote: Some(DocId::new_unchecked("a"))
            }
        );
    }

    #[test]
    fn already_canonical_is_a_no_op() {
        let a = node("a", Some("r"), 9, true);
        let siblings = vec![a.clone(), node("b", Some("r"), 2, false)];
        assert_eq!(evaluate(policy(), &a, 10, &siblings), Verdict::Keep);
    }

    #[test]
    fn root_is_never_evaluated() {
        let r = node("r", None, 40, true);
        assert_eq!(evaluate(policy(), &r, 41, &[]), Verdict::Keep);
    }

    #[test]
    fn custom_threshold_applies() {
        let x = node("x", Some("r"), 0, false);
        let low = PromotionPolicy { threshold: 1 };
        assert_eq!(
            evaluate(low, &x, 1, std::slice::from_ref(&x)),
            Verdict::Promote { demote: None }
        );
    }

    #[test]
    fn invariants_hold_for_well_formed_tree() {
        let tree = vec![
            node("r", None, 0, true),
            node("a", Some("r"), 6, true),
            node("b", Some("r"), 2, false),
            node("c", Some("a"), 0, false),
        ];
        assert_eq!(check_invariants(&tree), Ok(()));
    }

    #[test]
    fn invariants_report_every_violation() {
        let tree = vec![
            node("r", None, 0, false),
            node("a", Some("r"), 6, true),
            node("b", Some("r"), 7, true),
            node("c", Some("ghost"), 0, false),
        ];
        let violations = check_invariants(&tree).expect_err("broken tree");
        assert!(violations.contains(&InvariantViolation::RootNotCanonical {
            id: DocId::new_unchecked("r")
        }));
        assert!(violations.iter().any(|v| matches!(
            v,
            InvariantViolation::MultipleCanonical { count: 2, .. }
        )));
        assert!(violations.iter().any(|v| matches!(
            v,
            InvariantViolation::DanglingParent { .. }
        )));
    }

    #[test]
    fn empty_story_has_no_root() {
        assert_eq!(
            check_invariants(&[]),
            Err(vec![InvariantViolation::MissingRoot])
        );
    }
}
