//! Ordering the branches that continue a contribution.
//!
//! A [`BranchRanker`] proposes an order; [`ranked_branches`] never trusts it
//! blindly. Whatever comes back is reconciled against the real branch set, and
//! a failing ranker degrades to the local creation order.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::StoreError;
use crate::model::{Contribution, DocId};
use crate::store::StoryStore;

/// Justification attached by [`LocalRanker`].
pub const LOCAL_JUSTIFICATION: &str = "Ranked in order of creation.";

/// Justification for branches a ranker forgot to mention.
const UNRANKED_JUSTIFICATION: &str = "Not ranked; appended in order of creation.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedBranch {
    /// 1-based position.
    pub rank: u32,
    pub id: DocId,
    pub justification: String,
}

/// Something that can order the continuations of `lead`.
pub trait BranchRanker {
    /// # Errors
    ///
    /// Implementations report any failure to produce an order; callers fall
    /// back to [`LocalRanker`].
    fn rank(
        &self,
        lead: &Contribution,
        branches: &[Contribution],
    ) -> anyhow::Result<Vec<RankedBranch>>;
}

/// Ranks branches in the order they were written.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRanker;

impl BranchRanker for LocalRanker {
    fn rank(
        &self,
        _lead: &Contribution,
        branches: &[Contribution],
    ) -> anyhow::Result<Vec<RankedBranch>> {
        Ok(local_order(branches))
    }
}

fn local_order(branches: &[Contribution]) -> Vec<RankedBranch> {
    branches
        .iter()
        .zip(1_u32..)
        .map(|(branch, rank)| RankedBranch {
            rank,
            id: branch.id.clone(),
            justification: LOCAL_JUSTIFICATION.to_string(),
        })
        .collect()
}

/// Rank the branches directly under `contribution_id`.
///
/// # Errors
///
/// [`StoreError::NotFound`] if the contribution does not exist. Ranker
/// failures are logged and replaced by the local order, never returned.
pub fn ranked_branches<S: StoryStore, R: BranchRanker + ?Sized>(
    store: &S,
    ranker: &R,
    story_id: &str,
    contribution_id: &str,
) -> Result<Vec<RankedBranch>, StoreError> {
    let (lead, branches) = store.run_read(|tx| {
        let lead = tx
            .get_contribution(story_id, contribution_id)?
            .ok_or_else(|| StoreError::contribution_not_found(contribution_id))?;
        let branches = tx.query_children(story_id, Some(contribution_id))?;
        Ok((lead, branches))
    })?;

    if branches.is_empty() {
        return Ok(Vec::new());
    }

    let proposed = match ranker.rank(&lead, &branches) {
        Ok(proposed) => proposed,
        Err(err) => {
            tracing::warn!(
                story_id,
                contribution_id,
                error = %err,
                "branch ranker failed, using creation order"
            );
            return Ok(local_order(&branches));
        }
    };
    Ok(sanitize(proposed, &branches))
}

/// Reconcile a proposed ranking with the real branch set.
///
/// Unknown and repeated ids are dropped, branches the proposal left out are
/// appended in creation order, and ranks are renumbered from 1.
#[must_use]
pub fn sanitize(proposed: Vec<RankedBranch>, branches: &[Contribution]) -> Vec<RankedBranch> {
    let known: HashSet<&DocId> = branches.iter().map(|b| &b.id).collect();
    let mut seen: HashSet<DocId> = HashSet::with_capacity(branches.len());

    let mut ordered = proposed;
    ordered.sort_by_key(|r| r.rank);

    let mut out: Vec<RankedBranch> = ordered
        .into_iter()
        .filter(|r| known.contains(&r.id) && seen.insert(r.id.clone()))
        .collect();

    let dropped = known.len().saturating_sub(out.len());
    if dropped > 0 {
        tracing::debug!(missing = dropped, "ranker omitted branches");
    }
    out.extend(
        branches
            .iter()
            .filter(|b| !seen.contains(&b.id))
            .map(|b| RankedBranch {
                rank: 0,
                id: b.id.clone(),
                justification: UNRANKED_JUSTIFICATION.to_string(),
            }),
    );

    for (entry, rank) in out.iter_mut().zip(1_u32..) {
        entry.rank = rank;
    }
    out
}
