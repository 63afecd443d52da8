use proptest::prelude::*;

mod common;

use common::{add_branch, assert_canonical_leads, fetch, seed};
use storyfork_core::MemoryStore;
use storyfork_core::branches::{branches_of, contributions};
use storyfork_core::canon::{PromotionPolicy, check_invariants, record_like_with};
use storyfork_core::model::DocId;

/// Reference model of one sibling set: likes per branch and the champion.
#[derive(Debug, Default)]
struct Oracle {
    likes: Vec<u64>,
    champion: Option<usize>,
}

impl Oracle {
    fn like(&mut self, idx: usize, threshold: u64) {
        let before_max = self.likes.iter().copied().max().unwrap_or(0);
        self.likes[idx] += 1;
        let now = self.likes[idx];
        if now >= threshold && now > before_max && self.champion != Some(idx) {
            self.champion = Some(idx);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_likes_match_reference_model(
        threshold in 1_u64..6,
        picks in prop::collection::vec(0_usize..5, 0..60),
    ) {
        // Indices 0..3 are siblings under the root, 3 is a grandchild,
        // 4 is the root itself.
        let store = MemoryStore::new();
        let f = seed(&store, 3);
        let grandchild = add_branch(&store, &f.story_id, &f.branches[0], "deeper");
        let mut targets: Vec<DocId> = f.branches.clone();
        targets.push(grandchild.clone());
        targets.push(f.root.clone());

        let policy = PromotionPolicy { threshold };
        let mut oracle = Oracle { likes: vec![0; 3], champion: None };
        let mut expected_likes = vec![0_u64; targets.len()];

        for &pick in &picks {
            let outcome = record_like_with(&store, policy, &f.story_id, &targets[pick])
                .expect("like");
            expected_likes[pick] += 1;
            prop_assert_eq!(outcome.likes, expected_likes[pick]);
            if pick < 3 {
                oracle.like(pick, threshold);
            }

            let all = contributions(&store, &f.story_id).expect("list");
            prop_assert_eq!(check_invariants(&all), Ok(()));
        }

        for (idx, id) in f.branches.iter().enumerate() {
            let row = fetch(&store, &f.story_id, id);
            prop_assert_eq!(row.likes_count, oracle.likes[idx]);
            prop_assert_eq!(row.is_canonical, oracle.champion == Some(idx));
        }
        prop_assert!(fetch(&store, &f.story_id, &f.root).is_canonical);
        let grand = fetch(&store, &f.story_id, &grandchild);
        prop_assert_eq!(grand.is_canonical, expected_likes[3] >= threshold);

        let siblings = branches_of(&store, &f.story_id, &f.root).expect("siblings");
        assert_canonical_leads(&siblings, threshold);
    }
}
