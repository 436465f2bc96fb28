// src/balance.rs
//! Source balancer: diversity before depth.
//!
//! One reserved slot per source group in priority order, then round-robin over
//! the same groups until the cap is reached or every group is exhausted. An
//! empty group simply loses its turn.

use std::collections::{HashMap, HashSet};

use crate::ingest::dedup::candidate_key;
use crate::ingest::types::{Candidate, Source};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotPlan {
    /// Priority-ordered groups; sources within a group share one slot per pass.
    pub groups: Vec<Vec<Source>>,
    pub cap: usize,
}

impl SlotPlan {
    pub fn with_cap(cap: usize) -> Self {
        Self {
            groups: vec![
                vec![Source::ProductHunt],
                vec![Source::Toolify],
                vec![Source::Taaft, Source::Futurepedia],
                vec![Source::HackerNews],
                vec![Source::GitHub],
            ],
            cap,
        }
    }
}

impl Default for SlotPlan {
    fn default() -> Self {
        Self::with_cap(6)
    }
}

/// Group candidates by source, preserving upstream order within each pool.
pub fn group_by_source(candidates: Vec<Candidate>) -> HashMap<Source, Vec<Candidate>> {
    let mut pools: HashMap<Source, Vec<Candidate>> = HashMap::new();
    for c in candidates {
        pools.entry(c.source).or_default().push(c);
    }
    pools
}

pub fn balance(pools: &HashMap<Source, Vec<Candidate>>, plan: &SlotPlan) -> Vec<Candidate> {
    let lanes: Vec<Vec<&Candidate>> = plan
        .groups
        .iter()
        .map(|g| {
            g.iter()
                .flat_map(|s| pools.get(s).into_iter().flatten())
                .collect()
        })
        .collect();

    let mut cursors = vec![0usize; lanes.len()];
    let mut chosen: HashSet<String> = HashSet::new();
    let mut out: Vec<Candidate> = Vec::with_capacity(plan.cap);

    // Pass 0 is the reserved-slot pass; later passes are round-robin.
    loop {
        let mut progressed = false;
        for (lane, cursor) in lanes.iter().zip(cursors.iter_mut()) {
            if out.len() >= plan.cap {
                return out;
            }
            while let Some(c) = lane.get(*cursor) {
                *cursor += 1;
                if chosen.insert(candidate_key(c)) {
                    out.push((*c).clone());
                    progressed = true;
                    break;
                }
            }
        }
        if !progressed {
            return out;
        }
    }
}
