//! Weighted linear fusion of ranked candidate lists.

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::retrieval::candidate::{Candidate, DEFAULT_IDENTITY_PREFIX_CHARS};
use crate::util::score_desc;

/// How candidates are recognised as the same underlying text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "strategy")]
pub enum IdentityKey {
    /// The first `chars` characters of the content. Cheap and approximate:
    /// distinct texts sharing a prefix collapse into one candidate.
    Prefix { chars: usize },
    /// SHA-256 of the full content.
    ContentHash,
}

impl Default for IdentityKey {
    fn default() -> Self {
        IdentityKey::Prefix {
            chars: DEFAULT_IDENTITY_PREFIX_CHARS,
        }
    }
}

impl IdentityKey {
    /// Derive the key for `content`.
    pub fn key(&self, content: &str) -> String {
        match self {
            IdentityKey::Prefix { chars } => content.chars().take(*chars).collect(),
            IdentityKey::ContentHash => {
                let digest = Sha256::digest(content.as_bytes());
                digest.iter().map(|b| format!("{b:02x}")).collect()
            }
        }
    }
}

/// Which score of a candidate a ranked list contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreChannel {
    /// `dense_score`
    Dense,
    /// `sparse_score` (also web relevance)
    Sparse,
    /// The candidate's current ranking score, for lists that were already
    /// fused (and possibly re-ranked).
    Fused,
}

impl ScoreChannel {
    /// The score this channel reads from `candidate`.
    pub fn score(&self, candidate: &Candidate) -> f32 {
        match self {
            ScoreChannel::Dense => candidate.dense_score,
            ScoreChannel::Sparse => candidate.sparse_score,
            ScoreChannel::Fused => candidate.ranking_score(),
        }
    }
}

/// One input list of a fusion pass.
#[derive(Debug, Clone)]
pub struct RankedList {
    pub candidates: Vec<Candidate>,
    pub channel: ScoreChannel,
    /// Contribution weight; 0 means the list only adds candidates, never score.
    pub weight: f32,
}

impl RankedList {
    /// Negative or NaN weights are treated as 0.
    pub fn new(candidates: Vec<Candidate>, channel: ScoreChannel, weight: f32) -> Self {
        let weight = if weight.is_nan() || weight < 0.0 {
            log::warn!("fusion weight {weight} for {channel:?} list treated as 0");
            0.0
        } else {
            weight
        };
        RankedList {
            candidates,
            channel,
            weight,
        }
    }

    pub fn dense(candidates: Vec<Candidate>, weight: f32) -> Self {
        Self::new(candidates, ScoreChannel::Dense, weight)
    }

    pub fn sparse(candidates: Vec<Candidate>, weight: f32) -> Self {
        Self::new(candidates, ScoreChannel::Sparse, weight)
    }

    pub fn fused(candidates: Vec<Candidate>, weight: f32) -> Self {
        Self::new(candidates, ScoreChannel::Fused, weight)
    }
}

/// Merges ranked lists into one deduplicated list scored by the weighted
/// sum of each list's channel score.
///
/// Within one input list the first occurrence of a key wins and later
/// duplicates are dropped. Across lists, contributions for the same key are
/// added, so the merged scores do not depend on the order of the lists.
/// The output is sorted by `combined_score` descending (stable) and is not
/// truncated.
#[derive(Debug, Clone, Copy, Default)]
pub struct FusionCombiner {
    identity: IdentityKey,
}

impl FusionCombiner {
    pub fn new(identity: IdentityKey) -> Self {
        FusionCombiner { identity }
    }

    pub fn identity(&self) -> IdentityKey {
        self.identity
    }

    /// Fuse a dense list and a sparse list.
    pub fn combine(
        &self,
        dense: Vec<Candidate>,
        sparse: Vec<Candidate>,
        dense_weight: f32,
        sparse_weight: f32,
    ) -> Vec<Candidate> {
        self.fuse(vec![
            RankedList::dense(dense, dense_weight),
            RankedList::sparse(sparse, sparse_weight),
        ])
    }

    /// Fuse any number of lists.
    pub fn fuse(&self, lists: Vec<RankedList>) -> Vec<Candidate> {
        let capacity = lists.iter().map(|l| l.candidates.len()).sum();
        let mut merged: Vec<Candidate> = Vec::with_capacity(capacity);
        let mut positions: AHashMap<String, usize> = AHashMap::with_capacity(capacity);

        for list in lists {
            let mut seen_in_list: AHashSet<String> = AHashSet::new();
            for mut candidate in list.candidates {
                let key = self.identity.key(&candidate.content);
                if !seen_in_list.insert(key.clone()) {
                    continue;
                }
                let contribution = list.channel.score(&candidate) * list.weight;

                match positions.get(&key).copied() {
                    Some(pos) => merge_into(&mut merged[pos], &candidate, list.channel, contribution),
                    None => {
                        candidate.combined_score = contribution;
                        candidate.identity_key = key.clone();
                        candidate.clear_rerank();
                        positions.insert(key, merged.len());
                        merged.push(candidate);
                    }
                }
            }
        }

        merged.sort_by(|a, b| score_desc(a.combined_score, b.combined_score));
        merged
    }
}

fn merge_into(existing: &mut Candidate, incoming: &Candidate, channel: ScoreChannel, contribution: f32) {
    existing.combined_score += contribution;
    match channel {
        ScoreChannel::Dense => existing.dense_score = existing.dense_score.max(incoming.dense_score),
        ScoreChannel::Sparse => {
            existing.sparse_score = existing.sparse_score.max(incoming.sparse_score)
        }
        ScoreChannel::Fused => {
            existing.dense_score = existing.dense_score.max(incoming.dense_score);
            existing.sparse_score = existing.sparse_score.max(incoming.sparse_score);
        }
    }
    for (key, value) in &incoming.metadata {
        existing
            .metadata
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
}
