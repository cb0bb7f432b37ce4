//! Root scoring and clustering
//!
//! Root families are ranked by how much of the execution they transitively
//! encompass:
//!
//! ```text
//! score(f) = 1 + Σ score(c)   for every child family c (direct or indirect)
//!                             of every span of f
//! ```
//!
//! The containment graph is derived from noisy data and may contain cycles
//! (indirect edges are temporal, not causal). Each root's traversal keeps its
//! own visited set: a family reached a second time contributes 0, which both
//! breaks cycles and avoids counting a shared descendant twice. A memo table
//! shared across roots caches a family's score once its frame has run to
//! completion; a revisit cut off by the visited set writes nothing.
//!
//! The traversal uses an explicit work stack, so deep call chains cannot
//! overflow the thread stack.

use crate::config::TimelineConfig;
use crate::family::Family;
use crate::span::Span;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A root family and its encompassing score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredFamily {
    pub family_index: usize,
    pub score: u64,
}

/// Named group of root families, highest score first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub name: String,
    pub root_families: Vec<ScoredFamily>,
}

impl Cluster {
    pub fn family_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.root_families.iter().map(|r| r.family_index)
    }
}

struct Frame {
    family: usize,
    next_child: usize,
    total: u64,
}

/// Encompassing-score calculator over one computation's families
pub struct RootScorer {
    /// Child families of each family, flattened over its spans
    children: Vec<Vec<usize>>,
    memo: Vec<Option<u64>>,
}

impl RootScorer {
    pub fn new(spans: &[Span], families: &[Family]) -> Self {
        let children = families
            .iter()
            .map(|family| {
                family
                    .spans_indices
                    .iter()
                    .flat_map(|&s| {
                        spans[s]
                            .children_family_indices
                            .iter()
                            .chain(spans[s].indirect_children_family_indices.iter())
                            .copied()
                    })
                    .collect()
            })
            .collect();

        Self {
            children,
            memo: vec![None; families.len()],
        }
    }

    /// Score of `root`, with a fresh visited set
    pub fn score(&mut self, root: usize) -> u64 {
        if let Some(score) = self.memo[root] {
            return score;
        }

        let mut visited: HashSet<usize> = HashSet::new();
        visited.insert(root);

        let mut stack = vec![Frame {
            family: root,
            next_child: 0,
            total: 1,
        }];

        let mut score = 0;
        while let Some(top) = stack.last_mut() {
            if let Some(&child) = self.children[top.family].get(top.next_child) {
                top.next_child += 1;

                if !visited.insert(child) {
                    continue;
                }
                if let Some(cached) = self.memo[child] {
                    top.total += cached;
                    continue;
                }

                stack.push(Frame {
                    family: child,
                    next_child: 0,
                    total: 1,
                });
                continue;
            }

            let (family, total) = (top.family, top.total);
            stack.pop();
            self.memo[family] = Some(total);
            match stack.last_mut() {
                Some(parent) => parent.total += total,
                None => score = total,
            }
        }

        score
    }
}

/// Root family indices with their scores, highest first (stable on ties)
pub fn rank_roots(spans: &[Span], families: &[Family]) -> Vec<ScoredFamily> {
    let mut scorer = RootScorer::new(spans, families);

    let mut ranked: Vec<ScoredFamily> = families
        .iter()
        .enumerate()
        .filter(|(_, f)| f.is_root)
        .map(|(idx, _)| ScoredFamily {
            family_index: idx,
            score: scorer.score(idx),
        })
        .collect();

    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}

/// Filepath of the earliest span of a family
fn family_filepath<'a>(spans: &'a [Span], family: &Family) -> Option<&'a str> {
    family
        .spans_indices
        .first()
        .map(|&s| spans[s].position.filepath.as_str())
}

/// Group ranked roots into clusters
///
/// Without workspace roots every family lands in one cluster named
/// `config.cluster_name`. Otherwise each family joins the cluster of the
/// longest workspace root prefixing its first span's filepath; the rest join
/// the default cluster, placed last. Empty clusters are dropped.
pub fn cluster_roots(
    spans: &[Span],
    families: &[Family],
    ranked: Vec<ScoredFamily>,
    config: &TimelineConfig,
) -> Vec<Cluster> {
    if config.workspace_roots.is_empty() {
        return vec![Cluster {
            name: config.cluster_name.clone(),
            root_families: ranked,
        }];
    }

    let mut buckets: Vec<Vec<ScoredFamily>> = vec![Vec::new(); config.workspace_roots.len() + 1];
    let default_slot = config.workspace_roots.len();

    for scored in ranked {
        let filepath = family_filepath(spans, &families[scored.family_index]).unwrap_or("");
        let slot = config
            .workspace_roots
            .iter()
            .enumerate()
            .filter(|(_, root)| filepath.starts_with(root.as_str()))
            .max_by_key(|(_, root)| root.len())
            .map(|(i, _)| i)
            .unwrap_or(default_slot);
        buckets[slot].push(scored);
    }

    config
        .workspace_roots
        .iter()
        .chain(std::iter::once(&config.cluster_name))
        .zip(buckets)
        .filter(|(_, members)| !members.is_empty())
        .map(|(name, members)| Cluster {
            name: name.clone(),
            root_families: members,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Position;

    fn family(parent: &str, is_root: bool, spans_indices: Vec<usize>) -> Family {
        Family {
            label: parent.to_string(),
            parent_id: parent.to_string(),
            is_root,
            spans_indices,
            start_timestamp: 0,
            end_timestamp: 0,
            is_start_definite: true,
            is_end_definite: true,
            patterns: Vec::new(),
        }
    }

    fn span(file: &str, direct: Vec<usize>, indirect: Vec<usize>) -> Span {
        Span {
            trace_id: String::new(),
            parent_id: String::new(),
            location: format!("{}:1", file),
            position: Position::new(file, 1, 0),
            end_line: 1,
            end_column: 0,
            is_error: false,
            is_start_definite: true,
            is_end_definite: true,
            start_timestamp: 0,
            end_timestamp: 0,
            family_index: None,
            children_family_indices: direct,
            indirect_children_family_indices: indirect,
        }
    }

    #[test]
    fn test_leaf_root_scores_one() {
        let spans = vec![span("a.js", vec![], vec![])];
        let families = vec![family("orphan-1", true, vec![0])];

        let mut scorer = RootScorer::new(&spans, &families);
        assert_eq!(scorer.score(0), 1);
    }

    #[test]
    fn test_nested_chain_scores() {
        // F0 -> F1 -> F2
        let spans = vec![
            span("a.js", vec![1], vec![]),
            span("a.js", vec![2], vec![]),
            span("a.js", vec![], vec![]),
        ];
        let families = vec![
            family("orphan-1", true, vec![0]),
            family("s0", false, vec![1]),
            family("s1", false, vec![2]),
        ];

        let mut scorer = RootScorer::new(&spans, &families);
        assert_eq!(scorer.score(0), 3);
        // Inner subtrees are served from the memo
        assert_eq!(scorer.score(1), 2);
        assert_eq!(scorer.score(2), 1);
    }

    #[test]
    fn test_direct_and_indirect_children_count() {
        let spans = vec![
            span("a.js", vec![1], vec![2]),
            span("a.js", vec![], vec![]),
            span("a.js", vec![], vec![]),
        ];
        let families = vec![
            family("orphan-1", true, vec![0]),
            family("s0", false, vec![1]),
            family("x", false, vec![2]),
        ];

        assert_eq!(RootScorer::new(&spans, &families).score(0), 3);
    }

    #[test]
    fn test_cycle_terminates() {
        // F0 -> F1 -> F2 -> F1 (cycle A -> B -> A below the root)
        let spans = vec![
            span("a.js", vec![1], vec![]),
            span("a.js", vec![2], vec![]),
            span("a.js", vec![], vec![1]),
        ];
        let families = vec![
            family("orphan-1", true, vec![0]),
            family("s0", false, vec![1]),
            family("s1", false, vec![2]),
        ];

        let mut scorer = RootScorer::new(&spans, &families);
        assert_eq!(scorer.score(0), 3);
    }

    #[test]
    fn test_self_cycle_on_root() {
        let spans = vec![span("a.js", vec![0], vec![0])];
        let families = vec![family("orphan-1", true, vec![0])];

        assert_eq!(RootScorer::new(&spans, &families).score(0), 1);
    }

    #[test]
    fn test_shared_descendant_counted_once_per_root() {
        // Both spans of F0 point at F1
        let spans = vec![
            span("a.js", vec![1], vec![]),
            span("a.js", vec![], vec![1]),
            span("a.js", vec![], vec![]),
        ];
        let families = vec![family("orphan-1", true, vec![0, 1]), family("s0", false, vec![2])];

        assert_eq!(RootScorer::new(&spans, &families).score(0), 2);
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let depth = 100_000;
        let mut spans = Vec::with_capacity(depth);
        let mut families = Vec::with_capacity(depth);
        for i in 0..depth {
            let children = if i + 1 < depth { vec![i + 1] } else { vec![] };
            spans.push(span("deep.js", children, vec![]));
            families.push(family(&format!("p{}", i), i == 0, vec![i]));
        }

        assert_eq!(RootScorer::new(&spans, &families).score(0), depth as u64);
    }

    #[test]
    fn test_rank_roots_descending() {
        let spans = vec![
            span("a.js", vec![], vec![]),
            span("b.js", vec![2], vec![]),
            span("b.js", vec![], vec![]),
        ];
        let families = vec![
            family("orphan-1", true, vec![0]),
            family("orphan-2", true, vec![1]),
            family("s1", false, vec![2]),
        ];

        let ranked = rank_roots(&spans, &families);
        assert_eq!(
            ranked,
            vec![
                ScoredFamily { family_index: 1, score: 2 },
                ScoredFamily { family_index: 0, score: 1 },
            ]
        );
    }

    #[test]
    fn test_single_default_cluster() {
        let spans = vec![span("a.js", vec![], vec![])];
        let families = vec![family("orphan-1", true, vec![0])];
        let ranked = rank_roots(&spans, &families);

        let clusters = cluster_roots(&spans, &families, ranked, &TimelineConfig::default());
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].name, "default");
        assert_eq!(clusters[0].family_indices().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_workspace_root_clusters() {
        let spans = vec![
            span("/srv/web/app.js", vec![], vec![]),
            span("/srv/api/server.py", vec![], vec![]),
            span("/srv/api/v2/handler.py", vec![], vec![]),
            span("/tmp/script.js", vec![], vec![]),
        ];
        let families = vec![
            family("orphan-1", true, vec![0]),
            family("orphan-2", true, vec![1]),
            family("orphan-3", true, vec![2]),
            family("orphan-4", true, vec![3]),
        ];
        let config = TimelineConfig {
            workspace_roots: vec![
                "/srv/api".to_string(),
                "/srv/api/v2".to_string(),
                "/srv/mobile".to_string(),
                "/srv/web".to_string(),
            ],
            ..TimelineConfig::default()
        };

        let ranked = rank_roots(&spans, &families);
        let clusters = cluster_roots(&spans, &families, ranked, &config);

        let names: Vec<_> = clusters.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["/srv/api", "/srv/api/v2", "/srv/web", "default"]);
        assert_eq!(clusters[1].family_indices().collect::<Vec<_>>(), vec![2]);
        assert_eq!(clusters[3].family_indices().collect::<Vec<_>>(), vec![3]);
    }
}
