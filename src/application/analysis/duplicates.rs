//! Near-duplicate detection by clustering chunk embeddings
//!
//! Builds an undirected similarity graph over chunk vectors (edge when the
//! cosine distance is under `2 * (1 - threshold)`), finds connected
//! components by BFS, and ranks the surviving clusters by
//! `count * total_lines`. Pairwise comparison is O(n^2); callers size the
//! input accordingly.

use crate::domain::types::{ChunkKind, Language, VectorRow};
use itertools::Itertools;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};

/// Path fragments identifying build output; those chunks never cluster.
const BUILD_OUTPUT_MARKERS: &[&str] = &["dist/", "build/", "out/", "target/", ".min."];

/// Minimum shared-prefix length for a named extraction suggestion.
const SUGGESTION_PREFIX_LEN: usize = 4;

/// Detection options.
#[derive(Debug, Clone)]
pub struct DuplicateOptions {
    /// Similarity threshold in `[0, 1]`
    pub threshold: f32,
    /// Components below this size are dropped
    pub min_cluster_size: usize,
    /// Clusters kept after ranking
    pub max_clusters: usize,
}

impl Default for DuplicateOptions {
    fn default() -> Self {
        Self {
            threshold: 0.90,
            min_cluster_size: 2,
            max_clusters: 20,
        }
    }
}

/// One duplicated code instance.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DuplicateInstance {
    /// File the instance lives in
    pub file: String,
    /// Start line
    pub start_line: u32,
    /// End line
    pub end_line: u32,
    /// Symbol name, when the chunk is a named declaration
    pub symbol_name: Option<String>,
    /// Symbol kind
    pub symbol_type: Option<ChunkKind>,
    /// Source language
    pub language: Language,
}

/// One cluster of near-duplicates.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateCluster {
    /// Stable cluster id within this analysis
    pub id: usize,
    /// Mean pairwise cosine similarity in `[0, 1]`
    pub average_similarity: f32,
    /// Number of instances
    pub count: usize,
    /// Sum of instance line counts
    pub total_lines: u32,
    /// The duplicated instances
    pub instances: Vec<DuplicateInstance>,
    /// Human-readable refactoring suggestion
    pub suggestion: String,
}

/// Full duplicate analysis.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateAnalysis {
    /// Clusters, ranked by `count * total_lines` descending
    pub clusters: Vec<DuplicateCluster>,
    /// Chunks that entered the pairwise comparison
    pub analyzed_chunks: usize,
}

/// Cosine distance between two unit vectors, in `[0, 2]`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    (1.0 - dot).clamp(0.0, 2.0)
}

/// Find near-duplicate code across the given rows.
pub fn find_duplicates(rows: &[VectorRow], options: &DuplicateOptions) -> DuplicateAnalysis {
    // Deduplicate by (file, line range) and drop build output.
    let mut seen: HashSet<(String, u32, u32)> = HashSet::new();
    let candidates: Vec<&VectorRow> = rows
        .iter()
        .filter(|r| {
            !BUILD_OUTPUT_MARKERS
                .iter()
                .any(|m| r.metadata.file.contains(m))
        })
        .filter(|r| !r.vector.is_empty())
        .filter(|r| {
            seen.insert((
                r.metadata.file.clone(),
                r.metadata.start_line,
                r.metadata.end_line,
            ))
        })
        .collect();

    let n = candidates.len();
    let max_distance = 2.0 * (1.0 - options.threshold);
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
    for i in 0..n {
        for j in (i + 1)..n {
            let distance = cosine_distance(&candidates[i].vector, &candidates[j].vector);
            if distance < max_distance {
                adjacency[i].push(j);
                adjacency[j].push(i);
            }
        }
    }

    // Connected components by BFS.
    let mut visited = vec![false; n];
    let mut components: Vec<Vec<usize>> = Vec::new();
    for start in 0..n {
        if visited[start] || adjacency[start].is_empty() {
            continue;
        }
        let mut component = Vec::new();
        let mut queue = VecDeque::from([start]);
        visited[start] = true;
        while let Some(node) = queue.pop_front() {
            component.push(node);
            for &next in &adjacency[node] {
                if !visited[next] {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }
        if component.len() >= options.min_cluster_size.max(2) {
            components.push(component);
        }
    }

    let mut clusters: Vec<DuplicateCluster> = components
        .into_iter()
        .map(|component| {
            let average_similarity = mean_pairwise_similarity(&component, &candidates);
            let instances: Vec<DuplicateInstance> = component
                .iter()
                .map(|&i| {
                    let meta = &candidates[i].metadata;
                    DuplicateInstance {
                        file: meta.file.clone(),
                        start_line: meta.start_line,
                        end_line: meta.end_line,
                        symbol_name: meta.symbol_name.clone(),
                        symbol_type: meta.symbol_type,
                        language: meta.language,
                    }
                })
                .collect();
            let total_lines: u32 = instances
                .iter()
                .map(|i| i.end_line.saturating_sub(i.start_line) + 1)
                .sum();
            DuplicateCluster {
                id: 0,
                average_similarity,
                count: instances.len(),
                total_lines,
                suggestion: build_suggestion(&instances),
                instances,
            }
        })
        .collect();

    clusters.sort_by_key(|c| std::cmp::Reverse(c.count as u64 * c.total_lines as u64));
    clusters.truncate(options.max_clusters);
    for (id, cluster) in clusters.iter_mut().enumerate() {
        cluster.id = id;
    }

    DuplicateAnalysis {
        clusters,
        analyzed_chunks: n,
    }
}

fn mean_pairwise_similarity(component: &[usize], candidates: &[&VectorRow]) -> f32 {
    let mut total = 0.0f32;
    let mut pairs = 0u32;
    for (a, b) in component.iter().tuple_combinations() {
        let similarity = 1.0 - cosine_distance(&candidates[*a].vector, &candidates[*b].vector);
        total += similarity.clamp(0.0, 1.0);
        pairs += 1;
    }
    if pairs == 0 {
        1.0
    } else {
        total / pairs as f32
    }
}

/// Suggest extracting a shared helper when symbol names share a prefix of
/// at least four characters across two or more files.
fn build_suggestion(instances: &[DuplicateInstance]) -> String {
    let names: Vec<&str> = instances
        .iter()
        .filter_map(|i| i.symbol_name.as_deref())
        .collect();
    let distinct_files = instances.iter().map(|i| &i.file).unique().count();

    if names.len() >= 2 && distinct_files >= 2 {
        let prefix = common_prefix(&names);
        if prefix.len() >= SUGGESTION_PREFIX_LEN {
            return format!(
                "Extract the shared `{prefix}*` logic into a common utility used by all {} locations",
                instances.len()
            );
        }
    }
    format!(
        "These {} chunks are near-identical; extract the shared logic into one reusable function",
        instances.len()
    )
}

fn common_prefix(names: &[&str]) -> String {
    let first = names[0];
    let mut len = first.len();
    for name in &names[1..] {
        len = len.min(
            first
                .chars()
                .zip(name.chars())
                .take_while(|(a, b)| a == b)
                .count(),
        );
    }
    first.chars().take(len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{ChunkMetadata, HalsteadMetrics, TenantScope};
    use std::collections::BTreeSet;

    fn row(file: &str, start: u32, end: u32, symbol: &str, vector: Vec<f32>) -> VectorRow {
        VectorRow {
            content: String::new(),
            metadata: ChunkMetadata {
                scope: TenantScope {
                    org_id: "local".into(),
                    repo_id: "r".into(),
                    branch: "main".into(),
                    commit_sha: "c".into(),
                },
                file: file.to_string(),
                start_line: start,
                end_line: end,
                language: Language::TypeScript,
                kind: ChunkKind::Function,
                symbol_name: Some(symbol.to_string()),
                symbol_type: Some(ChunkKind::Function),
                parent_class: None,
                complexity: 1,
                cognitive_complexity: 0,
                halstead: HalsteadMetrics::default(),
                parameters: vec![],
                signature: String::new(),
                imports: BTreeSet::new(),
                exports: BTreeSet::new(),
                call_sites: vec![],
            },
            vector,
        }
    }

    #[test]
    fn identical_vectors_form_one_cluster() {
        // Two copies of a 30-line function in two files.
        let v = vec![0.6, 0.8, 0.0];
        let rows = vec![
            row("src/a.ts", 1, 30, "formatUser", v.clone()),
            row("src/b.ts", 5, 34, "formatUser", v.clone()),
            row("src/c.ts", 1, 10, "unrelated", vec![0.0, 0.0, 1.0]),
        ];
        let analysis = find_duplicates(&rows, &DuplicateOptions::default());
        assert_eq!(analysis.clusters.len(), 1);
        let cluster = &analysis.clusters[0];
        assert_eq!(cluster.count, 2);
        assert_eq!(cluster.total_lines, 60);
        assert!(cluster.average_similarity > 0.99);
        let files: Vec<&str> = cluster.instances.iter().map(|i| i.file.as_str()).collect();
        assert!(files.contains(&"src/a.ts"));
        assert!(files.contains(&"src/b.ts"));
        assert!(cluster.suggestion.contains("formatUser"));
    }

    #[test]
    fn duplicate_line_ranges_dedupe() {
        let v = vec![1.0, 0.0];
        let rows = vec![
            row("src/a.ts", 1, 30, "f", v.clone()),
            row("src/a.ts", 1, 30, "f", v.clone()),
        ];
        let analysis = find_duplicates(&rows, &DuplicateOptions::default());
        assert!(analysis.clusters.is_empty(), "a row is never its own duplicate");
        assert_eq!(analyzed(&analysis), 1);
    }

    fn analyzed(a: &DuplicateAnalysis) -> usize {
        a.analyzed_chunks
    }

    #[test]
    fn build_output_is_dropped() {
        let v = vec![1.0, 0.0];
        let rows = vec![
            row("dist/a.js", 1, 30, "f", v.clone()),
            row("src/a.ts", 1, 30, "f", v.clone()),
        ];
        let analysis = find_duplicates(&rows, &DuplicateOptions::default());
        assert!(analysis.clusters.is_empty());
    }

    #[test]
    fn distance_is_symmetric_and_bounded() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert_eq!(cosine_distance(&a, &b), cosine_distance(&b, &a));
        assert!(cosine_distance(&a, &b) <= 2.0);
        assert_eq!(cosine_distance(&a, &a), 0.0);
    }

    #[test]
    fn clusters_rank_by_count_times_lines() {
        let v1 = vec![1.0, 0.0, 0.0];
        let v2 = vec![0.0, 1.0, 0.0];
        let rows = vec![
            // Small cluster: 2 x 5 lines.
            row("src/a.ts", 1, 5, "tiny", v1.clone()),
            row("src/b.ts", 1, 5, "tiny", v1.clone()),
            // Large cluster: 2 x 50 lines.
            row("src/c.ts", 1, 50, "bigHelper", v2.clone()),
            row("src/d.ts", 1, 50, "bigHelper", v2.clone()),
        ];
        let analysis = find_duplicates(&rows, &DuplicateOptions::default());
        assert_eq!(analysis.clusters.len(), 2);
        assert_eq!(analysis.clusters[0].total_lines, 100);
        assert_eq!(analysis.clusters[0].id, 0);
    }
}
