//! Dependency graph construction over stored chunks
//!
//! Resolves each file's import specifiers against the store (exact
//! normalized path first, then fuzzy suffix match) and walks the resulting
//! adjacency lists from the requested roots. Nodes live in an integer slab
//! with adjacency lists; cycles are handled by a visited set.
//!
//! Safety limits are part of the contract: when a traversal would exceed
//! [`MAX_NODES`] nodes or [`MAX_EDGES`] edges, the builder switches to a
//! non-recursive "direct edges only" mode that processes each root as a
//! flat node set with at most [`MAX_EDGES_PER_NODE`] edges per node.

use super::{is_test_path, specifier_matches_file, DEFAULT_TEST_GLOBS};
use crate::domain::types::VectorRow;
use itertools::Itertools;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

/// Node budget before the safety mode engages.
pub const MAX_NODES: usize = 200;
/// Edge budget before the safety mode engages.
pub const MAX_EDGES: usize = 500;
/// Per-node edge cap in safety mode.
pub const MAX_EDGES_PER_NODE: usize = 20;

/// Traversal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Follow imports (what a file depends on)
    Forward,
    /// Follow importers (what depends on a file)
    Reverse,
    /// Both directions
    Both,
}

/// Graph build options.
#[derive(Debug, Clone)]
pub struct GraphOptions {
    /// Root files to walk from (repository-relative)
    pub root_files: Vec<String>,
    /// Traversal depth; `None` is unlimited
    pub depth: Option<usize>,
    /// Traversal direction
    pub direction: Direction,
    /// Keep test files in the graph
    pub include_tests: bool,
    /// Attach per-file max cyclomatic complexity to nodes
    pub include_complexity: bool,
    /// Collapse nodes to their directories
    pub module_level: bool,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            root_files: Vec::new(),
            depth: None,
            direction: Direction::Forward,
            include_tests: false,
            include_complexity: false,
            module_level: false,
        }
    }
}

/// One graph node.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GraphNode {
    /// Stable id (file path, or directory in module mode)
    pub id: String,
    /// Display label (file name or directory)
    pub label: String,
    /// `"file"` or `"module"`
    pub node_type: &'static str,
    /// Backing path
    pub file_path: String,
    /// Max cyclomatic complexity in the file, when requested
    pub complexity: Option<u32>,
}

/// One `imports` edge between node ids.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
pub struct GraphEdge {
    /// Importing node id
    pub from: String,
    /// Imported node id
    pub to: String,
    /// Always `"imports"`
    pub edge_type: &'static str,
}

/// Built dependency graph.
#[derive(Debug, Clone, Serialize)]
pub struct CodeGraph {
    /// Nodes reached by the traversal
    pub nodes: Vec<GraphNode>,
    /// Edges between reached nodes
    pub edges: Vec<GraphEdge>,
    /// The requested roots
    pub root_files: Vec<String>,
    /// Requested depth
    pub depth: Option<usize>,
    /// Requested direction
    pub direction: Direction,
    /// Whether module-level collapsing applied
    pub module_level: bool,
    /// True when the safety limits forced direct-edges-only mode
    pub truncated: bool,
}

/// Builder over all stored rows.
pub struct DependencyGraphBuilder {
    /// file -> distinct import specifiers
    imports_by_file: BTreeMap<String, BTreeSet<String>>,
    /// file -> max cyclomatic complexity
    complexity_by_file: HashMap<String, u32>,
    files: Vec<String>,
}

impl DependencyGraphBuilder {
    /// Ingest all rows (one scan of the store).
    pub fn new(rows: &[VectorRow]) -> Self {
        let mut imports_by_file: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut complexity_by_file: HashMap<String, u32> = HashMap::new();
        for row in rows {
            let file = row.metadata.file.clone();
            imports_by_file
                .entry(file.clone())
                .or_default()
                .extend(row.metadata.imports.iter().cloned());
            let entry = complexity_by_file.entry(file).or_insert(0);
            *entry = (*entry).max(row.metadata.complexity);
        }
        let files = imports_by_file.keys().cloned().collect();
        Self {
            imports_by_file,
            complexity_by_file,
            files,
        }
    }

    /// Build the graph for the given options.
    pub fn generate(&self, options: &GraphOptions) -> CodeGraph {
        let test_globs: Vec<String> = DEFAULT_TEST_GLOBS.iter().map(|s| s.to_string()).collect();
        let keep = |file: &str| options.include_tests || !is_test_path(file, &test_globs);

        // Slab of eligible files plus forward/reverse adjacency.
        let files: Vec<&String> = self.files.iter().filter(|f| keep(f)).collect();
        let index_of: HashMap<&str, usize> = files
            .iter()
            .enumerate()
            .map(|(i, f)| (f.as_str(), i))
            .collect();

        let mut forward: Vec<Vec<usize>> = vec![Vec::new(); files.len()];
        let mut reverse: Vec<Vec<usize>> = vec![Vec::new(); files.len()];
        for (from_idx, file) in files.iter().enumerate() {
            let Some(imports) = self.imports_by_file.get(*file) else {
                continue;
            };
            for specifier in imports {
                for (to_idx, target) in files.iter().enumerate() {
                    if to_idx == from_idx {
                        // Self-loops are suppressed.
                        continue;
                    }
                    if specifier_matches_file(specifier, file, target) {
                        forward[from_idx].push(to_idx);
                        reverse[to_idx].push(from_idx);
                    }
                }
            }
        }
        for adjacency in forward.iter_mut().chain(reverse.iter_mut()) {
            adjacency.sort_unstable();
            adjacency.dedup();
        }

        let roots: Vec<usize> = if options.root_files.is_empty() {
            (0..files.len()).collect()
        } else {
            options
                .root_files
                .iter()
                .filter_map(|f| index_of.get(f.as_str()).copied())
                .collect()
        };

        // Full traversal first; fall back to direct-edges mode past budget.
        let (mut reached, mut edges, truncated) =
            match self.traverse(&roots, &forward, &reverse, options) {
                Some(result) => (result.0, result.1, false),
                None => {
                    let (reached, edges) = direct_edges(&roots, &forward, &reverse, options);
                    (reached, edges, true)
                }
            };
        reached.sort_unstable();
        reached.dedup();
        edges.sort_unstable_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        edges.dedup();

        self.materialize(files, reached, edges, options, truncated)
    }

    /// Bounded BFS; `None` when the result would exceed the safety budget.
    fn traverse(
        &self,
        roots: &[usize],
        forward: &[Vec<usize>],
        reverse: &[Vec<usize>],
        options: &GraphOptions,
    ) -> Option<(Vec<usize>, Vec<(usize, usize)>)> {
        let mut visited: HashSet<usize> = HashSet::new();
        let mut edges: Vec<(usize, usize)> = Vec::new();
        let mut queue: VecDeque<(usize, usize)> = VecDeque::new();

        for &root in roots {
            if visited.insert(root) {
                queue.push_back((root, 0));
            }
        }

        while let Some((node, depth)) = queue.pop_front() {
            if options.depth.is_some_and(|max| depth >= max) {
                continue;
            }
            let mut neighbors: Vec<(usize, usize, bool)> = Vec::new();
            if matches!(options.direction, Direction::Forward | Direction::Both) {
                neighbors.extend(forward[node].iter().map(|&n| (node, n, true)));
            }
            if matches!(options.direction, Direction::Reverse | Direction::Both) {
                neighbors.extend(reverse[node].iter().map(|&n| (n, node, false)));
            }
            for (from, to, is_forward) in neighbors {
                edges.push((from, to));
                let next = if is_forward { to } else { from };
                if visited.insert(next) {
                    queue.push_back((next, depth + 1));
                }
                if visited.len() > MAX_NODES || edges.len() > MAX_EDGES {
                    return None;
                }
            }
        }

        Some((visited.into_iter().collect(), edges))
    }

    fn materialize(
        &self,
        files: Vec<&String>,
        reached: Vec<usize>,
        edges: Vec<(usize, usize)>,
        options: &GraphOptions,
        truncated: bool,
    ) -> CodeGraph {
        let node_id = |idx: usize| -> String {
            if options.module_level {
                module_of(files[idx])
            } else {
                files[idx].clone()
            }
        };

        let mut nodes: Vec<GraphNode> = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();
        for &idx in &reached {
            let id = node_id(idx);
            if !seen_ids.insert(id.clone()) {
                continue;
            }
            let complexity = options
                .include_complexity
                .then(|| {
                    if options.module_level {
                        // Max across the directory's files.
                        reached
                            .iter()
                            .filter(|&&other| node_id(other) == id)
                            .filter_map(|&other| self.complexity_by_file.get(files[other].as_str()))
                            .copied()
                            .max()
                    } else {
                        self.complexity_by_file.get(files[idx].as_str()).copied()
                    }
                })
                .flatten();
            nodes.push(GraphNode {
                label: id.rsplit('/').next().unwrap_or(&id).to_string(),
                node_type: if options.module_level { "module" } else { "file" },
                file_path: id.clone(),
                complexity,
                id,
            });
        }

        let mut edge_set: HashSet<GraphEdge> = HashSet::new();
        for (from, to) in edges {
            let from_id = node_id(from);
            let to_id = node_id(to);
            if from_id == to_id {
                // Module collapsing can fold an edge into a self-loop.
                continue;
            }
            edge_set.insert(GraphEdge {
                from: from_id,
                to: to_id,
                edge_type: "imports",
            });
        }
        let edges: Vec<GraphEdge> = edge_set
            .into_iter()
            .sorted_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)))
            .collect();

        CodeGraph {
            nodes,
            edges,
            root_files: options.root_files.clone(),
            depth: options.depth,
            direction: options.direction,
            module_level: options.module_level,
            truncated,
        }
    }
}

/// Flat fallback: each root plus its direct neighbors, bounded per node.
fn direct_edges(
    roots: &[usize],
    forward: &[Vec<usize>],
    reverse: &[Vec<usize>],
    options: &GraphOptions,
) -> (Vec<usize>, Vec<(usize, usize)>) {
    let mut reached: Vec<usize> = Vec::new();
    let mut edges: Vec<(usize, usize)> = Vec::new();
    for &root in roots {
        reached.push(root);
        if matches!(options.direction, Direction::Forward | Direction::Both) {
            for &to in forward[root].iter().take(MAX_EDGES_PER_NODE) {
                reached.push(to);
                edges.push((root, to));
            }
        }
        if matches!(options.direction, Direction::Reverse | Direction::Both) {
            for &from in reverse[root].iter().take(MAX_EDGES_PER_NODE) {
                reached.push(from);
                edges.push((from, root));
            }
        }
        if edges.len() >= MAX_EDGES {
            break;
        }
    }
    (reached, edges)
}

fn module_of(file: &str) -> String {
    match file.rsplit_once('/') {
        Some((dir, _)) => dir.to_string(),
        None => ".".to_string(),
    }
}
