//! Code Intelligence Domain Model
//!
//! Defines the fundamental entities of the indexing pipeline, from AST-derived
//! code chunks to search results and tenant isolation scopes.
//!
//! ## Core Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`CodeChunk`] | Semantically meaningful code segment from AST parsing |
//! | [`ChunkMetadata`] | Stored row payload: chunk fields plus tenant scope |
//! | [`Language`] | Supported languages (closed set, 17 variants) |
//! | [`ChunkKind`] | Structural classification of a chunk |
//! | [`TenantScope`] | `(org, repo, branch, commit)` isolation quadruple |
//! | [`SearchResult`] | Ranked result from semantic search |
//! | [`VectorRow`] | Full stored row (content + metadata + vector) |
//! | [`IndexingResult`] | Outcome summary of an indexing run |

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use validator::Validate;

/// Maximum bytes of chunk content persisted per row. Longer chunks are
/// truncated at a char boundary before storage.
pub const MAX_CHUNK_CONTENT_BYTES: usize = 8192;

/// Supported programming languages for AST parsing.
///
/// Each grammar-backed variant corresponds to a tree-sitter grammar used by
/// the chunking engine. `Vue` and `Liquid` are markup formats chunked by
/// top-level sections; `Scala` and `Unknown` fall back to line-based
/// chunking.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// TypeScript (including `.tsx`)
    TypeScript,
    /// JavaScript (including `.jsx`, `.mjs`, `.cjs`)
    JavaScript,
    /// Python
    Python,
    /// PHP
    Php,
    /// Go
    Go,
    /// Rust
    Rust,
    /// Java
    Java,
    /// C
    C,
    /// C++
    Cpp,
    /// C#
    CSharp,
    /// Ruby
    Ruby,
    /// Swift
    Swift,
    /// Kotlin
    Kotlin,
    /// Scala (line-based fallback, no grammar wired)
    Scala,
    /// Vue single-file components (section chunking)
    Vue,
    /// Liquid templates (section chunking)
    Liquid,
    /// Unrecognized extension; plain-text chunking
    Unknown,
}

impl Language {
    /// Map a file extension (without dot) to a language.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "ts" | "tsx" | "mts" | "cts" => Language::TypeScript,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "py" | "pyi" => Language::Python,
            "php" => Language::Php,
            "go" => Language::Go,
            "rs" => Language::Rust,
            "java" => Language::Java,
            "c" | "h" => Language::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Language::Cpp,
            "cs" => Language::CSharp,
            "rb" => Language::Ruby,
            "swift" => Language::Swift,
            "kt" | "kts" => Language::Kotlin,
            "scala" | "sc" => Language::Scala,
            "vue" => Language::Vue,
            "liquid" => Language::Liquid,
            _ => Language::Unknown,
        }
    }

    /// Map a repository-relative path to a language via its extension.
    pub fn from_path(path: &str) -> Self {
        path.rsplit('.')
            .next()
            .filter(|ext| !ext.contains('/'))
            .map_or(Language::Unknown, Self::from_extension)
    }

    /// Stable lowercase identifier used in filters and serialized rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Php => "php",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Ruby => "ruby",
            Language::Swift => "swift",
            Language::Kotlin => "kotlin",
            Language::Scala => "scala",
            Language::Vue => "vue",
            Language::Liquid => "liquid",
            Language::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Language {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "typescript" => Language::TypeScript,
            "javascript" => Language::JavaScript,
            "python" => Language::Python,
            "php" => Language::Php,
            "go" => Language::Go,
            "rust" => Language::Rust,
            "java" => Language::Java,
            "c" => Language::C,
            "cpp" => Language::Cpp,
            "csharp" => Language::CSharp,
            "ruby" => Language::Ruby,
            "swift" => Language::Swift,
            "kotlin" => Language::Kotlin,
            "scala" => Language::Scala,
            "vue" => Language::Vue,
            "liquid" => Language::Liquid,
            _ => Language::Unknown,
        })
    }
}

/// Structural classification of a chunk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    /// Free-standing function
    Function,
    /// Function bound to a class/impl/trait
    Method,
    /// Class, struct, impl block or equivalent
    Class,
    /// Interface, trait, protocol
    Interface,
    /// Top-of-file region (imports, module docs, top-level statements)
    Module,
    /// Any other contiguous region
    Block,
}

impl ChunkKind {
    /// Stable lowercase identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Function => "function",
            ChunkKind::Method => "method",
            ChunkKind::Class => "class",
            ChunkKind::Interface => "interface",
            ChunkKind::Module => "module",
            ChunkKind::Block => "block",
        }
    }

    /// Kinds that identify a named symbol (used by symbol queries).
    pub fn is_symbol(&self) -> bool {
        matches!(
            self,
            ChunkKind::Function | ChunkKind::Method | ChunkKind::Class | ChunkKind::Interface
        )
    }
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An identifier observed in call position inside a chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallSite {
    /// Callee symbol as written in source
    pub symbol: String,
    /// 1-based source line, always within the owning chunk's range
    pub line: u32,
}

/// Halstead complexity suite computed from operator/operand counts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct HalsteadMetrics {
    /// `volume = N * log2(n)`
    pub volume: f64,
    /// `difficulty = (n1 / 2) * (N2 / n2)`
    pub difficulty: f64,
    /// `effort = difficulty * volume`
    pub effort: f64,
    /// `bugs = volume / 3000`
    pub bugs: f64,
}

/// Tenant isolation scope.
///
/// Every stored row belongs to exactly one `(org_id, repo_id, branch,
/// commit_sha)` quadruple. The remote backend requires all four to be
/// non-empty; the embedded backend synthesizes stable locals from the
/// project root when git is absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Validate)]
pub struct TenantScope {
    /// Organization identifier (collection selector for the remote backend)
    #[validate(length(min = 1, message = "org_id cannot be empty"))]
    pub org_id: String,
    /// Repository identifier
    #[validate(length(min = 1, message = "repo_id cannot be empty"))]
    pub repo_id: String,
    /// Branch name
    #[validate(length(min = 1, message = "branch cannot be empty"))]
    pub branch: String,
    /// Commit SHA (or a stable local synthetic)
    #[validate(length(min = 1, message = "commit_sha cannot be empty"))]
    pub commit_sha: String,
}

impl TenantScope {
    /// Synthesize a deterministic local scope from a project root path.
    ///
    /// The repo id combines the directory name with an 8-hex hash of the
    /// canonical path so that two checkouts with the same name stay
    /// isolated.
    pub fn local_for(root: &std::path::Path) -> Self {
        let canonical = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let hash = seahash::hash(canonical.to_string_lossy().as_bytes());
        let name = canonical
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string());
        Self {
            org_id: "local".to_string(),
            repo_id: format!("{}-{:08x}", name, (hash >> 32) as u32),
            branch: "main".to_string(),
            commit_sha: "workspace".to_string(),
        }
    }
}

/// Intelligent code segment produced by the chunking engine.
///
/// A chunk is the unit of storage: one declaration (or contiguous region)
/// with its structural metadata and complexity metrics. Tenant identity is
/// attached at insertion time via [`ChunkMetadata::from_chunk`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeChunk {
    /// Chunk text, truncated to [`MAX_CHUNK_CONTENT_BYTES`]
    pub content: String,
    /// Repository-relative path with forward slashes
    pub file: String,
    /// Inclusive 1-based start line
    pub start_line: u32,
    /// Inclusive 1-based end line
    pub end_line: u32,
    /// Source language
    pub language: Language,
    /// Structural kind
    pub kind: ChunkKind,
    /// Declared symbol name, if any (`"anonymous"` for unnamed functions)
    pub symbol_name: Option<String>,
    /// Symbol classification, set for declaration chunks
    pub symbol_type: Option<ChunkKind>,
    /// Enclosing class/impl name for methods
    pub parent_class: Option<String>,
    /// Cyclomatic complexity (1 + decision points)
    pub complexity: u32,
    /// Sonar-style cognitive complexity
    pub cognitive_complexity: u32,
    /// Halstead metric suite
    pub halstead: HalsteadMetrics,
    /// Ordered parameter names
    pub parameters: Vec<String>,
    /// Declaration signature (first line up to the body)
    pub signature: String,
    /// File-level import specifiers, replicated into every chunk
    pub imports: BTreeSet<String>,
    /// File-level exported symbol names, replicated into every chunk
    pub exports: BTreeSet<String>,
    /// Identifiers in call position within this chunk's range
    pub call_sites: Vec<CallSite>,
}

impl CodeChunk {
    /// Number of source lines covered by this chunk.
    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

/// Stored row payload: all chunk fields except content, plus tenant scope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    /// Tenant isolation scope
    pub scope: TenantScope,
    /// Repository-relative path with forward slashes
    pub file: String,
    /// Inclusive 1-based start line
    pub start_line: u32,
    /// Inclusive 1-based end line
    pub end_line: u32,
    /// Source language
    pub language: Language,
    /// Structural kind
    pub kind: ChunkKind,
    /// Declared symbol name, if any
    pub symbol_name: Option<String>,
    /// Symbol classification
    pub symbol_type: Option<ChunkKind>,
    /// Enclosing class/impl name for methods
    pub parent_class: Option<String>,
    /// Cyclomatic complexity
    pub complexity: u32,
    /// Cognitive complexity
    pub cognitive_complexity: u32,
    /// Halstead metric suite
    pub halstead: HalsteadMetrics,
    /// Ordered parameter names
    pub parameters: Vec<String>,
    /// Declaration signature
    pub signature: String,
    /// File-level import specifiers
    pub imports: BTreeSet<String>,
    /// File-level exported symbol names
    pub exports: BTreeSet<String>,
    /// Identifiers in call position
    pub call_sites: Vec<CallSite>,
}

impl ChunkMetadata {
    /// Attach a tenant scope to a chunk, producing the stored payload.
    pub fn from_chunk(chunk: &CodeChunk, scope: &TenantScope) -> Self {
        Self {
            scope: scope.clone(),
            file: chunk.file.clone(),
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            language: chunk.language,
            kind: chunk.kind,
            symbol_name: chunk.symbol_name.clone(),
            symbol_type: chunk.symbol_type,
            parent_class: chunk.parent_class.clone(),
            complexity: chunk.complexity,
            cognitive_complexity: chunk.cognitive_complexity,
            halstead: chunk.halstead,
            parameters: chunk.parameters.clone(),
            signature: chunk.signature.clone(),
            imports: chunk.imports.clone(),
            exports: chunk.exports.clone(),
            call_sites: chunk.call_sites.clone(),
        }
    }

    /// Row identity within a tenant scope.
    pub fn row_key(&self) -> (String, u32, u32) {
        (self.file.clone(), self.start_line, self.end_line)
    }

    /// Number of source lines covered by this row.
    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

/// Bucketed label derived from a similarity score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceTag {
    /// Score >= 0.75
    HighlyRelevant,
    /// Score >= 0.55
    Relevant,
    /// Score >= 0.35
    LooselyRelated,
    /// Everything below
    NotRelevant,
}

impl RelevanceTag {
    /// Bucket a cosine similarity score.
    pub fn from_score(score: f32) -> Self {
        if score >= 0.75 {
            RelevanceTag::HighlyRelevant
        } else if score >= 0.55 {
            RelevanceTag::Relevant
        } else if score >= 0.35 {
            RelevanceTag::LooselyRelated
        } else {
            RelevanceTag::NotRelevant
        }
    }
}

/// Ranked result from vector similarity search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// Matched chunk content
    pub content: String,
    /// Stored row payload
    pub metadata: ChunkMetadata,
    /// Cosine similarity in `[0, 1]` (vectors are unit-normalized)
    pub score: f32,
    /// Bucketed relevance label
    pub relevance: RelevanceTag,
}

/// Full stored row as returned by scan operations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorRow {
    /// Chunk content
    pub content: String,
    /// Stored row payload
    pub metadata: ChunkMetadata,
    /// Unit-normalized embedding vector
    pub vector: Vec<f32>,
}

/// Outcome summary of an indexing run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexingResult {
    /// False when the run aborted on a fatal error
    pub success: bool,
    /// Files whose rows were (re)written
    pub files_indexed: u32,
    /// Chunks created across all indexed files
    pub chunks_created: u32,
    /// Wall-clock duration
    pub duration_ms: u64,
    /// True when the incremental path ran (manifest existed and was valid)
    pub incremental: bool,
    /// Fatal error message when `success` is false
    pub error: Option<String>,
}

impl IndexingResult {
    /// An empty successful result (nothing to index).
    pub fn empty(incremental: bool, duration_ms: u64) -> Self {
        Self {
            success: true,
            files_indexed: 0,
            chunks_created: 0,
            duration_ms,
            incremental,
            error: None,
        }
    }
}
