//! AST-driven code chunking
//!
//! Breaks source files into semantically meaningful segments for embedding
//! and indexing. Each chunk represents a logical unit (function, class,
//! method) extracted via tree-sitter parsing, annotated with complexity
//! metrics, imports/exports, and call sites.
//!
//! ## Strategy
//!
//! 1. **Primary**: language-specific AST extraction
//!    - Parse with the registered tree-sitter grammar
//!    - Extract top-level declarations plus nested functions/methods/classes
//!    - Emit non-declarative regions as `module`/`block` chunks so file
//!      coverage stays contiguous
//! 2. **Markup**: Vue and Liquid files chunk by top-level sections
//! 3. **Fallback**: plain line-based chunking (unknown extensions, or parse
//!    failures when [`AstFallback::LineBased`] is configured); metrics are
//!    zeroed

pub mod engine;
pub mod fallback;
pub mod languages;
pub mod markup;
pub mod metrics;

pub use engine::AstChunker;
pub use fallback::chunk_by_lines;
pub use languages::{language_spec, LanguageSpec};

use crate::domain::error::{Error, Result};
use crate::domain::types::{CodeChunk, Language, MAX_CHUNK_CONTENT_BYTES};

/// Default lines per plain-text chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 40;
/// Default overlapping lines between consecutive plain-text chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 4;

/// Behavior when AST parsing fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AstFallback {
    /// Degrade to the plain-text chunker with zeroed metrics.
    #[default]
    LineBased,
    /// Surface the parse failure; the orchestrator records the file as
    /// skipped and continues.
    Error,
}

/// Options controlling chunk extraction.
#[derive(Debug, Clone)]
pub struct ChunkingOptions {
    /// Lines per chunk for the plain-text chunker
    pub chunk_size: usize,
    /// Overlapping lines between consecutive plain-text chunks
    pub chunk_overlap: usize,
    /// Whether AST chunking is attempted at all
    pub use_ast: bool,
    /// Behavior on parse failure
    pub ast_fallback: AstFallback,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            use_ast: true,
            ast_fallback: AstFallback::default(),
        }
    }
}

/// Chunk one source file into an ordered sequence of [`CodeChunk`]s.
///
/// Language is inferred from the file extension. Grammar-backed languages go
/// through the AST engine, markup formats through the section chunker, and
/// everything else through the plain-text chunker.
pub fn chunk_file(file_path: &str, content: &str, options: &ChunkingOptions) -> Result<Vec<CodeChunk>> {
    let language = Language::from_path(file_path);

    if matches!(language, Language::Vue | Language::Liquid) {
        return Ok(markup::chunk_markup(file_path, content, language));
    }

    if options.use_ast {
        if let Some(spec) = language_spec(language) {
            match AstChunker::new(spec).chunk(file_path, content) {
                Ok(chunks) => return Ok(truncate_contents(chunks)),
                Err(err) => match options.ast_fallback {
                    AstFallback::LineBased => {
                        tracing::debug!(file = file_path, error = %err, "ast chunking failed, falling back to line-based");
                    }
                    AstFallback::Error => {
                        return Err(Error::parse(file_path, err.to_string()));
                    }
                },
            }
        }
    }

    Ok(truncate_contents(chunk_by_lines(
        file_path,
        content,
        language,
        options.chunk_size,
        options.chunk_overlap,
    )))
}

fn truncate_contents(mut chunks: Vec<CodeChunk>) -> Vec<CodeChunk> {
    for chunk in &mut chunks {
        if chunk.content.len() > MAX_CHUNK_CONTENT_BYTES {
            let mut cut = MAX_CHUNK_CONTENT_BYTES;
            while cut > 0 && !chunk.content.is_char_boundary(cut) {
                cut -= 1;
            }
            chunk.content.truncate(cut);
        }
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ChunkKind;

    #[test]
    fn unknown_extension_uses_plain_text_chunker() {
        let content = (1..=100).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let chunks = chunk_file("notes.dat", &content, &ChunkingOptions::default()).unwrap();
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.kind == ChunkKind::Block));
        assert!(chunks.iter().all(|c| c.complexity == 0));
        assert_eq!(chunks[0].start_line, 1);
    }

    #[test]
    fn parse_failure_degrades_to_line_based_by_default() {
        let garbage = "function ((((( {{{{ nope\n]]]]";
        let chunks = chunk_file("broken.ts", garbage, &ChunkingOptions::default()).unwrap();
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.complexity == 0 && c.cognitive_complexity == 0));
    }

    #[test]
    fn parse_failure_surfaces_when_configured() {
        let garbage = "function ((((( {{{{ nope\n]]]]";
        let options = ChunkingOptions {
            ast_fallback: AstFallback::Error,
            ..Default::default()
        };
        let err = chunk_file("broken.ts", garbage, &options).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn content_is_truncated_at_char_boundary() {
        let long_line = "é".repeat(MAX_CHUNK_CONTENT_BYTES);
        let chunks = chunk_file("big.dat", &long_line, &ChunkingOptions::default()).unwrap();
        assert!(chunks[0].content.len() <= MAX_CHUNK_CONTENT_BYTES);
        assert!(chunks[0].content.is_char_boundary(chunks[0].content.len()));
    }
}
