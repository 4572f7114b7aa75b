//! Plain-text fallback chunking
//!
//! Splits a file into fixed-size line windows with overlap. Used for
//! unknown extensions and as the degradation path when AST parsing fails.
//! All complexity metrics are zeroed; structure is unknown here.

use crate::domain::types::{ChunkKind, CodeChunk, Language};
use std::collections::BTreeSet;

/// Chunk content into `chunk_size`-line windows overlapping by
/// `chunk_overlap` lines.
pub fn chunk_by_lines(
    file_path: &str,
    content: &str,
    language: Language,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<CodeChunk> {
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let chunk_size = chunk_size.max(1);
    let step = chunk_size.saturating_sub(chunk_overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < lines.len() {
        let end = (start + chunk_size).min(lines.len());
        let text = lines[start..end].join("\n");
        if !text.trim().is_empty() {
            chunks.push(CodeChunk {
                content: text,
                file: file_path.to_string(),
                start_line: start as u32 + 1,
                end_line: end as u32,
                language,
                kind: ChunkKind::Block,
                symbol_name: None,
                symbol_type: None,
                parent_class: None,
                complexity: 0,
                cognitive_complexity: 0,
                halstead: Default::default(),
                parameters: Vec::new(),
                signature: String::new(),
                imports: BTreeSet::new(),
                exports: BTreeSet::new(),
                call_sites: Vec::new(),
            });
        }
        if end == lines.len() {
            break;
        }
        start += step;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_overlap_and_cover_all_lines() {
        let content = (1..=25).map(|i| format!("l{i}")).collect::<Vec<_>>().join("\n");
        let chunks = chunk_by_lines("f.txt", &content, Language::Unknown, 10, 2);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 10);
        assert_eq!(chunks[1].start_line, 9);
        assert_eq!(chunks[1].end_line, 18);
        assert_eq!(chunks.last().unwrap().end_line, 25);
        for c in &chunks {
            assert!(c.start_line <= c.end_line);
            assert_eq!(c.complexity, 0);
        }
    }

    #[test]
    fn empty_content_yields_nothing() {
        assert!(chunk_by_lines("f.txt", "", Language::Unknown, 10, 2).is_empty());
        assert!(chunk_by_lines("f.txt", "\n\n\n", Language::Unknown, 10, 2).is_empty());
    }

    #[test]
    fn overlap_larger_than_size_still_advances() {
        let content = (1..=10).map(|i| format!("l{i}")).collect::<Vec<_>>().join("\n");
        let chunks = chunk_by_lines("f.txt", &content, Language::Unknown, 3, 5);
        assert!(chunks.len() <= 10);
        assert_eq!(chunks.last().unwrap().end_line, 10);
    }
}
