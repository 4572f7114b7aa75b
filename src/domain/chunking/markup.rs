//! Section chunking for markup formats (Vue SFCs, Liquid templates)
//!
//! Markup files are split at top-level section boundaries: `<template>` /
//! `<script>` / `<style>` blocks for Vue, `{% ... %}` block tags for
//! Liquid. Each section becomes a `module` chunk; loose content between
//! sections becomes `block` chunks.

use crate::domain::types::{ChunkKind, CodeChunk, Language};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static VUE_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*<(template|script|style)\b").expect("static pattern"));

static LIQUID_SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\{%-?\s*(section|schema|block|form|for|if|unless|case|capture|paginate)\b")
        .expect("static pattern")
});

/// Chunk a markup file by its top-level sections.
pub fn chunk_markup(file_path: &str, content: &str, language: Language) -> Vec<CodeChunk> {
    let section_start = match language {
        Language::Vue => &*VUE_SECTION,
        _ => &*LIQUID_SECTION,
    };

    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }

    // Collect the 1-based start line of every top-level section opener; each
    // section runs until the next opener (or EOF).
    let mut boundaries: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| section_start.is_match(line))
        .map(|(i, _)| i + 1)
        .collect();
    if boundaries.first() != Some(&1) {
        boundaries.insert(0, 1);
    }
    boundaries.push(lines.len() + 1);

    let mut chunks = Vec::new();
    for window in boundaries.windows(2) {
        let (start, next) = (window[0], window[1]);
        let end = next - 1;
        if end < start {
            continue;
        }
        let text = lines[start - 1..end].join("\n");
        if text.trim().is_empty() {
            continue;
        }
        let is_section = section_start.is_match(lines[start - 1]);
        let symbol_name = is_section.then(|| section_name(lines[start - 1]));
        chunks.push(CodeChunk {
            content: text,
            file: file_path.to_string(),
            start_line: start as u32,
            end_line: end as u32,
            language,
            kind: if is_section { ChunkKind::Module } else { ChunkKind::Block },
            symbol_name,
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
    chunks
}

fn section_name(opening_line: &str) -> String {
    opening_line
        .trim()
        .trim_start_matches('<')
        .trim_start_matches("{%")
        .trim_start_matches('-')
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .find(|s| !s.is_empty())
        .unwrap_or("section")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vue_sfc_splits_into_sections() {
        let source = "<template>\n  <div>{{ msg }}</div>\n</template>\n<script>\nexport default {}\n</script>\n<style>\n.a {}\n</style>\n";
        let chunks = chunk_markup("App.vue", source, Language::Vue);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.kind == ChunkKind::Module));
        assert_eq!(chunks[0].symbol_name.as_deref(), Some("template"));
        assert_eq!(chunks[1].symbol_name.as_deref(), Some("script"));
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[2].end_line, 9);
    }

    #[test]
    fn liquid_loose_prefix_becomes_block() {
        let source = "Hello {{ name }}\n{% section 'header' %}\n  content\n{% endsection %}\n";
        let chunks = chunk_markup("page.liquid", source, Language::Liquid);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].kind, ChunkKind::Block);
        assert_eq!(chunks[1].kind, ChunkKind::Module);
        assert_eq!(chunks[1].symbol_name.as_deref(), Some("section"));
    }
}
