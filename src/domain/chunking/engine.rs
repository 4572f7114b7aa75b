//! Tree-sitter chunk extraction engine
//!
//! Walks a parsed syntax tree and emits one chunk per declaration (plus
//! nested functions/methods/classes), then groups the remaining top-level
//! regions into `module`/`block` chunks so coverage stays contiguous.

use super::languages::LanguageSpec;
use super::metrics::MetricsComputer;
use crate::domain::error::{Error, Result};
use crate::domain::types::{CallSite, ChunkKind, CodeChunk, Language};
use std::collections::{BTreeSet, HashSet};
use tree_sitter::{Node, Parser};

/// Maximum characters kept for a declaration signature.
const MAX_SIGNATURE_CHARS: usize = 200;

/// Field names probed for a declaration's parameter list.
const PARAMETER_CONTAINER_KINDS: &[&str] = &[
    "parameters",
    "formal_parameters",
    "parameter_list",
    "method_parameters",
    "parameter_clause",
    "function_value_parameters",
];

/// Field names probed, in order, for a call's callee.
const CALLEE_FIELDS: &[&str] = &["function", "name", "method", "macro", "constructor"];

/// One extracted declaration before chunk assembly.
struct Candidate<'t> {
    /// Node covering the emitted span (wrapper when present)
    span: Node<'t>,
    /// The declaration node itself (name, params, body)
    decl: Node<'t>,
    kind: ChunkKind,
}

/// AST-based chunker for one language spec.
pub struct AstChunker<'s> {
    spec: &'s LanguageSpec,
}

impl<'s> AstChunker<'s> {
    /// Create a chunker for the given language spec.
    pub fn new(spec: &'s LanguageSpec) -> Self {
        Self { spec }
    }

    /// Parse and chunk one file.
    ///
    /// Fails when the grammar cannot produce a usable tree; the caller
    /// decides between line-based fallback and surfacing the error.
    pub fn chunk(&self, file_path: &str, content: &str) -> Result<Vec<CodeChunk>> {
        let mut parser = Parser::new();
        parser
            .set_language(&(self.spec.grammar)())
            .map_err(|e| Error::parse(file_path, format!("grammar load failed: {e}")))?;

        let tree = parser
            .parse(content, None)
            .ok_or_else(|| Error::parse(file_path, "parser returned no tree"))?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(Error::parse(file_path, "syntax errors in tree"));
        }

        let lines: Vec<&str> = content.lines().collect();
        let imports = self.collect_imports(root, content);
        let exports = self.collect_exports(root, content);

        let candidates = self.collect_candidates(root, content);
        let mut chunks = Vec::new();
        let mut emitted_ranges: HashSet<(u32, u32)> = HashSet::new();
        // Node ids claimed by declarations (wrappers, inner decls, doc comments):
        // excluded from the gap regions below.
        let mut claimed: HashSet<usize> = HashSet::new();
        let metrics = MetricsComputer::new(self.spec);

        for candidate in &candidates {
            let span_start = candidate.span.start_position().row as u32 + 1;
            let span_end = candidate.span.end_position().row as u32 + 1;
            if !emitted_ranges.insert((span_start, span_end)) {
                continue;
            }
            claimed.insert(candidate.span.id());
            claimed.insert(candidate.decl.id());

            let doc_start = self.leading_doc_start(candidate.span, &mut claimed);
            let start_line = doc_start.unwrap_or(span_start);
            let content_text = slice_lines(&lines, start_line, span_end);

            let symbol_name = self.node_name(candidate.decl, content).or_else(|| {
                matches!(candidate.kind, ChunkKind::Function | ChunkKind::Method)
                    .then(|| "anonymous".to_string())
            });
            let parent_class = self.enclosing_class_name(candidate.decl, content);
            let is_function = matches!(candidate.kind, ChunkKind::Function | ChunkKind::Method);

            let (complexity, cognitive, halstead) = if is_function {
                (
                    metrics.cyclomatic(candidate.decl),
                    metrics.cognitive(candidate.decl),
                    metrics.halstead(candidate.decl, content),
                )
            } else {
                (0, 0, Default::default())
            };

            chunks.push(CodeChunk {
                content: content_text,
                file: file_path.to_string(),
                start_line,
                end_line: span_end,
                language: self.spec.language,
                kind: candidate.kind,
                symbol_name,
                symbol_type: Some(candidate.kind),
                parent_class,
                complexity,
                cognitive_complexity: cognitive,
                halstead,
                parameters: self.parameters(candidate.decl, content),
                signature: self.signature(candidate.span, candidate.decl, content),
                imports: imports.clone(),
                exports: exports.clone(),
                call_sites: self.call_sites(candidate.decl, content),
            });
        }

        self.emit_gap_regions(root, &lines, &claimed, &imports, &exports, file_path, &mut chunks);

        chunks.sort_by_key(|c| (c.start_line, std::cmp::Reverse(c.end_line)));
        Ok(chunks)
    }

    /// Depth-first candidate collection. Wrappers (export statements,
    /// decorated definitions) claim their inner declaration so overlapping
    /// declarations are emitted once under the outer span.
    fn collect_candidates<'t>(&self, root: Node<'t>, source: &str) -> Vec<Candidate<'t>> {
        let mut out = Vec::new();
        let mut wrapped: HashSet<usize> = HashSet::new();
        let mut stack = vec![root];
        let mut ordered = Vec::new();
        while let Some(node) = stack.pop() {
            ordered.push(node);
            for i in (0..node.child_count()).rev() {
                if let Some(child) = node.child(i as u32) {
                    stack.push(child);
                }
            }
        }

        for node in ordered {
            let kind = node.kind();
            if self.spec.wrappers.contains(&kind) {
                if let Some(inner) = self.inner_declaration(node) {
                    wrapped.insert(inner.id());
                    out.push(Candidate {
                        span: node,
                        decl: inner,
                        kind: self.resolve_kind(inner),
                    });
                } else if let Some((decl, inner_kind)) = self.function_valued_declarator(node, source) {
                    wrapped.insert(decl.id());
                    out.push(Candidate {
                        span: node,
                        decl,
                        kind: inner_kind,
                    });
                }
                continue;
            }
            if wrapped.contains(&node.id()) {
                continue;
            }
            if self.declared_kind(kind).is_some() {
                out.push(Candidate {
                    span: node,
                    decl: node,
                    kind: self.resolve_kind(node),
                });
                continue;
            }
            // `const f = () => {}` style function-valued bindings.
            if matches!(kind, "lexical_declaration" | "variable_declaration")
                && matches!(
                    self.spec.language,
                    Language::JavaScript | Language::TypeScript
                )
            {
                if let Some((decl, inner_kind)) = self.function_valued_declarator(node, source) {
                    wrapped.insert(decl.id());
                    out.push(Candidate {
                        span: node,
                        decl,
                        kind: inner_kind,
                    });
                }
            }
        }

        out.sort_by_key(|c| {
            (
                c.span.start_position().row,
                std::cmp::Reverse(c.span.end_position().row),
            )
        });
        out
    }

    fn declared_kind(&self, kind: &str) -> Option<ChunkKind> {
        self.spec
            .declarations
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, chunk_kind)| *chunk_kind)
    }

    /// Functions nested inside a class-like container become methods.
    fn resolve_kind(&self, decl: Node<'_>) -> ChunkKind {
        let mapped = self.declared_kind(decl.kind()).unwrap_or(ChunkKind::Block);
        if mapped == ChunkKind::Function && self.enclosing_class(decl).is_some() {
            return ChunkKind::Method;
        }
        mapped
    }

    fn inner_declaration<'t>(&self, wrapper: Node<'t>) -> Option<Node<'t>> {
        let mut cursor = wrapper.walk();
        let found = wrapper
            .named_children(&mut cursor)
            .find(|child| self.declared_kind(child.kind()).is_some());
        found
    }

    /// Detect `const name = <function>` declarators; returns the declarator
    /// node (for naming) and the chunk kind.
    fn function_valued_declarator<'t>(
        &self,
        node: Node<'t>,
        _source: &str,
    ) -> Option<(Node<'t>, ChunkKind)> {
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            if n.kind() == "variable_declarator" {
                let value = n.child_by_field_name("value")?;
                if matches!(
                    value.kind(),
                    "arrow_function" | "function_expression" | "function" | "generator_function"
                ) {
                    let kind = if self.enclosing_class(n).is_some() {
                        ChunkKind::Method
                    } else {
                        ChunkKind::Function
                    };
                    return Some((n, kind));
                }
                return None;
            }
            let mut cursor = n.walk();
            for child in n.named_children(&mut cursor) {
                stack.push(child);
            }
        }
        None
    }

    fn enclosing_class<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        let mut current = node.parent();
        while let Some(n) = current {
            if self.spec.class_containers.contains(&n.kind()) {
                // Containers that are bodies (class_body, declaration_list)
                // resolve to their named parent.
                if n.child_by_field_name("name").is_some()
                    || n.child_by_field_name("type").is_some()
                {
                    return Some(n);
                }
                if let Some(parent) = n.parent() {
                    return Some(parent);
                }
                return Some(n);
            }
            current = n.parent();
        }
        None
    }

    fn enclosing_class_name(&self, node: Node<'_>, source: &str) -> Option<String> {
        let class = self.enclosing_class(node)?;
        self.node_name(class, source)
    }

    fn node_name(&self, node: Node<'_>, source: &str) -> Option<String> {
        for field in ["name", "declarator", "type"] {
            if let Some(child) = node.child_by_field_name(field) {
                if let Some(name) = identifier_text(child, source) {
                    return Some(name);
                }
            }
        }
        // Shallow scan for a first identifier-like child.
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind().ends_with("identifier") || child.kind() == "identifier" {
                return Some(node_text(child, source));
            }
        }
        None
    }

    fn parameters(&self, decl: Node<'_>, source: &str) -> Vec<String> {
        let container = self.find_parameter_container(decl, 0);
        let Some(container) = container else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut cursor = container.walk();
        for child in container.named_children(&mut cursor) {
            if child.kind().contains("comment") {
                continue;
            }
            if let Some(name) = identifier_text(child, source) {
                out.push(name);
            } else {
                let text = node_text(child, source);
                if !text.is_empty() {
                    out.push(text);
                }
            }
        }
        out
    }

    fn find_parameter_container<'t>(&self, node: Node<'t>, depth: usize) -> Option<Node<'t>> {
        if depth > 3 {
            return None;
        }
        if let Some(params) = node.child_by_field_name("parameters") {
            return Some(params);
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if PARAMETER_CONTAINER_KINDS.contains(&child.kind()) {
                return Some(child);
            }
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            // Declarator chains (C) and function-valued bindings (arrow
            // functions behind a declarator) both nest the parameter list.
            if child.kind().contains("declarator") || child.kind().contains("function") {
                if let Some(found) = self.find_parameter_container(child, depth + 1) {
                    return Some(found);
                }
            }
        }
        None
    }

    fn signature(&self, span: Node<'_>, decl: Node<'_>, source: &str) -> String {
        let body_start = decl
            .child_by_field_name("body")
            .map(|b| b.start_byte())
            .unwrap_or_else(|| decl.end_byte());
        let start = span.start_byte();
        let end = body_start.max(start).min(source.len());
        let raw = &source[start..end];
        let collapsed: String = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut signature = collapsed.trim().trim_end_matches('{').trim().to_string();
        if signature.is_empty() {
            signature = node_text(decl, source).lines().next().unwrap_or("").trim().to_string();
        }
        if signature.len() > MAX_SIGNATURE_CHARS {
            let mut cut = MAX_SIGNATURE_CHARS;
            while cut > 0 && !signature.is_char_boundary(cut) {
                cut -= 1;
            }
            signature.truncate(cut);
        }
        signature
    }

    fn call_sites(&self, decl: Node<'_>, source: &str) -> Vec<CallSite> {
        let mut sites = Vec::new();
        let mut stack = vec![decl];
        while let Some(node) = stack.pop() {
            if node.id() != decl.id() && self.spec.calls.contains(&node.kind()) {
                if let Some(symbol) = self.callee_name(node, source) {
                    sites.push(CallSite {
                        symbol,
                        line: node.start_position().row as u32 + 1,
                    });
                }
            }
            for i in (0..node.child_count()).rev() {
                if let Some(child) = node.child(i as u32) {
                    stack.push(child);
                }
            }
        }
        sites.sort_by_key(|s| s.line);
        sites
    }

    fn callee_name(&self, call: Node<'_>, source: &str) -> Option<String> {
        for field in CALLEE_FIELDS {
            if let Some(target) = call.child_by_field_name(field) {
                return rightmost_identifier(target, source);
            }
        }
        // Grammars without a callee field: first named child.
        call.named_child(0)
            .and_then(|c| rightmost_identifier(c, source))
    }

    fn leading_doc_start(&self, span: Node<'_>, claimed: &mut HashSet<usize>) -> Option<u32> {
        let mut start: Option<u32> = None;
        let mut expected_row = span.start_position().row;
        let mut sibling = span.prev_sibling();
        while let Some(node) = sibling {
            if !self.spec.comments.contains(&node.kind()) {
                break;
            }
            let end_row = node.end_position().row;
            if end_row + 1 != expected_row {
                break;
            }
            claimed.insert(node.id());
            expected_row = node.start_position().row;
            start = Some(node.start_position().row as u32 + 1);
            sibling = node.prev_sibling();
        }
        start
    }

    /// Group top-level nodes not claimed by any declaration into contiguous
    /// `module`/`block` chunks. The first region (typically imports and
    /// module docs) is emitted as `module`, later ones as `block`.
    #[allow(clippy::too_many_arguments)]
    fn emit_gap_regions(
        &self,
        root: Node<'_>,
        lines: &[&str],
        claimed: &HashSet<usize>,
        imports: &BTreeSet<String>,
        exports: &BTreeSet<String>,
        file_path: &str,
        chunks: &mut Vec<CodeChunk>,
    ) {
        let mut covered = vec![false; lines.len() + 2];
        for chunk in chunks.iter() {
            for line in chunk.start_line..=chunk.end_line.min(lines.len() as u32) {
                covered[line as usize] = true;
            }
        }

        let mut regions: Vec<(u32, u32)> = Vec::new();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            if claimed.contains(&child.id()) {
                continue;
            }
            let start = child.start_position().row as u32 + 1;
            let end = child.end_position().row as u32 + 1;
            if (start..=end.min(lines.len() as u32)).any(|l| covered[l as usize]) {
                continue;
            }
            match regions.last_mut() {
                Some((_, prev_end)) if start <= *prev_end + 1 => {
                    *prev_end = (*prev_end).max(end);
                }
                _ => regions.push((start, end)),
            }
        }

        let mut first = true;
        for (start, end) in regions {
            let content = slice_lines(lines, start, end);
            if content.trim().is_empty() {
                continue;
            }
            let kind = if first { ChunkKind::Module } else { ChunkKind::Block };
            first = false;
            chunks.push(CodeChunk {
                content,
                file: file_path.to_string(),
                start_line: start,
                end_line: end,
                language: self.spec.language,
                kind,
                symbol_name: None,
                symbol_type: None,
                parent_class: None,
                complexity: 0,
                cognitive_complexity: 0,
                halstead: Default::default(),
                parameters: Vec::new(),
                signature: String::new(),
                imports: imports.clone(),
                exports: exports.clone(),
                call_sites: Vec::new(),
            });
        }
    }

    fn collect_imports(&self, root: Node<'_>, source: &str) -> BTreeSet<String> {
        let mut imports = BTreeSet::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.id() != root.id() && self.spec.imports.contains(&node.kind()) {
                for spec in self.import_specifiers(node, source) {
                    imports.insert(spec);
                }
            }
            for i in (0..node.child_count()).rev() {
                if let Some(child) = node.child(i as u32) {
                    stack.push(child);
                }
            }
        }
        imports
    }

    fn import_specifiers(&self, node: Node<'_>, source: &str) -> Vec<String> {
        match node.kind() {
            "use_declaration" => {
                let text = node_text(node, source);
                let trimmed = text
                    .trim_start_matches("pub")
                    .trim()
                    .trim_start_matches("use")
                    .trim()
                    .trim_end_matches(';')
                    .trim();
                if trimmed.is_empty() {
                    vec![]
                } else {
                    vec![trimmed.to_string()]
                }
            }
            "import_from_statement" => node
                .child_by_field_name("module_name")
                .map(|m| vec![node_text(m, source)])
                .unwrap_or_default(),
            "preproc_include" => node
                .child_by_field_name("path")
                .map(|p| vec![strip_quotes(&node_text(p, source))])
                .unwrap_or_default(),
            // Ruby requires arrive as plain call nodes.
            "call" => {
                let method = node
                    .child_by_field_name("method")
                    .map(|m| node_text(m, source))
                    .unwrap_or_default();
                if matches!(method.as_str(), "require" | "require_relative" | "load") {
                    string_descendants(node, source)
                } else {
                    vec![]
                }
            }
            _ => {
                // JS/TS `import ... from "x"` exposes a source field.
                if let Some(src) = node.child_by_field_name("source") {
                    return vec![strip_quotes(&node_text(src, source))];
                }
                let strings = string_descendants(node, source);
                if !strings.is_empty() {
                    return strings;
                }
                let mut found = Vec::new();
                let mut stack = vec![node];
                while let Some(n) = stack.pop() {
                    if matches!(
                        n.kind(),
                        "dotted_name"
                            | "scoped_identifier"
                            | "qualified_name"
                            | "namespace_name"
                            | "qualified_identifier"
                            | "identifier"
                    ) {
                        found.push(node_text(n, source));
                        continue;
                    }
                    let mut cursor = n.walk();
                    for child in n.named_children(&mut cursor) {
                        stack.push(child);
                    }
                }
                found.reverse();
                // Keep at most the leading specifier names; keywords like
                // `import` are anonymous tokens and never land here.
                found.truncate(4);
                found
            }
        }
    }

    fn collect_exports(&self, root: Node<'_>, source: &str) -> BTreeSet<String> {
        let mut exports = BTreeSet::new();
        match self.spec.language {
            Language::JavaScript | Language::TypeScript => {
                let mut stack = vec![root];
                while let Some(node) = stack.pop() {
                    if node.kind() == "export_statement" {
                        if let Some(decl) = node.child_by_field_name("declaration") {
                            if let Some(name) = self.node_name(decl, source) {
                                exports.insert(name);
                            } else if let Some((declarator, _)) =
                                self.function_valued_declarator(decl, source)
                            {
                                if let Some(name) = self.node_name(declarator, source) {
                                    exports.insert(name);
                                }
                            }
                        }
                        let mut cursor = node.walk();
                        for child in node.named_children(&mut cursor) {
                            if child.kind() == "export_clause" {
                                let mut inner = child.walk();
                                for spec_node in child.named_children(&mut inner) {
                                    if let Some(name) = identifier_text(spec_node, source) {
                                        exports.insert(name);
                                    }
                                }
                            }
                        }
                    }
                    for i in (0..node.child_count()).rev() {
                        if let Some(child) = node.child(i as u32) {
                            stack.push(child);
                        }
                    }
                }
            }
            Language::Rust => {
                let mut cursor = root.walk();
                for child in root.named_children(&mut cursor) {
                    let mut inner = child.walk();
                    let is_pub = child
                        .named_children(&mut inner)
                        .any(|c| c.kind() == "visibility_modifier");
                    if is_pub {
                        if let Some(name) = self.node_name(child, source) {
                            exports.insert(name);
                        }
                    }
                }
            }
            Language::Go => {
                let mut cursor = root.walk();
                for child in root.named_children(&mut cursor) {
                    if self.declared_kind(child.kind()).is_some() {
                        if let Some(name) = self.node_name(child, source) {
                            if name.chars().next().is_some_and(|c| c.is_uppercase()) {
                                exports.insert(name);
                            }
                        }
                    }
                }
            }
            Language::Python => {
                let mut cursor = root.walk();
                for child in root.named_children(&mut cursor) {
                    if matches!(child.kind(), "function_definition" | "class_definition") {
                        if let Some(name) = self.node_name(child, source) {
                            if !name.starts_with('_') {
                                exports.insert(name);
                            }
                        }
                    }
                }
            }
            Language::Php => {
                let mut cursor = root.walk();
                for child in root.named_children(&mut cursor) {
                    if self.declared_kind(child.kind()).is_some() {
                        if let Some(name) = self.node_name(child, source) {
                            exports.insert(name);
                        }
                    }
                }
            }
            _ => {}
        }
        exports
    }
}

fn slice_lines(lines: &[&str], start_line: u32, end_line: u32) -> String {
    let start = (start_line.saturating_sub(1)) as usize;
    let end = (end_line as usize).min(lines.len());
    if start >= end {
        return String::new();
    }
    lines[start..end].join("\n")
}

fn node_text(node: Node<'_>, source: &str) -> String {
    source[node.start_byte()..node.end_byte().min(source.len())].to_string()
}

fn strip_quotes(text: &str) -> String {
    text.trim_matches(|c| matches!(c, '"' | '\'' | '`' | '<' | '>')).to_string()
}

/// Collect string-literal descendants (de-quoted), in source order.
fn string_descendants(node: Node<'_>, source: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        if n.kind().contains("string") && !n.kind().contains("fragment") {
            let text = strip_quotes(node_text(n, source).trim());
            if !text.is_empty() {
                out.push(text);
            }
            continue;
        }
        for i in (0..n.named_child_count()).rev() {
            if let Some(child) = n.named_child(i as u32) {
                stack.push(child);
            }
        }
    }
    out
}

fn identifier_text(node: Node<'_>, source: &str) -> Option<String> {
    if node.kind().ends_with("identifier")
        || matches!(node.kind(), "identifier" | "type_identifier" | "constant")
    {
        return Some(node_text(node, source));
    }
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        if n.kind().ends_with("identifier") || n.kind() == "identifier" {
            return Some(node_text(n, source));
        }
        for i in (0..n.named_child_count()).rev() {
            if let Some(child) = n.named_child(i as u32) {
                stack.push(child);
            }
        }
    }
    None
}

/// Rightmost identifier under a callee expression: `a.b.c(` resolves to `c`.
fn rightmost_identifier(node: Node<'_>, source: &str) -> Option<String> {
    if node.kind().ends_with("identifier") || node.kind() == "identifier" {
        return Some(node_text(node, source));
    }
    for field in ["property", "field", "name", "attribute"] {
        if let Some(child) = node.child_by_field_name(field) {
            if let Some(name) = rightmost_identifier(child, source) {
                return Some(name);
            }
        }
    }
    let mut last = None;
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if let Some(name) = rightmost_identifier(child, source) {
            last = Some(name);
        }
    }
    last
}
