//! Complexity metric computation over syntax subtrees
//!
//! Cyclomatic: 1 + decision points (branches, loops, case arms, catch
//! clauses, boolean operators, ternaries). Cognitive: Sonar-style
//! accumulator where each additional nesting level adds +1 to the step cost
//! of subsequent structural operators. Halstead: operator/operand counts
//! over the chunk's token stream.

use super::languages::LanguageSpec;
use crate::domain::types::HalsteadMetrics;
use std::collections::HashSet;
use tree_sitter::Node;

/// Token kinds classified as operands when they are not identifier-like.
const OPERAND_KINDS: &[&str] = &[
    "number",
    "integer",
    "float",
    "string_fragment",
    "string_content",
    "true",
    "false",
    "null",
    "nil",
    "none",
    "character",
    "escape_sequence",
];

/// Metric computer bound to one language spec.
pub struct MetricsComputer<'s> {
    spec: &'s LanguageSpec,
}

impl<'s> MetricsComputer<'s> {
    /// Create a computer for the given language spec.
    pub fn new(spec: &'s LanguageSpec) -> Self {
        Self { spec }
    }

    /// Cyclomatic complexity: 1 + count of decision points.
    pub fn cyclomatic(&self, node: Node<'_>) -> u32 {
        let mut count = 1u32;
        walk(node, |n| {
            let kind = n.kind();
            if self.spec.decisions.contains(&kind) {
                count += 1;
            } else if n.child_count() == 0 && self.spec.bool_operators.contains(&kind) {
                count += 1;
            }
        });
        count
    }

    /// Cognitive complexity with nesting multipliers.
    pub fn cognitive(&self, node: Node<'_>) -> u32 {
        let mut total = 0u32;
        self.cognitive_visit(node, 0, &mut total);
        total
    }

    fn cognitive_visit(&self, node: Node<'_>, nesting: u32, total: &mut u32) {
        for i in 0..node.child_count() {
            let Some(child) = node.child(i as u32) else { continue };
            let kind = child.kind();
            if self.spec.else_kinds.contains(&kind) {
                *total += 1;
                self.cognitive_visit(child, nesting + 1, total);
            } else if self.spec.nesting.contains(&kind) {
                *total += 1 + nesting;
                self.cognitive_visit(child, nesting + 1, total);
            } else if child.child_count() == 0 && self.spec.bool_operators.contains(&kind) {
                *total += 1;
            } else if self
                .spec
                .declarations
                .iter()
                .any(|(k, _)| *k == kind)
            {
                // Nested declarations raise the nesting level but cost nothing
                // themselves.
                self.cognitive_visit(child, nesting + 1, total);
            } else {
                self.cognitive_visit(child, nesting, total);
            }
        }
    }

    /// Halstead suite from operator/operand counts over the token stream.
    pub fn halstead(&self, node: Node<'_>, source: &str) -> HalsteadMetrics {
        let mut distinct_operators: HashSet<String> = HashSet::new();
        let mut distinct_operands: HashSet<String> = HashSet::new();
        let mut total_operators = 0u64;
        let mut total_operands = 0u64;

        walk(node, |n| {
            if n.child_count() != 0 {
                return;
            }
            let kind = n.kind();
            if self.spec.comments.contains(&kind) {
                return;
            }
            if is_operand_kind(kind) {
                let text = source[n.start_byte()..n.end_byte().min(source.len())].to_string();
                distinct_operands.insert(text);
                total_operands += 1;
            } else {
                distinct_operators.insert(kind.to_string());
                total_operators += 1;
            }
        });

        let n1 = distinct_operators.len() as f64;
        let n2 = distinct_operands.len() as f64;
        let n_distinct = n1 + n2;
        let n_total = (total_operators + total_operands) as f64;

        let volume = if n_distinct > 0.0 {
            n_total * n_distinct.log2()
        } else {
            0.0
        };
        let difficulty = if n2 > 0.0 {
            (n1 / 2.0) * (total_operands as f64 / n2)
        } else {
            0.0
        };
        let effort = difficulty * volume;
        let bugs = volume / 3000.0;

        HalsteadMetrics {
            volume,
            difficulty,
            effort,
            bugs,
        }
    }
}

fn is_operand_kind(kind: &str) -> bool {
    kind.ends_with("identifier")
        || kind.ends_with("literal")
        || kind == "identifier"
        || OPERAND_KINDS.contains(&kind)
}

fn walk<'t>(node: Node<'t>, mut f: impl FnMut(Node<'t>)) {
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        f(n);
        for i in (0..n.child_count()).rev() {
            if let Some(child) = n.child(i as u32) {
                stack.push(child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chunking::language_spec;
    use crate::domain::types::Language;
    use tree_sitter::Parser;

    fn parse(language: Language, source: &str) -> (tree_sitter::Tree, &'static LanguageSpec) {
        let spec = language_spec(language).unwrap();
        let mut parser = Parser::new();
        parser.set_language(&(spec.grammar)()).unwrap();
        (parser.parse(source, None).unwrap(), spec)
    }

    #[test]
    fn cyclomatic_counts_branches_and_bool_ops() {
        let source = "function f(a, b) { if (a && b) { return 1; } for (;;) {} return 0; }";
        let (tree, spec) = parse(Language::JavaScript, source);
        let computer = MetricsComputer::new(spec);
        // base 1 + if + && + for
        assert_eq!(computer.cyclomatic(tree.root_node()), 4);
    }

    #[test]
    fn cognitive_adds_nesting_penalty() {
        let flat = "function f(a) { if (a) { return 1; } if (!a) { return 2; } }";
        let nested = "function f(a) { if (a) { if (!a) { return 2; } } }";
        let (flat_tree, spec) = parse(Language::JavaScript, flat);
        let (nested_tree, _) = parse(Language::JavaScript, nested);
        let computer = MetricsComputer::new(spec);
        let flat_score = computer.cognitive(flat_tree.root_node());
        let nested_score = computer.cognitive(nested_tree.root_node());
        assert!(nested_score > flat_score, "nesting must cost more: {nested_score} <= {flat_score}");
    }

    #[test]
    fn halstead_formulas_hold() {
        let source = "function f(a) { return a + a; }";
        let (tree, spec) = parse(Language::JavaScript, source);
        let computer = MetricsComputer::new(spec);
        let h = computer.halstead(tree.root_node(), source);
        assert!(h.volume > 0.0);
        assert!(h.effort >= h.volume * 0.0);
        assert!((h.bugs - h.volume / 3000.0).abs() < 1e-9);
        assert!((h.effort - h.difficulty * h.volume).abs() < 1e-6);
    }

    #[test]
    fn empty_subtree_yields_zeroes() {
        let source = "";
        let (tree, spec) = parse(Language::JavaScript, source);
        let computer = MetricsComputer::new(spec);
        let h = computer.halstead(tree.root_node(), source);
        assert_eq!(h.volume, 0.0);
        assert_eq!(h.difficulty, 0.0);
    }
}
