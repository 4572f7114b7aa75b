//! Read-only analyzers over the vector store
//!
//! All analyzers are pure readers: they scan stored rows and derive
//! reports without mutating the index. The fuzzy import matcher here is
//! shared by the dependency graph builder and the complexity analyzer's
//! dependent enrichment.

pub mod complexity;
pub mod duplicates;
pub mod graph;

pub use complexity::{ComplexityAnalyzer, ComplexityReport, ComplexityThresholds};
pub use duplicates::{find_duplicates, DuplicateAnalysis, DuplicateOptions};
pub use graph::{CodeGraph, DependencyGraphBuilder, Direction, GraphOptions};

/// Extensions stripped before path comparison.
const STRIPPABLE_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "php", "go", "rs", "java", "c", "h", "cpp",
    "cc", "hpp", "cs", "rb", "swift", "kt", "kts", "scala", "vue", "liquid",
];

/// Normalize separators and drop a known source extension.
pub(crate) fn comparable_path(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    let trimmed = normalized.trim_start_matches("./");
    if let Some((stem, ext)) = trimmed.rsplit_once('.') {
        if STRIPPABLE_EXTENSIONS.contains(&ext) {
            return stem.to_string();
        }
    }
    trimmed.to_string()
}

/// Resolve `./`/`../` specifiers against the importing file's directory.
pub(crate) fn resolve_relative(specifier: &str, from_file: &str) -> Option<String> {
    if !specifier.starts_with("./") && !specifier.starts_with("../") {
        return None;
    }
    let from = from_file.replace('\\', "/");
    let mut segments: Vec<&str> = from.split('/').collect();
    segments.pop(); // drop the file name
    for part in specifier.split('/') {
        match part {
            "." | "" => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}

/// Fuzzy import match: does `specifier` written inside `from_file` refer to
/// `target` (a repository-relative path)?
///
/// Exact normalized-path equality wins; otherwise relative specifiers are
/// resolved against the importer and suffix-matched (with `/index`
/// tolerance for barrel files); bare specifiers suffix-match on whole path
/// segments, with dotted module names (`pkg.module`) treated as paths.
pub fn specifier_matches_file(specifier: &str, from_file: &str, target: &str) -> bool {
    let target_cmp = comparable_path(target);
    let spec_cmp = comparable_path(specifier);

    if spec_cmp == target_cmp {
        return true;
    }

    if let Some(resolved) = resolve_relative(specifier, from_file) {
        let resolved = comparable_path(&resolved);
        return resolved == target_cmp || format!("{resolved}/index") == target_cmp;
    }

    let mut candidates = vec![spec_cmp.clone()];
    if !spec_cmp.contains('/') && spec_cmp.contains('.') {
        candidates.push(spec_cmp.replace('.', "/"));
    }
    for candidate in candidates {
        if candidate.is_empty() {
            continue;
        }
        if target_cmp == candidate || target_cmp.ends_with(&format!("/{candidate}")) {
            return true;
        }
    }
    false
}

/// Default globs identifying test files.
pub const DEFAULT_TEST_GLOBS: &[&str] = &[
    "**/test/**",
    "**/tests/**",
    "**/__tests__/**",
    "**/*.test.*",
    "**/*.spec.*",
    "**/*_test.*",
    "**/test_*",
];

/// True when a path looks like a test file under the given globs.
pub(crate) fn is_test_path(path: &str, globs: &[String]) -> bool {
    globs
        .iter()
        .filter_map(|g| glob::Pattern::new(g).ok())
        .any(|p| p.matches(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_path_match() {
        assert!(specifier_matches_file("src/util.ts", "src/a.ts", "src/util.ts"));
        assert!(specifier_matches_file("src/util", "src/a.ts", "src/util.ts"));
    }

    #[test]
    fn relative_specifiers_resolve_against_importer() {
        assert!(specifier_matches_file("./helper", "src/run.ts", "src/helper.ts"));
        assert!(specifier_matches_file("../lib/math", "src/app/main.ts", "src/lib/math.ts"));
        assert!(!specifier_matches_file("./helper", "src/run.ts", "other/helper.ts"));
    }

    #[test]
    fn index_barrel_tolerance() {
        assert!(specifier_matches_file("./utils", "src/a.ts", "src/utils/index.ts"));
    }

    #[test]
    fn bare_specifier_suffix_matches_segments() {
        assert!(specifier_matches_file("utils/strings", "src/a.ts", "src/utils/strings.ts"));
        // No partial-segment matches.
        assert!(!specifier_matches_file("rings", "src/a.ts", "src/utils/strings.ts"));
    }

    #[test]
    fn dotted_module_names_match_paths() {
        assert!(specifier_matches_file("pkg.module", "app.py", "src/pkg/module.py"));
    }

    #[test]
    fn escaping_the_root_fails_gracefully() {
        assert!(!specifier_matches_file("../../x", "a.ts", "x.ts"));
    }

    #[test]
    fn test_path_detection() {
        let globs: Vec<String> = DEFAULT_TEST_GLOBS.iter().map(|s| s.to_string()).collect();
        assert!(is_test_path("src/__tests__/a.ts", &globs));
        assert!(is_test_path("src/a.test.ts", &globs));
        assert!(is_test_path("tests/integration.rs", &globs));
        assert!(!is_test_path("src/a.ts", &globs));
    }
}
