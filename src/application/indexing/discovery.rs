//! Repository scanning and ecosystem presets
//!
//! Produces the deterministic ordered list of repository-relative files to
//! index. Presets probe the project root and one level of subdirectories
//! (monorepos) for marker files; each matched preset contributes include
//! globs by language extension and exclude globs for build/cache output.
//! The union of includes and the union of excludes apply, on top of hard
//! safety excludes (`node_modules`, `vendor`, `.git`, the index root).
//!
//! Binary files (NUL probe), files above the size cap, and symlinks are
//! skipped. Unreadable directories are logged and skipped; an empty result
//! is a valid "nothing to index" outcome.

use glob::Pattern;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Directories never indexed regardless of presets.
pub const HARD_EXCLUDES: &[&str] = &["node_modules", "vendor", ".git", "__pycache__", ".idea", ".vscode"];

/// Bytes of the file head probed for NUL when sniffing binaries.
const BINARY_PROBE_BYTES: usize = 512;

/// One ecosystem preset: marker files plus the globs it contributes.
pub struct EcosystemPreset {
    /// Human-readable preset name
    pub name: &'static str,
    /// Files whose presence activates the preset
    pub markers: &'static [&'static str],
    /// Include globs contributed by this preset
    pub includes: &'static [&'static str],
    /// Exclude globs contributed by this preset
    pub excludes: &'static [&'static str],
}

/// The closed preset set.
pub const PRESETS: &[EcosystemPreset] = &[
    EcosystemPreset {
        name: "node",
        markers: &["package.json"],
        includes: &[
            "**/*.ts", "**/*.tsx", "**/*.js", "**/*.jsx", "**/*.mjs", "**/*.cjs", "**/*.vue",
        ],
        excludes: &["dist/**", "build/**", "out/**", ".next/**", "coverage/**", "*.min.js"],
    },
    EcosystemPreset {
        name: "python",
        markers: &["pyproject.toml", "setup.py", "requirements.txt"],
        includes: &["**/*.py", "**/*.pyi"],
        excludes: &[".venv/**", "venv/**", "*.egg-info/**", ".tox/**", ".mypy_cache/**"],
    },
    EcosystemPreset {
        name: "php",
        markers: &["composer.json"],
        includes: &["**/*.php"],
        excludes: &["storage/**", "cache/**"],
    },
    EcosystemPreset {
        name: "laravel",
        markers: &["artisan"],
        includes: &["**/*.php", "**/*.blade.php", "**/*.liquid"],
        excludes: &["storage/**", "bootstrap/cache/**", "public/build/**"],
    },
];

/// Catch-all language-extension preset, always active.
pub const CATCH_ALL_INCLUDES: &[&str] = &[
    "**/*.ts", "**/*.tsx", "**/*.js", "**/*.jsx", "**/*.mjs", "**/*.cjs", "**/*.py", "**/*.php",
    "**/*.go", "**/*.rs", "**/*.java", "**/*.c", "**/*.h", "**/*.cpp", "**/*.cc", "**/*.hpp",
    "**/*.cs", "**/*.rb", "**/*.swift", "**/*.kt", "**/*.kts", "**/*.scala", "**/*.vue",
    "**/*.liquid",
];

/// Scanner tuning.
#[derive(Debug, Clone)]
pub struct ScannerOptions {
    /// Files above this size are skipped with a logged warning
    pub max_file_size_bytes: u64,
    /// The index root (never scanned even when nested under the project)
    pub index_root: Option<PathBuf>,
}

impl Default for ScannerOptions {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 1024 * 1024,
            index_root: None,
        }
    }
}

/// Repository scanner with preset-driven include/exclude patterns.
pub struct Scanner {
    root: PathBuf,
    options: ScannerOptions,
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
    active_presets: Vec<&'static str>,
}

impl Scanner {
    /// Probe the root for presets and build the pattern sets.
    pub fn new(root: &Path, options: ScannerOptions) -> Self {
        let mut include_globs: Vec<&'static str> = CATCH_ALL_INCLUDES.to_vec();
        let mut exclude_globs: Vec<&'static str> = Vec::new();
        let mut active_presets = vec!["catch-all"];

        for preset in PRESETS {
            if Self::preset_matches(root, preset) {
                active_presets.push(preset.name);
                include_globs.extend_from_slice(preset.includes);
                exclude_globs.extend_from_slice(preset.excludes);
            }
        }

        let includes = include_globs
            .iter()
            .filter_map(|g| Pattern::new(g).ok())
            .collect();
        let excludes = exclude_globs
            .iter()
            .filter_map(|g| Pattern::new(g).ok())
            .collect();

        Self {
            root: root.to_path_buf(),
            options,
            includes,
            excludes,
            active_presets,
        }
    }

    /// Marker probe: the root itself plus one level of subdirectories.
    fn preset_matches(root: &Path, preset: &EcosystemPreset) -> bool {
        for marker in preset.markers {
            if root.join(marker).exists() {
                return true;
            }
        }
        let Ok(entries) = std::fs::read_dir(root) else {
            return false;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name();
            if HARD_EXCLUDES.iter().any(|e| name == std::ffi::OsStr::new(e)) {
                continue;
            }
            for marker in preset.markers {
                if path.join(marker).exists() {
                    return true;
                }
            }
        }
        false
    }

    /// Names of the presets activated by the probe.
    pub fn active_presets(&self) -> &[&'static str] {
        &self.active_presets
    }

    /// Deterministic ordered list of repository-relative file paths.
    pub fn scan(&self) -> Vec<String> {
        let mut files = Vec::new();
        let walker = WalkBuilder::new(&self.root)
            .follow_links(false)
            .hidden(false)
            .git_ignore(true)
            .git_global(false)
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                !HARD_EXCLUDES.contains(&name.as_ref())
            })
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(error = %err, "scan entry skipped");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            let Ok(relative) = path.strip_prefix(&self.root) else {
                continue;
            };
            if let Some(index_root) = &self.options.index_root {
                if path.starts_with(index_root) {
                    continue;
                }
            }
            let relative_str = relative.to_string_lossy().replace('\\', "/");
            if !self.matches(&relative_str) {
                continue;
            }
            if let Ok(metadata) = entry.metadata() {
                if metadata.len() > self.options.max_file_size_bytes {
                    tracing::warn!(
                        file = %relative_str,
                        size = metadata.len(),
                        cap = self.options.max_file_size_bytes,
                        "file exceeds size cap, skipped"
                    );
                    continue;
                }
            }
            if is_binary(path) {
                continue;
            }
            files.push(relative_str);
        }

        files.sort();
        files
    }

    /// True when a repository-relative path passes the pattern sets.
    pub fn matches(&self, relative: &str) -> bool {
        if relative.split('/').any(|seg| HARD_EXCLUDES.contains(&seg)) {
            return false;
        }
        if self.excludes.iter().any(|p| p.matches(relative)) {
            return false;
        }
        self.includes.iter().any(|p| p.matches(relative))
    }

    /// Project root this scanner is bound to.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn is_binary(path: &Path) -> bool {
    use std::io::Read;
    let Ok(mut file) = std::fs::File::open(path) else {
        return true;
    };
    let mut buffer = [0u8; BINARY_PROBE_BYTES];
    let Ok(read) = file.read(&mut buffer) else {
        return true;
    };
    buffer[..read].contains(&0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn scan_is_sorted_and_relative() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/b.ts", "export const b = 1;");
        touch(dir.path(), "src/a.ts", "export const a = 1;");
        touch(dir.path(), "README.md", "# docs");

        let scanner = Scanner::new(dir.path(), ScannerOptions::default());
        let files = scanner.scan();
        assert_eq!(files, vec!["src/a.ts", "src/b.ts"]);
    }

    #[test]
    fn hard_excludes_apply() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/a.ts", "ok");
        touch(dir.path(), "node_modules/pkg/index.js", "skip");
        touch(dir.path(), "vendor/lib.php", "skip");

        let scanner = Scanner::new(dir.path(), ScannerOptions::default());
        let files = scanner.scan();
        assert_eq!(files, vec!["src/a.ts"]);
    }

    #[test]
    fn node_preset_excludes_dist() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "package.json", "{}");
        touch(dir.path(), "src/a.ts", "ok");
        touch(dir.path(), "dist/a.js", "built");

        let scanner = Scanner::new(dir.path(), ScannerOptions::default());
        assert!(scanner.active_presets().contains(&"node"));
        let files = scanner.scan();
        assert_eq!(files, vec!["src/a.ts"]);
    }

    #[test]
    fn monorepo_markers_one_level_deep() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "packages/app/package.json", "{}");
        let scanner = Scanner::new(dir.path(), ScannerOptions::default());
        assert!(scanner.active_presets().contains(&"node"));
    }

    #[test]
    fn oversized_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/big.ts", &"x".repeat(2048));
        touch(dir.path(), "src/small.ts", "ok");

        let scanner = Scanner::new(
            dir.path(),
            ScannerOptions {
                max_file_size_bytes: 1024,
                ..Default::default()
            },
        );
        assert_eq!(scanner.scan(), vec!["src/small.ts"]);
    }

    #[test]
    fn binary_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/a.ts", "ok");
        let binary = dir.path().join("src/blob.ts");
        std::fs::write(&binary, [0x66u8, 0x00, 0x66, 0x00]).unwrap();

        let scanner = Scanner::new(dir.path(), ScannerOptions::default());
        assert_eq!(scanner.scan(), vec!["src/a.ts"]);
    }

    #[test]
    fn empty_project_is_a_valid_outcome() {
        let dir = TempDir::new().unwrap();
        let scanner = Scanner::new(dir.path(), ScannerOptions::default());
        assert!(scanner.scan().is_empty());
    }
}
