//! Complexity analysis over stored chunk metadata
//!
//! Emits one violation per `(chunk, metric)` pair exceeding its threshold,
//! rolls violations up into per-file risk levels, and enriches risky files
//! with their dependents (fuzzy import matches across the store) so impact
//! is visible.

use super::{is_test_path, specifier_matches_file, DEFAULT_TEST_GLOBS};
use crate::domain::error::Result;
use crate::domain::ports::vector_store::ScanFilter;
use crate::domain::ports::{SharedVectorStore, VectorStore};
use crate::domain::types::{ChunkKind, VectorRow};
use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeMap;

/// Seconds-per-effort-unit divisor of the standard Halstead time equation.
const HALSTEAD_TIME_FACTOR: f64 = 18.0;

/// Dependent count above which a risky file is boosted to critical.
const CRITICAL_DEPENDENT_COUNT: usize = 30;

/// Metric kinds that can violate a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    /// Cyclomatic complexity
    Cyclomatic,
    /// Cognitive complexity
    Cognitive,
    /// Halstead effort (converted from time-to-understand minutes)
    HalsteadEffort,
    /// Halstead estimated bugs
    HalsteadBugs,
}

/// Violation severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Metric within [1x, 2x) of its threshold
    Warning,
    /// Metric at or above 2x its threshold
    Error,
}

/// Per-file risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// No errors, fewer than two warnings
    Low,
    /// Two or more warnings
    Medium,
    /// At least one error violation
    High,
    /// High risk with more than 30 dependents
    Critical,
}

/// Analyzer thresholds.
#[derive(Debug, Clone)]
pub struct ComplexityThresholds {
    /// Cyclomatic complexity cap
    pub complexity: u32,
    /// Cognitive complexity cap ("mental load")
    pub mental_load: u32,
    /// Halstead effort cap expressed as minutes to understand
    pub time_to_understand_minutes: f64,
    /// Halstead estimated-bugs cap
    pub estimated_bugs: f64,
    /// Globs identifying test files for test association
    pub test_paths: Vec<String>,
}

impl Default for ComplexityThresholds {
    fn default() -> Self {
        Self {
            complexity: 10,
            mental_load: 15,
            time_to_understand_minutes: 60.0,
            estimated_bugs: 0.5,
            test_paths: DEFAULT_TEST_GLOBS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ComplexityThresholds {
    /// Effort threshold derived from minutes: `minutes * 60 * 18`.
    pub fn effort_threshold(&self) -> f64 {
        self.time_to_understand_minutes * 60.0 * HALSTEAD_TIME_FACTOR
    }
}

/// One threshold violation.
#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    /// File the offending chunk lives in
    pub file: String,
    /// Chunk start line
    pub start_line: u32,
    /// Chunk end line
    pub end_line: u32,
    /// Offending symbol, when named
    pub symbol: Option<String>,
    /// Which metric tripped
    pub metric: MetricType,
    /// Observed value
    pub value: f64,
    /// Configured threshold
    pub threshold: f64,
    /// Error at >= 2x threshold, warning otherwise
    pub severity: Severity,
}

/// Aggregate complexity metrics of a file's dependents.
#[derive(Debug, Clone, Serialize)]
pub struct DependentComplexityMetrics {
    /// Mean cyclomatic complexity across dependent chunks
    pub avg_complexity: f64,
    /// Maximum cyclomatic complexity across dependent chunks
    pub max_complexity: u32,
}

/// Per-file analysis outcome.
#[derive(Debug, Clone, Serialize)]
pub struct FileComplexity {
    /// Violations in this file
    pub violations: Vec<Violation>,
    /// Files importing this one (fuzzy match)
    pub dependents: Vec<String>,
    /// Number of dependents
    pub dependent_count: usize,
    /// Aggregate metrics over dependents, when any exist
    pub dependent_complexity_metrics: Option<DependentComplexityMetrics>,
    /// Dependent files that look like tests
    pub test_associations: Vec<String>,
    /// Rolled-up risk level
    pub risk_level: RiskLevel,
}

/// Report summary block.
#[derive(Debug, Clone, Serialize)]
pub struct ComplexitySummary {
    /// Files examined
    pub files_analyzed: usize,
    /// Total violations across all files
    pub total_violations: usize,
    /// Error-severity violations
    pub errors: usize,
    /// Warning-severity violations
    pub warnings: usize,
    /// Mean cyclomatic complexity across analyzed function/method chunks
    pub avg_complexity: f64,
    /// Maximum cyclomatic complexity observed
    pub max_complexity: u32,
}

/// Full complexity report.
#[derive(Debug, Clone, Serialize)]
pub struct ComplexityReport {
    /// Aggregates
    pub summary: ComplexitySummary,
    /// Per-file details, keyed by path (only files with violations)
    pub files: BTreeMap<String, FileComplexity>,
}

impl ComplexityReport {
    /// Count of violations at or above a severity.
    pub fn violations_at_least(&self, severity: Severity) -> usize {
        self.files
            .values()
            .flat_map(|f| &f.violations)
            .filter(|v| v.severity >= severity)
            .count()
    }
}

/// Complexity analyzer; a pure reader of the store.
pub struct ComplexityAnalyzer {
    store: SharedVectorStore,
}

impl ComplexityAnalyzer {
    /// Bind an analyzer to a store handle.
    pub fn new(store: SharedVectorStore) -> Self {
        Self { store }
    }

    /// Analyze the whole index, or just `files` when given.
    pub async fn analyze(
        &self,
        files: Option<&[String]>,
        thresholds: &ComplexityThresholds,
    ) -> Result<ComplexityReport> {
        let rows = self.store.scan_all(&ScanFilter::default()).await?;
        let rows: Vec<VectorRow> = match files {
            Some(allow) => rows
                .into_iter()
                .filter(|r| allow.iter().any(|f| f == &r.metadata.file))
                .collect(),
            None => rows,
        };

        let function_rows: Vec<&VectorRow> = rows
            .iter()
            .filter(|r| matches!(r.metadata.kind, ChunkKind::Function | ChunkKind::Method))
            .collect();

        let mut by_file: BTreeMap<String, Vec<Violation>> = BTreeMap::new();
        for row in &function_rows {
            for violation in check_chunk(row, thresholds) {
                by_file
                    .entry(row.metadata.file.clone())
                    .or_default()
                    .push(violation);
            }
        }

        let files_analyzed = rows.iter().map(|r| &r.metadata.file).unique().count();
        let total_violations: usize = by_file.values().map(Vec::len).sum();
        let errors = by_file
            .values()
            .flatten()
            .filter(|v| v.severity == Severity::Error)
            .count();
        let warnings = total_violations - errors;
        let complexities: Vec<u32> = function_rows.iter().map(|r| r.metadata.complexity).collect();
        let avg_complexity = if complexities.is_empty() {
            0.0
        } else {
            complexities.iter().map(|&c| c as f64).sum::<f64>() / complexities.len() as f64
        };
        let max_complexity = complexities.iter().copied().max().unwrap_or(0);

        let mut report_files = BTreeMap::new();
        for (file, violations) in by_file {
            let dependents = find_dependents(&rows, &file);
            let dependent_count = dependents.len();
            let dependent_complexity_metrics = dependent_metrics(&rows, &dependents);
            let test_associations: Vec<String> = dependents
                .iter()
                .filter(|d| is_test_path(d, &thresholds.test_paths))
                .cloned()
                .collect();

            let error_count = violations.iter().filter(|v| v.severity == Severity::Error).count();
            let warning_count = violations.len() - error_count;
            let mut risk_level = if error_count > 0 {
                RiskLevel::High
            } else if warning_count >= 2 {
                RiskLevel::Medium
            } else {
                RiskLevel::Low
            };
            if risk_level >= RiskLevel::High && dependent_count > CRITICAL_DEPENDENT_COUNT {
                risk_level = RiskLevel::Critical;
            }

            report_files.insert(
                file,
                FileComplexity {
                    violations,
                    dependents,
                    dependent_count,
                    dependent_complexity_metrics,
                    test_associations,
                    risk_level,
                },
            );
        }

        Ok(ComplexityReport {
            summary: ComplexitySummary {
                files_analyzed,
                total_violations,
                errors,
                warnings,
                avg_complexity,
                max_complexity,
            },
            files: report_files,
        })
    }
}

fn check_chunk(row: &VectorRow, thresholds: &ComplexityThresholds) -> Vec<Violation> {
    let meta = &row.metadata;
    let mut violations = Vec::new();
    let mut push = |metric: MetricType, value: f64, threshold: f64| {
        if threshold <= 0.0 || value < threshold {
            return;
        }
        let severity = if value >= threshold * 2.0 {
            Severity::Error
        } else {
            Severity::Warning
        };
        violations.push(Violation {
            file: meta.file.clone(),
            start_line: meta.start_line,
            end_line: meta.end_line,
            symbol: meta.symbol_name.clone(),
            metric,
            value,
            threshold,
            severity,
        });
    };

    push(
        MetricType::Cyclomatic,
        meta.complexity as f64,
        thresholds.complexity as f64,
    );
    push(
        MetricType::Cognitive,
        meta.cognitive_complexity as f64,
        thresholds.mental_load as f64,
    );
    push(
        MetricType::HalsteadEffort,
        meta.halstead.effort,
        thresholds.effort_threshold(),
    );
    push(
        MetricType::HalsteadBugs,
        meta.halstead.bugs,
        thresholds.estimated_bugs,
    );
    violations
}

fn find_dependents(rows: &[VectorRow], target: &str) -> Vec<String> {
    rows.iter()
        .filter(|r| r.metadata.file != target)
        .filter(|r| {
            r.metadata
                .imports
                .iter()
                .any(|spec| specifier_matches_file(spec, &r.metadata.file, target))
        })
        .map(|r| r.metadata.file.clone())
        .unique()
        .sorted()
        .collect()
}

fn dependent_metrics(rows: &[VectorRow], dependents: &[String]) -> Option<DependentComplexityMetrics> {
    let values: Vec<u32> = rows
        .iter()
        .filter(|r| dependents.contains(&r.metadata.file))
        .filter(|r| matches!(r.metadata.kind, ChunkKind::Function | ChunkKind::Method))
        .map(|r| r.metadata.complexity)
        .collect();
    if values.is_empty() {
        return None;
    }
    Some(DependentComplexityMetrics {
        avg_complexity: values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64,
        max_complexity: values.iter().copied().max().unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{ChunkMetadata, HalsteadMetrics, Language, TenantScope};
    use std::collections::BTreeSet;

    fn row(file: &str, complexity: u32, cognitive: u32, imports: &[&str]) -> VectorRow {
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
                start_line: 1,
                end_line: 10,
                language: Language::TypeScript,
                kind: ChunkKind::Function,
                symbol_name: Some("f".into()),
                symbol_type: Some(ChunkKind::Function),
                parent_class: None,
                complexity,
                cognitive_complexity: cognitive,
                halstead: HalsteadMetrics::default(),
                parameters: vec![],
                signature: String::new(),
                imports: imports.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
                exports: BTreeSet::new(),
                call_sites: vec![],
            },
            vector: vec![],
        }
    }

    #[test]
    fn severity_doubles_at_twice_threshold() {
        let thresholds = ComplexityThresholds::default();
        let warning = check_chunk(&row("a.ts", 12, 0, &[]), &thresholds);
        assert_eq!(warning.len(), 1);
        assert_eq!(warning[0].severity, Severity::Warning);
        assert_eq!(warning[0].metric, MetricType::Cyclomatic);

        let error = check_chunk(&row("a.ts", 20, 0, &[]), &thresholds);
        assert_eq!(error[0].severity, Severity::Error);
    }

    #[test]
    fn effort_threshold_uses_time_factor() {
        let thresholds = ComplexityThresholds::default();
        // 60 minutes * 60 seconds * 18 effort/second
        assert_eq!(thresholds.effort_threshold(), 64_800.0);
    }

    #[test]
    fn one_violation_per_metric() {
        let thresholds = ComplexityThresholds::default();
        let violations = check_chunk(&row("a.ts", 25, 40, &[]), &thresholds);
        assert_eq!(violations.len(), 2);
    }

    #[test]
    fn dependents_found_by_fuzzy_import() {
        let rows = vec![
            row("src/core.ts", 1, 0, &[]),
            row("src/user.ts", 1, 0, &["./core"]),
            row("src/other.ts", 1, 0, &["./unrelated"]),
        ];
        let dependents = find_dependents(&rows, "src/core.ts");
        assert_eq!(dependents, vec!["src/user.ts"]);
    }
}
