// src/aggregate.rs
// C7: merges, deduplicates, and sorts findings across analyzers.

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use crate::tools::registry::canonical_rank;
use crate::types::{Finding, ToolResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DedupKey {
    file_path: String,
    line_number: Option<u32>,
    description: String,
}

/// Merge every tool's raw findings into the job's canonical `Finding` list.
/// Findings missing `file_path` or `description` are dropped (the
/// normalizer already enforces this, but the aggregator is the contract
/// boundary so it re-checks). Dedup key is `(file_path, line_number,
/// description)`; ties keep the highest severity, then the earliest tool in
/// the registry's canonical order. Final order is severity descending, then
/// `file_path` ascending, then `line_number` ascending (nulls last), then
/// `tool` ascending.
pub fn aggregate(job_id: &str, results: &[ToolResult]) -> Vec<Finding> {
    let mut retained: HashMap<DedupKey, Finding> = HashMap::new();

    for result in results {
        for raw in &result.raw_findings {
            if raw.file_path.is_empty() || raw.description.is_empty() {
                continue;
            }

            let key = DedupKey {
                file_path: raw.file_path.clone(),
                line_number: raw.line_number,
                description: raw.description.clone(),
            };

            let candidate = Finding {
                id: Uuid::new_v4().to_string(),
                scan_job_id: job_id.to_string(),
                severity: raw.severity,
                tool: result.tool.clone(),
                file_path: raw.file_path.clone(),
                line_number: raw.line_number,
                description: raw.description.clone(),
                remediation: None,
                code_example: None,
                created_at: Utc::now(),
            };

            match retained.get(&key) {
                None => {
                    retained.insert(key, candidate);
                }
                Some(existing) => {
                    let existing_rank = canonical_rank(&existing.tool);
                    let candidate_rank = canonical_rank(&candidate.tool);
                    let candidate_wins = candidate.severity > existing.severity
                        || (candidate.severity == existing.severity && candidate_rank < existing_rank);
                    if candidate_wins {
                        retained.insert(key, candidate);
                    }
                }
            }
        }
    }

    let mut findings: Vec<Finding> = retained.into_values().collect();
    sort_findings(&mut findings);
    findings
}

fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.file_path.cmp(&b.file_path))
            .then_with(|| match (a.line_number, b.line_number) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
            .then_with(|| a.tool.cmp(&b.tool))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RawFinding, Severity};
    use std::time::Duration;

    fn tool_result(tool: &str, raws: Vec<RawFinding>) -> ToolResult {
        ToolResult {
            tool: tool.to_string(),
            raw_findings: raws,
            timed_out: false,
            error: None,
            duration: Duration::from_secs(1),
        }
    }

    #[test]
    fn dedups_identical_findings_keeping_canonical_order_winner() {
        let raw = RawFinding {
            file_path: ".env".to_string(),
            line_number: Some(3),
            description: "AWS access key".to_string(),
            severity: Severity::High,
            rule_id: None,
        };
        let results = vec![
            tool_result("trufflehog", vec![raw.clone()]),
            tool_result("gitleaks", vec![raw]),
        ];

        let findings = aggregate("job-1", &results);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].tool, "gitleaks");
    }

    #[test]
    fn orders_by_severity_then_file_then_line_then_tool() {
        let results = vec![tool_result(
            "semgrep",
            vec![
                RawFinding {
                    file_path: "b.py".to_string(),
                    line_number: None,
                    description: "info issue".to_string(),
                    severity: Severity::Info,
                    rule_id: None,
                },
                RawFinding {
                    file_path: "a.py".to_string(),
                    line_number: Some(10),
                    description: "high issue".to_string(),
                    severity: Severity::High,
                    rule_id: None,
                },
            ],
        )];

        let findings = aggregate("job-1", &results);
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[1].severity, Severity::Info);
    }

    #[test]
    fn is_a_fixed_point_on_its_own_output() {
        let results = vec![tool_result(
            "semgrep",
            vec![RawFinding {
                file_path: "a.py".to_string(),
                line_number: Some(1),
                description: "issue".to_string(),
                severity: Severity::Medium,
                rule_id: None,
            }],
        )];

        let once = aggregate("job-1", &results);
        let as_tool_results = vec![ToolResult {
            tool: "semgrep".to_string(),
            raw_findings: once
                .iter()
                .map(|f| crate::types::RawFinding {
                    file_path: f.file_path.clone(),
                    line_number: f.line_number,
                    description: f.description.clone(),
                    severity: f.severity,
                    rule_id: None,
                })
                .collect(),
            timed_out: false,
            error: None,
            duration: Duration::from_secs(1),
        }];
        let twice = aggregate("job-1", &as_tool_results);
        assert_eq!(once.len(), twice.len());
    }

    #[test]
    fn drops_findings_missing_file_path_or_description() {
        let results = vec![tool_result(
            "semgrep",
            vec![RawFinding {
                file_path: String::new(),
                line_number: None,
                description: "issue".to_string(),
                severity: Severity::Low,
                rule_id: None,
            }],
        )];
        assert!(aggregate("job-1", &results).is_empty());
    }
}
