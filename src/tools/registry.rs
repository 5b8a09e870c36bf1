// src/tools/registry.rs
// C4: static tool registry. Each tool_id carries a small, tagged-variant
// record {argv template, exit-code policy, output format tag, severity map}.
// The runner and the normalizer both dispatch on `OutputFormat`; there is no
// inheritance or dynamic lookup here, by design.

use std::path::Path;

use crate::types::{LanguageTag, Severity};

/// Tags the shape of a tool's stdout, used by both the runner's parse step
/// and the normalizer to pick the right decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    SemgrepJson,
    GitleaksJson,
    TrufflehogJsonLines,
    GrypeJson,
    GovulncheckJson,
    BanditJson,
    PipAuditJson,
    SafetyJson,
    NpmAuditJson,
    CargoAuditJson,
    BundlerAuditJson,
    BrakemanJson,
}

#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub id: &'static str,
    pub binary: &'static str,
    pub output_format: OutputFormat,
    /// Exit codes that mean "ran to completion", including the ones some
    /// analyzers use to mean "findings present".
    pub success_exit_codes: &'static [i32],
    pub default_severity: Severity,
}

impl ToolSpec {
    pub fn argv(&self, workdir: &Path) -> Vec<String> {
        let dir = workdir.to_string_lossy().to_string();
        match self.id {
            "semgrep" => vec![
                "--config=auto".to_string(),
                "--json".to_string(),
                "--quiet".to_string(),
                dir,
            ],
            "gitleaks" => vec![
                "detect".to_string(),
                "--source".to_string(),
                dir,
                "--report-format".to_string(),
                "json".to_string(),
                "--report-path".to_string(),
                "/dev/stdout".to_string(),
                "--no-git".to_string(),
                "--exit-code".to_string(),
                "0".to_string(),
            ],
            "trufflehog" => vec![
                "filesystem".to_string(),
                dir,
                "--json".to_string(),
                "--no-update".to_string(),
            ],
            "grype" => vec!["dir:".to_string() + &dir, "-o".to_string(), "json".to_string()],
            "govulncheck" => vec!["-json".to_string(), "./...".to_string()],
            "bandit" => vec!["-r".to_string(), dir, "-f".to_string(), "json".to_string()],
            "pip-audit" => vec!["-f".to_string(), "json".to_string()],
            "safety" => vec!["check".to_string(), "--json".to_string()],
            "npm-audit" => vec!["audit".to_string(), "--json".to_string()],
            "cargo-audit" => vec!["audit".to_string(), "--json".to_string()],
            "bundler-audit" => vec!["check".to_string(), "--format".to_string(), "json".to_string()],
            "brakeman" => vec!["-f".to_string(), "json".to_string(), dir],
            other => vec![other.to_string()],
        }
    }

    pub fn is_success_exit(&self, code: i32) -> bool {
        self.success_exit_codes.contains(&code)
    }
}

/// Canonical order, used for the aggregator's dedup tie-break
/// (earlier entries win when two tools report the same finding key).
pub const REGISTRY: &[ToolSpec] = &[
    ToolSpec {
        id: "gitleaks",
        binary: "gitleaks",
        output_format: OutputFormat::GitleaksJson,
        success_exit_codes: &[0, 1],
        default_severity: Severity::High,
    },
    ToolSpec {
        id: "trufflehog",
        binary: "trufflehog",
        output_format: OutputFormat::TrufflehogJsonLines,
        success_exit_codes: &[0, 183],
        default_severity: Severity::High,
    },
    ToolSpec {
        id: "grype",
        binary: "grype",
        output_format: OutputFormat::GrypeJson,
        success_exit_codes: &[0, 1],
        default_severity: Severity::Medium,
    },
    ToolSpec {
        id: "semgrep",
        binary: "semgrep",
        output_format: OutputFormat::SemgrepJson,
        success_exit_codes: &[0, 1],
        default_severity: Severity::Medium,
    },
    ToolSpec {
        id: "govulncheck",
        binary: "govulncheck",
        output_format: OutputFormat::GovulncheckJson,
        success_exit_codes: &[0, 3],
        default_severity: Severity::High,
    },
    ToolSpec {
        id: "pip-audit",
        binary: "pip-audit",
        output_format: OutputFormat::PipAuditJson,
        success_exit_codes: &[0, 1],
        default_severity: Severity::High,
    },
    ToolSpec {
        id: "safety",
        binary: "safety",
        output_format: OutputFormat::SafetyJson,
        success_exit_codes: &[0, 64, 65],
        default_severity: Severity::High,
    },
    ToolSpec {
        id: "bandit",
        binary: "bandit",
        output_format: OutputFormat::BanditJson,
        success_exit_codes: &[0, 1],
        default_severity: Severity::Medium,
    },
    ToolSpec {
        id: "npm-audit",
        binary: "npm",
        output_format: OutputFormat::NpmAuditJson,
        success_exit_codes: &[0, 1],
        default_severity: Severity::High,
    },
    ToolSpec {
        id: "cargo-audit",
        binary: "cargo-audit",
        output_format: OutputFormat::CargoAuditJson,
        success_exit_codes: &[0, 1],
        default_severity: Severity::High,
    },
    ToolSpec {
        id: "bundler-audit",
        binary: "bundle-audit",
        output_format: OutputFormat::BundlerAuditJson,
        success_exit_codes: &[0, 1],
        default_severity: Severity::High,
    },
    ToolSpec {
        id: "brakeman",
        binary: "brakeman",
        output_format: OutputFormat::BrakemanJson,
        success_exit_codes: &[0, 3],
        default_severity: Severity::Medium,
    },
];

pub fn by_id(id: &str) -> Option<&'static ToolSpec> {
    REGISTRY.iter().find(|t| t.id == id)
}

/// Position in `REGISTRY`, used as the aggregator's canonical-order tie-break.
pub fn canonical_rank(id: &str) -> usize {
    REGISTRY.iter().position(|t| t.id == id).unwrap_or(usize::MAX)
}

/// C4 Selector: universal analyzers always run; per-language analyzers are
/// added when the corresponding tag is present.
pub fn select(languages: &[LanguageTag]) -> Vec<&'static ToolSpec> {
    let mut selected: Vec<&'static ToolSpec> = vec![
        by_id("semgrep").unwrap(),
        by_id("gitleaks").unwrap(),
        by_id("trufflehog").unwrap(),
        by_id("grype").unwrap(),
    ];

    for lang in languages {
        match lang {
            LanguageTag::Go => selected.push(by_id("govulncheck").unwrap()),
            LanguageTag::Python => {
                selected.push(by_id("pip-audit").unwrap());
                selected.push(by_id("safety").unwrap());
                selected.push(by_id("bandit").unwrap());
            }
            LanguageTag::Javascript | LanguageTag::Typescript => {
                selected.push(by_id("npm-audit").unwrap());
            }
            LanguageTag::Rust => selected.push(by_id("cargo-audit").unwrap()),
            LanguageTag::Ruby => {
                selected.push(by_id("bundler-audit").unwrap());
                selected.push(by_id("brakeman").unwrap());
            }
            _ => {}
        }
    }

    selected.sort_by_key(|t| canonical_rank(t.id));
    selected.dedup_by_key(|t| t.id);
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_selects_universal_analyzers() {
        let sel = select(&[]);
        let ids: Vec<_> = sel.iter().map(|t| t.id).collect();
        assert!(ids.contains(&"semgrep"));
        assert!(ids.contains(&"gitleaks"));
        assert!(ids.contains(&"trufflehog"));
        assert!(ids.contains(&"grype"));
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn adds_per_language_analyzers() {
        let sel = select(&[LanguageTag::Go, LanguageTag::Python]);
        let ids: Vec<_> = sel.iter().map(|t| t.id).collect();
        assert!(ids.contains(&"govulncheck"));
        assert!(ids.contains(&"pip-audit"));
        assert!(ids.contains(&"safety"));
        assert!(ids.contains(&"bandit"));
    }

    #[test]
    fn canonical_order_is_stable() {
        let sel = select(&[LanguageTag::Ruby]);
        let ranks: Vec<_> = sel.iter().map(|t| canonical_rank(t.id)).collect();
        let mut sorted = ranks.clone();
        sorted.sort();
        assert_eq!(ranks, sorted);
    }
}
