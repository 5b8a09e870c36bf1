// src/normalize/mod.rs
// C6: parses each analyzer family's native output into a common
// `RawFinding` record. Dispatches on `OutputFormat`, the same tag the
// runner uses to pick an analyzer's argv — no inheritance, no dynamic
// lookup, per this codebase's tagged-variant convention.

use std::path::Path;

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::tools::registry::OutputFormat;
use crate::types::{RawFinding, Severity};

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("malformed output: {0}")]
    Malformed(String),
}

pub type NormalizeResult<T> = Result<T, NormalizeError>;

/// `file_path` is made repo-relative (stripping `workdir`) and normalized
/// to forward-slash form.
fn relative_path(workdir: &Path, raw: &str) -> String {
    let candidate = Path::new(raw);
    let stripped = candidate.strip_prefix(workdir).unwrap_or(candidate);
    stripped.to_string_lossy().replace('\\', "/")
}

fn push_if_valid(out: &mut Vec<RawFinding>, tool: &str, finding: Option<RawFinding>) {
    match finding {
        Some(f) if !f.file_path.is_empty() && !f.description.is_empty() => out.push(f),
        Some(_) | None => {
            warn!(tool, "dropping malformed record: missing file_path or description");
        }
    }
}

pub fn parse(format: OutputFormat, workdir: &Path, raw: &[u8]) -> NormalizeResult<Vec<RawFinding>> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    match format {
        OutputFormat::SemgrepJson => parse_semgrep(workdir, raw),
        OutputFormat::GitleaksJson => parse_gitleaks(workdir, raw),
        OutputFormat::TrufflehogJsonLines => parse_trufflehog(workdir, raw),
        OutputFormat::GrypeJson => parse_grype(raw),
        OutputFormat::GovulncheckJson => parse_govulncheck(raw),
        OutputFormat::BanditJson => parse_bandit(workdir, raw),
        OutputFormat::PipAuditJson => parse_pip_audit(raw),
        OutputFormat::SafetyJson => parse_safety(raw),
        OutputFormat::NpmAuditJson => parse_npm_audit(raw),
        OutputFormat::CargoAuditJson => parse_cargo_audit(raw),
        OutputFormat::BundlerAuditJson => parse_bundler_audit(raw),
        OutputFormat::BrakemanJson => parse_brakeman(workdir, raw),
    }
}

fn parse_json(raw: &[u8]) -> NormalizeResult<Value> {
    serde_json::from_slice(raw).map_err(|e| NormalizeError::Malformed(e.to_string()))
}

fn parse_semgrep(workdir: &Path, raw: &[u8]) -> NormalizeResult<Vec<RawFinding>> {
    let doc = parse_json(raw)?;
    let mut out = Vec::new();
    for r in doc.get("results").and_then(Value::as_array).into_iter().flatten() {
        let file_path = r.get("path").and_then(Value::as_str).unwrap_or_default();
        let line_number = r
            .get("start")
            .and_then(|s| s.get("line"))
            .and_then(Value::as_u64)
            .map(|n| n as u32);
        let description = r
            .get("extra")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let severity_raw = r
            .get("extra")
            .and_then(|e| e.get("severity"))
            .and_then(Value::as_str)
            .unwrap_or("info");
        let rule_id = r.get("check_id").and_then(Value::as_str).map(String::from);

        push_if_valid(
            &mut out,
            "semgrep",
            Some(RawFinding {
                file_path: relative_path(workdir, file_path),
                line_number,
                description: description.to_string(),
                severity: Severity::from_str_lenient(severity_raw),
                rule_id,
            }),
        );
    }
    Ok(out)
}

fn parse_gitleaks(workdir: &Path, raw: &[u8]) -> NormalizeResult<Vec<RawFinding>> {
    let doc = parse_json(raw)?;
    let entries = doc.as_array().cloned().unwrap_or_default();
    let mut out = Vec::new();
    for r in entries {
        let file_path = r.get("File").and_then(Value::as_str).unwrap_or_default();
        let line_number = r.get("StartLine").and_then(Value::as_u64).map(|n| n as u32);
        let rule = r.get("RuleID").and_then(Value::as_str).unwrap_or("secret");
        let description = format!("potential secret detected ({rule})");

        push_if_valid(
            &mut out,
            "gitleaks",
            Some(RawFinding {
                file_path: relative_path(workdir, file_path),
                line_number,
                description,
                severity: Severity::High,
                rule_id: Some(rule.to_string()),
            }),
        );
    }
    Ok(out)
}

fn parse_trufflehog(workdir: &Path, raw: &[u8]) -> NormalizeResult<Vec<RawFinding>> {
    let mut out = Vec::new();
    for line in raw.split(|b| *b == b'\n') {
        if line.is_empty() {
            continue;
        }
        let Ok(r) = serde_json::from_slice::<Value>(line) else {
            continue;
        };
        let file_path = r
            .get("SourceMetadata")
            .and_then(|m| m.get("Data"))
            .and_then(|d| d.get("Filesystem"))
            .and_then(|f| f.get("file"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let verified = r.get("Verified").and_then(Value::as_bool).unwrap_or(false);
        let detector = r
            .get("DetectorName")
            .and_then(Value::as_str)
            .unwrap_or("secret");

        push_if_valid(
            &mut out,
            "trufflehog",
            Some(RawFinding {
                file_path: relative_path(workdir, file_path),
                line_number: None,
                description: format!("{detector} secret detected{}", if verified { " (verified)" } else { "" }),
                severity: if verified { Severity::Critical } else { Severity::High },
                rule_id: Some(detector.to_string()),
            }),
        );
    }
    Ok(out)
}

fn parse_grype(raw: &[u8]) -> NormalizeResult<Vec<RawFinding>> {
    let doc = parse_json(raw)?;
    let mut out = Vec::new();
    for m in doc.get("matches").and_then(Value::as_array).into_iter().flatten() {
        let vuln = m.get("vulnerability");
        let id = vuln.and_then(|v| v.get("id")).and_then(Value::as_str).unwrap_or("");
        let severity_raw = vuln
            .and_then(|v| v.get("severity"))
            .and_then(Value::as_str)
            .unwrap_or("info");
        let pkg_name = m
            .get("artifact")
            .and_then(|a| a.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("dependency");
        let pkg_version = m
            .get("artifact")
            .and_then(|a| a.get("version"))
            .and_then(Value::as_str)
            .unwrap_or("");
        let file_path = m
            .get("artifact")
            .and_then(|a| a.get("locations"))
            .and_then(Value::as_array)
            .and_then(|l| l.first())
            .and_then(|loc| loc.get("path"))
            .and_then(Value::as_str)
            .unwrap_or("go.mod");

        push_if_valid(
            &mut out,
            "grype",
            Some(RawFinding {
                file_path: file_path.trim_start_matches('/').to_string(),
                line_number: None,
                description: format!("{id} in {pkg_name}@{pkg_version}"),
                severity: Severity::from_str_lenient(severity_raw),
                rule_id: Some(id.to_string()),
            }),
        );
    }
    Ok(out)
}

fn parse_govulncheck(raw: &[u8]) -> NormalizeResult<Vec<RawFinding>> {
    let mut out = Vec::new();
    for line in raw.split(|b| *b == b'\n') {
        if line.is_empty() {
            continue;
        }
        let Ok(msg) = serde_json::from_slice::<Value>(line) else {
            continue;
        };
        let Some(finding) = msg.get("finding") else {
            continue;
        };
        let osv = finding.get("osv").and_then(Value::as_str).unwrap_or("");
        let trace = finding.get("trace").and_then(Value::as_array);
        let position = trace
            .and_then(|t| t.first())
            .and_then(|t| t.get("position"));
        let file_path = position
            .and_then(|p| p.get("filename"))
            .and_then(Value::as_str)
            .unwrap_or("go.mod");
        let line_number = position.and_then(|p| p.get("line")).and_then(Value::as_u64).map(|n| n as u32);

        push_if_valid(
            &mut out,
            "govulncheck",
            Some(RawFinding {
                file_path: file_path.to_string(),
                line_number,
                description: format!("known vulnerability {osv} reachable"),
                severity: Severity::High,
                rule_id: Some(osv.to_string()),
            }),
        );
    }
    Ok(out)
}

fn parse_bandit(workdir: &Path, raw: &[u8]) -> NormalizeResult<Vec<RawFinding>> {
    let doc = parse_json(raw)?;
    let mut out = Vec::new();
    for r in doc.get("results").and_then(Value::as_array).into_iter().flatten() {
        let file_path = r.get("filename").and_then(Value::as_str).unwrap_or_default();
        let line_number = r.get("line_number").and_then(Value::as_u64).map(|n| n as u32);
        let description = r.get("issue_text").and_then(Value::as_str).unwrap_or_default();
        let severity_raw = r.get("issue_severity").and_then(Value::as_str).unwrap_or("LOW");
        let rule_id = r.get("test_id").and_then(Value::as_str).map(String::from);

        push_if_valid(
            &mut out,
            "bandit",
            Some(RawFinding {
                file_path: relative_path(workdir, file_path),
                line_number,
                description: description.to_string(),
                severity: Severity::from_str_lenient(severity_raw),
                rule_id,
            }),
        );
    }
    Ok(out)
}

fn parse_pip_audit(raw: &[u8]) -> NormalizeResult<Vec<RawFinding>> {
    let doc = parse_json(raw)?;
    let mut out = Vec::new();
    let deps = doc.get("dependencies").and_then(Value::as_array).cloned().unwrap_or_default();
    for dep in deps {
        let name = dep.get("name").and_then(Value::as_str).unwrap_or("dependency");
        for vuln in dep.get("vulns").and_then(Value::as_array).into_iter().flatten() {
            let id = vuln.get("id").and_then(Value::as_str).unwrap_or("");
            let description = vuln
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("vulnerable dependency");

            push_if_valid(
                &mut out,
                "pip-audit",
                Some(RawFinding {
                    file_path: "requirements.txt".to_string(),
                    line_number: None,
                    description: format!("{name}: {id} — {description}"),
                    severity: Severity::High,
                    rule_id: Some(id.to_string()),
                }),
            );
        }
    }
    Ok(out)
}

fn parse_safety(raw: &[u8]) -> NormalizeResult<Vec<RawFinding>> {
    let doc = parse_json(raw)?;
    let vulns = doc
        .get("vulnerabilities")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let mut out = Vec::new();
    for v in vulns {
        let pkg = v.get("package_name").and_then(Value::as_str).unwrap_or("dependency");
        let id = v.get("vulnerability_id").and_then(Value::as_str).unwrap_or("");
        let description = v
            .get("advisory")
            .and_then(Value::as_str)
            .unwrap_or("known vulnerability");

        push_if_valid(
            &mut out,
            "safety",
            Some(RawFinding {
                file_path: "requirements.txt".to_string(),
                line_number: None,
                description: format!("{pkg}: {description}"),
                severity: Severity::High,
                rule_id: Some(id.to_string()),
            }),
        );
    }
    Ok(out)
}

fn parse_npm_audit(raw: &[u8]) -> NormalizeResult<Vec<RawFinding>> {
    let doc = parse_json(raw)?;
    let mut out = Vec::new();
    let vulns = doc.get("vulnerabilities").and_then(Value::as_object);
    for (name, v) in vulns.into_iter().flatten() {
        let severity_raw = v.get("severity").and_then(Value::as_str).unwrap_or("low");
        let via = v.get("via").and_then(Value::as_array);
        let description = via
            .and_then(|a| a.iter().find_map(|x| x.get("title").and_then(Value::as_str)))
            .unwrap_or("vulnerable npm dependency");

        push_if_valid(
            &mut out,
            "npm-audit",
            Some(RawFinding {
                file_path: "package.json".to_string(),
                line_number: None,
                description: format!("{name}: {description}"),
                severity: Severity::from_str_lenient(severity_raw),
                rule_id: Some(name.clone()),
            }),
        );
    }
    Ok(out)
}

fn parse_cargo_audit(raw: &[u8]) -> NormalizeResult<Vec<RawFinding>> {
    let doc = parse_json(raw)?;
    let mut out = Vec::new();
    let vulns = doc
        .get("vulnerabilities")
        .and_then(|v| v.get("list"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    for v in vulns {
        let advisory = v.get("advisory");
        let id = advisory.and_then(|a| a.get("id")).and_then(Value::as_str).unwrap_or("");
        let title = advisory
            .and_then(|a| a.get("title"))
            .and_then(Value::as_str)
            .unwrap_or("vulnerable crate");
        let pkg = v
            .get("package")
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("dependency");

        push_if_valid(
            &mut out,
            "cargo-audit",
            Some(RawFinding {
                file_path: "Cargo.lock".to_string(),
                line_number: None,
                description: format!("{pkg}: {id} — {title}"),
                severity: Severity::High,
                rule_id: Some(id.to_string()),
            }),
        );
    }
    Ok(out)
}

fn parse_bundler_audit(raw: &[u8]) -> NormalizeResult<Vec<RawFinding>> {
    let doc = parse_json(raw)?;
    let mut out = Vec::new();
    for r in doc.get("results").and_then(Value::as_array).into_iter().flatten() {
        let gem = r
            .get("gem")
            .and_then(|g| g.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("dependency");
        let advisory = r.get("advisory");
        let id = advisory.and_then(|a| a.get("id")).and_then(Value::as_str).unwrap_or("");
        let title = advisory
            .and_then(|a| a.get("title"))
            .and_then(Value::as_str)
            .unwrap_or("vulnerable gem");

        push_if_valid(
            &mut out,
            "bundler-audit",
            Some(RawFinding {
                file_path: "Gemfile.lock".to_string(),
                line_number: None,
                description: format!("{gem}: {id} — {title}"),
                severity: Severity::High,
                rule_id: Some(id.to_string()),
            }),
        );
    }
    Ok(out)
}

fn parse_brakeman(workdir: &Path, raw: &[u8]) -> NormalizeResult<Vec<RawFinding>> {
    let doc = parse_json(raw)?;
    let mut out = Vec::new();
    for w in doc.get("warnings").and_then(Value::as_array).into_iter().flatten() {
        let file_path = w.get("file").and_then(Value::as_str).unwrap_or_default();
        let line_number = w.get("line").and_then(Value::as_u64).map(|n| n as u32);
        let description = w.get("message").and_then(Value::as_str).unwrap_or_default();
        let confidence = w.get("confidence").and_then(Value::as_str).unwrap_or("Medium");
        let rule_id = w.get("warning_type").and_then(Value::as_str).map(String::from);

        push_if_valid(
            &mut out,
            "brakeman",
            Some(RawFinding {
                file_path: relative_path(workdir, file_path),
                line_number,
                description: description.to_string(),
                severity: Severity::from_str_lenient(confidence),
                rule_id,
            }),
        );
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn wd() -> PathBuf {
        PathBuf::from("/work/repo")
    }

    #[test]
    fn semgrep_drops_records_missing_description() {
        let raw = br#"{"results":[{"path":"/work/repo/a.py","start":{"line":3},"extra":{"message":"","severity":"ERROR"},"check_id":"x"}]}"#;
        let out = parse(OutputFormat::SemgrepJson, &wd(), raw).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn semgrep_parses_and_relativizes_path() {
        let raw = br#"{"results":[{"path":"/work/repo/a.py","start":{"line":3},"extra":{"message":"sql injection","severity":"ERROR"},"check_id":"x"}]}"#;
        let out = parse(OutputFormat::SemgrepJson, &wd(), raw).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].file_path, "a.py");
        assert_eq!(out[0].line_number, Some(3));
        assert_eq!(out[0].severity, Severity::Critical);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let raw = b"not json";
        let err = parse(OutputFormat::SemgrepJson, &wd(), raw).unwrap_err();
        assert!(matches!(err, NormalizeError::Malformed(_)));
    }

    #[test]
    fn empty_output_is_empty_list_not_error() {
        let out = parse(OutputFormat::GitleaksJson, &wd(), b"").unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn gitleaks_maps_to_high_severity() {
        let raw = br#"[{"File":"/work/repo/.env","StartLine":3,"RuleID":"aws-access-key"}]"#;
        let out = parse(OutputFormat::GitleaksJson, &wd(), raw).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].severity, Severity::High);
        assert_eq!(out[0].file_path, ".env");
    }
}
