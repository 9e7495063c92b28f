// Report generation from a finished run

use crate::scan::ScanReport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";
const THIN_RULE: &str = "────────────────────────────────────────────────────────────────────────────────\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

pub fn render(report: &ScanReport, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(report)),
        ReportFormat::Json => generate_json_report(report),
    }
}

pub fn generate_text_report(report: &ScanReport) -> String {
    let mut out = String::new();

    out.push_str(RULE);
    out.push_str("                          HARROW SCAN REPORT\n");
    out.push_str(RULE);
    out.push('\n');

    out.push_str(&format!("Run ID:       {}\n", report.run_id));
    out.push_str(&format!("Target:       {}\n", report.target));
    out.push_str(&format!(
        "Scan Date:    {}\n",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    let duration = report.finished_at - report.started_at;
    out.push_str(&format!(
        "Duration:     {:.1} seconds\n",
        duration.num_milliseconds() as f64 / 1000.0
    ));
    out.push_str(&format!("Pages Found:  {}\n", report.crawled_urls.len()));
    out.push_str(&format!("Forms Found:  {}\n", report.form_count()));
    out.push_str(&format!("Attempts:     {}\n", report.attempts.len()));
    if let Some(ref reason) = report.fuzzing_aborted {
        out.push_str(&format!("Fuzzing:      aborted ({})\n", reason));
    }
    out.push('\n');

    out.push_str(RULE);
    out.push_str("SUMMARY\n");
    out.push_str(RULE);
    out.push('\n');

    out.push_str(&format!(
        "Total Vulnerabilities: {}\n\n",
        report.vulnerabilities.len()
    ));
    for (label, count) in report.vulnerability_counts() {
        out.push_str(&format!("  {:<36} {}\n", label, count));
    }
    if !report.attempts.is_empty() {
        out.push_str("\nAttempt outcomes:\n");
        for (label, count) in report.attempt_counts() {
            out.push_str(&format!("  {:<36} {}\n", label, count));
        }
    }
    out.push('\n');

    if !report.vulnerabilities.is_empty() {
        out.push_str(RULE);
        out.push_str("VULNERABILITIES\n");
        out.push_str(RULE);
        out.push('\n');

        let mut by_type: BTreeMap<&str, Vec<_>> = BTreeMap::new();
        for v in &report.vulnerabilities {
            by_type.entry(v.vuln_type.as_str()).or_default().push(v);
        }

        let mut idx = 0;
        for (vuln_type, vulns) in by_type {
            out.push_str(&format!("## {} ({})\n\n", vuln_type, vulns.len()));
            for v in vulns {
                idx += 1;
                out.push_str(&format!("[{}] {} {}\n", idx, v.method.as_str(), v.form_action));
                out.push_str(&format!("Confidence:   {}%\n", v.confidence));
                out.push_str(&format!("Response:     HTTP {}\n", v.response_code));
                out.push_str(&format!("Payload:      {}\n", v.payload));
                out.push_str("Evidence:\n");
                out.push_str(&indent(&v.evidence, "  "));
                out.push('\n');
                out.push_str(THIN_RULE);
                out.push('\n');
            }
        }
    }

    if !report.crawled_urls.is_empty() {
        out.push_str(RULE);
        out.push_str("CRAWLED URLS\n");
        out.push_str(RULE);
        out.push('\n');
        for url in &report.crawled_urls {
            out.push_str(&format!("  {}\n", url));
        }
        out.push('\n');
    }

    out.push_str(RULE);
    out.push_str("                            End of Report\n");
    out.push_str(RULE);
    out.push_str("\nGenerated by Harrow - crawl-and-fuzz web scanner\n");
    out.push_str("For authorized security testing only.\n\n");

    out
}

pub fn generate_json_report(report: &ScanReport) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Harrow",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json",
                "disclaimer": "For authorized security testing only"
            },
            "summary": {
                "pages_crawled": report.crawled_urls.len(),
                "forms_found": report.form_count(),
                "total_attempts": report.attempts.len(),
                "total_vulnerabilities": report.vulnerabilities.len(),
                "vulnerability_breakdown": report.vulnerability_counts(),
                "attempt_breakdown": report.attempt_counts(),
            },
            "scan": report,
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn indent(text: &str, prefix: &str) -> String {
    let mut result = String::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        result.push_str(prefix);
        result.push_str(line.trim_end());
        result.push('\n');
    }
    result
}
