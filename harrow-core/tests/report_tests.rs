// Tests for report rendering

use chrono::{Duration as ChronoDuration, Utc};
use harrow_core::report::{ReportFormat, generate_text_report, render, save_report};
use harrow_core::{Attempt, AttemptResult, Category, ScanReport, Vulnerability};
use harrow_scanner::{ExtractionResult, Form, Input, Method};
use std::fs;
use tempfile::TempDir;
use uuid::Uuid;

fn sample_report() -> ScanReport {
    let started_at = Utc::now();
    let form = Form {
        action: "http://test.local/login.php".to_string(),
        method: Method::Post,
        inputs: vec![
            Input::new("input", "text", Some("username")),
            Input::new("input", "password", Some("password")),
        ],
    };

    let attempt = |payload: &str, result: AttemptResult| Attempt {
        form_action: form.action.clone(),
        method: Method::Post,
        category: Category::SqlInjection,
        payload: payload.to_string(),
        result,
        status: Some(200),
        elapsed_ms: 12,
        error: None,
    };

    ScanReport {
        run_id: Uuid::new_v4(),
        target: "http://test.local/".to_string(),
        started_at,
        finished_at: started_at + ChronoDuration::milliseconds(2500),
        crawled_urls: vec![
            "http://test.local".to_string(),
            "http://test.local/login.php".to_string(),
        ],
        extraction_results: vec![ExtractionResult {
            url: "http://test.local/login.php".to_string(),
            forms: vec![form.clone()],
            independent_inputs: Vec::new(),
        }],
        vulnerabilities: vec![Vulnerability {
            vuln_type: "SQL Injection".to_string(),
            category: Category::SqlInjection,
            payload: "' OR '1'='1".to_string(),
            form_action: form.action.clone(),
            method: Method::Post,
            confidence: 80,
            evidence: "You have an error in your SQL syntax".to_string(),
            response_code: 500,
        }],
        attempts: vec![
            attempt("' OR '1'='1", AttemptResult::Finding("SQL Injection".to_string())),
            attempt("'", AttemptResult::NoFinding),
            attempt("' OR SLEEP(5)-- ", AttemptResult::Timeout),
        ],
        fuzzing_aborted: None,
    }
}

// ============================================================================
// ReportFormat Tests
// ============================================================================

#[test]
fn test_report_format_from_str() {
    assert_eq!(ReportFormat::from_str("text"), Some(ReportFormat::Text));
    assert_eq!(ReportFormat::from_str("JSON"), Some(ReportFormat::Json));
    assert_eq!(ReportFormat::from_str("Txt"), Some(ReportFormat::Text));
    assert_eq!(ReportFormat::from_str("html"), None);
}

// ============================================================================
// Text Report Tests
// ============================================================================

#[test]
fn test_text_report_sections() {
    let report = sample_report();
    let text = generate_text_report(&report);

    assert!(text.contains("HARROW SCAN REPORT"));
    assert!(text.contains(&report.run_id.to_string()));
    assert!(text.contains("Target:       http://test.local/"));
    assert!(text.contains("Duration:     2.5 seconds"));
    assert!(text.contains("Pages Found:  2"));
    assert!(text.contains("Forms Found:  1"));
    assert!(text.contains("Total Vulnerabilities: 1"));
    assert!(text.contains("## SQL Injection (1)"));
    assert!(text.contains("[1] POST http://test.local/login.php"));
    assert!(text.contains("Confidence:   80%"));
    assert!(text.contains("Timeout"));
    assert!(text.contains("No Finding"));
    assert!(text.contains("For authorized security testing only."));
}

#[test]
fn test_text_report_without_findings() {
    let mut report = sample_report();
    report.vulnerabilities.clear();
    report.attempts.clear();
    report.fuzzing_aborted = Some("Authentication failed: login returned HTTP 401".to_string());

    let text = generate_text_report(&report);
    assert!(text.contains("Total Vulnerabilities: 0"));
    assert!(!text.contains("VULNERABILITIES\n"));
    assert!(text.contains("Fuzzing:      aborted"));
}

// ============================================================================
// JSON Report Tests
// ============================================================================

#[test]
fn test_json_report_structure() {
    let report = sample_report();
    let json = render(&report, ReportFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    let root = &value["report"];
    assert_eq!(root["metadata"]["generator"], "Harrow");
    assert_eq!(root["summary"]["pages_crawled"], 2);
    assert_eq!(root["summary"]["total_vulnerabilities"], 1);
    assert_eq!(root["summary"]["attempt_breakdown"]["Timeout"], 1);

    let scan = &root["scan"];
    assert_eq!(scan["run_id"], report.run_id.to_string());
    assert_eq!(scan["vulnerabilities"][0]["type"], "SQL Injection");
    assert_eq!(scan["vulnerabilities"][0]["category"], "sql_injection");
    assert_eq!(scan["vulnerabilities"][0]["method"], "POST");
    assert_eq!(scan["attempts"][0]["result"], "SQL Injection");
    assert_eq!(scan["attempts"][1]["result"], "No Finding");
    assert_eq!(scan["extraction_results"][0]["forms"][0]["inputs"][1]["type"], "password");
    assert!(scan.get("fuzzing_aborted").is_none());
}

#[test]
fn test_scan_report_roundtrips_through_json() {
    let report = sample_report();
    let json = serde_json::to_string(&report).unwrap();
    let back: ScanReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back, report);
}

#[test]
fn test_save_report() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.txt");
    let text = render(&sample_report(), ReportFormat::Text).unwrap();

    save_report(&text, &path).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), text);
}
