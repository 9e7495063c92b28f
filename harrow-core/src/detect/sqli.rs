use super::{Detection, Probe};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

pub const ERROR_BASED: Detection = Detection::new("SQL Injection", 80);
pub const DIFFERENTIAL: Detection = Detection::new("SQL Injection (Differential)", 55);
pub const TIME_BASED: Detection = Detection::new("SQL Injection (Blind Time-Based)", 65);

/// DBMS error fingerprints, matched case-insensitively.
static SQL_ERRORS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"you have an error in your sql syntax",
        r"warning:.*\bmysqli?_",
        r"mysql_fetch_(array|assoc|row)",
        r"unclosed quotation mark after the character string",
        r"quoted string not properly terminated",
        r"incorrect syntax near",
        r"microsoft ole db provider for (odbc|sql server)",
        r"\[odbc sql server driver\]",
        r"pg_query\(\)",
        r"syntax error at or near",
        r"unterminated quoted string at or near",
        r"postgresql.*error",
        r"\bora-\d{5}\b",
        r"sqlite3?::(sql)?exception",
        r"sqlite_error",
        r#"near ".*": syntax error"#,
        r"sqlstate\[\w+\]",
        r"pdoexception",
    ]
    .iter()
    .filter_map(|p| Regex::new(&format!("(?i){}", p)).ok())
    .collect()
});

const DELAY_PRIMITIVES: &[&str] = &[
    "sleep(",
    "pg_sleep",
    "waitfor delay",
    "benchmark(",
    "dbms_lock.sleep",
    "randomblob(",
];

pub fn detect(probe: &Probe) -> Option<Detection> {
    if let Some(baseline) = probe.baseline {
        if matches_error(probe.body()) && !matches_error(&baseline.body) {
            return Some(ERROR_BASED);
        }
    } else if matches_error(probe.body()) {
        return Some(ERROR_BASED);
    }

    if probe.baseline.is_some() && (probe.status_changed() || probe.content_drift()) {
        return Some(DIFFERENTIAL);
    }

    let margin = Duration::from_secs_f64(probe.config.sqli_delay_margin_secs.max(0.0));
    if has_delay_primitive(probe.payload) && probe.extra_delay() >= margin {
        return Some(TIME_BASED);
    }

    None
}

fn matches_error(body: &str) -> bool {
    SQL_ERRORS.iter().any(|re| re.is_match(body))
}

fn has_delay_primitive(payload: &str) -> bool {
    let lower = payload.to_lowercase();
    DELAY_PRIMITIVES.iter().any(|p| lower.contains(p))
}
