use super::{Detection, Probe};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

pub const OUTPUT: Detection = Detection::new("Command Injection", 90);
pub const TIME_BASED: Detection = Detection::new("Command Injection (Time-Based)", 70);
pub const DIFFERENTIAL: Detection = Detection::new("Command Injection (Differential)", 40);

/// Output of `id`, `ls -l`, `dir`, and `cat /etc/passwd`.
static CMD_OUTPUT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"uid=\d+\([\w.-]+\)\s+gid=\d+",
        r"(?m)^[\w.-]+:[x*!]?:\d+:\d+:[^:\n]*:[^:\n]*:[^:\n]*$",
        r"root:x:0:0:",
        r"(?m)^total\s+\d+\s*$",
        r"(?m)^[dlcbps-][rwxsStT-]{9}[.+@]?\s+\d+\s+\S+\s+\S+",
        r"(?i)volume\s+serial\s+number",
        r"(?i)directory\s+of\s+[a-z]:\\",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

const DELAY_PRIMITIVES: &[&str] = &["sleep ", "ping -c", "ping -n", "timeout /t", "timeout "];

pub fn detect(probe: &Probe) -> Option<Detection> {
    let body = probe.body();
    let output_hit = CMD_OUTPUT_PATTERNS.iter().any(|re| {
        re.is_match(body) && !probe.baseline.is_some_and(|b| re.is_match(&b.body))
    });
    if output_hit {
        return Some(OUTPUT);
    }

    let margin = Duration::from_secs_f64(probe.config.cmd_delay_margin_secs.max(0.0));
    if has_delay_primitive(probe.payload) && probe.extra_delay() >= margin {
        return Some(TIME_BASED);
    }

    if probe.content_drift() {
        return Some(DIFFERENTIAL);
    }

    None
}

fn has_delay_primitive(payload: &str) -> bool {
    let lower = payload.to_lowercase().replace("${ifs}", " ");
    DELAY_PRIMITIVES.iter().any(|p| lower.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::Baseline;
    use crate::config::DetectionConfig;
    use crate::detect::tests::snapshot;
    use url::Url;

    fn baseline(body: &str, elapsed_ms: u64) -> Baseline {
        Baseline {
            status: 200,
            body_length: body.len(),
            body: body.to_string(),
            elapsed: Duration::from_millis(elapsed_ms),
        }
    }

    fn run(payload: &str, body: &str, elapsed_ms: u64, base: Option<&Baseline>) -> Option<Detection> {
        let origin = Url::parse("http://test.local/").unwrap();
        let config = DetectionConfig::default();
        let response = snapshot(200, body, elapsed_ms);
        detect(&Probe::new(&response, payload, base, &origin, &config))
    }

    #[test]
    fn test_os_output_fingerprints() {
        for body in [
            "<pre>uid=33(www-data) gid=33(www-data) groups=33(www-data)</pre>",
            "<pre>root:x:0:0:root:/root:/bin/bash\ndaemon:x:1:1:daemon:/usr/sbin:/usr/sbin/nologin</pre>",
            "total 12\ndrwxr-xr-x 2 www www 4096 Jan  1 00:00 uploads\n",
            " Volume Serial Number is 1234-ABCD\n Directory of C:\\inetpub\n",
        ] {
            assert_eq!(run(";id", body, 10, None), Some(OUTPUT), "{}", body);
        }
    }

    #[test]
    fn test_output_present_in_baseline_is_ignored() {
        let page = "<pre>uid=0(root) gid=0(root)</pre> tutorial";
        let base = baseline(page, 10);
        assert_eq!(run(";id", page, 10, Some(&base)), None);
    }

    #[test]
    fn test_time_based() {
        let base = baseline("pong", 50);
        assert_eq!(run("; sleep 5", "pong", 5_100, Some(&base)), Some(TIME_BASED));
        assert_eq!(run("| ping -c 5 127.0.0.1", "pong", 4_000, Some(&base)), Some(TIME_BASED));
        assert_eq!(run("; sleep 5", "pong", 1_000, Some(&base)), None);
    }

    #[test]
    fn test_drift_is_differential() {
        let base = baseline("<p>Ping result: ok</p>", 10);
        let body = "<p>Error: invalid host specified, aborting request</p>";
        assert_eq!(run("$(id)", body, 10, Some(&base)), Some(DIFFERENTIAL));
    }
}
