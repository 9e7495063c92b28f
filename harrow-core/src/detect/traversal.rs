use super::{Detection, Probe};
use once_cell::sync::Lazy;
use regex::Regex;

pub const FILE_DISCLOSURE: Detection = Detection::new("Path Traversal", 85);

/// Contents of files traversal payloads typically reach.
static FILE_FINGERPRINTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"root:[x*]?:0:0:",
        r"(?m)^daemon:[x*]?:\d+:\d+:",
        r"(?i)\[boot loader\]",
        r"(?i); for 16-bit app support",
        r"(?m)^\[(extensions|fonts|mci extensions)\]\s*$",
        r"-----BEGIN (RSA |EC |OPENSSH )?PRIVATE KEY-----",
        r"<\?php",
        r"(?m)^\s*DB_PASSWORD\s*=",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// A file fingerprint that the baseline lacks, on a response that drifted from it.
pub fn detect(probe: &Probe) -> Option<Detection> {
    if !probe.content_drift() {
        return None;
    }
    let baseline = probe.baseline?;
    let body = probe.body();
    FILE_FINGERPRINTS
        .iter()
        .any(|re| re.is_match(body) && !re.is_match(&baseline.body))
        .then_some(FILE_DISCLOSURE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::Baseline;
    use crate::config::DetectionConfig;
    use crate::detect::tests::snapshot;
    use std::time::Duration;
    use url::Url;

    fn run(body: &str, base: Option<&Baseline>) -> Option<Detection> {
        let origin = Url::parse("http://test.local/").unwrap();
        let config = DetectionConfig::default();
        let response = snapshot(200, body, 10);
        detect(&Probe::new(&response, "../../../../etc/passwd", base, &origin, &config))
    }

    fn base() -> Baseline {
        let body = "<p>File not found</p>";
        Baseline {
            status: 200,
            body_length: body.len(),
            body: body.to_string(),
            elapsed: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_passwd_disclosure() {
        let body = "root:x:0:0:root:/root:/bin/bash\ndaemon:x:1:1:daemon:/usr/sbin:/usr/sbin/nologin\n";
        assert_eq!(run(body, Some(&base())), Some(FILE_DISCLOSURE));
    }

    #[test]
    fn test_win_ini_disclosure() {
        let body = "; for 16-bit app support\n[fonts]\n[extensions]\n[mci extensions]\n";
        assert_eq!(run(body, Some(&base())), Some(FILE_DISCLOSURE));
    }

    #[test]
    fn test_fingerprint_without_drift_is_clean() {
        assert_eq!(run("root:x:0:0:root:/root:/bin/bash", None), None);
    }

    #[test]
    fn test_drift_without_fingerprint_is_clean() {
        let body = "<h1>Internal Server Error</h1><p>something went wrong</p>";
        assert_eq!(run(body, Some(&base())), None);
    }
}
