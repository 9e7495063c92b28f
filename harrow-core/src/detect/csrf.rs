use super::{Detection, Probe};
use once_cell::sync::Lazy;
use regex::Regex;

pub const TOKEN_HANDLING: Detection = Detection::new("CSRF", 50);

static CSRF_PHRASES: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?i)(request forgery|(csrf|xsrf)\s+(token\s+)?(check|validation|verification)\s+failed|(invalid|missing|expired|mismatched)\s+(csrf\s+|xsrf\s+|security\s+|form\s+)?token|token\s+(is\s+)?(invalid|missing|expired|mismatch)|unauthori[sz]ed|not\s+authori[sz]ed|forbidden|permission\s+denied)",
    )
    .ok()
});

/// Content drift plus wording that points at anti-forgery token handling.
pub fn detect(probe: &Probe) -> Option<Detection> {
    let re = CSRF_PHRASES.as_ref()?;
    (probe.content_drift() && re.is_match(probe.body())).then_some(TOKEN_HANDLING)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::Baseline;
    use crate::config::DetectionConfig;
    use crate::detect::tests::snapshot;
    use std::time::Duration;
    use url::Url;

    fn run(body: &str, base_body: Option<&str>) -> Option<Detection> {
        let origin = Url::parse("http://test.local/").unwrap();
        let config = DetectionConfig::default();
        let response = snapshot(403, body, 10);
        let base = base_body.map(|b| Baseline {
            status: 200,
            body_length: b.len(),
            body: b.to_string(),
            elapsed: Duration::from_millis(10),
        });
        detect(&Probe::new(&response, "1", base.as_ref(), &origin, &config))
    }

    #[test]
    fn test_token_error_after_drift() {
        assert_eq!(
            run("<h1>Forbidden</h1><p>CSRF token missing or incorrect.</p>", Some("<p>Profile updated</p>")),
            Some(TOKEN_HANDLING)
        );
        assert_eq!(
            run("<p>Your session expired: invalid security token</p>", Some("<p>Profile updated</p>")),
            Some(TOKEN_HANDLING)
        );
    }

    #[test]
    fn test_unauthorized_after_drift() {
        assert_eq!(
            run("<p>You are not authorized to perform this action.</p>", Some("<p>Profile updated</p>")),
            Some(TOKEN_HANDLING)
        );
        assert_eq!(
            run("<h1>403 Forbidden</h1><p>Permission denied</p>", Some("<p>Profile updated</p>")),
            Some(TOKEN_HANDLING)
        );
    }

    #[test]
    fn test_token_field_name_alone_is_clean() {
        let base = "<p>Profile updated</p>";
        let body = "<form><input type=hidden name=csrf_token value=abc><input name=bio></form>";
        assert_eq!(run(body, Some(base)), None);
    }

    #[test]
    fn test_phrase_without_drift_is_clean() {
        let page = "<form><input type=hidden name=csrf_token value=abc></form>";
        assert_eq!(run(page, Some(page)), None);
        assert_eq!(run(page, None), None);
    }
}
