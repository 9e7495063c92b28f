use super::{Detection, Probe};
use once_cell::sync::Lazy;
use regex::Regex;

pub const EVALUATED: Detection = Detection::new("Server-Side Template Injection", 85);

static STRING_REPEAT: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"(\d{1,4})\s*\*\s*['"](\d{1,4})['"]"#).ok());
static PRODUCT: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(\d{1,9})\s*\*\s*(\d{1,9})").ok());

/// The literal a template engine would render for the payload's arithmetic.
pub fn expected_literal(payload: &str) -> Option<String> {
    if let Some(caps) = STRING_REPEAT.as_ref().and_then(|re| re.captures(payload)) {
        let count: usize = caps[1].parse().ok()?;
        if count > 64 {
            return None;
        }
        return Some(caps[2].repeat(count));
    }

    let caps = PRODUCT.as_ref()?.captures(payload)?;
    let a: u64 = caps[1].parse().ok()?;
    let b: u64 = caps[2].parse().ok()?;
    a.checked_mul(b).map(|p| p.to_string())
}

/// The evaluated literal appears in the response but not in the baseline.
pub fn detect(probe: &Probe) -> Option<Detection> {
    let expected = expected_literal(probe.payload)?;
    let body = probe.body();
    if !body.contains(&expected) || probe.baseline_contains(&expected) {
        return None;
    }
    // the literal only turned up inside an unevaluated echo of the payload
    if probe.payload.contains(&expected) && body.matches(&expected).count() <= body.matches(probe.payload).count() {
        return None;
    }
    Some(EVALUATED)
}
