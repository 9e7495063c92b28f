use super::{Detection, Probe};
use scraper::{Html, Selector};

pub const SCRIPT_BLOCK: Detection = Detection::new("XSS (script block)", 85);
pub const ATTRIBUTE: Detection = Detection::new("XSS (attribute injection)", 75);
pub const HTML_TAG: Detection = Detection::new("XSS (HTML tag injection)", 70);
pub const ENCODED: Detection = Detection::new("XSS (encoded context)", 30);
pub const HEURISTIC: Detection = Detection::new("XSS (pattern heuristic)", 40);

const EXPLOIT_TOKENS: &[&str] = &[
    "<script",
    "javascript:",
    "onerror",
    "onload",
    "onmouseover",
    "onfocus",
    "alert(",
    "prompt(",
    "confirm(",
    "document.cookie",
    "eval(",
    "<svg",
    "<iframe",
];

pub fn detect(probe: &Probe) -> Option<Detection> {
    let payload = probe.payload;
    if payload.is_empty() {
        return None;
    }
    let body = probe.body();

    if body.contains(payload) && !probe.baseline_contains(payload) {
        return Some(classify_reflection(body, payload));
    }

    if probe.content_drift() {
        if encoded_variants(payload).iter().any(|v| body.contains(v.as_str())) {
            return Some(ENCODED);
        }
        if exploit_token_near_payload(body, payload, probe.config.evidence_width) {
            return Some(HEURISTIC);
        }
    }

    None
}

/// Where a verbatim reflection landed in the document.
fn classify_reflection(body: &str, payload: &str) -> Detection {
    let document = Html::parse_document(body);

    if let Ok(scripts) = Selector::parse("script") {
        if document
            .select(&scripts)
            .any(|s| s.text().collect::<String>().contains(payload))
        {
            return SCRIPT_BLOCK;
        }
    }

    if let Ok(all) = Selector::parse("*") {
        if document
            .select(&all)
            .any(|el| el.value().attrs().any(|(_, value)| value.contains(payload)))
        {
            return ATTRIBUTE;
        }
    }

    if inside_tag(body, payload) {
        return ATTRIBUTE;
    }

    HTML_TAG
}

/// The first raw occurrence sits between a `<` and its closing `>`.
fn inside_tag(body: &str, payload: &str) -> bool {
    let Some(idx) = body.find(payload) else {
        return false;
    };
    let before = &body[..idx];
    match (before.rfind('<'), before.rfind('>')) {
        (Some(open), Some(close)) => open > close,
        (Some(_), None) => true,
        _ => false,
    }
}

/// The payload as the common server-side HTML escapers would print it.
fn encoded_variants(payload: &str) -> Vec<String> {
    let mut variants: Vec<String> = Vec::new();
    let candidates = [
        html_escape::encode_text(payload).into_owned(),
        html_escape::encode_quoted_attribute(payload).into_owned(),
        html_escape::encode_quoted_attribute(payload).replace("&#x27;", "&#39;"),
        html_escape::encode_safe(payload).into_owned(),
    ];
    for candidate in candidates {
        if candidate != payload && !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}

/// An exploit token within half an evidence window of the payload's most distinctive word.
fn exploit_token_near_payload(body: &str, payload: &str, window: usize) -> bool {
    let body_lower = body.to_lowercase();
    let payload_lower = payload.to_lowercase();

    let Some(anchor) = payload_lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3)
        .max_by_key(|w| w.len())
    else {
        return false;
    };
    let Some(pos) = body_lower.find(anchor) else {
        return false;
    };

    let half = (window / 2).max(1);
    let mut start = pos.saturating_sub(half);
    while !body_lower.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = (pos + anchor.len() + half).min(body_lower.len());
    while !body_lower.is_char_boundary(end) {
        end += 1;
    }

    let region = &body_lower[start..end];
    EXPLOIT_TOKENS.iter().any(|t| region.contains(t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::Baseline;
    use crate::config::DetectionConfig;
    use crate::detect::tests::snapshot;
    use std::time::Duration;
    use url::Url;

    fn baseline(body: &str) -> Baseline {
        Baseline {
            status: 200,
            body_length: body.len(),
            body: body.to_string(),
            elapsed: Duration::from_millis(10),
        }
    }

    fn run(payload: &str, body: &str, base: Option<&Baseline>) -> Option<Detection> {
        let origin = Url::parse("http://test.local/").unwrap();
        let config = DetectionConfig::default();
        let response = snapshot(200, body, 10);
        detect(&Probe::new(&response, payload, base, &origin, &config))
    }

    #[test]
    fn test_reflection_as_markup_is_tag_injection() {
        let payload = "<script>alert(1)</script>";
        let body = format!("<html><body><div>{}</div></body></html>", payload);
        assert_eq!(run(payload, &body, None), Some(HTML_TAG));
    }

    #[test]
    fn test_reflection_inside_script_block() {
        let payload = "';alert(1);//";
        let body = format!("<script>var q = '{}';</script>", payload);
        assert_eq!(run(payload, &body, None), Some(SCRIPT_BLOCK));
    }

    #[test]
    fn test_reflection_inside_attribute_value() {
        let payload = "harrow<probe";
        let body = format!("<input name=\"q\" value=\"{}\">", payload);
        assert_eq!(run(payload, &body, None), Some(ATTRIBUTE));
    }

    #[test]
    fn test_attribute_breakout_is_attribute_injection() {
        let payload = "\" onmouseover=\"alert(1)";
        let body = format!("<input name=\"q\" value=\"{}\">", payload);
        assert_eq!(run(payload, &body, None), Some(ATTRIBUTE));
    }

    #[test]
    fn test_reflection_already_in_baseline_is_ignored() {
        let payload = "<b>";
        let page = "<html><b>bold</b></html>";
        let base = baseline(page);
        assert_eq!(run(payload, page, Some(&base)), None);
    }

    #[test]
    fn test_encoded_reflection_needs_drift() {
        let payload = "<script>alert(1)</script>";
        let encoded = "&lt;script&gt;alert(1)&lt;/script&gt;";
        let base = baseline("<p>Search for nothing</p>");
        let body = format!("<p>You searched for: {} - 0 results found here</p>", encoded);
        assert_eq!(run(payload, &body, Some(&base)), Some(ENCODED));

        // same reflection but no baseline means no drift signal
        assert_eq!(run(payload, &body, None), None);
    }

    #[test]
    fn test_attribute_escaped_reflection() {
        let payload = "\"'><svg onload=alert(1)>";
        let base = baseline("<form><input name=\"q\" value=\"\"></form>");
        let body = "<form><input name=\"q\" value=\"&quot;&#x27;&gt;&lt;svg onload=alert(1)&gt;\"></form>";
        assert_eq!(run(payload, body, Some(&base)), Some(ENCODED));
    }

    #[test]
    fn test_encoded_variants_skip_inert_payloads() {
        assert!(encoded_variants("plain text").is_empty());
        assert!(encoded_variants("<b>").contains(&"&lt;b&gt;".to_string()));
    }

    #[test]
    fn test_pattern_heuristic() {
        let payload = "<img src=x onerror=alert(1)>";
        let base = baseline("<p>welcome</p>");
        // payload mangled by a filter but the handler survived
        let body = "<div>profile saved</div><img src=x onerror=alert(1) data-filtered=\"true\">";
        assert_eq!(run(payload, body, Some(&base)), Some(HEURISTIC));
    }

    #[test]
    fn test_unreflected_payload_is_clean() {
        let base = baseline("<p>hello</p>");
        assert_eq!(run("<svg onload=alert(1)>", "<p>hello</p>", Some(&base)), None);
    }
}
