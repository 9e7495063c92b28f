//! Content-drift comparison between a fuzz response and its baseline.

use strsim::normalized_levenshtein;

/// Levenshtein distance over characters divided by the longer length, in `0.0..=1.0`.
///
/// When either body exceeds `max_chars`, both are sampled with the same stride so
/// the comparison stays bounded.
pub fn normalized_distance(a: &str, b: &str, max_chars: usize) -> f64 {
    if a == b {
        return 0.0;
    }

    let longest = a.chars().count().max(b.chars().count());
    let max_chars = max_chars.max(1);
    let (a, b) = if longest > max_chars {
        let stride = longest.div_ceil(max_chars);
        (sample(a, stride), sample(b, stride))
    } else {
        (a.to_string(), b.to_string())
    };

    (1.0 - normalized_levenshtein(&a, &b)).clamp(0.0, 1.0)
}

/// True when the bodies differ by more than `threshold`.
pub fn content_differs(baseline: &str, body: &str, threshold: f64, max_chars: usize) -> bool {
    if baseline == body {
        return false;
    }
    normalized_distance(baseline, body, max_chars) > threshold
}

fn sample(text: &str, stride: usize) -> String {
    text.chars().step_by(stride).collect()
}
