use super::{Detection, Probe};
use harrow_scanner::normalize::is_same_origin;
use reqwest::header::LOCATION;

pub const OFF_ORIGIN: Detection = Detection::new("Open Redirect", 80);

/// A 3xx whose `Location` resolves outside the scan origin.
pub fn detect(probe: &Probe) -> Option<Detection> {
    if !(300..400).contains(&probe.status()) {
        return None;
    }
    let location = probe.response.headers.get(LOCATION)?.to_str().ok()?.trim();
    if location.is_empty() {
        return None;
    }
    // browsers treat backslashes in the authority like forward slashes
    let location = location.replace('\\', "/");
    let target = probe.origin.join(&location).ok()?;
    (!is_same_origin(&target, probe.origin)).then_some(OFF_ORIGIN)
}
