//! Building and timing form submissions.

use harrow_scanner::normalize::is_http;
use harrow_scanner::{Form, Method};
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder};
use std::time::{Duration, Instant};
use url::Url;

/// Value sent to inputs that do not receive the payload.
pub const PLACEHOLDER_VALUE: &str = "test";

/// What the detectors get to look at.
#[derive(Debug, Clone)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
    /// Send to end of body.
    pub elapsed: Duration,
}

/// The form's action as an absolute http(s) URL.
pub fn action_url(form: &Form) -> Option<Url> {
    Url::parse(&form.action).ok().filter(is_http)
}

/// Parameters with `payload` in every textual named input, placeholder elsewhere.
pub fn payload_params(form: &Form, payload: &str) -> Vec<(String, String)> {
    form.named_inputs()
        .filter_map(|input| {
            let name = input.name.clone()?;
            let value = if input.is_textual() {
                payload.to_string()
            } else {
                PLACEHOLDER_VALUE.to_string()
            };
            Some((name, value))
        })
        .collect()
}

/// Parameters with the placeholder in every named input.
pub fn benign_params(form: &Form) -> Vec<(String, String)> {
    form.named_inputs()
        .filter_map(|input| Some((input.name.clone()?, PLACEHOLDER_VALUE.to_string())))
        .collect()
}

/// GET sends the parameters as the query string, POST as a urlencoded body.
pub fn form_request(
    client: &Client,
    url: Url,
    method: Method,
    params: &[(String, String)],
) -> RequestBuilder {
    match method {
        Method::Get => client.get(url).query(params),
        Method::Post => client.post(url).form(params),
    }
}

pub async fn execute(request: RequestBuilder) -> Result<ResponseSnapshot, reqwest::Error> {
    let start = Instant::now();
    let response = request.send().await?;
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let body = response.text().await?;

    Ok(ResponseSnapshot {
        status,
        headers,
        body,
        elapsed: start.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use harrow_scanner::Input;

    fn form() -> Form {
        Form {
            action: "http://test.local/search".to_string(),
            method: Method::Get,
            inputs: vec![
                Input::new("input", "text", Some("q")),
                Input::new("input", "hidden", Some("token")),
                Input::new("textarea", "textarea", Some("body")),
                Input::new("input", "submit", None),
            ],
        }
    }

    #[test]
    fn test_payload_only_in_textual_inputs() {
        let params = payload_params(&form(), "'");
        assert_eq!(
            params,
            vec![
                ("q".to_string(), "'".to_string()),
                ("token".to_string(), PLACEHOLDER_VALUE.to_string()),
                ("body".to_string(), "'".to_string()),
            ]
        );
    }

    #[test]
    fn test_benign_params_cover_named_inputs() {
        let params = benign_params(&form());
        assert_eq!(params.len(), 3);
        assert!(params.iter().all(|(_, v)| v == PLACEHOLDER_VALUE));
    }

    #[test]
    fn test_action_url_rejects_non_http() {
        let mut f = form();
        assert!(action_url(&f).is_some());
        f.action = "javascript:void(0)".to_string();
        assert!(action_url(&f).is_none());
        f.action = "not a url".to_string();
        assert!(action_url(&f).is_none());
    }
}
