//! Benign reference responses, one per form action, shared by every task on that action.

use crate::request::{action_url, benign_params, execute, form_request};
use harrow_scanner::Form;
use harrow_scanner::normalize::canonicalize;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub status: u16,
    pub body_length: usize,
    pub body: String,
    pub elapsed: Duration,
}

type Slot = Arc<OnceCell<Option<Arc<Baseline>>>>;

/// Establishes a baseline at most once per method and action; concurrent callers wait on
/// the same request. Forms sharing an action share the first one's baseline.
pub struct BaselineOracle {
    client: Client,
    cache: Mutex<HashMap<String, Slot>>,
}

impl BaselineOracle {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Sends one benign submission. `None` when the request cannot be made or fails.
    pub async fn establish(&self, form: &Form) -> Option<Baseline> {
        let url = action_url(form)?;
        let params = benign_params(form);
        let request = form_request(&self.client, url, form.method, &params);

        match execute(request).await {
            Ok(snapshot) => {
                debug!(
                    "Baseline for {} {}: {} ({} bytes, {:?})",
                    form.method.as_str(),
                    form.action,
                    snapshot.status,
                    snapshot.body.len(),
                    snapshot.elapsed
                );
                Some(Baseline {
                    status: snapshot.status,
                    body_length: snapshot.body.len(),
                    body: snapshot.body,
                    elapsed: snapshot.elapsed,
                })
            }
            Err(e) => {
                warn!("Baseline request to {} failed: {}", form.action, e);
                None
            }
        }
    }

    pub async fn get_or_establish(&self, form: &Form) -> Option<Arc<Baseline>> {
        let slot = self.slot(form);
        slot.get_or_init(|| async { self.establish(form).await.map(Arc::new) })
            .await
            .clone()
    }

    /// Number of actions with a baseline attempt started.
    pub fn len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, form: &Form) -> Slot {
        let key = cache_key(form);
        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.entry(key).or_default().clone()
    }
}

fn cache_key(form: &Form) -> String {
    let action = action_url(form)
        .map(|url| canonicalize(&url))
        .unwrap_or_else(|| form.action.clone());
    format!("{} {}", form.method.as_str(), action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use harrow_scanner::{Input, Method};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn search_form(base: &str) -> Form {
        Form {
            action: format!("{}/search", base),
            method: Method::Get,
            inputs: vec![Input::new("input", "text", Some("q"))],
        }
    }

    #[tokio::test]
    async fn test_baseline_established_once_per_form() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "test"))
            .respond_with(ResponseTemplate::new(200).set_body_string("no results"))
            .expect(1)
            .mount(&server)
            .await;

        let oracle = Arc::new(BaselineOracle::new(Client::new()));
        let form = search_form(&server.uri());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let oracle = oracle.clone();
            let form = form.clone();
            handles.push(tokio::spawn(async move { oracle.get_or_establish(&form).await }));
        }
        for handle in handles {
            let baseline = handle.await.unwrap().expect("baseline");
            assert_eq!(baseline.status, 200);
            assert_eq!(baseline.body, "no results");
            assert_eq!(baseline.body_length, 10);
        }
        assert_eq!(oracle.len(), 1);
    }

    #[tokio::test]
    async fn test_forms_sharing_an_action_share_one_baseline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("no results"))
            .expect(1)
            .mount(&server)
            .await;

        let oracle = Arc::new(BaselineOracle::new(Client::new()));
        let by_query = search_form(&server.uri());
        let by_term = Form {
            action: format!("{}/search", server.uri()),
            method: Method::Get,
            inputs: vec![Input::new("input", "search", Some("term"))],
        };
        let promoted = Form::synthetic(
            format!("{}/search", server.uri()),
            Input::new("input", "text", Some("filter")),
        );

        let mut handles = Vec::new();
        for form in [by_query, by_term, promoted] {
            let oracle = oracle.clone();
            handles.push(tokio::spawn(async move { oracle.get_or_establish(&form).await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().expect("baseline").body, "no results");
        }
        assert_eq!(oracle.len(), 1);
    }

    #[test]
    fn test_cache_key_keeps_method_apart() {
        let get = Form {
            action: "http://test.local/login".to_string(),
            method: Method::Get,
            inputs: vec![Input::new("input", "text", Some("user"))],
        };
        let post = Form {
            method: Method::Post,
            ..get.clone()
        };
        assert_ne!(cache_key(&get), cache_key(&post));
        assert_eq!(cache_key(&get), "GET http://test.local/login");

        let trailing = Form {
            action: "http://test.local/login/#top".to_string(),
            ..get.clone()
        };
        assert_eq!(cache_key(&trailing), cache_key(&get));
    }

    #[tokio::test]
    async fn test_baseline_failure_is_none_and_cached() {
        let oracle = BaselineOracle::new(Client::new());
        let form = search_form("http://127.0.0.1:1");

        assert!(oracle.get_or_establish(&form).await.is_none());
        assert!(oracle.get_or_establish(&form).await.is_none());
        assert_eq!(oracle.len(), 1);
    }

    #[tokio::test]
    async fn test_post_baseline_sends_form_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(401).set_body_string("denied"))
            .mount(&server)
            .await;

        let oracle = BaselineOracle::new(Client::new());
        let form = Form {
            action: format!("{}/login", server.uri()),
            method: Method::Post,
            inputs: vec![
                Input::new("input", "text", Some("user")),
                Input::new("input", "password", Some("pass")),
            ],
        };

        let baseline = oracle.establish(&form).await.expect("baseline");
        assert_eq!(baseline.status, 401);

        let received = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&received[0].body).to_string();
        assert_eq!(body, "user=test&pass=test");
    }
}
