//! Scripted transport for unit and integration tests.
//!
//! Built for `cfg(test)` and behind the `test-support` feature.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};

struct Route {
    responses: Vec<HttpResponse>,
    repeat_last: bool,
}

#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<(&'static str, String), Route>>,
    failures: Mutex<HashMap<(&'static str, String), String>>,
    requests: Mutex<Vec<HttpRequest>>,
    pauses: Mutex<Vec<Duration>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response; queued responses are served once each, in order.
    pub fn respond(&self, method: HttpMethod, url: &str, response: HttpResponse) -> &Self {
        let mut routes = self.routes.lock().unwrap();
        routes
            .entry((method.as_str(), url.to_string()))
            .or_insert_with(|| Route {
                responses: Vec::new(),
                repeat_last: false,
            })
            .responses
            .push(response);
        self
    }

    /// Serve the same response for every request to this route.
    pub fn respond_always(&self, method: HttpMethod, url: &str, response: HttpResponse) -> &Self {
        let mut routes = self.routes.lock().unwrap();
        routes.insert(
            (method.as_str(), url.to_string()),
            Route {
                responses: vec![response],
                repeat_last: true,
            },
        );
        self
    }

    pub fn fail(&self, method: HttpMethod, url: &str, error: &str) -> &Self {
        self.failures
            .lock()
            .unwrap()
            .insert((method.as_str(), url.to_string()), error.to_string());
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: HttpMethod, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.url == url)
            .count()
    }

    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().unwrap().clone()
    }
}

impl HttpTransport for ScriptedTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let key = (request.method.as_str(), request.url.clone());

        if let Some(error) = self.failures.lock().unwrap().get(&key) {
            return Err(Error::api_transport_failed(
                request.method.as_str(),
                &request.url,
                error.clone(),
            ));
        }

        let mut routes = self.routes.lock().unwrap();
        let route = routes.get_mut(&key).ok_or_else(|| {
            Error::internal_unexpected(format!(
                "no scripted response for {} {}",
                request.method.as_str(),
                request.url
            ))
        })?;

        match (route.responses.len(), route.repeat_last) {
            (0, _) => Err(Error::internal_unexpected(format!(
                "scripted responses exhausted for {} {}",
                request.method.as_str(),
                request.url
            ))),
            (1, true) => Ok(route.responses[0].clone()),
            _ => Ok(route.responses.remove(0)),
        }
    }

    fn pause(&self, duration: Duration) {
        self.pauses.lock().unwrap().push(duration);
    }
}
