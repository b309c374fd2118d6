//! Scripted in-process transport for tests.
//!
//! Routes are matched by method and path suffix. Each route serves its queued
//! replies in order; once the queue is drained the last reply served repeats.
//! Every request is recorded for call-count and header assertions.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use reqwest::header::HeaderMap;
use serde_json::Value;
use url::Url;

use crate::{HttpTransport, TransportError, TransportRequest, TransportResponse};

#[derive(Debug, Clone)]
enum Outcome {
    Respond { status: u16, body: Vec<u8> },
    Fail(String),
}

#[derive(Debug, Clone)]
struct Reply {
    delay: Duration,
    outcome: Outcome,
}

#[derive(Debug)]
struct Route {
    method: Method,
    path: String,
    replies: VecDeque<Reply>,
    last: Option<Reply>,
}

/// One request observed by [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request method.
    pub method: Method,
    /// Absolute request URL.
    pub url: Url,
    /// Final headers as sent.
    pub headers: HeaderMap,
    /// Decoded JSON body, when present.
    pub body: Option<Value>,
}

impl RecordedRequest {
    /// Header value as text.
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }

    /// Query parameter value by key.
    pub fn query(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.into_owned())
    }
}

/// Transport that replays scripted responses.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    /// Creates a transport with no routes. Unmatched requests get a 404.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a JSON reply.
    pub fn reply(&self, method: Method, path: &str, status: u16, body: Value) {
        self.reply_after(method, path, Duration::ZERO, status, body);
    }

    /// Queues a JSON reply delivered after `delay`.
    pub fn reply_after(&self, method: Method, path: &str, delay: Duration, status: u16, body: Value) {
        let body = serde_json::to_vec(&body).unwrap_or_default();
        self.push(method, path, Reply {
            delay,
            outcome: Outcome::Respond { status, body },
        });
    }

    /// Queues a reply whose body is raw text.
    pub fn reply_raw(&self, method: Method, path: &str, status: u16, body: &str) {
        self.push(method, path, Reply {
            delay: Duration::ZERO,
            outcome: Outcome::Respond {
                status,
                body: body.as_bytes().to_vec(),
            },
        });
    }

    /// Queues a transport failure.
    pub fn fail(&self, method: Method, path: &str, cause: &str) {
        self.push(method, path, Reply {
            delay: Duration::ZERO,
            outcome: Outcome::Fail(cause.to_string()),
        });
    }

    /// Every request seen so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests seen so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of requests whose path ends with `path`.
    pub fn count_for(&self, method: Method, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.method == method && request.url.path().ends_with(path))
            .count()
    }

    /// Most recent request.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests().pop()
    }

    fn push(&self, method: Method, path: &str, reply: Reply) {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(route) = routes
            .iter_mut()
            .find(|route| route.method == method && route.path == path)
        {
            route.replies.push_back(reply);
            return;
        }
        routes.push(Route {
            method,
            path: path.to_string(),
            replies: VecDeque::from([reply]),
            last: None,
        });
    }

    fn next_reply(&self, method: &Method, url: &Url) -> Option<Reply> {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        let route = routes
            .iter_mut()
            .find(|route| &route.method == method && url.path().ends_with(&route.path))?;

        match route.replies.pop_front() {
            Some(reply) => {
                route.last = Some(reply.clone());
                Some(reply)
            }
            None => route.last.clone(),
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let body = request
            .body
            .as_deref()
            .and_then(|raw| serde_json::from_slice(raw).ok());
        let reply = self.next_reply(&request.method, &request.url);

        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedRequest {
                method: request.method,
                url: request.url,
                headers: request.headers,
                body,
            });

        let Some(reply) = reply else {
            return Ok(TransportResponse {
                status: StatusCode::NOT_FOUND,
                body: br#"{"error":"no scripted route"}"#.to_vec(),
            });
        };

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }

        match reply.outcome {
            Outcome::Respond { status, body } => Ok(TransportResponse {
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                body,
            }),
            Outcome::Fail(cause) => Err(TransportError(cause)),
        }
    }
}
