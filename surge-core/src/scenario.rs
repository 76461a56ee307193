use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use surge_http::{HttpRequest, HttpResponse, HttpTransportErrorKind};
use tokio::time::Instant;

use crate::runner::{HostAddress, IterationContext};

mod check;

pub use check::{Check, CheckFn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub name: Arc<str>,
    pub passed: bool,
}

/// Outcome of one scenario iteration.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// `false` when the request never produced a response (connect error, timeout, ...).
    pub request_sent: bool,
    pub response: Option<HttpResponse>,
    pub checks: Vec<CheckOutcome>,
    pub elapsed: Duration,
    pub transport_error: Option<HttpTransportErrorKind>,
}

impl ScenarioResult {
    /// Evaluates `checks` against a response.
    pub fn from_response(response: HttpResponse, checks: &[Check], elapsed: Duration) -> Self {
        let checks = checks
            .iter()
            .map(|c| CheckOutcome {
                name: c.name().clone(),
                passed: c.evaluate(&response),
            })
            .collect();

        Self {
            request_sent: true,
            response: Some(response),
            checks,
            elapsed,
            transport_error: None,
        }
    }

    /// No response: every declared check fails.
    pub fn transport_failure(
        kind: HttpTransportErrorKind,
        checks: &[Check],
        elapsed: Duration,
    ) -> Self {
        let checks = checks
            .iter()
            .map(|c| CheckOutcome {
                name: c.name().clone(),
                passed: false,
            })
            .collect();

        Self {
            request_sent: false,
            response: None,
            checks,
            elapsed,
            transport_error: Some(kind),
        }
    }

    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }
}

/// Work performed by a worker on every iteration.
///
/// Implementations may perform at most one outbound call through
/// [`IterationContext::transport`] and must not touch scheduler state.
#[async_trait]
pub trait Scenario: Send + Sync + 'static {
    async fn run(&self, ctx: &IterationContext) -> ScenarioResult;

    /// Names of the checks this scenario evaluates, known before the run starts.
    fn check_names(&self) -> Vec<Arc<str>> {
        Vec::new()
    }
}

/// One HTTP request plus the checks evaluated against its response.
#[derive(Debug, Clone)]
pub struct HttpScenario {
    method: http::Method,
    path: String,
    port: Option<u16>,
    headers: Vec<(String, String)>,
    body: Bytes,
    checks: Vec<Check>,
}

impl HttpScenario {
    pub fn new(method: http::Method, path: impl Into<String>) -> Self {
        let mut path = path.into();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }

        Self {
            method,
            path,
            port: None,
            headers: Vec::new(),
            body: Bytes::new(),
            checks: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(http::Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self::new(http::Method::POST, path).with_body(body)
    }

    /// Port appended to hosts that do not name one.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn with_check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    pub fn method(&self) -> &http::Method {
        &self.method
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    /// Joins the host's base URL and the request path. The scenario port goes into the
    /// authority, never after a base path.
    pub fn url_for(&self, host: &HostAddress) -> String {
        let base = if host.has_scheme() {
            host.to_string()
        } else {
            format!("http://{host}")
        };

        // Unparseable hosts are passed through; the transport reports them as invalid.
        let Ok(mut url) = url::Url::parse(&base) else {
            return format!("{base}{}", self.path);
        };
        if let Some(port) = self.port
            && !host.has_port()
            && url.set_port(Some(port)).is_err()
        {
            return format!("{base}{}", self.path);
        }
        format!("{}{}", url.as_str().trim_end_matches('/'), self.path)
    }

    fn request_for(&self, ctx: &IterationContext) -> HttpRequest {
        let mut req = HttpRequest::new(self.method.clone(), self.url_for(&ctx.target))
            .with_body(self.body.clone())
            .with_timeout(ctx.request_timeout);
        req.headers.extend(self.headers.iter().cloned());
        req
    }
}

#[async_trait]
impl Scenario for HttpScenario {
    async fn run(&self, ctx: &IterationContext) -> ScenarioResult {
        let req = self.request_for(ctx);

        let started = Instant::now();
        match ctx.transport.send(req).await {
            Ok(res) => ScenarioResult::from_response(res, &self.checks, started.elapsed()),
            Err(err) => {
                tracing::debug!(
                    worker = ctx.worker_id,
                    iteration = ctx.iteration,
                    error = %err,
                    "request failed"
                );
                ScenarioResult::transport_failure(
                    err.transport_error_kind(),
                    &self.checks,
                    started.elapsed(),
                )
            }
        }
    }

    fn check_names(&self) -> Vec<Arc<str>> {
        self.checks.iter().map(|c| c.name().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Transport;
    use std::sync::Mutex;

    struct Canned {
        status: u16,
        seen: Mutex<Vec<HttpRequest>>,
    }

    #[async_trait]
    impl Transport for Canned {
        async fn send(&self, req: HttpRequest) -> surge_http::Result<HttpResponse> {
            self.seen
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(req);
            Ok(HttpResponse::new(self.status))
        }
    }

    struct TimesOut;

    #[async_trait]
    impl Transport for TimesOut {
        async fn send(&self, req: HttpRequest) -> surge_http::Result<HttpResponse> {
            let timeout = req.timeout.unwrap_or(Duration::from_secs(1));
            tokio::time::sleep(timeout).await;
            Err(surge_http::Error::Timeout(timeout))
        }
    }

    fn host(raw: &str) -> HostAddress {
        HostAddress::new(raw).unwrap_or_else(|e| panic!("bad host: {e}"))
    }

    fn ctx(transport: Arc<dyn Transport>) -> IterationContext {
        IterationContext::new(
            7,
            0,
            host("localhost"),
            transport,
            Some(Duration::from_millis(250)),
            Instant::now(),
        )
    }

    fn create_user() -> HttpScenario {
        HttpScenario::post("/user", r#"{"first_name":"john","last_name":"smith"}"#)
            .with_port(3000)
            .with_header("content-type", "application/json")
            .with_check(Check::status_is("status was 201", 201))
            .with_check(Check::status_in("not a server error", 100..=499))
    }

    #[test]
    fn url_appends_port_only_when_missing() {
        let s = HttpScenario::get("user").with_port(3000);
        assert_eq!(s.url_for(&host("localhost")), "http://localhost:3000/user");
        assert_eq!(
            s.url_for(&host("127.0.0.1:8080")),
            "http://127.0.0.1:8080/user"
        );
        assert_eq!(
            s.url_for(&host("https://api.example.com")),
            "https://api.example.com:3000/user"
        );
        assert_eq!(
            HttpScenario::get("/user").url_for(&host("localhost")),
            "http://localhost/user"
        );
    }

    #[test]
    fn url_keeps_base_path_after_the_port() {
        let s = HttpScenario::get("/user").with_port(3000);
        assert_eq!(
            s.url_for(&host("http://api.local/v1")),
            "http://api.local:3000/v1/user"
        );
        assert_eq!(s.url_for(&host("api.local/v1/")), "http://api.local:3000/v1/user");
        assert_eq!(
            s.url_for(&host("http://api.local:8080/v1")),
            "http://api.local:8080/v1/user"
        );
        assert_eq!(s.url_for(&host("[::1]")), "http://[::1]:3000/user");
        assert_eq!(
            HttpScenario::get("/slow?ms=5").with_port(3000).url_for(&host("localhost")),
            "http://localhost:3000/slow?ms=5"
        );
    }

    #[test]
    fn url_passes_malformed_hosts_through() {
        let s = HttpScenario::get("/user").with_port(3000);
        assert_eq!(s.url_for(&host("bad host")), "http://bad host/user");
    }

    #[tokio::test]
    async fn evaluates_checks_against_response() {
        let transport = Arc::new(Canned {
            status: 201,
            seen: Mutex::new(Vec::new()),
        });
        let scenario = create_user();

        let result = scenario.run(&ctx(transport.clone())).await;
        assert!(result.request_sent);
        assert!(result.all_passed());
        assert_eq!(result.checks.len(), 2);
        assert_eq!(result.response.map(|r| r.status), Some(201));

        let seen = transport
            .seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let req = seen.first();
        assert_eq!(req.map(|r| r.url.as_str()), Some("http://localhost:3000/user"));
        assert_eq!(req.map(|r| r.method.clone()), Some(http::Method::POST));
        assert_eq!(req.and_then(|r| r.timeout), Some(Duration::from_millis(250)));
        assert!(req.is_some_and(|r| r.headers.iter().any(|(k, _)| k == "content-type")));
    }

    #[tokio::test]
    async fn non_success_status_is_an_ordinary_result() {
        let transport = Arc::new(Canned {
            status: 500,
            seen: Mutex::new(Vec::new()),
        });

        let result = create_user().run(&ctx(transport)).await;
        assert!(result.request_sent);
        assert!(result.transport_error.is_none());
        assert!(result.checks.iter().all(|c| !c.passed));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_marks_request_unsent_and_fails_every_check() {
        let result = create_user().run(&ctx(Arc::new(TimesOut))).await;

        assert!(!result.request_sent);
        assert!(result.response.is_none());
        assert_eq!(result.transport_error, Some(HttpTransportErrorKind::Timeout));
        assert_eq!(result.checks.len(), 2);
        assert!(result.checks.iter().all(|c| !c.passed));
        assert_eq!(result.elapsed, Duration::from_millis(250));
    }

    #[test]
    fn check_names_are_declared_up_front() {
        let names = create_user().check_names();
        let names: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
        assert_eq!(names, vec!["status was 201", "not a server error"]);
    }
}
