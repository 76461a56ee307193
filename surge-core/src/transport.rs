use async_trait::async_trait;
use surge_http::{HttpClient, HttpRequest, HttpResponse};

/// Outbound HTTP seam used by scenarios.
///
/// The run loop never talks to the network directly; [`HttpClient`] is the production
/// implementation and tests plug in-memory transports in its place.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, req: HttpRequest) -> surge_http::Result<HttpResponse>;
}

#[async_trait]
impl Transport for HttpClient {
    async fn send(&self, req: HttpRequest) -> surge_http::Result<HttpResponse> {
        self.request(req).await
    }
}
