use std::time::Duration;

use calsync_domain::CalsyncError;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::InfraError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound on a server-requested `Retry-After` wait
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// HTTP client shared by the Graph and chat platform adapters.
///
/// Server errors, throttling (429) and connection failures are retried.
/// Bodies must be buffered (JSON or form) so the request can be cloned.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    max_attempts: usize,
    base_backoff: Duration,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Send with retries. The last response is returned whatever its status.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, CalsyncError> {
        let mut attempt = 1;
        loop {
            let request = builder
                .try_clone()
                .ok_or_else(|| CalsyncError::Internal("request body is not replayable".into()))?
                .build()
                .map_err(network_error)?;
            let method = request.method().clone();
            let url = request.url().clone();
            let last = attempt >= self.max_attempts;

            let delay = match self.client.execute(request).await {
                Ok(response) if !last && is_retryable_status(response.status()) => {
                    let delay = retry_after(&response).unwrap_or_else(|| self.backoff(attempt));
                    debug!(
                        attempt, %method, %url, status = %response.status(), ?delay,
                        "retrying request"
                    );
                    delay
                }
                Ok(response) => {
                    debug!(attempt, %method, %url, status = %response.status(), "response");
                    return Ok(response);
                }
                Err(err) if !last && is_retryable_error(&err) => {
                    let delay = self.backoff(attempt);
                    debug!(attempt, %method, %url, error = %err, ?delay, "retrying request");
                    delay
                }
                Err(err) => return Err(network_error(err)),
            };

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Like [`HttpClient::send`], but non-2xx responses become errors.
    ///
    /// The response body is handed to `map_error` so each adapter can decode
    /// its own error envelope.
    pub async fn send_checked<F>(
        &self,
        builder: RequestBuilder,
        map_error: F,
    ) -> Result<Response, CalsyncError>
    where
        F: FnOnce(StatusCode, &str) -> CalsyncError,
    {
        let response = self.send(builder).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        debug!(%status, body_len = body.len(), "request rejected");
        Err(map_error(status, &body))
    }

    pub async fn send_json<T, F>(
        &self,
        builder: RequestBuilder,
        map_error: F,
    ) -> Result<T, CalsyncError>
    where
        T: DeserializeOwned,
        F: FnOnce(StatusCode, &str) -> CalsyncError,
    {
        let response = self.send_checked(builder, map_error).await?;
        response.json::<T>().await.map_err(network_error)
    }

    /// `base_backoff` doubled per failed attempt
    fn backoff(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(6) as u32;
        self.base_backoff.saturating_mul(1 << shift)
    }
}

#[derive(Debug)]
pub struct HttpClientBuilder {
    max_attempts: usize,
    base_backoff: Duration,
    user_agent: Option<String>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self { max_attempts: 3, base_backoff: Duration::from_millis(200), user_agent: None }
    }
}

impl HttpClientBuilder {
    /// Total attempts, the first try included
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> Result<HttpClient, CalsyncError> {
        let mut builder = ReqwestClient::builder().timeout(REQUEST_TIMEOUT);
        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }
        let client = builder.build().map_err(network_error)?;

        Ok(HttpClient { client, max_attempts: self.max_attempts, base_backoff: self.base_backoff })
    }
}

fn network_error(err: reqwest::Error) -> CalsyncError {
    InfraError::from(err).into()
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

/// Delay from a `Retry-After: <seconds>` header, capped
fn retry_after(response: &Response) -> Option<Duration> {
    let seconds: u64 = response.headers().get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    Some(Duration::from_secs(seconds).min(MAX_RETRY_AFTER))
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn quick_client(attempts: usize) -> HttpClient {
        HttpClient::builder()
            .base_backoff(Duration::from_millis(5))
            .max_attempts(attempts)
            .build()
            .expect("http client")
    }

    async fn get(client: &HttpClient, server: &MockServer) -> Response {
        client.send(client.request(Method::GET, server.uri())).await.expect("response")
    }

    #[tokio::test]
    async fn server_errors_are_retried_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

        let response = get(&quick_client(3), &server).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn throttling_honours_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

        let response = get(&quick_client(2), &server).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn client_errors_and_last_attempt_are_returned_as_is() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        assert_eq!(get(&quick_client(3), &server).await.status(), StatusCode::NOT_FOUND);

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        assert_eq!(get(&quick_client(1), &server).await.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn send_checked_hands_error_body_to_mapper() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(409).set_body_string("conflict body"))
            .mount(&server)
            .await;

        let client = quick_client(1);
        let result = client
            .send_checked(client.request(Method::GET, server.uri()), |status, body| {
                CalsyncError::remote(status.as_u16().to_string(), body)
            })
            .await;

        assert_eq!(result.unwrap_err(), CalsyncError::remote("409", "conflict body"));
    }

    #[tokio::test]
    async fn send_json_decodes_success_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "abc"})))
            .mount(&server)
            .await;

        let client = quick_client(1);
        let value: serde_json::Value = client
            .send_json(client.request(Method::GET, server.uri()), |_, body| {
                CalsyncError::Internal(body.to_string())
            })
            .await
            .expect("json body");

        assert_eq!(value["id"], "abc");
    }

    #[tokio::test]
    async fn refused_connection_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let client = quick_client(2);
        let err = client.send(client.request(Method::GET, &url)).await.unwrap_err();

        assert!(matches!(err, CalsyncError::Network(_)), "got {err:?}");
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let client = quick_client(3);
        assert_eq!(client.backoff(1), Duration::from_millis(5));
        assert_eq!(client.backoff(3), Duration::from_millis(20));
    }
}
