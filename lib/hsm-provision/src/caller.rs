//! Resilient remote calls
//!
//! The only component that talks to the network. Rate-limit responses (HTTP 429) and
//! transport errors are retried with a fixed delay up to the policy's attempt bound; any
//! other response is handed back untouched for the caller to interpret.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{Config, RetryPolicy};
use crate::error::{CallFailure, ProvisionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        }
    }
}

/// Headers every HSM call carries: bearer credential and JSON content type.
pub fn bearer_headers(token: &str) -> Result<HeaderMap, ProvisionError> {
    let mut authorization = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| ProvisionError::Config(format!("Invalid HSM_API_TOKEN: {}", e)))?;
    authorization.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, authorization);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

#[derive(Debug, Clone)]
pub struct ResilientCaller {
    client: Client,
    policy: RetryPolicy,
}

impl ResilientCaller {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_client(Client::new(), policy)
    }

    pub fn with_client(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Build a caller whose transport honours the configured per-attempt timeout.
    pub fn from_config(config: &Config) -> Result<Self, ProvisionError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ProvisionError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, config.retry))
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Issue one logical call, retrying rate limits and transport errors.
    ///
    /// Returns the first response that is not HTTP 429, whatever its status. After
    /// `max_attempts` retry-worthy outcomes fails with `RetryExhausted` carrying the last one.
    pub async fn execute<B>(
        &self,
        url: &str,
        payload: Option<&B>,
        headers: &HeaderMap,
        method: Method,
    ) -> Result<Response, ProvisionError>
    where
        B: Serialize + ?Sized,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!("{:?} {} (attempt {}/{})", method, url, attempt, max_attempts);

            let failure = match self.send_once(url, payload, headers, method).await {
                Ok(response) if response.status() != StatusCode::TOO_MANY_REQUESTS => {
                    return Ok(response);
                }
                Ok(_) => CallFailure::RateLimited,
                Err(e) => CallFailure::Transport(e),
            };

            if attempt >= max_attempts {
                return Err(ProvisionError::RetryExhausted {
                    attempts: attempt,
                    last: failure,
                });
            }

            warn!(
                "{} failed on attempt {}/{}: {}; retrying in {:?}",
                url, attempt, max_attempts, failure, self.policy.delay
            );
            tokio::time::sleep(self.policy.delay).await;
        }
    }

    async fn send_once<B>(
        &self,
        url: &str,
        payload: Option<&B>,
        headers: &HeaderMap,
        method: Method,
    ) -> Result<Response, reqwest::Error>
    where
        B: Serialize + ?Sized,
    {
        let mut request = self
            .client
            .request(method.into(), url)
            .headers(headers.clone());
        if let Some(body) = payload {
            request = request.json(body);
        }
        request.send().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_method_mapping() {
        assert_eq!(reqwest::Method::from(Method::Get), reqwest::Method::GET);
        assert_eq!(reqwest::Method::from(Method::Post), reqwest::Method::POST);
    }

    #[test]
    fn test_bearer_headers() {
        let headers = bearer_headers("abc123").unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer abc123");
        assert!(headers[AUTHORIZATION].is_sensitive());
        assert_eq!(headers[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_bearer_headers_rejects_control_characters() {
        let err = bearer_headers("bad\ntoken").unwrap_err();
        assert!(matches!(err, ProvisionError::Config(_)));
    }

    #[test]
    fn test_from_config_keeps_policy() {
        let policy = RetryPolicy::new(5, Duration::from_millis(10));
        let config = Config::new("http://hsm", "t", 1, "p").with_retry(policy);
        let caller = ResilientCaller::from_config(&config).unwrap();
        assert_eq!(caller.policy(), policy);
    }

    #[tokio::test]
    async fn test_transport_failure_exhausts_exact_attempts() {
        // Port 9 on localhost is not listening; every attempt is a transport error
        let caller = ResilientCaller::new(RetryPolicy::new(2, Duration::from_millis(1)));
        let headers = bearer_headers("t").unwrap();

        let err = caller
            .execute::<()>("http://127.0.0.1:9/v1/key", None, &headers, Method::Get)
            .await
            .unwrap_err();

        match err {
            ProvisionError::RetryExhausted { attempts, last } => {
                assert_eq!(attempts, 2);
                assert!(matches!(last, CallFailure::Transport(_)));
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
