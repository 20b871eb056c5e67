use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;

use crate::error::KiraError;

const MAX_RETRIES: usize = 3;
const BASE_DELAY_MS: u64 = 200;

/// A blocking client bound to one provider name, used in error messages.
#[derive(Clone)]
pub struct HttpAgent {
    client: Client,
    provider: &'static str,
}

impl HttpAgent {
    pub fn new(provider: &'static str, timeout: Duration) -> Result<Self, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-ca/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::http(provider, err))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| KiraError::http(provider, err))?;
        Ok(Self { client, provider })
    }

    pub fn provider(&self) -> &'static str {
        self.provider
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// GET `url`, retrying transient failures, and decode a JSON body.
    /// A 404 yields `Ok(None)`.
    pub fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, KiraError> {
        let response = self.send_with_retries(|| self.client.get(url).query(query))?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        let response = self.handle_status(response)?;
        response
            .json()
            .map(Some)
            .map_err(|err| KiraError::payload(self.provider, err.to_string()))
    }

    pub fn send_with_retries<F>(&self, mut make_req: F) -> Result<Response, KiraError>
    where
        F: FnMut() -> RequestBuilder,
    {
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        tracing::debug!(provider = self.provider, status, attempt, "retrying");
                        backoff(attempt);
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        tracing::debug!(provider = self.provider, error = %err, attempt, "retrying");
                        backoff(attempt);
                        attempt += 1;
                        continue;
                    }
                    return Err(KiraError::http(self.provider, err));
                }
            }
        }
    }

    pub fn handle_status(&self, response: Response) -> Result<Response, KiraError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| format!("{} request failed", self.provider));
        Err(KiraError::ProviderStatus {
            provider: self.provider.to_string(),
            status,
            message,
        })
    }
}

fn backoff(attempt: usize) {
    std::thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
