use std::thread;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FetchOutcome {
    NotModified,
    Fresh { body: String, etag: Option<String> },
}

#[derive(Debug, Error)]
pub(crate) enum FetchError {
    #[error("request failed: HTTP status {status}{detail}")]
    Status { status: u16, detail: String },
    #[error("request failed after {attempts} attempt(s): {last}")]
    Exhausted { attempts: usize, last: String },
    #[error("request failed: response decode failed: {0}")]
    Decode(String),
    #[error("invalid JSON in {url}: {source}")]
    InvalidJson {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) attempts: usize,
    pub(crate) retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            read_timeout: Duration::from_secs(10),
            attempts: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

fn should_retry_http_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..=599).contains(&status)
}

fn status_detail(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        String::new()
    } else {
        let truncated = body.chars().take(240).collect::<String>();
        format!(" ({truncated})")
    }
}

/// GET with `If-None-Match` revalidation. A 304 is only meaningful when an
/// etag was sent; otherwise it is reported as a status error.
pub(crate) fn get_conditional_with_retries(
    url: &str,
    etag: Option<&str>,
    policy: RetryPolicy,
) -> Result<FetchOutcome, FetchError> {
    let attempts = policy.attempts.max(1);
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(policy.connect_timeout)
        .timeout_read(policy.read_timeout)
        .timeout_write(policy.read_timeout)
        .build();

    for attempt in 1..=attempts {
        let mut request = agent.get(url);
        if let Some(tag) = etag {
            request = request.set("If-None-Match", tag);
        }

        match request.call() {
            Ok(response) if response.status() == 304 => {
                if etag.is_some() {
                    log::debug!("{url} not modified");
                    return Ok(FetchOutcome::NotModified);
                }
                return Err(FetchError::Status {
                    status: 304,
                    detail: " (no cached copy to revalidate)".to_string(),
                });
            }
            Ok(response) => {
                let etag = response.header("etag").map(str::to_string);
                return match response.into_string() {
                    Ok(body) => Ok(FetchOutcome::Fresh { body, etag }),
                    Err(err) => Err(FetchError::Decode(err.to_string())),
                };
            }
            Err(ureq::Error::Status(status, response)) => {
                let detail = status_detail(&response.into_string().ok().unwrap_or_default());

                if should_retry_http_status(status) && attempt < attempts {
                    log::debug!("{url} returned {status}, retrying (attempt {attempt})");
                    thread::sleep(policy.retry_delay);
                    continue;
                }

                if should_retry_http_status(status) {
                    return Err(FetchError::Exhausted {
                        attempts,
                        last: format!("HTTP status {status}{detail}"),
                    });
                }

                return Err(FetchError::Status { status, detail });
            }
            Err(ureq::Error::Transport(err)) => {
                let transport_error = format!("transport error: {err}");
                if attempt < attempts {
                    log::debug!("{url}: {transport_error}, retrying (attempt {attempt})");
                    thread::sleep(policy.retry_delay);
                    continue;
                }
                return Err(FetchError::Exhausted {
                    attempts,
                    last: transport_error,
                });
            }
        }
    }

    Err(FetchError::Exhausted {
        attempts,
        last: "no concrete error".to_string(),
    })
}
