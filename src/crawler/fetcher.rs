//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests to fetch page content
//! - Classifying the response for the worker

use crate::config::UserAgentConfig;
use crate::queue::is_transient_status;
use reqwest::{header::LOCATION, redirect::Policy, Client};
use std::time::Duration;

/// Upper bound on establishing a connection, independent of the request timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A response, reduced to what the worker needs
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// HTTP status code
    pub status: u16,
    /// Raw `Location` header, present on redirects
    pub location: Option<String>,
    /// Response body (empty for redirects and errors)
    pub body: String,
}

/// How the worker should treat a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// 200: store and follow links
    Ok,
    /// 301, 302, 303, 307, 308: enqueue the target
    Redirect,
    /// 429, 500, 502, 503, 504: retry with linear backoff
    Transient,
    /// Anything else: retry with fixed backoff
    Unexpected,
}

impl ResponseClass {
    pub fn from_status(status: u16) -> Self {
        match status {
            200 => Self::Ok,
            301 | 302 | 303 | 307 | 308 => Self::Redirect,
            s if is_transient_status(s) => Self::Transient,
            _ => Self::Unexpected,
        }
    }
}

impl FetchedPage {
    pub fn class(&self) -> ResponseClass {
        ResponseClass::from_status(self.status)
    }
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are not followed: the worker enqueues redirect targets as
/// independent jobs.
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Per-request timeout
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use wiki_harvest::config::UserAgentConfig;
/// use wiki_harvest::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "WikiHarvest".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/bot".to_string(),
///     contact_email: "bot@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(20)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL once
///
/// Non-200 statuses are not errors here; only failures to get a response
/// (connection, timeout, body decoding) are.
pub async fn fetch_page(client: &Client, url: &str) -> Result<FetchedPage, reqwest::Error> {
    let response = client.get(url).send().await?;
    let status = response.status().as_u16();

    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = if status == 200 {
        response.text().await?
    } else {
        String::new()
    };

    Ok(FetchedPage {
        status,
        location,
        body,
    })
}

/// Describes a fetch failure for `last_error`
pub fn describe_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "Request timeout".to_string()
    } else if error.is_connect() {
        format!("Connection failed: {}", error)
    } else {
        error.to_string()
    }
}
