//! Shared HTTP client construction for consistent timeout and TLS configuration.

use std::time::Duration;

/// Create a shared HTTP client with standard docent configuration.
///
/// Config: 30s connect timeout, 60s request timeout, rustls TLS,
/// `docent/{version}` user-agent, redirect limit 10.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn default_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .timeout(Duration::from_secs(60))
        .user_agent(concat!("docent/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
}
