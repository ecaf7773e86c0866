//! Registry implementations for fetching the newest module version

pub mod github;
pub mod nuget;
pub mod optimizely;

pub use github::GitHubRegistry;
pub use nuget::NuGetRegistry;
pub use optimizely::OptimizelyRegistry;

use tracing::warn;

use crate::version::error::RegistryError;

/// User agent sent with every registry request
const USER_AGENT: &str = "dep-reconcile";

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .expect("Failed to create HTTP client")
}

/// Sends a GET request and maps unsuccessful statuses to registry errors
pub(crate) async fn get_checked(
    client: &reqwest::Client,
    link: &str,
) -> Result<reqwest::Response, RegistryError> {
    let response = client.get(link).send().await?;

    let status = response.status();

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(RegistryError::NotFound(link.to_string()));
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        return Err(RegistryError::RateLimited {
            retry_after_secs: retry_after,
        });
    }

    if !status.is_success() {
        warn!("Registry returned status {}: {}", status, link);
        return Err(RegistryError::InvalidResponse(format!(
            "Unexpected status: {}",
            status
        )));
    }

    Ok(response)
}
