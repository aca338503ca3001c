use url::Url;

use crate::error::FetchError;

/// Result of fetching a page
#[derive(Clone)]
pub struct FetchResult {
    pub html: String,
    pub url: String,
    pub status: u16,
    pub content_type: String,
}

/// Add a scheme to bare host input, as an address bar would.
pub fn normalize_url(url_str: &str) -> Result<Url, FetchError> {
    let url = if !url_str.starts_with("http://") && !url_str.starts_with("https://") {
        format!("https://{}", url_str)
    } else {
        url_str.to_string()
    };
    Url::parse(&url).map_err(|e| FetchError::InvalidEndpoint(format!("Invalid URL: {}", e)))
}

/// Fetch a page so the page agent has a document to work on.
pub async fn fetch_page(url_str: &str) -> Result<FetchResult, FetchError> {
    let parsed = normalize_url(url_str)?;

    let client = reqwest::Client::builder()
        .user_agent(concat!("Mozilla/5.0 (compatible; usher/", env!("CARGO_PKG_VERSION"), ")"))
        .timeout(std::time::Duration::from_secs(15))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()?;

    let response = client
        .get(parsed.as_str())
        .header(
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        )
        .send()
        .await?;

    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("text/html")
        .to_string();

    let final_url = response.url().to_string();
    let html = response.text().await?;

    Ok(FetchResult {
        html,
        url: final_url,
        status,
        content_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_hosts_get_https() {
        assert_eq!(normalize_url("example.com/a").unwrap().as_str(), "https://example.com/a");
        assert_eq!(normalize_url("http://example.com").unwrap().as_str(), "http://example.com/");
    }
}
