#[derive(Debug, Clone)]
pub struct FetchedPayload {
    pub body: String,
    pub content_type: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status code: {0}")]
    HttpStatus(u16),
}

/// Single best-effort GET. Callers decide what a failure means for the run.
pub async fn fetch_status(
    client: &reqwest::Client,
    url: &str,
) -> Result<FetchedPayload, FetchError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus(status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string);
    let body = response.text().await?;

    Ok(FetchedPayload { body, content_type })
}
