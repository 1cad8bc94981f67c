use anyhow::Context;

/// Object storage settings; reports land at `{endpoint}/{bucket}/{key}` and
/// are served back from `{public_base_url}/{bucket}/{key}`.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_token: String,
    pub public_base_url: String,
}

impl StorageConfig {
    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint.trim_end_matches('/'), self.bucket, key)
    }

    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.public_base_url.trim_end_matches('/'),
            self.bucket,
            key
        )
    }
}

/// Uploads the serialized report. Unlike the analysis call this has no
/// fallback: a failed upload fails the request.
pub async fn upload_report(
    client: &reqwest::Client,
    config: &StorageConfig,
    key: &str,
    bytes: Vec<u8>,
) -> anyhow::Result<String> {
    client
        .put(config.object_url(key))
        .bearer_auth(&config.access_token)
        .header("Content-Type", "application/pdf")
        .body(bytes)
        .send()
        .await
        .context("storage upload request failed")?
        .error_for_status()
        .context("storage rejected the upload")?;

    Ok(config.public_url(key))
}
