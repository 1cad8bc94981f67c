use std::env;

use anyhow::Context;
use tracing::info;

use crate::storage::StorageConfig;

pub struct Config {
    pub port: u16,
    pub api_token: Option<String>,
    pub gemini_api_key: Option<String>,
    pub storage: Option<StorageConfig>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let port = match env::var("PORT") {
            Ok(value) => value.parse().context("PORT must be a valid port number")?,
            Err(_) => {
                info!("PORT not set, using default: 8080");
                8080
            }
        };

        let storage = match env::var("STORAGE_ENDPOINT") {
            Ok(endpoint) => Some(StorageConfig {
                endpoint,
                bucket: env::var("STORAGE_BUCKET")
                    .context("STORAGE_BUCKET must be set when STORAGE_ENDPOINT is")?,
                access_token: env::var("STORAGE_TOKEN")
                    .context("STORAGE_TOKEN must be set when STORAGE_ENDPOINT is")?,
                public_base_url: env::var("STORAGE_PUBLIC_URL")
                    .context("STORAGE_PUBLIC_URL must be set when STORAGE_ENDPOINT is")?,
            }),
            Err(_) => None,
        };

        Ok(Self {
            port,
            api_token: env::var("API_TOKEN").ok(),
            gemini_api_key: env::var("GEMINI_API_KEY").ok(),
            storage,
        })
    }
}
