// == Internal crates
use super::{
    client::FolderApi,
    model::{FetchError, Folder, PermissionRecord, retain_addressable},
};
use crate::{common::Urn, config::ViewerConfig};

// == External crates
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("Invalid base url '{url}': {source}")]
    InvalidBaseUrl { url: String, source: url::ParseError },
    #[error("Base url '{0}' cannot be used as a base for API paths")]
    CannotBeABase(String),
    #[error("Failed to create HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Talks to the folder permissions backend over HTTP. Every endpoint is a plain GET that returns a JSON array.
#[derive(Debug, Clone)]
pub struct HttpFolderApi {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpFolderApi {
    /// Creates a client for the backend at the configured base url
    pub fn new(config: &ViewerConfig) -> Result<Self, HttpClientError> {
        let base_url = parse_base_url(config.base_url())?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(HttpFolderApi {
            client: builder.build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds the url of an API endpoint, with the node urn as a percent-encoded query parameter when given
    fn endpoint(&self, path: &str, urn: Option<&Urn>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["api", path]);
        }
        if let Some(urn) = urn {
            url.query_pairs_mut().append_pair("urn", urn.as_str());
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, FetchError> {
        tracing::debug!(%url, "GET");

        let response = self.client.get(url.clone()).send().await.map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: describe_transport_error(&e),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.json::<T>().await.map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

impl FolderApi for HttpFolderApi {
    async fn fetch_folders(&self) -> Result<Vec<Folder>, FetchError> {
        self.get_json(self.endpoint("folders", None)).await.map(retain_addressable)
    }

    async fn fetch_subfolders(&self, urn: &Urn) -> Result<Vec<Folder>, FetchError> {
        self.get_json(self.endpoint("subfolders", Some(urn)))
            .await
            .map(retain_addressable)
    }

    async fn fetch_permissions(&self, urn: &Urn) -> Result<Vec<PermissionRecord>, FetchError> {
        self.get_json(self.endpoint("permissions", Some(urn))).await
    }
}

fn parse_base_url(raw: &str) -> Result<Url, HttpClientError> {
    let url = Url::parse(raw).map_err(|source| HttpClientError::InvalidBaseUrl {
        url: raw.to_string(),
        source,
    })?;
    if url.cannot_be_a_base() {
        return Err(HttpClientError::CannotBeABase(raw.to_string()));
    }
    Ok(url)
}

fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        format!("connection error: {error}")
    } else {
        format!("network error: {error}")
    }
}
