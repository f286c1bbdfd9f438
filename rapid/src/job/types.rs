//! Wire types for the fetch request and the job descriptor.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::format::format_size;

/// Provider used when none is requested.
pub const DEFAULT_PROVIDER: &str = "default";

/// A browser cookie forwarded to the server with the fetch request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub domain: String,
    #[serde(rename = "expirationDate", default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub same_site: String,
}

impl Cookie {
    /// Create a session cookie with only a name and value.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: String::new(),
            domain: String::new(),
            expires: None,
            secure: false,
            http_only: false,
            same_site: String::new(),
        }
    }

    /// Parse a `NAME=VALUE` pair as given on the command line.
    pub fn parse_pair(pair: &str) -> Option<Self> {
        let (name, value) = pair.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self::new(name, value.trim()))
    }
}

/// Body of `POST /fetch`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cookies: Vec<Cookie>,
}

impl FetchRequest {
    /// Create a request for `url` using the default provider.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: None,
            provider: Some(DEFAULT_PROVIDER.to_string()),
            content_type: None,
            user_agent: None,
            cookies: Vec::new(),
        }
    }

    /// Identify the requesting client.
    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = Some(client.into());
        self
    }

    /// Select the server-side download provider. Empty names fall back to the default.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        let provider = provider.into();
        self.provider = if provider.is_empty() {
            Some(DEFAULT_PROVIDER.to_string())
        } else {
            Some(provider)
        };
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.push(cookie);
        self
    }
}

/// Job descriptor returned by the server once a fetch is accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Server-assigned opaque identifier.
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Destination path (or name) on the server side.
    #[serde(default)]
    pub location: String,
    /// Total size in bytes.
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub filetype: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub resumable: bool,
    /// Number of chunks the transfer is split into.
    #[serde(rename = "chunkLen", default)]
    pub chunk_count: usize,
    #[serde(default)]
    pub download_provider: String,
}

impl Job {
    /// File name component of the destination, falling back to the job name.
    pub fn file_name(&self) -> String {
        Path::new(&self.location)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.name.clone())
    }

    /// Headline printed before progress rendering starts.
    pub fn headline(&self) -> String {
        format!("Downloading {} ({})", self.file_name(), format_size(self.size))
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "==============================")?;
        writeln!(f, "ID: {}", self.id)?;
        writeln!(f, "Name: {}", self.name)?;
        writeln!(f, "Location: {}", self.location)?;
        writeln!(f, "Size: {}", self.size)?;
        writeln!(f, "Filetype: {}", self.filetype)?;
        writeln!(f, "Resumable: {}", self.resumable)?;
        writeln!(f, "Total Chunks: {}", self.chunk_count)?;
        writeln!(f, "==============================")
    }
}
