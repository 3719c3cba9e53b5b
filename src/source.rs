//! The fetch capability: `ordinal -> raw chapter text | not found`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::USER_AGENT;
use url::Url;

use crate::config::ChapterLayout;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    Found { source_id: String, text: String },
    NotFound,
}

#[async_trait]
pub trait ChapterSource: Send + Sync {
    /// `Err` means the transport itself failed, not that the chapter is missing.
    async fn fetch(&self, ordinal: u32) -> anyhow::Result<Fetched>;

    fn describe(&self) -> String;
}

/// Opens `location` as an HTTP static host when it is an http(s) URL, else as a directory.
pub fn open(location: &str, layout: &ChapterLayout) -> anyhow::Result<Arc<dyn ChapterSource>> {
    if location.starts_with("http://") || location.starts_with("https://") {
        let base = Url::parse(location).with_context(|| format!("parse --source url: {location}"))?;
        return Ok(Arc::new(
            HttpSource::new(base, layout.clone()).context("build http chapter source")?,
        ));
    }
    Ok(Arc::new(DirSource::new(location, layout.clone())))
}

/// Fallback pages (typically an SPA `index.html` served for any path) are
/// markup, never chapter text.
pub fn is_substitute_document(text: &str) -> bool {
    let lowered = text.to_ascii_lowercase();
    lowered.contains("<!doctype html") || lowered.contains("<html")
}

#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
    layout: ChapterLayout,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>, layout: ChapterLayout) -> Self {
        Self {
            root: root.into(),
            layout,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The canonical file name, or any `.txt` file carrying the same
    /// zero-padded ordinal prefix.
    async fn resolve(&self, ordinal: u32) -> anyhow::Result<Option<PathBuf>> {
        let canonical = self.root.join(self.layout.file_name(ordinal));
        if tokio::fs::try_exists(&canonical)
            .await
            .with_context(|| format!("stat chapter file: {}", canonical.display()))?
        {
            return Ok(Some(canonical));
        }

        let prefix = format!("{ordinal:03}_");
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .with_context(|| format!("read chapter dir: {}", self.root.display()))?;
        let mut matches = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with(&prefix) && name.ends_with(".txt") {
                matches.push(entry.path());
            }
        }
        matches.sort();
        if matches.len() > 1 {
            tracing::warn!(ordinal, candidates = matches.len(), "several chapter files share an ordinal; using the first");
        }
        Ok(matches.into_iter().next())
    }
}

#[async_trait]
impl ChapterSource for DirSource {
    async fn fetch(&self, ordinal: u32) -> anyhow::Result<Fetched> {
        let Some(path) = self.resolve(ordinal).await? else {
            return Ok(Fetched::NotFound);
        };
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Fetched::NotFound),
            Err(err) => {
                return Err(err).with_context(|| format!("read chapter file: {}", path.display()));
            }
        };
        let source_id = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_owned)
            .unwrap_or_else(|| self.layout.file_name(ordinal));
        Ok(Fetched::Found { source_id, text })
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// Chapter files served by a static HTTP host under `base`.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base: Url,
    layout: ChapterLayout,
}

impl HttpSource {
    pub fn new(base: Url, layout: ChapterLayout) -> anyhow::Result<Self> {
        if base.cannot_be_a_base() {
            anyhow::bail!("chapter source url cannot be a base: {base}");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("build chapter http client")?;
        Ok(Self {
            client,
            base,
            layout,
        })
    }

    pub fn chapter_url(&self, ordinal: u32) -> anyhow::Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("chapter source url cannot be a base: {}", self.base))?
            .pop_if_empty()
            .push(&self.layout.file_name(ordinal));
        Ok(url)
    }
}

#[async_trait]
impl ChapterSource for HttpSource {
    async fn fetch(&self, ordinal: u32) -> anyhow::Result<Fetched> {
        let url = self.chapter_url(ordinal)?;
        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, "chaptershelf/0.1")
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Ok(Fetched::NotFound);
        }
        if !status.is_success() {
            anyhow::bail!("GET {url}: {status}");
        }

        let text = response
            .text()
            .await
            .with_context(|| format!("read body: {url}"))?;
        Ok(Fetched::Found {
            source_id: self.layout.file_name(ordinal),
            text,
        })
    }

    fn describe(&self) -> String {
        self.base.to_string()
    }
}
