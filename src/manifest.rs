use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio_util::sync::CancellationToken;

use crate::cli::ManifestArgs;
use crate::config::CorpusConfig;
use crate::error::BuildError;
use crate::formats::{ChapterRecord, ManifestArtifact, ManifestEntry};
use crate::parser::ChapterParser;
use crate::probe::{ProbeOptions, probe_run};
use crate::source::ChapterSource;

/// The canonical, ordered chapter collection. Never mutated once assembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterManifest {
    chapters: Vec<ChapterRecord>,
    original_count: usize,
    ai_generated_count: usize,
    generated_at: DateTime<Utc>,
}

impl ChapterManifest {
    pub fn empty(generated_at: DateTime<Utc>) -> Self {
        assemble(Vec::new(), generated_at)
    }

    pub fn chapters(&self) -> &[ChapterRecord] {
        &self.chapters
    }

    pub fn total_chapters(&self) -> usize {
        self.chapters.len()
    }

    pub fn original_count(&self) -> usize {
        self.original_count
    }

    pub fn ai_generated_count(&self) -> usize {
        self.ai_generated_count
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    /// `N` of the stored run.
    pub fn last_ordinal(&self) -> u32 {
        self.chapters.last().map_or(0, |record| record.ordinal)
    }

    pub fn get(&self, ordinal: u32) -> Option<&ChapterRecord> {
        self.chapters
            .binary_search_by_key(&ordinal, |record| record.ordinal)
            .ok()
            .map(|index| &self.chapters[index])
    }

    pub fn contains(&self, ordinal: u32) -> bool {
        self.get(ordinal).is_some()
    }

    pub fn to_artifact(&self) -> ManifestArtifact {
        ManifestArtifact {
            total_chapters: self.total_chapters(),
            original_chapters: self.original_count,
            ai_generated_chapters: self.ai_generated_count,
            generated_at: self.generated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            chapters: self
                .chapters
                .iter()
                .map(|record| ManifestEntry {
                    ordinal: record.ordinal,
                    source_id: record.source_id.clone(),
                    title: record.title.clone(),
                    word_count: record.word_count,
                    word_count_estimated: record.word_count_estimated,
                    is_ai_generated: record.is_ai_generated,
                })
                .collect(),
        }
    }

    /// Rebuilds from a persisted artifact. Bodies and descriptions are not
    /// stored there and come back empty; counts are recomputed from entries.
    pub fn from_artifact(artifact: ManifestArtifact) -> anyhow::Result<Self> {
        let generated_at = DateTime::parse_from_rfc3339(&artifact.generated_at)
            .with_context(|| format!("parse generatedAt: {}", artifact.generated_at))?
            .with_timezone(&Utc);
        let records = artifact
            .chapters
            .into_iter()
            .map(|entry| ChapterRecord {
                ordinal: entry.ordinal,
                source_id: entry.source_id,
                title: entry.title,
                word_count: entry.word_count,
                word_count_estimated: entry.word_count_estimated,
                is_ai_generated: entry.is_ai_generated,
                description: String::new(),
                body: String::new(),
            })
            .collect();
        let manifest = assemble(records, generated_at);
        if manifest.total_chapters() != artifact.total_chapters {
            tracing::warn!(
                declared = artifact.total_chapters,
                actual = manifest.total_chapters(),
                "manifest artifact counters disagree with its entries"
            );
        }
        Ok(manifest)
    }
}

/// Orders records by ordinal and derives the provenance counters.
pub fn assemble(mut records: Vec<ChapterRecord>, generated_at: DateTime<Utc>) -> ChapterManifest {
    records.sort_by_key(|record| record.ordinal);
    let ai_generated_count = records
        .iter()
        .filter(|record| record.is_ai_generated)
        .count();
    ChapterManifest {
        original_count: records.len() - ai_generated_count,
        ai_generated_count,
        chapters: records,
        generated_at,
    }
}

/// Probe, parse and assemble in one pass.
pub async fn build_manifest(
    source: Arc<dyn ChapterSource>,
    config: &CorpusConfig,
    cancel: &CancellationToken,
) -> Result<ChapterManifest, BuildError> {
    let parser = ChapterParser::new(config.layout.clone(), config.ai_threshold)
        .map_err(|err| BuildError::Layout(format!("{err:#}")))?;
    let options = ProbeOptions {
        ceiling: config.probe_ceiling,
        concurrency: config.probe_concurrency,
    };
    let run = probe_run(Arc::clone(&source), options, cancel).await?;

    let records = run
        .chapters
        .iter()
        .map(|chapter| parser.parse(&chapter.text, chapter.ordinal, &chapter.source_id))
        .collect();
    let manifest = assemble(records, Utc::now());
    tracing::info!(
        total = manifest.total_chapters(),
        original = manifest.original_count(),
        ai_generated = manifest.ai_generated_count(),
        "assembled chapter manifest"
    );
    Ok(manifest)
}

pub async fn run(args: ManifestArgs) -> anyhow::Result<()> {
    let config = args.corpus.to_config()?;
    let source = crate::source::open(&args.corpus.source, &config.layout)?;
    let out_path = Path::new(&args.out);

    let manifest = build_manifest(source, &config, &CancellationToken::new())
        .await
        .context("build manifest")?;
    write_manifest_atomic(out_path, &manifest).await?;
    tracing::info!(
        out = %out_path.display(),
        total = manifest.total_chapters(),
        original = manifest.original_count(),
        ai_generated = manifest.ai_generated_count(),
        "manifest written"
    );
    Ok(())
}

/// Replaces `path` with the serialized artifact via a sibling temp file and rename.
pub async fn write_manifest_atomic(path: &Path, manifest: &ChapterManifest) -> anyhow::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&parent)
        .await
        .with_context(|| format!("create manifest dir: {}", parent.display()))?;

    let data = serde_json::to_vec_pretty(&manifest.to_artifact()).context("serialize manifest")?;
    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    tokio::fs::write(&tmp_path, &data)
        .await
        .with_context(|| format!("write tmp manifest: {}", tmp_path.display()))?;
    if let Err(err) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(err).with_context(|| format!("replace manifest: {}", path.display()));
    }
    Ok(())
}

/// `Ok(None)` when no artifact exists at `path`.
pub async fn read_manifest(path: &Path) -> anyhow::Result<Option<ManifestArtifact>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("read manifest: {}", path.display()));
        }
    };
    let artifact = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse manifest: {}", path.display()))?;
    Ok(Some(artifact))
}
