//! The live chapter collection shared by the CLI and the HTTP app.
//!
//! Readers take an `Arc` snapshot of the current manifest; a finished build
//! swaps the pointer. Starting a build cancels the one in flight, and a build
//! only publishes if no newer build started after it.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::config::CorpusConfig;
use crate::error::BuildError;
use crate::formats::{ChapterPage, ChapterView};
use crate::manifest::{ChapterManifest, build_manifest, read_manifest, write_manifest_atomic};
use crate::parser::ChapterParser;
use crate::query::{ListQuery, get, list};
use crate::source::ChapterSource;

struct BuildSlot {
    generation: u64,
    cancel: CancellationToken,
}

pub struct Library {
    source: Arc<dyn ChapterSource>,
    config: CorpusConfig,
    parser: ChapterParser,
    cache_path: Option<PathBuf>,
    current: RwLock<Arc<ChapterManifest>>,
    slot: Mutex<BuildSlot>,
    persist: tokio::sync::Mutex<()>,
}

impl Library {
    /// `cache_path` is where builds are persisted and where the fallback
    /// manifest is read from when the source is down.
    pub fn new(
        source: Arc<dyn ChapterSource>,
        config: CorpusConfig,
        cache_path: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let parser = ChapterParser::new(config.layout.clone(), config.ai_threshold)?;
        Ok(Self {
            source,
            config,
            parser,
            cache_path,
            current: RwLock::new(Arc::new(ChapterManifest::empty(Utc::now()))),
            slot: Mutex::new(BuildSlot {
                generation: 0,
                cancel: CancellationToken::new(),
            }),
            persist: tokio::sync::Mutex::new(()),
        })
    }

    pub fn source(&self) -> &Arc<dyn ChapterSource> {
        &self.source
    }

    pub fn config(&self) -> &CorpusConfig {
        &self.config
    }

    pub fn manifest(&self) -> Arc<ChapterManifest> {
        Arc::clone(&*self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn publish(&self, manifest: Arc<ChapterManifest>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = manifest;
    }

    fn latest_generation(&self) -> u64 {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    /// Publishes `manifest` unless a build newer than `generation` has started.
    fn publish_if_current(&self, generation: u64, manifest: Arc<ChapterManifest>) -> bool {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.generation != generation {
            tracing::debug!(generation, latest = slot.generation, "discarding superseded manifest");
            return false;
        }
        self.publish(manifest);
        true
    }

    /// Builds a fresh manifest, superseding any build still running.
    pub async fn rebuild(&self) -> Result<Arc<ChapterManifest>, BuildError> {
        self.rebuild_tracked().await.1
    }

    async fn rebuild_tracked(&self) -> (u64, Result<Arc<ChapterManifest>, BuildError>) {
        let (generation, cancel) = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            slot.cancel.cancel();
            slot.generation += 1;
            slot.cancel = CancellationToken::new();
            (slot.generation, slot.cancel.clone())
        };
        tracing::info!(generation, source = %self.source.describe(), "manifest build started");

        let manifest = match build_manifest(Arc::clone(&self.source), &self.config, &cancel).await {
            Ok(manifest) => Arc::new(manifest),
            Err(err) => return (generation, Err(err)),
        };
        if !self.publish_if_current(generation, Arc::clone(&manifest)) {
            return (generation, Err(BuildError::Superseded));
        }

        if let Some(path) = &self.cache_path {
            let _guard = self.persist.lock().await;
            if self.latest_generation() == generation {
                if let Err(err) = write_manifest_atomic(path, &manifest).await {
                    tracing::warn!(path = %path.display(), err = %format!("{err:#}"), "could not persist manifest");
                }
            }
        }
        (generation, Ok(manifest))
    }

    /// Initial load: build, or fall back to the persisted artifact, or to an
    /// explicitly empty manifest. A fallback never replaces a newer build.
    pub async fn load(&self) -> Arc<ChapterManifest> {
        let (generation, result) = self.rebuild_tracked().await;
        let err = match result {
            Ok(manifest) => return manifest,
            Err(BuildError::Superseded) => return self.manifest(),
            Err(err) => err,
        };
        tracing::warn!(%err, "manifest build failed; falling back");

        if let Some(path) = &self.cache_path {
            match read_manifest(path).await {
                Ok(Some(artifact)) => match ChapterManifest::from_artifact(artifact) {
                    Ok(manifest) => {
                        tracing::info!(path = %path.display(), total = manifest.total_chapters(), "serving persisted manifest");
                        let manifest = Arc::new(manifest);
                        if self.publish_if_current(generation, Arc::clone(&manifest)) {
                            return manifest;
                        }
                        return self.manifest();
                    }
                    Err(err) => {
                        tracing::warn!(path = %path.display(), err = %format!("{err:#}"), "persisted manifest is unusable");
                    }
                },
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(path = %path.display(), err = %format!("{err:#}"), "could not read persisted manifest");
                }
            }
        }

        let empty = Arc::new(ChapterManifest::empty(Utc::now()));
        if self.publish_if_current(generation, Arc::clone(&empty)) {
            return empty;
        }
        self.manifest()
    }

    pub fn list(&self, query: &ListQuery) -> ChapterPage {
        list(&self.manifest(), query)
    }

    pub async fn get(&self, ordinal: u32) -> Option<ChapterView> {
        let manifest = self.manifest();
        get(self.source.as_ref(), Some(&manifest), &self.parser, ordinal).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::manifest::assemble;
    use crate::manifest::tests::{fixed_time, record};
    use crate::testing::{MockSource, Reply};

    #[tokio::test]
    async fn rebuild_publishes_and_persists() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let cache = temp.path().join("chapter-manifest.json");
        let library = Library::new(
            Arc::new(MockSource::with_chapters(25)),
            CorpusConfig::default(),
            Some(cache.clone()),
        )?;
        assert_eq!(library.manifest().total_chapters(), 0);

        library.rebuild().await?;
        assert_eq!(library.manifest().total_chapters(), 25);
        let page = library.list(&ListQuery::default());
        assert_eq!(page.items.len(), 12);
        assert_eq!(page.total_pages, 3);

        let artifact = read_manifest(&cache).await?.expect("persisted");
        assert_eq!(artifact.total_chapters, 25);
        Ok(())
    }

    #[tokio::test]
    async fn newer_build_supersedes_running_one() -> anyhow::Result<()> {
        let source = MockSource::with_chapters(5).with_delay(Duration::from_millis(20));
        let library = Arc::new(Library::new(
            Arc::new(source),
            CorpusConfig::default(),
            None,
        )?);

        let first = tokio::spawn({
            let library = Arc::clone(&library);
            async move { library.rebuild().await }
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        let second = library.rebuild().await?;

        assert!(matches!(first.await?, Err(BuildError::Superseded)));
        assert_eq!(second.total_chapters(), 5);
        assert!(Arc::ptr_eq(&second, &library.manifest()));
        Ok(())
    }

    #[tokio::test]
    async fn load_falls_back_to_persisted_artifact() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let cache = temp.path().join("chapter-manifest.json");
        let previous = assemble(vec![record(1, "楔子：白帝城", ""), record(2, "第2章", "")], fixed_time());
        write_manifest_atomic(&cache, &previous).await?;

        let source = MockSource::with_chapters(5);
        source.set(1, Reply::Broken);
        let library = Library::new(Arc::new(source), CorpusConfig::default(), Some(cache))?;

        let manifest = library.load().await;
        assert_eq!(manifest.total_chapters(), 2);
        assert_eq!(manifest.generated_at(), fixed_time());
        Ok(())
    }

    #[tokio::test]
    async fn load_without_artifact_is_explicitly_empty() -> anyhow::Result<()> {
        let source = MockSource::with_chapters(5);
        source.set(1, Reply::Broken);
        let library = Library::new(Arc::new(source), CorpusConfig::default(), None)?;

        let manifest = library.load().await;
        assert_eq!(manifest.total_chapters(), 0);
        assert_eq!(library.list(&ListQuery::default()).total_pages, 0);
        Ok(())
    }

    #[tokio::test]
    async fn stale_fallback_does_not_replace_newer_build() -> anyhow::Result<()> {
        let library = Library::new(
            Arc::new(MockSource::with_chapters(5)),
            CorpusConfig::default(),
            None,
        )?;
        let built = library.rebuild().await?;
        assert_eq!(built.total_chapters(), 5);

        let stale = Arc::new(ChapterManifest::empty(fixed_time()));
        assert!(!library.publish_if_current(0, stale));
        assert!(Arc::ptr_eq(&built, &library.manifest()));
        Ok(())
    }

    #[tokio::test]
    async fn get_reads_through_the_source() -> anyhow::Result<()> {
        let library = Library::new(
            Arc::new(MockSource::with_chapters(3)),
            CorpusConfig::default(),
            None,
        )?;
        library.load().await;
        let view = library.get(3).await.expect("chapter 3");
        assert!(view.has_previous);
        assert!(!view.has_next);
        assert!(library.get(4).await.is_none());
        Ok(())
    }
}
