//! Discovery of the contiguous run `[1, N]` of chapters that exist.
//!
//! Chapter files carry no index, so the run is found by fetching ordinals in
//! order until the first miss. Fetches may overlap inside a window, but
//! results are accepted as a prefix scan: nothing after the first miss counts.

use std::sync::Arc;

use anyhow::Context as _;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::cli::ProbeArgs;
use crate::error::BuildError;
use crate::source::{ChapterSource, Fetched, is_substitute_document};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOptions {
    pub ceiling: u32,
    pub concurrency: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbedChapter {
    pub ordinal: u32,
    pub source_id: String,
    pub text: String,
}

/// What ended the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStop {
    Missing { ordinal: u32 },
    Substitute { ordinal: u32 },
    Transport { ordinal: u32 },
    Ceiling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRun {
    /// Ascending, dense from ordinal 1.
    pub chapters: Vec<ProbedChapter>,
    pub stop: ProbeStop,
}

impl ProbeRun {
    /// `N`, the last ordinal of the run (0 when nothing exists).
    pub fn last_ordinal(&self) -> u32 {
        self.chapters.last().map_or(0, |chapter| chapter.ordinal)
    }
}

pub async fn run(args: ProbeArgs) -> anyhow::Result<()> {
    let config = args.corpus.to_config()?;
    let source = crate::source::open(&args.corpus.source, &config.layout)?;
    let options = ProbeOptions {
        ceiling: config.probe_ceiling,
        concurrency: config.probe_concurrency,
    };
    let run = probe_run(source, options, &CancellationToken::new())
        .await
        .context("probe chapter source")?;
    println!("{}", run.last_ordinal());
    Ok(())
}

enum Step {
    Accept(ProbedChapter),
    Stop(ProbeStop),
}

pub async fn probe_run(
    source: Arc<dyn ChapterSource>,
    options: ProbeOptions,
    cancel: &CancellationToken,
) -> Result<ProbeRun, BuildError> {
    let window = u32::try_from(options.concurrency.max(1)).unwrap_or(u32::MAX);
    let mut chapters = Vec::new();
    let mut next = 1_u32;

    while next <= options.ceiling {
        let last = next.saturating_add(window - 1).min(options.ceiling);
        let mut results = fetch_window(&source, next, last, cancel).await?;
        results.sort_by_key(|(ordinal, _)| *ordinal);

        for (ordinal, result) in results {
            match classify(source.as_ref(), ordinal, result)? {
                Step::Accept(chapter) => chapters.push(chapter),
                Step::Stop(stop) => {
                    tracing::info!(found = chapters.len(), ?stop, source = %source.describe(), "chapter probe finished");
                    return Ok(ProbeRun { chapters, stop });
                }
            }
        }
        next = last.saturating_add(1);
        if last == u32::MAX {
            break;
        }
    }

    tracing::warn!(ceiling = options.ceiling, source = %source.describe(), "chapter probe hit its iteration ceiling");
    Ok(ProbeRun {
        chapters,
        stop: ProbeStop::Ceiling,
    })
}

/// Live existence check for one ordinal; transport errors count as absent.
pub async fn chapter_exists(source: &dyn ChapterSource, ordinal: u32) -> bool {
    if ordinal == 0 {
        return false;
    }
    match source.fetch(ordinal).await {
        Ok(Fetched::Found { text, .. }) => !is_substitute_document(&text),
        Ok(Fetched::NotFound) => false,
        Err(err) => {
            tracing::debug!(ordinal, err = %format!("{err:#}"), "existence check failed");
            false
        }
    }
}

async fn fetch_window(
    source: &Arc<dyn ChapterSource>,
    first: u32,
    last: u32,
    cancel: &CancellationToken,
) -> Result<Vec<(u32, anyhow::Result<Fetched>)>, BuildError> {
    let mut tasks = JoinSet::new();
    for ordinal in first..=last {
        let source = Arc::clone(source);
        tasks.spawn(async move { (ordinal, source.fetch(ordinal).await) });
    }

    let mut results = Vec::with_capacity(tasks.len());
    loop {
        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tasks.abort_all();
                return Err(BuildError::Superseded);
            }
            joined = tasks.join_next() => joined,
        };
        let Some(joined) = joined else {
            break;
        };
        match joined {
            Ok(result) => results.push(result),
            Err(err) => {
                // A panicking fetch is a broken transport for that ordinal.
                tracing::error!(?err, "chapter fetch task failed");
                return Err(BuildError::SourceUnavailable {
                    source_location: source.describe(),
                    reason: format!("fetch task failed: {err}"),
                });
            }
        }
    }
    Ok(results)
}

fn classify(
    source: &dyn ChapterSource,
    ordinal: u32,
    result: anyhow::Result<Fetched>,
) -> Result<Step, BuildError> {
    match result {
        Ok(Fetched::Found { text, .. }) if is_substitute_document(&text) => {
            tracing::debug!(ordinal, "fetch returned a substitute document");
            Ok(Step::Stop(ProbeStop::Substitute { ordinal }))
        }
        Ok(Fetched::Found { source_id, text }) => Ok(Step::Accept(ProbedChapter {
            ordinal,
            source_id,
            text,
        })),
        Ok(Fetched::NotFound) => Ok(Step::Stop(ProbeStop::Missing { ordinal })),
        Err(err) if ordinal == 1 => Err(BuildError::SourceUnavailable {
            source_location: source.describe(),
            reason: format!("{err:#}"),
        }),
        Err(err) => {
            tracing::warn!(ordinal, err = %format!("{err:#}"), "chapter fetch failed; ending run");
            Ok(Step::Stop(ProbeStop::Transport { ordinal }))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::{MockSource, Reply};

    fn options(concurrency: usize) -> ProbeOptions {
        ProbeOptions {
            ceiling: 10_000,
            concurrency,
        }
    }

    #[tokio::test]
    async fn stops_at_first_missing_ordinal() -> anyhow::Result<()> {
        let source = Arc::new(MockSource::with_chapters(10));
        let run = probe_run(source.clone(), options(1), &CancellationToken::new()).await?;
        assert_eq!(run.last_ordinal(), 10);
        assert_eq!(run.stop, ProbeStop::Missing { ordinal: 11 });
        assert_eq!(source.fetches(), 11);
        let ordinals: Vec<u32> = run.chapters.iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, (1..=10).collect::<Vec<_>>());
        Ok(())
    }

    #[tokio::test]
    async fn never_skips_a_gap() -> anyhow::Result<()> {
        let source = MockSource::with_chapters(10);
        source.set(5, Reply::Missing);
        let run = probe_run(Arc::new(source), options(1), &CancellationToken::new()).await?;
        assert_eq!(run.last_ordinal(), 4);
        assert_eq!(run.stop, ProbeStop::Missing { ordinal: 5 });
        Ok(())
    }

    #[tokio::test]
    async fn windowed_probe_matches_sequential_result() -> anyhow::Result<()> {
        let source = MockSource::with_chapters(10);
        source.set(5, Reply::Missing);
        let run = probe_run(Arc::new(source), options(4), &CancellationToken::new()).await?;
        assert_eq!(run.last_ordinal(), 4);

        let run = probe_run(
            Arc::new(MockSource::with_chapters(10)),
            options(3),
            &CancellationToken::new(),
        )
        .await?;
        assert_eq!(run.last_ordinal(), 10);
        Ok(())
    }

    #[tokio::test]
    async fn substitute_document_ends_run() -> anyhow::Result<()> {
        let source = MockSource::with_chapters(10);
        source.set(8, Reply::Html);
        let run = probe_run(Arc::new(source), options(1), &CancellationToken::new()).await?;
        assert_eq!(run.last_ordinal(), 7);
        assert_eq!(run.stop, ProbeStop::Substitute { ordinal: 8 });
        Ok(())
    }

    #[tokio::test]
    async fn transport_error_after_first_ordinal_ends_run() -> anyhow::Result<()> {
        let source = MockSource::with_chapters(10);
        source.set(3, Reply::Broken);
        let run = probe_run(Arc::new(source), options(1), &CancellationToken::new()).await?;
        assert_eq!(run.last_ordinal(), 2);
        assert_eq!(run.stop, ProbeStop::Transport { ordinal: 3 });
        Ok(())
    }

    #[tokio::test]
    async fn transport_error_on_first_ordinal_is_build_failure() {
        let source = MockSource::with_chapters(10);
        source.set(1, Reply::Broken);
        let err = probe_run(Arc::new(source), options(1), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn empty_source_yields_empty_run() -> anyhow::Result<()> {
        let run = probe_run(
            Arc::new(MockSource::default()),
            options(1),
            &CancellationToken::new(),
        )
        .await?;
        assert_eq!(run.last_ordinal(), 0);
        assert!(run.chapters.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn ceiling_bounds_a_source_that_never_misses() -> anyhow::Result<()> {
        let source = Arc::new(MockSource::with_chapters(50));
        let run = probe_run(
            source.clone(),
            ProbeOptions {
                ceiling: 20,
                concurrency: 1,
            },
            &CancellationToken::new(),
        )
        .await?;
        assert_eq!(run.last_ordinal(), 20);
        assert_eq!(run.stop, ProbeStop::Ceiling);
        assert_eq!(source.fetches(), 20);
        Ok(())
    }

    #[tokio::test]
    async fn cancelled_probe_is_superseded() {
        let source = MockSource::with_chapters(10).with_delay(Duration::from_millis(50));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = probe_run(Arc::new(source), options(1), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, BuildError::Superseded);
    }

    #[tokio::test]
    async fn existence_check_rejects_substitutes_and_zero() {
        let source = MockSource::with_chapters(3);
        source.set(2, Reply::Html);
        assert!(chapter_exists(&source, 1).await);
        assert!(!chapter_exists(&source, 2).await);
        assert!(!chapter_exists(&source, 0).await);
        assert!(!chapter_exists(&source, 4).await);
    }
}
