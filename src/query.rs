//! Listing, search and reader navigation over a [`ChapterManifest`].

use std::io::Write as _;
use std::sync::Arc;

use anyhow::Context as _;

use crate::cli::{ListArgs, ShowArgs};
use crate::formats::{ChapterPage, ChapterSummary, ChapterView, SortDirection};
use crate::library::Library;
use crate::manifest::ChapterManifest;
use crate::parser::ChapterParser;
use crate::probe::chapter_exists;
use crate::source::{ChapterSource, Fetched, is_substitute_document};

pub const DEFAULT_PAGE_SIZE: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub query: String,
    pub sort: SortDirection,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            sort: SortDirection::Asc,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

pub fn list(manifest: &ChapterManifest, query: &ListQuery) -> ChapterPage {
    let needle = query.query.to_lowercase();
    let mut matches: Vec<_> = manifest
        .chapters()
        .iter()
        .filter(|record| {
            needle.is_empty()
                || record.title.to_lowercase().contains(&needle)
                || record.description.to_lowercase().contains(&needle)
        })
        .collect();
    if query.sort == SortDirection::Desc {
        matches.reverse();
    }

    let page_size = query.page_size.max(1);
    let total_count = matches.len();
    let total_pages = total_count.div_ceil(page_size);
    let items = match query.page.checked_sub(1) {
        Some(index) => matches
            .into_iter()
            .skip(index.saturating_mul(page_size))
            .take(page_size)
            .map(ChapterSummary::from_record)
            .collect(),
        None => Vec::new(),
    };

    ChapterPage {
        items,
        total_pages,
        total_count,
    }
}

pub async fn run_list(args: ListArgs) -> anyhow::Result<()> {
    let library = open_library(&args.corpus)?;
    library.load().await;
    let page = library.list(&ListQuery {
        query: args.query,
        sort: args.sort,
        page: args.page,
        page_size: args.page_size,
    });
    print_json(&page)
}

/// Opens one chapter without building a manifest first.
pub async fn run_show(args: ShowArgs) -> anyhow::Result<()> {
    let config = args.corpus.to_config()?;
    let source = crate::source::open(&args.corpus.source, &config.layout)?;
    let parser = ChapterParser::new(config.layout, config.ai_threshold)?;
    let view = get(source.as_ref(), None, &parser, args.ordinal)
        .await
        .ok_or_else(|| anyhow::anyhow!("chapter not found: {}", args.ordinal))?;
    print_json(&view)
}

fn open_library(corpus: &crate::cli::CorpusArgs) -> anyhow::Result<Library> {
    let config = corpus.to_config()?;
    let source = crate::source::open(&corpus.source, &config.layout)?;
    Library::new(Arc::clone(&source), config, None)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value).context("serialize output")?;
    out.write_all(b"\n").context("write output newline")?;
    Ok(())
}

/// Bound-check adjacency inside a dense run `[1, n]`.
pub fn adjacency_in_run(ordinal: u32, n: u32) -> (bool, bool) {
    let inside = ordinal >= 1 && ordinal <= n;
    (inside && ordinal > 1, inside && ordinal < n)
}

/// Opens one chapter from the live source and re-probes its neighbours.
///
/// The manifest may be stale, so the source decides; disagreements are only
/// logged, and only when a manifest is given. Transport failures read as an
/// absent chapter. Costs one fetch plus at most two neighbour checks.
pub async fn get(
    source: &dyn ChapterSource,
    manifest: Option<&ChapterManifest>,
    parser: &ChapterParser,
    ordinal: u32,
) -> Option<ChapterView> {
    if ordinal == 0 {
        return None;
    }

    let (source_id, text) = match source.fetch(ordinal).await {
        Ok(Fetched::Found { source_id, text }) if !is_substitute_document(&text) => {
            (source_id, text)
        }
        Ok(Fetched::Found { .. } | Fetched::NotFound) => {
            if manifest.is_some_and(|manifest| manifest.contains(ordinal)) {
                tracing::warn!(ordinal, "manifest lists a chapter the source no longer serves");
            }
            return None;
        }
        Err(err) => {
            tracing::warn!(ordinal, err = %format!("{err:#}"), "chapter fetch failed");
            return None;
        }
    };
    let record = parser.parse(&text, ordinal, &source_id);

    let has_previous = ordinal > 1 && chapter_exists(source, ordinal - 1).await;
    let has_next = match ordinal.checked_add(1) {
        Some(next) => chapter_exists(source, next).await,
        None => false,
    };

    if let Some(manifest) = manifest {
        let stored = adjacency_in_run(ordinal, manifest.last_ordinal());
        if stored != (has_previous, has_next) {
            tracing::warn!(
                ordinal,
                manifest_last = manifest.last_ordinal(),
                has_previous,
                has_next,
                "manifest adjacency is stale; using live answer"
            );
        }
    }

    Some(ChapterView {
        record,
        has_previous,
        has_next,
    })
}
