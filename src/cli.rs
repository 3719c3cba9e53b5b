use clap::{Args, Parser, Subcommand};

use crate::config::{CorpusConfig, DEFAULT_AI_THRESHOLD, DEFAULT_PROBE_CEILING};
use crate::formats::SortDirection;
use crate::query::DEFAULT_PAGE_SIZE;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the number of contiguous chapters the source serves.
    Probe(ProbeArgs),
    /// Build the chapter manifest and write it atomically.
    Manifest(ManifestArgs),
    /// Print one page of the chapter listing as JSON.
    List(ListArgs),
    /// Print one chapter with its neighbours as JSON.
    Show(ShowArgs),
    /// Split a full novel into chapter files.
    Split(SplitArgs),
}

#[derive(Debug, Clone, Args)]
pub struct CorpusArgs {
    /// Chapter directory, or http(s) base URL of a static chapter host.
    #[arg(long)]
    pub source: String,

    /// First ordinal counted as AI-generated (default: $CHAPTERSHELF_AI_THRESHOLD or 132).
    #[arg(long)]
    pub ai_threshold: Option<u32>,

    /// Hard limit on discovery iterations.
    #[arg(long, default_value_t = DEFAULT_PROBE_CEILING)]
    pub probe_ceiling: u32,

    /// Chapter fetches in flight during discovery.
    #[arg(long, default_value_t = 1)]
    pub probe_concurrency: usize,
}

impl CorpusArgs {
    pub fn to_config(&self) -> anyhow::Result<CorpusConfig> {
        let ai_threshold = match self.ai_threshold {
            Some(0) => anyhow::bail!("--ai-threshold must be at least 1"),
            Some(value) => value,
            None => CorpusConfig::ai_threshold_from_env()?.unwrap_or(DEFAULT_AI_THRESHOLD),
        };
        Ok(CorpusConfig {
            ai_threshold,
            probe_ceiling: self.probe_ceiling,
            probe_concurrency: self.probe_concurrency.max(1),
            ..CorpusConfig::default()
        })
    }
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,
}

#[derive(Debug, Args)]
pub struct ManifestArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,

    /// Output path for `chapter-manifest.json` (replaced atomically).
    #[arg(long)]
    pub out: String,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,

    /// Case-insensitive filter on title or description.
    #[arg(long, default_value = "")]
    pub query: String,

    #[arg(long, value_enum, default_value_t = SortDirection::Asc)]
    pub sort: SortDirection,

    /// 1-based page index.
    #[arg(long, default_value_t = 1)]
    pub page: usize,

    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,

    #[arg(long)]
    pub ordinal: u32,
}

#[derive(Debug, Args)]
pub struct SplitArgs {
    /// Full novel text (UTF-8).
    #[arg(long)]
    pub input: String,

    /// Output directory for chapter files (must not exist).
    #[arg(long)]
    pub out: String,

    #[arg(long, default_value_t = 2000)]
    pub words_per_file: usize,

    #[arg(long, default_value = "《龙族Ⅰ火之晨曦》")]
    pub series: String,

    #[arg(long, default_value = "江南")]
    pub author: String,
}
