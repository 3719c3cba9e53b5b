use anyhow::Context as _;

/// First ordinal of the synthetic continuation; 1..=131 are the original text.
pub const DEFAULT_AI_THRESHOLD: u32 = 132;

/// Upper bound on discovery iterations, far above any real corpus.
pub const DEFAULT_PROBE_CEILING: u32 = 10_000;

pub const AI_THRESHOLD_ENV: &str = "CHAPTERSHELF_AI_THRESHOLD";

/// Fixed markers and limits of the chapter file layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterLayout {
    pub series_marker: String,
    pub author_marker: String,
    /// Decorative rule; header lines contain at least two in a row.
    pub separator_char: char,
    pub stats_label: String,
    pub stats_unit: String,
    pub file_id_marker: String,
    /// Number of leading lines searched for a title.
    pub title_window: usize,
    pub title_max_chars: usize,
    pub description_max_chars: usize,
    /// Reported when a file carries no statistics line.
    pub default_word_count: u32,
    pub first_label: String,
    pub placeholder_label: String,
}

impl Default for ChapterLayout {
    fn default() -> Self {
        Self {
            series_marker: "《龙族".to_owned(),
            author_marker: "作者：".to_owned(),
            separator_char: '═',
            stats_label: "字数统计".to_owned(),
            stats_unit: "字".to_owned(),
            file_id_marker: "文件编号".to_owned(),
            title_window: 20,
            title_max_chars: 40,
            description_max_chars: 100,
            default_word_count: 2000,
            first_label: "楔子：白帝城".to_owned(),
            placeholder_label: "未知章节".to_owned(),
        }
    }
}

impl ChapterLayout {
    pub fn separator_run(&self) -> String {
        std::iter::repeat_n(self.separator_char, 2).collect()
    }

    /// File name the corpus uses for `ordinal`.
    pub fn file_name(&self, ordinal: u32) -> String {
        let label = if ordinal == 1 {
            &self.first_label
        } else {
            &self.placeholder_label
        };
        format!("{ordinal:03}_{label}.txt")
    }
}

/// Everything a manifest build needs besides the source itself.
///
/// Fixed once per collection; a different threshold means a different
/// collection and therefore a rebuild.
#[derive(Debug, Clone)]
pub struct CorpusConfig {
    pub ai_threshold: u32,
    pub probe_ceiling: u32,
    pub probe_concurrency: usize,
    pub layout: ChapterLayout,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            ai_threshold: DEFAULT_AI_THRESHOLD,
            probe_ceiling: DEFAULT_PROBE_CEILING,
            probe_concurrency: 1,
            layout: ChapterLayout::default(),
        }
    }
}

impl CorpusConfig {
    /// Threshold from `CHAPTERSHELF_AI_THRESHOLD`, if set.
    pub fn ai_threshold_from_env() -> anyhow::Result<Option<u32>> {
        let Ok(raw) = std::env::var(AI_THRESHOLD_ENV) else {
            return Ok(None);
        };
        parse_threshold(&raw)
            .map(Some)
            .with_context(|| format!("invalid {AI_THRESHOLD_ENV}={raw:?}"))
    }
}

pub fn parse_threshold(raw: &str) -> anyhow::Result<u32> {
    let value: u32 = raw.trim().parse().context("parse threshold")?;
    if value == 0 {
        anyhow::bail!("threshold must be at least 1");
    }
    Ok(value)
}
