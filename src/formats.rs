use serde::{Deserialize, Serialize};

/// One parsed chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterRecord {
    pub ordinal: u32,
    pub source_id: String,
    pub title: String,
    pub word_count: u32,
    /// `true` when `word_count` is the layout default rather than a marker value.
    pub word_count_estimated: bool,
    #[serde(rename = "isAIGenerated")]
    pub is_ai_generated: bool,
    pub description: String,
    pub body: String,
}

/// Listing card for one chapter; a record without its body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterSummary {
    pub ordinal: u32,
    pub source_id: String,
    pub title: String,
    pub word_count: u32,
    pub word_count_estimated: bool,
    #[serde(rename = "isAIGenerated")]
    pub is_ai_generated: bool,
    pub description: String,
    pub section: String,
}

impl ChapterSummary {
    pub fn from_record(record: &ChapterRecord) -> Self {
        Self {
            ordinal: record.ordinal,
            source_id: record.source_id.clone(),
            title: record.title.clone(),
            word_count: record.word_count,
            word_count_estimated: record.word_count_estimated,
            is_ai_generated: record.is_ai_generated,
            description: record.description.clone(),
            section: section_label(record.ordinal),
        }
    }
}

/// Grouping shown on chapter cards: the prologue, then acts of ten files.
pub fn section_label(ordinal: u32) -> String {
    if ordinal <= 1 {
        "楔子".to_owned()
    } else {
        format!("第{}幕", ordinal.div_ceil(10))
    }
}

/// Persisted manifest (`chapter-manifest.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestArtifact {
    pub total_chapters: usize,
    pub original_chapters: usize,
    pub ai_generated_chapters: usize,
    pub generated_at: String,
    pub chapters: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub ordinal: u32,
    pub source_id: String,
    pub title: String,
    pub word_count: u32,
    /// Absent in artifacts written before the flag was recorded.
    #[serde(default)]
    pub word_count_estimated: bool,
    #[serde(rename = "isAIGenerated")]
    pub is_ai_generated: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// One page of the listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterPage {
    pub items: Vec<ChapterSummary>,
    pub total_pages: usize,
    pub total_count: usize,
}

/// A chapter opened in the reader together with its live neighbours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterView {
    pub record: ChapterRecord,
    pub has_previous: bool,
    pub has_next: bool,
}
