//! Turns one raw chapter file into a [`ChapterRecord`].
//!
//! The layout is semi-structured: a header block (series, author, rule), an
//! optional title line, the body, then a footer (rule, statistics line, file
//! id). Every rule here is a best-effort heuristic; malformed input falls back
//! to defaults instead of failing.

use anyhow::Context as _;
use regex::Regex;

use crate::config::ChapterLayout;
use crate::formats::ChapterRecord;

const ELLIPSIS: &str = "...";

#[derive(Debug, Clone)]
pub struct ChapterParser {
    layout: ChapterLayout,
    ai_threshold: u32,
    separator_run: String,
    stats_re: Regex,
}

impl ChapterParser {
    pub fn new(layout: ChapterLayout, ai_threshold: u32) -> anyhow::Result<Self> {
        let pattern = format!(
            r"{}[：:]\s*(\d+)\s*{}",
            regex::escape(&layout.stats_label),
            regex::escape(&layout.stats_unit)
        );
        let stats_re = Regex::new(&pattern).context("compile statistics marker pattern")?;
        Ok(Self {
            separator_run: layout.separator_run(),
            layout,
            ai_threshold,
            stats_re,
        })
    }

    pub fn layout(&self) -> &ChapterLayout {
        &self.layout
    }

    pub fn ai_threshold(&self) -> u32 {
        self.ai_threshold
    }

    pub fn is_ai_generated(&self, ordinal: u32) -> bool {
        ordinal >= self.ai_threshold
    }

    pub fn parse(&self, raw: &str, ordinal: u32, source_id: &str) -> ChapterRecord {
        let title_line = self.find_title_line(raw);
        let title = match title_line {
            Some(line) => truncate_chars(line, self.layout.title_max_chars),
            None => format!("Chapter {ordinal}"),
        };
        let (word_count, word_count_estimated) = match self.word_count(raw) {
            Some(count) => (count, false),
            None => (self.layout.default_word_count, true),
        };

        ChapterRecord {
            ordinal,
            source_id: source_id.to_owned(),
            title,
            word_count,
            word_count_estimated,
            is_ai_generated: self.is_ai_generated(ordinal),
            description: self.description(raw),
            body: self.body(raw, title_line),
        }
    }

    fn is_header_line(&self, trimmed: &str) -> bool {
        let layout = &self.layout;
        trimmed.contains(layout.series_marker.as_str())
            || trimmed.contains(layout.author_marker.as_str())
            || trimmed.contains(self.separator_run.as_str())
            || trimmed.contains(layout.stats_label.as_str())
            || trimmed.contains(layout.file_id_marker.as_str())
    }

    fn is_bare_separator(&self, trimmed: &str) -> bool {
        !trimmed.is_empty() && trimmed.chars().all(|c| c == self.layout.separator_char)
    }

    fn is_footer_line(&self, trimmed: &str) -> bool {
        self.is_bare_separator(trimmed)
            || trimmed.contains(self.layout.stats_label.as_str())
            || trimmed.contains(self.layout.file_id_marker.as_str())
    }

    /// Untruncated title line, searched in the leading window only.
    fn find_title_line<'a>(&self, raw: &'a str) -> Option<&'a str> {
        raw.lines()
            .take(self.layout.title_window)
            .map(str::trim)
            .filter(|line| !line.is_empty() && !self.is_header_line(line))
            .find(|line| looks_like_title(line))
    }

    fn word_count(&self, raw: &str) -> Option<u32> {
        let captures = self.stats_re.captures(raw)?;
        captures.get(1)?.as_str().parse().ok()
    }

    fn body(&self, raw: &str, title_line: Option<&str>) -> String {
        let mut lines = Vec::new();
        let mut started = false;
        for line in raw.lines() {
            let trimmed = line.trim();
            if !started {
                if trimmed.is_empty()
                    || self.is_header_line(trimmed)
                    || title_line == Some(trimmed)
                {
                    continue;
                }
                started = true;
            } else if self.is_footer_line(trimmed) {
                break;
            }
            lines.push(line);
        }
        lines.join("\n").trim().to_owned()
    }

    fn description(&self, raw: &str) -> String {
        let bound = self.layout.description_max_chars;
        let mut text = String::new();
        let mut started = false;
        for line in raw.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if !started {
                // Headings never open a preview.
                if self.is_header_line(trimmed) || trimmed.contains('第') || trimmed.contains('章')
                {
                    continue;
                }
                started = true;
            } else if trimmed.contains(self.layout.separator_char)
                || trimmed.contains(self.layout.stats_label.as_str())
                || trimmed.contains(self.layout.file_id_marker.as_str())
            {
                continue;
            }
            text.push_str(trimmed);
            if text.chars().count() >= bound {
                break;
            }
        }

        if text.chars().count() <= bound {
            return text;
        }
        let mut out: String = text.chars().take(bound.saturating_sub(ELLIPSIS.len())).collect();
        out.push_str(ELLIPSIS);
        out
    }
}

/// `第…章` headings, `楔子：…` style labels and anything mentioning a chapter.
fn looks_like_title(line: &str) -> bool {
    line.contains('章') || line.contains('：')
}

fn truncate_chars(line: &str, max_chars: usize) -> String {
    if line.chars().count() <= max_chars {
        return line.to_owned();
    }
    let mut out: String = line.chars().take(max_chars).collect();
    out.push_str(ELLIPSIS);
    out
}
