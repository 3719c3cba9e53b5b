//! Cuts a full novel into fixed-size chapter files in the layout the parser reads.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Context as _;
use regex::Regex;

use crate::cli::SplitArgs;
use crate::config::ChapterLayout;

static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:楔子：|第.*幕|\d+\.)").expect("valid label pattern"));

const INDEX_FILE_NAME: &str = "000_文件索引.txt";
const RULE_WIDTH: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitChapter {
    pub ordinal: u32,
    pub file_name: String,
    pub label: String,
    pub word_count: usize,
}

pub fn run(args: SplitArgs) -> anyhow::Result<()> {
    let input = PathBuf::from(&args.input);
    let out_dir = PathBuf::from(&args.out);
    if out_dir.exists() {
        anyhow::bail!("chapter output directory already exists: {}", out_dir.display());
    }

    let text = std::fs::read_to_string(&input)
        .with_context(|| format!("read novel: {}", input.display()))?;
    let layout = ChapterLayout::default();
    let header = Header {
        series: args.series,
        author: args.author,
    };

    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("create chapter dir: {}", out_dir.display()))?;
    let chapters = write_chapters(&text, &out_dir, &header, &layout, args.words_per_file)?;
    write_index(&out_dir, &header, &chapters)?;

    let total: usize = chapters.iter().map(|chapter| chapter.word_count).sum();
    tracing::info!(files = chapters.len(), total_words = total, out = %out_dir.display(), "split finished");
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Header {
    pub series: String,
    pub author: String,
}

/// CJK unified ideographs only; punctuation and latin text do not count.
pub fn count_words(text: &str) -> usize {
    text.chars()
        .filter(|c| ('\u{4e00}'..='\u{9fff}').contains(c))
        .count()
}

/// Groups paragraphs into chunks of at most `words_per_file` counted words.
/// A single paragraph larger than the limit still gets a chunk of its own.
pub fn chunk_paragraphs(text: &str, words_per_file: usize) -> Vec<(String, usize)> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_words = 0_usize;

    for paragraph in text.lines().map(str::trim) {
        if paragraph.is_empty() || paragraph.starts_with('═') {
            continue;
        }
        let words = count_words(paragraph);
        if current_words + words > words_per_file && !current.is_empty() {
            chunks.push((current.join("\n\n"), current_words));
            current.clear();
            current_words = 0;
        }
        current.push(paragraph);
        current_words += words;
    }
    if !current.is_empty() {
        chunks.push((current.join("\n\n"), current_words));
    }
    chunks
}

/// Label for a chunk from its first lines, made safe for file names.
pub fn chunk_label(chunk: &str, layout: &ChapterLayout) -> String {
    let label = chunk
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(5)
        .find(|line| LABEL_RE.is_match(line))
        .unwrap_or(layout.placeholder_label.as_str());
    sanitize_label(label)
}

fn sanitize_label(label: &str) -> String {
    let replaced: String = label
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | '·' | ' ' => '_',
            other => other,
        })
        .collect();
    replaced.replace("——", "_")
}

fn chapter_contents(header: &Header, body: &str, word_count: usize, ordinal: u32) -> String {
    let rule = "═".repeat(RULE_WIDTH);
    let series = &header.series;
    let author = &header.author;
    format!(
        "{series}\n作者：{author}\n\n{rule}\n\n{body}\n\n{rule}\n字数统计：{word_count} 字\n文件编号：{ordinal:03}\n"
    )
}

fn write_new_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    let mut file = OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(path)
        .with_context(|| format!("create chapter file: {}", path.display()))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("write chapter file: {}", path.display()))?;
    Ok(())
}

pub fn write_chapters(
    text: &str,
    out_dir: &Path,
    header: &Header,
    layout: &ChapterLayout,
    words_per_file: usize,
) -> anyhow::Result<Vec<SplitChapter>> {
    let mut written = Vec::new();
    for (index, (body, word_count)) in chunk_paragraphs(text, words_per_file.max(1))
        .into_iter()
        .enumerate()
    {
        let ordinal = u32::try_from(index + 1).context("too many chapters")?;
        let label = chunk_label(&body, layout);
        let file_name = format!("{ordinal:03}_{label}.txt");
        write_new_file(
            &out_dir.join(&file_name),
            &chapter_contents(header, &body, word_count, ordinal),
        )?;
        tracing::debug!(ordinal, file = %file_name, word_count, "wrote chapter");
        written.push(SplitChapter {
            ordinal,
            file_name,
            label,
            word_count,
        });
    }
    Ok(written)
}

fn write_index(out_dir: &Path, header: &Header, chapters: &[SplitChapter]) -> anyhow::Result<()> {
    let rule = "═".repeat(RULE_WIDTH);
    let total: usize = chapters.iter().map(|chapter| chapter.word_count).sum();
    let average = total.checked_div(chapters.len()).unwrap_or(0);

    let mut out = format!("{}文件索引\n作者：{}\n\n{rule}\n\n", header.series, header.author);
    for chapter in chapters {
        out.push_str(&format!(
            "{:3}. {}\n     文件：{}\n     字数：{} 字\n\n",
            chapter.ordinal, chapter.label, chapter.file_name, chapter.word_count
        ));
    }
    out.push_str(&format!("{rule}\n总计：{} 个文件\n总字数：{total} 字\n平均每文件：{average} 字\n", chapters.len()));

    write_new_file(&out_dir.join(INDEX_FILE_NAME), &out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_AI_THRESHOLD;
    use crate::parser::ChapterParser;

    fn header() -> Header {
        Header {
            series: "《龙族Ⅰ火之晨曦》".to_owned(),
            author: "江南".to_owned(),
        }
    }

    #[test]
    fn counts_only_ideographs() {
        assert_eq!(count_words("路明非, hello 123！"), 3);
        assert_eq!(count_words(""), 0);
    }

    #[test]
    fn chunks_respect_word_limit() {
        let text = "一二三\n\n四五六\n══════\n七八九\n\n十";
        let chunks = chunk_paragraphs(text, 6);
        assert_eq!(
            chunks,
            vec![
                ("一二三\n\n四五六".to_owned(), 6),
                ("七八九\n\n十".to_owned(), 4),
            ]
        );
    }

    #[test]
    fn oversized_paragraph_gets_its_own_chunk() {
        let chunks = chunk_paragraphs("一二三四五\n六", 3);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].1, 5);
    }

    #[test]
    fn labels_come_from_leading_headings() {
        let layout = ChapterLayout::default();
        assert_eq!(chunk_label("楔子：白帝城\n正文", &layout), "楔子：白帝城");
        assert_eq!(chunk_label("第一幕 卡塞尔之门\n正文", &layout), "第一幕_卡塞尔之门");
        assert_eq!(chunk_label("正文\n1. 新生", &layout), "1._新生");
        assert_eq!(chunk_label("只是正文", &layout), "未知章节");
        assert_eq!(chunk_label("第二幕——龙", &layout), "第二幕_龙");
    }

    #[test]
    fn written_chapters_parse_back() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let text = "楔子：白帝城\n\n长江上起了大雾。\n\n第一幕 卡塞尔之门\n\n路明非收到了一封信。";
        let chapters = write_chapters(text, temp.path(), &header(), &ChapterLayout::default(), 17)?;
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].file_name, "001_楔子：白帝城.txt");
        assert_eq!(chapters[1].file_name, "002_第一幕_卡塞尔之门.txt");

        let parser = ChapterParser::new(ChapterLayout::default(), DEFAULT_AI_THRESHOLD)?;
        let raw = std::fs::read_to_string(temp.path().join(&chapters[0].file_name))?;
        let record = parser.parse(&raw, 1, &chapters[0].file_name);
        assert_eq!(record.title, "楔子：白帝城");
        assert_eq!(record.body, "长江上起了大雾。");
        assert_eq!(record.word_count, chapters[0].word_count as u32);
        assert!(!record.word_count_estimated);
        Ok(())
    }

    #[test]
    fn index_lists_every_chapter() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let chapters = write_chapters("一二\n\n三四", temp.path(), &header(), &ChapterLayout::default(), 2)?;
        write_index(temp.path(), &header(), &chapters)?;
        let index = std::fs::read_to_string(temp.path().join(INDEX_FILE_NAME))?;
        assert!(index.contains("001_未知章节.txt"));
        assert!(index.contains("002_未知章节.txt"));
        assert!(index.contains("总计：2 个文件"));
        assert!(index.contains("总字数：4 字"));
        Ok(())
    }
}
