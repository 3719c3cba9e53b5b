#![allow(dead_code)]

use std::fs;
use std::path::Path;

pub const SERIES: &str = "《龙族Ⅰ火之晨曦》";

/// A chapter file in the corpus layout: header, rule, title, body, rule, stats, file id.
pub fn chapter_text(ordinal: u32, title: &str, body: &str, words: u32) -> String {
    let rule = "═".repeat(50);
    format!(
        "{SERIES}\n作者：江南\n\n{rule}\n\n{title}\n\n{body}\n\n{rule}\n字数统计：{words} 字\n文件编号：{ordinal:03}\n"
    )
}

pub fn file_name(ordinal: u32) -> String {
    if ordinal == 1 {
        "001_楔子：白帝城.txt".to_owned()
    } else {
        format!("{ordinal:03}_未知章节.txt")
    }
}

pub fn sample_chapter(ordinal: u32) -> String {
    chapter_text(
        ordinal,
        &format!("第{ordinal}章 雨夜"),
        &format!("第{ordinal}段正文，路明非看着窗外。\n\n雨一直下。"),
        1000 + ordinal,
    )
}

/// Writes chapters `1..=n` under their canonical names.
pub fn write_corpus(dir: &Path, n: u32) {
    for ordinal in 1..=n {
        fs::write(dir.join(file_name(ordinal)), sample_chapter(ordinal)).expect("write chapter");
    }
}
