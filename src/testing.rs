//! In-memory chapter sources for unit tests.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::ChapterLayout;
use crate::parser::tests::chapter_text;
use crate::source::{ChapterSource, Fetched};

#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Html,
    Missing,
    Broken,
}

#[derive(Debug, Default)]
pub struct MockSource {
    replies: Mutex<BTreeMap<u32, Reply>>,
    delay: Option<Duration>,
    fetches: AtomicUsize,
}

impl MockSource {
    /// Ordinals `1..=n` answer with well-formed chapters, everything else is missing.
    pub fn with_chapters(n: u32) -> Self {
        let source = Self::default();
        for ordinal in 1..=n {
            source.set(ordinal, Reply::Text(sample_chapter(ordinal)));
        }
        source
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set(&self, ordinal: u32, reply: Reply) {
        self.replies
            .lock()
            .expect("mock replies lock")
            .insert(ordinal, reply);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

pub fn sample_chapter(ordinal: u32) -> String {
    let title = format!("第{ordinal}章 雨夜");
    let body = format!("这是第{ordinal}段正文。\n\n雨一直下。");
    chapter_text(Some(&title), &body, Some(1000 + ordinal))
}

#[async_trait]
impl ChapterSource for MockSource {
    async fn fetch(&self, ordinal: u32) -> anyhow::Result<Fetched> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let reply = self
            .replies
            .lock()
            .expect("mock replies lock")
            .get(&ordinal)
            .cloned()
            .unwrap_or(Reply::Missing);
        match reply {
            Reply::Text(text) => Ok(Fetched::Found {
                source_id: ChapterLayout::default().file_name(ordinal),
                text,
            }),
            Reply::Html => Ok(Fetched::Found {
                source_id: ChapterLayout::default().file_name(ordinal),
                text: "<!DOCTYPE html>\n<html><body><div id=\"root\"></div></body></html>".to_owned(),
            }),
            Reply::Missing => Ok(Fetched::NotFound),
            Reply::Broken => anyhow::bail!("connection refused"),
        }
    }

    fn describe(&self) -> String {
        "mock".to_owned()
    }
}
