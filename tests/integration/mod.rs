// Integration test utilities and common code
// WHY: centralized fixture and fake collaborators avoid duplication across tests
#![allow(dead_code)]

use futures::future::BoxFuture;
use futures::StreamExt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use txtconv::error::ConvertError;
use txtconv::fetch::SourceFetcher;
use txtconv::{
    ConversionEvent, ConversionProgress, ConversionResult, DictPair, DictionaryStore,
    EventStream, ScriptConverter,
};

use super::fixtures::{CHARACTER_TABLE, PHRASE_TABLE};

/// Test fixture helper for temporary directories with tables and dictionaries
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub root_path: PathBuf,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root_path = temp_dir.path().to_path_buf();
        Self {
            temp_dir,
            root_path,
        }
    }

    /// Write a file relative to the fixture root, creating parent directories
    pub fn create_file<P: AsRef<Path>>(&self, relative_path: P, content: &[u8]) -> PathBuf {
        let file_path = self.root_path.join(relative_path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        fs::write(&file_path, content).expect("Failed to write test file");
        file_path
    }

    /// Write the standard character and phrase tables, returning their paths
    pub fn create_tables(&self) -> Vec<PathBuf> {
        vec![
            self.create_file("tables/STCharacters.txt", CHARACTER_TABLE.as_bytes()),
            self.create_file("tables/STPhrases.txt", PHRASE_TABLE.as_bytes()),
        ]
    }

    /// Write `<root>/dicts/<user>.csv`
    pub fn create_dictionary(&self, user: &str, csv: &str) -> PathBuf {
        self.create_file(format!("dicts/{user}.csv"), csv.as_bytes())
    }

    pub fn dict_dir(&self) -> PathBuf {
        self.root_path.join("dicts")
    }
}

/// Converter built from the fixture tables without touching the filesystem
pub fn fixture_converter() -> ScriptConverter {
    let mut converter = ScriptConverter::new();
    converter
        .add_table(CHARACTER_TABLE)
        .expect("character table should parse");
    converter
        .add_table(PHRASE_TABLE)
        .expect("phrase table should parse");
    converter
}

/// Fetcher serving canned responses
pub enum FakeFetcher {
    Body(Vec<u8>),
    Status(u16),
    Unreachable,
}

impl SourceFetcher for FakeFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, ConvertError>> {
        Box::pin(async move {
            match self {
                FakeFetcher::Body(bytes) => Ok(bytes.clone()),
                FakeFetcher::Status(status) => Err(ConvertError::FetchStatus {
                    url: url.to_string(),
                    status: *status,
                }),
                FakeFetcher::Unreachable => Err(ConvertError::Fetch {
                    url: url.to_string(),
                    reason: "connection refused".to_string(),
                }),
            }
        })
    }
}

/// Store that counts loads and can be switched to failing
pub struct CountingStore {
    pub pairs: Vec<DictPair>,
    pub loads: Arc<AtomicUsize>,
    pub fail: bool,
}

impl CountingStore {
    pub fn new(pairs: Vec<DictPair>) -> (Self, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let store = Self {
            pairs,
            loads: loads.clone(),
            fail: false,
        };
        (store, loads)
    }

    pub fn failing() -> Self {
        Self {
            pairs: Vec::new(),
            loads: Arc::new(AtomicUsize::new(0)),
            fail: true,
        }
    }

    pub fn load_count(loads: &Arc<AtomicUsize>) -> usize {
        loads.load(Ordering::SeqCst)
    }
}

impl DictionaryStore for CountingStore {
    fn load<'a>(&'a self, _user_id: &'a str) -> BoxFuture<'a, anyhow::Result<Vec<DictPair>>> {
        Box::pin(async move {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("dictionary backend unavailable");
            }
            Ok(self.pairs.clone())
        })
    }
}

/// Drain a pipeline's events into progress updates and the terminal outcome
pub async fn drain(
    stream: EventStream,
) -> (Vec<ConversionProgress>, Result<ConversionResult, String>) {
    let events: Vec<ConversionEvent> = stream.collect().await;
    let mut progress = Vec::new();
    let mut outcome = None;
    for event in events {
        assert!(outcome.is_none(), "event received after terminal event");
        match event {
            ConversionEvent::Progress(p) => progress.push(p),
            ConversionEvent::Complete(result) => outcome = Some(Ok(result)),
            ConversionEvent::Error { message } => outcome = Some(Err(message)),
        }
    }
    (progress, outcome.expect("pipeline should emit a terminal event"))
}
