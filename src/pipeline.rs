// WHY: one request = one task = one ordered event channel. The worker sends
// progress; the supervising task sends exactly one terminal event after the
// worker finishes, so a failure or panic can never be followed by output.

use crate::charset::{CharsetDetector, DetectedEncoding};
use crate::config::{Config, FileNameConfig, ProgressConfig};
use crate::dictionary::DictPair;
use crate::error::{ConvertError, Result};
use crate::fetch::{file_name_from_url, SourceFetcher};
use crate::filename::{sanitize_file_name, split_extension};
use crate::progressive::{LineProgress, ProgressiveConverter};
use crate::store::{DictionaryCache, UserContext};
use crate::table::BaseConvert;
use futures::FutureExt;
use serde::Serialize;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

/// Name used for remote sources whose URL has no usable last segment
const REMOTE_FALLBACK_NAME: &str = "download.txt";

/// File-name cleaner applied to derived output names
pub type Sanitizer = dyn Fn(&str) -> String + Send + Sync;

/// Ordered per-pipeline event stream: progress events, then one terminal event
pub type EventStream = UnboundedReceiverStream<ConversionEvent>;

/// Coarse stage reported alongside progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    LoadingLibs,
    LoadingDict,
    Converting,
    Archiving,
    Complete,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LoadingLibs => "loading-libs",
            Self::LoadingDict => "loading-dict",
            Self::Converting => "converting",
            Self::Archiving => "archiving",
            Self::Complete => "complete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionProgress {
    pub stage: Stage,
    /// Overall completion, 0.0..=1.0, never decreasing within one run
    pub percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_lines: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub content: String,
    pub file_name: String,
    pub encoding: DetectedEncoding,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversionEvent {
    Progress(ConversionProgress),
    Complete(ConversionResult),
    Error { message: String },
}

impl ConversionEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

/// Lifecycle of a single pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    ReadingSource,
    DetectingEncoding,
    LoadingDictionary,
    Converting,
    Complete,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ReadingSource => "reading-source",
            Self::DetectingEncoding => "detecting-encoding",
            Self::LoadingDictionary => "loading-dictionary",
            Self::Converting => "converting",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Where the input bytes come from
#[derive(Debug, Clone)]
pub enum Source {
    Upload { bytes: Vec<u8>, file_name: String },
    Remote { url: String, file_name: Option<String> },
}

#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub source: Source,
    /// None converts without custom pairs
    pub user: Option<UserContext>,
}

impl ConversionRequest {
    pub fn upload(bytes: Vec<u8>, file_name: impl Into<String>) -> Self {
        Self {
            source: Source::Upload {
                bytes,
                file_name: file_name.into(),
            },
            user: None,
        }
    }

    pub fn remote(url: impl Into<String>) -> Self {
        Self {
            source: Source::Remote {
                url: url.into(),
                file_name: None,
            },
            user: None,
        }
    }

    pub fn for_user(mut self, user: UserContext) -> Self {
        self.user = Some(user);
        self
    }
}

/// State and progress bookkeeping for one run
struct PipelineRun {
    events: Option<UnboundedSender<ConversionEvent>>,
    state: PipelineState,
    last_percent: f64,
    started: Instant,
}

impl PipelineRun {
    fn new(events: Option<UnboundedSender<ConversionEvent>>) -> Self {
        Self {
            events,
            state: PipelineState::Idle,
            last_percent: 0.0,
            started: Instant::now(),
        }
    }

    fn enter(&mut self, next: PipelineState) {
        debug!(from = %self.state, to = %next, "Pipeline state transition");
        self.state = next;
    }

    fn report(&mut self, stage: Stage, percent: f64, lines: Option<LineProgress>) {
        let percent = percent.clamp(0.0, 1.0).max(self.last_percent);
        self.last_percent = percent;
        if let Some(events) = &self.events {
            // a dropped receiver means the caller stopped listening
            let _ = events.send(ConversionEvent::Progress(ConversionProgress {
                stage,
                percent,
                current_line: lines.map(|l| l.current_line),
                total_lines: lines.map(|l| l.total_lines),
            }));
        }
    }

    fn fail(&mut self, error: &ConvertError) {
        warn!(
            state = %self.state,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Conversion failed: {error}"
        );
        self.enter(PipelineState::Failed);
    }
}

/// Detection → dictionary → progressive conversion → file-name derivation
#[derive(Clone)]
pub struct ConversionPipeline {
    converter: ProgressiveConverter,
    detector: Arc<CharsetDetector>,
    fetcher: Option<Arc<dyn SourceFetcher>>,
    dictionaries: Option<Arc<DictionaryCache>>,
    sanitizer: Arc<Sanitizer>,
    progress: ProgressConfig,
}

impl ConversionPipeline {
    pub fn new(base: Arc<BaseConvert>, config: &Config) -> Self {
        let file_names: FileNameConfig = config.file_name.clone();
        Self {
            converter: ProgressiveConverter::new(base)
                .with_max_notifications(config.progress.max_notifications),
            detector: Arc::new(CharsetDetector::new(&config.detector)),
            fetcher: None,
            dictionaries: None,
            sanitizer: Arc::new(move |name: &str| sanitize_file_name(name, &file_names)),
            progress: config.progress.clone(),
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn SourceFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_dictionaries(mut self, dictionaries: Arc<DictionaryCache>) -> Self {
        self.dictionaries = Some(dictionaries);
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: Arc<Sanitizer>) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Spawn the pipeline and return its event stream.
    /// Dropping the stream abandons the run; its remaining events are discarded.
    pub fn start(&self, request: ConversionRequest) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let pipeline = self.clone();

        tokio::spawn(async move {
            let progress_tx = tx.clone();
            let worker = tokio::spawn(async move {
                let mut run = PipelineRun::new(Some(progress_tx));
                let outcome = pipeline.execute(request, &mut run).await;
                if let Err(error) = &outcome {
                    run.fail(error);
                }
                outcome
            });

            let terminal = match worker.await {
                Ok(Ok(result)) => ConversionEvent::Complete(result),
                Ok(Err(error)) => ConversionEvent::Error {
                    message: error.to_string(),
                },
                Err(join_error) => {
                    let reason = if join_error.is_panic() {
                        panic_message(join_error.into_panic())
                    } else {
                        "conversion task was cancelled".to_string()
                    };
                    warn!("Conversion task aborted: {reason}");
                    ConversionEvent::Error {
                        message: ConvertError::Conversion(reason).to_string(),
                    }
                }
            };
            let _ = tx.send(terminal);
        });

        UnboundedReceiverStream::new(rx)
    }

    /// Run to completion in the current task without emitting events.
    /// A panic inside the run is returned as [`ConvertError::Conversion`].
    pub async fn run(&self, request: ConversionRequest) -> Result<ConversionResult> {
        let mut run = PipelineRun::new(None);
        let outcome = AssertUnwindSafe(self.execute(request, &mut run))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(ConvertError::Conversion(panic_message(payload))));
        if let Err(error) = &outcome {
            run.fail(error);
        }
        outcome
    }

    async fn execute(
        &self,
        request: ConversionRequest,
        run: &mut PipelineRun,
    ) -> Result<ConversionResult> {
        let lead = self.progress.lead_fraction;
        let trail = self.progress.trail_fraction;

        run.enter(PipelineState::ReadingSource);
        run.report(Stage::LoadingLibs, 0.0, None);
        let (bytes, source_name) = self.read_source(request.source).await?;

        run.enter(PipelineState::DetectingEncoding);
        let detected = self.detector.detect(&bytes);
        drop(bytes);
        info!(
            encoding = %detected.encoding,
            chars = detected.content.chars().count(),
            "Detected encoding for {source_name}"
        );
        run.report(Stage::LoadingLibs, lead * 0.5, None);

        run.enter(PipelineState::LoadingDictionary);
        run.report(Stage::LoadingDict, lead * 0.5, None);
        let pairs = self.load_pairs(request.user.as_ref()).await;
        run.report(Stage::LoadingDict, lead, None);

        run.enter(PipelineState::Converting);
        let span = 1.0 - lead - trail;
        let content = self
            .converter
            .convert(&detected.content, &pairs, |lines| {
                run.report(Stage::Converting, lead + lines.percent * span, Some(lines));
            })
            .await;

        run.report(Stage::Archiving, 1.0 - trail, None);
        let file_name = self.derive_file_name(&source_name);

        run.enter(PipelineState::Complete);
        run.report(Stage::Complete, 1.0, None);
        info!(
            file_name = %file_name,
            elapsed_ms = run.started.elapsed().as_millis() as u64,
            "Conversion complete"
        );

        Ok(ConversionResult {
            content,
            file_name,
            encoding: detected.encoding,
        })
    }

    async fn read_source(&self, source: Source) -> Result<(Vec<u8>, String)> {
        match source {
            Source::Upload { bytes, file_name } => Ok((bytes, file_name)),
            Source::Remote { url, file_name } => {
                let fetcher = self.fetcher.as_ref().ok_or_else(|| {
                    ConvertError::Config("remote sources require a fetcher".to_string())
                })?;
                let bytes = fetcher.fetch(&url).await?;
                let name = file_name
                    .or_else(|| file_name_from_url(&url))
                    .unwrap_or_else(|| REMOTE_FALLBACK_NAME.to_string());
                Ok((bytes, name))
            }
        }
    }

    /// Custom pairs for `user`; any failure degrades to no pairs
    async fn load_pairs(&self, user: Option<&UserContext>) -> Vec<DictPair> {
        let (Some(cache), Some(user)) = (&self.dictionaries, user) else {
            return Vec::new();
        };
        match cache.get(user).await {
            Ok(pairs) => pairs,
            Err(e) => {
                warn!(user = %user.id, "Custom dictionary unavailable, continuing without it: {e:#}");
                Vec::new()
            }
        }
    }

    /// Convert the stem with the content converter, keep the extension, sanitize
    pub fn derive_file_name(&self, source_name: &str) -> String {
        let (stem, extension) = split_extension(source_name);
        let converted = (self.converter.base())(stem);
        (self.sanitizer)(&format!("{converted}{extension}"))
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "conversion task panicked".to_string()
    }
}
