use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::stream::{self, StreamExt};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use txtconv::fetch::HttpFetcher;
use txtconv::{
    dictionary, table, CharsetDetector, Config, ConversionEvent, ConversionPipeline,
    ConversionRequest, DictionaryCache, DirectoryStore, LicenseTier, ScriptConverter,
    UserContext,
};

#[derive(Parser, Debug)]
#[command(name = "txtconv")]
#[command(about = "Convert Simplified Chinese text files to Traditional Chinese, whatever their encoding")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert files, directories of *.txt files, or a remote URL
    Convert(ConvertArgs),
    /// Print the detected encoding of a file
    Detect {
        file: PathBuf,
    },
    /// Validate a custom dictionary CSV and list every problem
    CheckDict {
        file: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct ConvertArgs {
    /// Files or directories to convert
    inputs: Vec<PathBuf>,

    /// Fetch the source from a URL instead of local files
    #[arg(long, conflicts_with = "inputs")]
    url: Option<String>,

    /// Directory receiving converted files
    #[arg(long, default_value = "converted")]
    out_dir: PathBuf,

    /// Extra OpenCC-style conversion tables, applied after configured ones
    #[arg(long)]
    table: Vec<PathBuf>,

    /// Directory of per-user dictionaries named <user>.csv
    #[arg(long)]
    dict_dir: Option<PathBuf>,

    /// User whose custom dictionary applies
    #[arg(long, default_value = "local")]
    user: String,

    #[arg(long, value_enum, default_value_t = TierArg::Free)]
    tier: TierArg,

    /// Abort remote fetches after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Print every pipeline event as a JSON line instead of progress bars
    #[arg(long)]
    json: bool,

    /// Suppress console progress bars
    #[arg(long)]
    no_progress: bool,

    /// Files converted concurrently
    #[arg(long, default_value_t = num_cpus::get())]
    jobs: usize,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TierArg {
    Free,
    Pro,
}

impl From<TierArg> for LicenseTier {
    fn from(tier: TierArg) -> Self {
        match tier {
            TierArg::Free => LicenseTier::Free,
            TierArg::Pro => LicenseTier::Pro,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // WHY: stdout carries results and JSON events, so logs go to stderr
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let args = Args::parse();
    info!(?args, "Parsed CLI arguments");

    let config = match &args.config {
        Some(path) => Config::load(path).await?,
        None => Config::default(),
    };

    match args.command {
        Command::Convert(convert) => run_convert(config, convert).await,
        Command::Detect { file } => run_detect(&config, &file).await,
        Command::CheckDict { file } => run_check_dict(&config, &file).await,
    }
}

async fn run_detect(config: &Config, file: &Path) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let detected = CharsetDetector::new(&config.detector).detect(&bytes);
    println!(
        "{}\t{}\t{} chars",
        file.display(),
        detected.encoding,
        detected.content.chars().count()
    );
    Ok(())
}

async fn run_check_dict(config: &Config, file: &Path) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    // dictionaries are often saved from legacy editors, decode them like any upload
    let csv = CharsetDetector::new(&config.detector).detect(&bytes).content;

    let errors = dictionary::validate(&csv);
    if errors.is_empty() {
        println!("{}: {} pairs, no problems", file.display(), dictionary::parse(&csv).len());
        return Ok(());
    }
    for error in &errors {
        println!("{}:{}", file.display(), error);
    }
    bail!("{} problem(s) found in {}", errors.len(), file.display());
}

async fn run_convert(mut config: Config, args: ConvertArgs) -> Result<()> {
    if args.timeout_secs.is_some() {
        config.fetch.timeout_secs = args.timeout_secs;
    }
    config.tables.extend(args.table.iter().cloned());
    config.validate()?;

    let base = if config.tables.is_empty() {
        warn!("No conversion tables configured; text passes through unchanged");
        table::identity()
    } else {
        ScriptConverter::load(&config.tables).await?.into_base_convert()
    };

    let mut pipeline = ConversionPipeline::new(base, &config)
        .with_fetcher(Arc::new(HttpFetcher::new(&config.fetch)?));
    let user = match &args.dict_dir {
        Some(dir) => {
            let cache = DictionaryCache::new(DirectoryStore::new(dir), config.dictionary.clone());
            pipeline = pipeline.with_dictionaries(Arc::new(cache));
            Some(UserContext {
                id: args.user.clone(),
                tier: args.tier.into(),
            })
        }
        None => None,
    };

    let jobs = collect_jobs(&args)?;
    if jobs.is_empty() {
        bail!("Nothing to convert: pass input files, directories or --url");
    }
    tokio::fs::create_dir_all(&args.out_dir)
        .await
        .with_context(|| format!("failed to create {}", args.out_dir.display()))?;

    let multi = MultiProgress::new();
    if args.no_progress || args.json {
        multi.set_draw_target(ProgressDrawTarget::hidden());
    }
    let style = ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos:>3}% {msg}")?
        .progress_chars("=>-");

    info!("Converting {} input(s) with up to {} concurrent jobs", jobs.len(), args.jobs);
    let outcomes: Vec<Result<PathBuf>> = stream::iter(jobs)
        .map(|job| {
            let bar = multi.add(ProgressBar::new(100));
            bar.set_style(style.clone());
            bar.set_prefix(job.label());
            let pipeline = pipeline.clone();
            let user = user.clone();
            let out_dir = args.out_dir.clone();
            let json = args.json;
            async move { convert_one(pipeline, job, user, &out_dir, bar, json).await }
        })
        .buffer_unordered(args.jobs.max(1))
        .collect()
        .await;

    let mut failed = 0;
    for outcome in &outcomes {
        match outcome {
            Ok(path) => println!("wrote {}", path.display()),
            Err(e) => {
                failed += 1;
                eprintln!("error: {e:#}");
            }
        }
    }
    info!(converted = outcomes.len() - failed, failed, "Conversion run finished");

    if failed > 0 {
        bail!("{failed} of {} conversion(s) failed", outcomes.len());
    }
    Ok(())
}

/// One unit of CLI work
enum Job {
    File(PathBuf),
    Url(String),
}

impl Job {
    fn label(&self) -> String {
        match self {
            Job::File(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Job::Url(url) => url.clone(),
        }
    }

    async fn into_request(self) -> Result<ConversionRequest> {
        match self {
            Job::File(path) => {
                let bytes = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Ok(ConversionRequest::upload(bytes, name))
            }
            Job::Url(url) => Ok(ConversionRequest::remote(url)),
        }
    }
}

/// Expand inputs: directories contribute their *.txt files, recursively
fn collect_jobs(args: &ConvertArgs) -> Result<Vec<Job>> {
    if let Some(url) = &args.url {
        return Ok(vec![Job::Url(url.clone())]);
    }

    let mut jobs = Vec::new();
    for input in &args.inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = walkdir::WalkDir::new(input)
                .follow_links(false)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|path| {
                    path.extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
                })
                .collect();
            found.sort();
            info!("Found {} text files under {}", found.len(), input.display());
            jobs.extend(found.into_iter().map(Job::File));
        } else if input.is_file() {
            jobs.push(Job::File(input.clone()));
        } else {
            bail!("Input does not exist: {}", input.display());
        }
    }
    Ok(jobs)
}

async fn convert_one(
    pipeline: ConversionPipeline,
    job: Job,
    user: Option<UserContext>,
    out_dir: &Path,
    bar: ProgressBar,
    json: bool,
) -> Result<PathBuf> {
    let label = job.label();
    let mut request = job.into_request().await?;
    request.user = user;

    let mut events = pipeline.start(request);
    while let Some(event) = events.next().await {
        if json {
            println!("{}", serde_json::to_string(&event)?);
        }
        match event {
            ConversionEvent::Progress(progress) => {
                bar.set_position((progress.percent * 100.0).round() as u64);
                bar.set_message(progress.stage.to_string());
            }
            ConversionEvent::Complete(result) => {
                let path = unique_output_path(out_dir, &result.file_name).await;
                tokio::fs::write(&path, result.content.as_bytes())
                    .await
                    .with_context(|| format!("failed to write {}", path.display()))?;
                bar.finish_with_message(format!("{} -> {}", result.encoding, path.display()));
                return Ok(path);
            }
            ConversionEvent::Error { message } => {
                bar.abandon_with_message(message.clone());
                bail!("{label}: {message}");
            }
        }
    }
    bail!("{label}: pipeline ended without a result")
}

/// `name`, or `stem (n).ext` when the name is already taken
async fn unique_output_path(out_dir: &Path, name: &str) -> PathBuf {
    let candidate = out_dir.join(name);
    if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        return candidate;
    }
    let (stem, extension) = txtconv::filename::split_extension(name);
    let mut n = 1;
    loop {
        let candidate = out_dir.join(format!("{stem} ({n}){extension}"));
        if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        n += 1;
    }
}
