use anyhow::{bail, Context, Result};
use apigw_provisioner::apigw::ApiGatewayClient;
use apigw_provisioner::config::Config;
use apigw_provisioner::dispatch::{Dispatcher, Outcome};
use apigw_provisioner::driver::Driver;
use apigw_provisioner::event::CloudFormationEvent;
use apigw_provisioner::resource::{ApiGatewayHandlers, HandlerSet, ResourceType};
use apigw_provisioner::response::{HttpReporter, Reporter, StdoutReporter};
use apigw_provisioner::retry::RetryPolicy;
use apigw_provisioner::tracker::{FileTracker, ResourceTracker};
use apigw_provisioner::VERSION;
use clap::{Parser, ValueEnum};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Provision API Gateway resources from CloudFormation custom-resource events
#[derive(Parser, Debug)]
#[command(name = "apigw-provisioner", version, about, long_about = None)]
struct Args {
    /// Event JSON file, or `-` for stdin
    #[arg(short, long, default_value = "-")]
    event: String,

    /// Print the completion to stdout instead of sending it to ResponseURL
    #[arg(long)]
    dry_report: bool,

    /// Tracker file
    #[arg(long)]
    tracker: Option<PathBuf>,

    /// API Gateway management endpoint
    #[arg(long)]
    endpoint: Option<String>,

    /// AWS region used for the default endpoint
    #[arg(long)]
    region: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// List supported resource types and exit
    #[arg(long)]
    list_types: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(
    level: LogLevel,
    log_file: Option<&Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing_level.as_str().to_lowercase()));

    let Some(log_path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .init();
        return Ok(None);
    };

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("apigw-provisioner {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn read_event(source: &str) -> Result<String> {
    if source == "-" {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("failed to read event from stdin")?;
        return Ok(input);
    }
    std::fs::read_to_string(source).with_context(|| format!("failed to read event {}", source))
}

async fn drive<H, T, R>(driver: Driver<H, T, R>, event: CloudFormationEvent) -> Result<()>
where
    H: HandlerSet,
    T: ResourceTracker,
    R: Reporter,
{
    let label = format!("{} {}", event.request_type, event.logical_resource_id);
    let outcome = driver
        .run_event(event)
        .await
        .context("failed to report completion")?;
    if let Outcome::Failure { error } = outcome {
        bail!("{} failed: {}", label, error);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_types {
        for resource_type in ResourceType::ALL {
            println!("{}", resource_type.cloudformation_type());
        }
        return Ok(());
    }

    let _log_guard = setup_logging(args.log_level, args.log_file.as_deref())?;
    let log_ref = args
        .log_file
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "stderr".to_string());

    let config = Config::load();
    let region = config.effective_region(args.region.as_deref());
    let endpoint = config.effective_endpoint(args.endpoint.as_deref(), &region);
    let tracker_path = config.effective_tracker_path(args.tracker.as_deref());
    tracing::debug!("Endpoint {}, tracker {:?}", endpoint, tracker_path);

    // Converted to a request by the driver, so a bad event is still reported
    let event: CloudFormationEvent =
        serde_json::from_str(&read_event(&args.event)?).context("invalid event JSON")?;

    let client = ApiGatewayClient::new(&endpoint, config.effective_api_token())
        .context("failed to create API Gateway client")?;
    let dispatcher = Dispatcher::new(
        ApiGatewayHandlers::new(client),
        FileTracker::new(tracker_path),
        RetryPolicy::new(config.safety_margin()),
    );

    if args.dry_report {
        let driver = Driver::new(dispatcher, StdoutReporter)
            .with_max_reschedules(config.max_reschedules())
            .with_log_ref(log_ref);
        drive(driver, event).await
    } else {
        let driver = Driver::new(dispatcher, HttpReporter::default())
            .with_max_reschedules(config.max_reschedules())
            .with_log_ref(log_ref);
        drive(driver, event).await
    }
}
