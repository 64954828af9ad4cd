use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use device_sidecar::capture::{DeviceDriver, LogSource};
use device_sidecar::{
    AllureSink, AppiumDriver, DiagnosticsPipeline, Platform, ScriptedDriver, TestContext,
    TestError, TestOutcome, config,
};

/// Device Sidecar - diagnostics capture for mobile end-to-end UI tests
#[derive(Parser, Debug)]
#[command(
    name = "device-sidecar",
    about = "Screen recording, screenshots and server logs for failing mobile UI tests",
    after_help = "ENVIRONMENT VARIABLES:\n\
        SIDECAR_LOG_PATH              Appium server log file\n\
        SIDECAR_LOG_TAIL_LINES        Lines kept from the end of the log\n\
        SIDECAR_RECORDING_TIME_LIMIT  Recording cap in seconds\n\
        SIDECAR_REPORT_DIR            Allure results directory\n\
        SIDECAR_APPIUM_URL            Appium server base URL\n\
        RUST_LOG                      Log filter (default: info)"
)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the log excerpt that would be attached to a failing test
    Tail {
        /// Log file (default: SIDECAR_LOG_PATH or ./logs/appium.log)
        #[arg(short, long)]
        log: Option<PathBuf>,

        /// Number of trailing lines
        #[arg(short = 'n', long)]
        lines: Option<usize>,
    },

    /// Capture diagnostics from a live Appium session as a failed test
    Capture {
        /// Appium session id
        #[arg(short, long)]
        session_id: String,

        /// Platform of the device: android or ios
        #[arg(short, long)]
        platform: String,

        /// Appium server URL
        #[arg(long, env = "SIDECAR_APPIUM_URL", default_value = "http://127.0.0.1:4723")]
        appium_url: String,

        /// Allure results directory (default: SIDECAR_REPORT_DIR or ./allure-results)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Test name used in the report
        #[arg(long, default_value = "manual capture")]
        name: String,

        /// Record the screen for this many seconds before capturing
        #[arg(long)]
        record: Option<u64>,

        /// Failure message recorded in the report
        #[arg(long, default_value = "captured manually")]
        message: String,
    },

    /// Run one scripted failing test without a device and write its report
    Demo {
        /// Platform to simulate: android or ios
        #[arg(short, long, default_value = "android")]
        platform: String,

        /// Allure results directory (default: SIDECAR_REPORT_DIR or ./allure-results)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the effective configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Tail { log, lines } => {
            let settings = &config::get().capture;
            let source = LogSource::new(
                log.unwrap_or_else(|| settings.log_path.clone()),
                lines.unwrap_or(settings.log_tail_lines),
            );
            match source.read_tail().await? {
                Some(excerpt) => println!("{}", excerpt),
                None => eprintln!("No log file at {}", source.path().display()),
            }
        }

        Commands::Capture {
            session_id,
            platform,
            appium_url,
            output,
            name,
            record,
            message,
        } => {
            let platform = parse_platform(&platform)?;
            let driver = Arc::new(AppiumDriver::new(appium_url, session_id, Some(platform))?);
            let output = output.unwrap_or_else(config::report_dir);

            let recording = record.map(Duration::from_secs);
            let path = capture_failed_test(driver, &name, &message, recording, output).await?;
            println!("Wrote {}", path.display());
        }

        Commands::Demo { platform, output } => {
            let platform = parse_platform(&platform)?;
            let driver = Arc::new(ScriptedDriver::new(Some(platform)));
            let output = output.unwrap_or_else(config::report_dir);

            let path = capture_failed_test(
                driver,
                "scripted failure",
                "demo assertion failed",
                Some(Duration::ZERO),
                output,
            )
            .await?;
            println!("Wrote {}", path.display());
        }

        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(config::get())?);
        }
    }

    Ok(())
}

fn parse_platform(name: &str) -> Result<Platform, Box<dyn Error>> {
    Platform::from_name(name)
        .ok_or_else(|| format!("unsupported platform '{}': expected android or ios", name).into())
}

/// Drive the hooks around a synthetic failing test and write its Allure result
async fn capture_failed_test(
    driver: Arc<dyn DeviceDriver>,
    name: &str,
    message: &str,
    recording: Option<Duration>,
    output: PathBuf,
) -> Result<PathBuf, Box<dyn Error>> {
    let sink = Arc::new(AllureSink::new(output)?);
    let mut pipeline = DiagnosticsPipeline::new(driver.clone(), sink.clone(), config::capture_config());
    let ctx = TestContext::for_driver(name, driver.as_ref());

    sink.begin_test();
    if let Some(duration) = recording {
        pipeline.on_test_start(&ctx).await;
        info!(secs = duration.as_secs(), "recording");
        tokio::time::sleep(duration).await;
    }

    let outcome = TestOutcome::failed(TestError::new(message), recording.unwrap_or_default());
    let summary = pipeline.on_test_end(&ctx, &outcome).await;
    info!(attached = ?summary.attached, failures = ?summary.failures, "capture finished");

    Ok(sink.finish_test(&ctx, &outcome)?)
}
