//! Third Party Timer monitor, entry point.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use thirdparty_timer::{
    publish_document, MeasureKey, MetricName, MetricSink, NeverStop, ReportDocument,
};
use thirdparty_timer_monitor::{
    JsonLinesSink, Monitor, MonitorConfig, Shutdown, SubscribedSink, TracingSink,
};

#[derive(Parser)]
#[command(
    name = "thirdparty-timer-monitor",
    about = "Per-host response times and call counts for third-party content",
    version
)]
struct Cli {
    /// Path to the JSON config file.
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Where samples go: JSON lines on stdout, or the log.
    #[arg(long, value_enum, default_value_t = SinkKind::Json)]
    sink: SinkKind,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the report once and publish its samples (default).
    Run,

    /// Run a pass every configured interval until Ctrl-C.
    Watch,

    /// Aggregate a saved report file without contacting the server.
    Parse {
        /// Report file (TransactionFlow XML export).
        file: PathBuf,

        /// Response-time statistic to read.
        #[arg(long, default_value = "avg")]
        aggregation: String,

        /// Metric to publish ("Response Time" or "Count"); repeatable.
        /// Defaults to both.
        #[arg(long = "metric", value_parser = parse_metric)]
        metrics: Vec<MetricName>,
    },

    /// Print the report URL the config resolves to.
    Url,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   thirdparty-timer-monitor completions bash > ~/.local/share/bash-completion/completions/thirdparty-timer-monitor
    ///   thirdparty-timer-monitor completions zsh > ~/.zfunc/_thirdparty-timer-monitor
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SinkKind {
    /// One JSON object per sample on stdout.
    Json,
    /// Samples logged through tracing on stderr.
    Tracing,
}

impl SinkKind {
    fn build(self) -> Box<dyn MetricSink + Send> {
        match self {
            SinkKind::Json => Box::new(JsonLinesSink::stdout()),
            SinkKind::Tracing => Box::new(TracingSink),
        }
    }
}

fn parse_metric(name: &str) -> Result<MetricName, String> {
    MetricName::from_name(name).ok_or_else(|| {
        format!("unknown metric '{name}', expected \"Response Time\" or \"Count\"")
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let config = MonitorConfig::from_sources(cli.config.as_deref())?;
            let monitor = Monitor::new(config)?;
            let shutdown = shutdown_on_ctrl_c();
            let sink = Arc::new(Mutex::new(cli.sink.build()));
            let report = monitor.run_once(&sink, &shutdown).await?;
            if report.publish_failures > 0 {
                anyhow::bail!("{} samples could not be written", report.publish_failures);
            }
        }

        Commands::Watch => {
            let config = MonitorConfig::from_sources(cli.config.as_deref())?;
            let monitor = Monitor::new(config)?;
            let shutdown = shutdown_on_ctrl_c();
            let sink = Arc::new(Mutex::new(cli.sink.build()));
            monitor.watch(sink, shutdown).await?;
        }

        Commands::Parse {
            file,
            aggregation,
            metrics,
        } => {
            if aggregation.trim().is_empty() {
                anyhow::bail!("--aggregation must not be empty");
            }
            let doc = ReportDocument::from_file(&file)?;
            let measure = MeasureKey::from_aggregation(&aggregation);
            let metrics: BTreeSet<MetricName> = if metrics.is_empty() {
                MetricName::ALL.into_iter().collect()
            } else {
                metrics.into_iter().collect()
            };
            let mut sink = SubscribedSink::new(cli.sink.build(), metrics);
            let report = publish_document(&doc, &measure, &mut sink, &NeverStop)?;
            tracing::info!("{}", serde_json::to_string(&report)?);
        }

        Commands::Url => {
            let config = MonitorConfig::from_sources(cli.config.as_deref())?;
            println!("{}", config.report_url()?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(
                shell,
                &mut cmd,
                "thirdparty-timer-monitor",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Trigger shutdown on the first Ctrl-C.
fn shutdown_on_ctrl_c() -> Shutdown {
    let shutdown = Shutdown::new();
    let handle = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
            handle.trigger();
        }
    });
    shutdown
}
