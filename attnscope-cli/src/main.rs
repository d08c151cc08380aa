//! attnscope CLI: serve the attention viewer or inspect heads from the terminal.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// attnscope: see what a transformer attends to
#[derive(Parser, Debug)]
#[command(name = "attnscope", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the web viewer
    Serve {
        /// Address to bind (overrides server.host)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Render one head as an SVG heatmap
    Render {
        /// Text to analyze
        #[arg(short, long)]
        text: String,
        /// Layer index (defaults to view.default_layer)
        #[arg(short, long)]
        layer: Option<usize>,
        /// Head index (defaults to view.default_head)
        #[arg(long)]
        head: Option<usize>,
        /// Output file; the SVG goes to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print each score inside its cell
        #[arg(long)]
        annotate: bool,
    },
    /// Show how the model tokenizes a text
    Tokens {
        #[arg(short, long)]
        text: String,
    },
    /// Rank every head by how focused its attention is
    Heads {
        #[arg(short, long)]
        text: String,
        /// Number of heads to list
        #[arg(long, default_value = "10")]
        top: usize,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print the example guide
    Guide,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create default configuration file
    Init,
    /// Show current configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "attnscope", "attnscope")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "attnscope.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.config.as_deref()).await
}
