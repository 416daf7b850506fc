use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use slide_common::SlideConfig;
use slide_core::Deck;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "slide")]
#[command(about = "Edit PowerPoint decks by chatting with a language model")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Config file (TOML or JSON). Defaults to .slide/config.toml and friends.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override model (e.g., gpt-4o, gpt-4o-mini)
    #[arg(long)]
    pub model: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server (default)
    Serve {
        /// Address to listen on, e.g. 0.0.0.0:5000
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Print the per-slide text the model would see for a deck
    Summary {
        /// Path to a .pptx file
        file: PathBuf,
    },
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    let mut config = SlideConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(model) = cli.model {
        config.model = model;
    }
    init_logging(cli.debug, config.log_path.as_deref())?;
    tracing::debug!(model = %config.model, bind = %config.bind, "configuration resolved");

    match cli.command.unwrap_or(Commands::Serve { bind: None }) {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind = bind;
            }
            slide_server::serve(config).await?;
        }
        Commands::Summary { file } => {
            print_summary(&file).await?;
        }
    }

    Ok(())
}

async fn print_summary(file: &Path) -> Result<()> {
    let deck = Deck::open(file)
        .await
        .with_context(|| format!("failed to open {}", file.display()))?;
    println!("{}", serde_json::to_string_pretty(&deck.summaries())?);
    Ok(())
}

/// `RUST_LOG` decides the level unless `--debug` is given; the default is
/// `info`. Output goes to `log_path` when set, otherwise stderr.
fn init_logging(debug: bool, log_path: Option<&Path>) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let (stderr_layer, file_layer) = match log_path {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            (None, Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file))))
        }
        None => (Some(fmt::layer().with_target(false).with_writer(std::io::stderr)), None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install logger")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_serve_is_default() {
        let cli = Cli::try_parse_from(["slide", "--model", "gpt-4o"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.model.as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn test_parse_serve_and_summary() {
        let cli = Cli::try_parse_from(["slide", "--debug", "serve", "--bind", "0.0.0.0:8080"]).unwrap();
        assert!(cli.debug);
        match cli.command {
            Some(Commands::Serve { bind }) => assert_eq!(bind, Some("0.0.0.0:8080".parse().unwrap())),
            _ => panic!("expected serve"),
        }

        let cli = Cli::try_parse_from(["slide", "summary", "deck.pptx"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Summary { file }) if file == Path::new("deck.pptx")));
    }

    #[test]
    fn test_bad_bind_address_is_rejected() {
        assert!(Cli::try_parse_from(["slide", "serve", "--bind", "nowhere"]).is_err());
    }
}
