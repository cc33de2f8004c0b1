//! Wantframe - build and inspect framed exchange messages
//!
//! Frames written by `build` are appended, so a file can hold a whole
//! sequence of messages for `inspect` to walk through.

use std::path::{Path, PathBuf};

use bytes::BytesMut;
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wantframe::config::{self, Config};
use wantframe::{write_message, Block, ContentId, Decoder, Message};

/// Priority given to wants that do not name one
const DEFAULT_PRIORITY: i64 = 1;

/// Wantframe - want-list and block exchange messages
#[derive(Parser)]
#[command(name = "wantframe")]
#[command(author = "Wantframe Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Build and inspect framed want-list/block messages", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the content identifier of a file
    Cid {
        /// File to hash
        file: PathBuf,
    },

    /// Build a message and append it as one frame
    Build {
        /// Mark the want-list as the sender's complete want-list
        #[arg(long)]
        full: bool,

        /// Content to request, as CID or CID:PRIORITY
        #[arg(short, long = "want", value_parser = parse_want)]
        wants: Vec<(ContentId, i64)>,

        /// Content to cancel
        #[arg(long = "cancel")]
        cancels: Vec<ContentId>,

        /// File whose contents are pushed as a block
        #[arg(short, long = "block")]
        blocks: Vec<PathBuf>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decode every frame in a file ("-" for stdin)
    Inspect {
        /// File holding one or more frames
        file: PathBuf,
    },

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Output path for generated config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_want(s: &str) -> Result<(ContentId, i64), String> {
    let (cid, priority) = match s.split_once(':') {
        Some((cid, priority)) => {
            let priority = priority
                .parse::<i64>()
                .map_err(|e| format!("invalid priority '{priority}': {e}"))?;
            (cid, priority)
        }
        None => (s, DEFAULT_PRIORITY),
    };
    let cid = cid.parse::<ContentId>().map_err(|e| e.to_string())?;
    Ok((cid, priority))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default().unwrap_or_default()
    };

    // Initialize logging; stdout is reserved for frames and reports
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Cid { file } => {
            let data = tokio::fs::read(&file).await?;
            println!("{}", ContentId::for_data(&data));
        }
        Commands::Build {
            full,
            wants,
            cancels,
            blocks,
            output,
        } => {
            let message = build_message(full, wants, cancels, &blocks).await?;
            emit_frame(&config, &message, output.as_deref()).await?;
        }
        Commands::Inspect { file } => {
            inspect(&config, &file).await?;
        }
        Commands::Config { generate, output } => {
            if generate {
                let sample = config::generate_sample_config()?;
                if let Some(path) = output {
                    std::fs::write(&path, &sample)?;
                    println!("Configuration written to: {}", path.display());
                } else {
                    println!("{}", sample);
                }
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

/// Assemble a message; cancels are applied after wants.
async fn build_message(
    full: bool,
    wants: Vec<(ContentId, i64)>,
    cancels: Vec<ContentId>,
    blocks: &[PathBuf],
) -> anyhow::Result<Message> {
    let mut message = Message::new(full);

    for (cid, priority) in wants {
        message.add_entry(cid, priority);
    }
    for cid in cancels {
        message.cancel(cid);
    }
    for path in blocks {
        let data = tokio::fs::read(path).await?;
        let block = Block::new(data);
        tracing::debug!(cid = %block.cid(), size = block.size(), path = %path.display(), "Adding block");
        message.add_block(block);
    }

    tracing::debug!(summary = ?message.summary(), "Built message");
    Ok(message)
}

async fn emit_frame(config: &Config, message: &Message, output: Option<&Path>) -> anyhow::Result<()> {
    let max = config.framing.max_frame_size;
    match output {
        Some(path) => {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            write_message(&mut file, message, max).await?;
            tracing::info!(path = %path.display(), "Frame appended");
        }
        None => {
            let mut stdout = tokio::io::stdout();
            write_message(&mut stdout, message, max).await?;
        }
    }
    Ok(())
}

async fn inspect(config: &Config, file: &Path) -> anyhow::Result<()> {
    let data = if file == Path::new("-") {
        let mut data = Vec::new();
        tokio::io::stdin().read_to_end(&mut data).await?;
        data
    } else {
        tokio::fs::read(file).await?
    };

    let mut buf = BytesMut::from(&data[..]);
    let mut decoder = Decoder::with_max_size(config.framing.max_frame_size);
    let mut count = 0usize;

    while let Some(message) = decoder.decode_eof(&mut buf)? {
        println!("# frame {}", count);
        println!("{}", serde_json::to_string_pretty(&message.summary())?);
        count += 1;
    }

    tracing::info!(frames = count, "Inspection complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["wantframe", "inspect", "frames.bin"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_parse_want() {
        let cid = ContentId::for_data(b"wanted");

        let (parsed, priority) = parse_want(&cid.to_string()).unwrap();
        assert_eq!(parsed, cid);
        assert_eq!(priority, DEFAULT_PRIORITY);

        let (_, priority) = parse_want(&format!("{cid}:-3")).unwrap();
        assert_eq!(priority, -3);

        assert!(parse_want("nope").is_err());
        assert!(parse_want(&format!("{cid}:high")).is_err());
    }

    #[test]
    fn test_build_args() {
        let cid = ContentId::for_data(b"x").to_string();
        let cli = Cli::try_parse_from([
            "wantframe", "build", "--full", "-w", cid.as_str(), "--cancel", cid.as_str(), "-b", "a.bin",
        ])
        .unwrap();

        match cli.command {
            Commands::Build {
                full,
                wants,
                cancels,
                blocks,
                output,
            } => {
                assert!(full);
                assert_eq!(wants.len(), 1);
                assert_eq!(cancels.len(), 1);
                assert_eq!(blocks, vec![PathBuf::from("a.bin")]);
                assert!(output.is_none());
            }
            _ => panic!("expected build"),
        }
    }

    #[tokio::test]
    async fn test_build_message_cancel_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("block.bin");
        std::fs::write(&path, b"block contents").unwrap();

        let cid = ContentId::for_data(b"x");
        let message = build_message(false, vec![(cid.clone(), 5)], vec![cid.clone()], &[path])
            .await
            .unwrap();

        let entry = message.entry(&cid).unwrap();
        assert!(entry.cancel);
        assert_eq!(entry.priority, 0);
        assert!(message
            .block(&ContentId::for_data(b"block contents"))
            .is_some());
    }

    #[tokio::test]
    async fn test_emit_then_inspect_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.bin");
        let config = Config::default();

        let mut message = Message::new(true);
        message.add_entry(ContentId::for_data(b"y"), 2);
        emit_frame(&config, &message, Some(&path)).await.unwrap();
        emit_frame(&config, &Message::new(false), Some(&path)).await.unwrap();

        let data = std::fs::read(&path).unwrap();
        let mut buf = BytesMut::from(&data[..]);
        let mut decoder = Decoder::new();
        assert_eq!(decoder.decode_eof(&mut buf).unwrap().unwrap(), message);
        assert!(decoder.decode_eof(&mut buf).unwrap().unwrap().is_empty());
        assert!(decoder.decode_eof(&mut buf).unwrap().is_none());

        inspect(&config, &path).await.unwrap();
    }
}
