//! `modvfs`: browse remote music-module archives as a virtual filesystem.
//!
//! ```text
//! modvfs ls                                   # categories
//! modvfs ls modland:/Authors/B --limit 20     # first 20 authors starting with B
//! modvfs resolve 'modland:/Authors/B/Beispiel/track1.mod?id=42'
//! modvfs get 'modland:/Authors/B/Beispiel/track1.mod?id=42' -o track1.mod
//! modvfs stats
//! ```

mod app;
mod error;
mod format;

use crate::app::App;
use crate::error::{ErrorKind, Result};
use crate::format::format_bytes;
use clap::{Parser, Subcommand};
use exn::{OptionExt, ResultExt};
use modvfs_catalog::{ListEvent, visit};
use modvfs_config::Config;
use modvfs_vfs::{Node, Vfs};
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "modvfs", version, about = "Browse remote music-module archives as a virtual filesystem")]
struct Cli {
    /// Configuration file (TOML, YAML or JSON) instead of the platform default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a directory (the root by default)
    Ls {
        uri: Option<String>,
        /// Stop after this many entries
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show a node and its ancestry
    Resolve { uri: String },
    /// Fetch file content
    Get {
        uri: String,
        /// Write to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Show persistent index statistics
    Stats,
}

fn init_tracing(verbose: bool) {
    let filter = match verbose {
        true => EnvFilter::new("debug"),
        false => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let app = App::assemble(&config).await?;
    let result = match cli.command {
        Command::Ls { uri, limit } => ls(&app.vfs, uri, limit).await,
        Command::Resolve { uri } => resolve(&app.vfs, &uri).await,
        Command::Get { uri, output } => get(&app.vfs, &uri, output).await,
        Command::Stats => stats(&app).await,
    };
    app.close().await;
    result
}

async fn lookup(vfs: &Vfs, uri: &str) -> Result<Node> {
    vfs.resolve(uri).await.or_raise(|| ErrorKind::Vfs)?.ok_or_raise(|| ErrorKind::NotFound(uri.to_string()))
}

fn describe(vfs: &Vfs, node: &Node) -> Result<String> {
    let size = node.size().map(format_bytes).unwrap_or_else(|| "-".to_string());
    let identifier = vfs.identifier(node).or_raise(|| ErrorKind::Vfs)?;
    let mut line = format!("{size:>12}  {identifier}");
    if let Some(description) = node.description() {
        line.push_str(&format!("  ({description})"));
    }
    Ok(line)
}

async fn ls(vfs: &Vfs, uri: Option<String>, limit: Option<usize>) -> Result<()> {
    let uri = uri.unwrap_or_else(|| format!("{}:/", vfs.scheme()));
    let node = lookup(vfs, &uri).await?;
    let listing = vfs.enumerate(&node).ok_or_raise(|| ErrorKind::NotADirectory(uri.clone()))?;
    let limit = limit.unwrap_or(usize::MAX);
    let mut shown = 0;
    let complete = visit(listing, |event| {
        match event {
            ListEvent::CountHint(count) => println!("{count} entries"),
            ListEvent::Item(child) => {
                match describe(vfs, &child) {
                    Ok(line) => println!("{line}"),
                    Err(err) => tracing::warn!(name = %child.name(), error = ?err, "Skipping unaddressable entry"),
                }
                shown += 1;
            },
        }
        if shown >= limit { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
    })
    .await
    .or_raise(|| ErrorKind::Vfs)?;
    if !complete {
        tracing::debug!(shown, "Listing stopped early");
    }
    Ok(())
}

async fn resolve(vfs: &Vfs, uri: &str) -> Result<()> {
    let node = lookup(vfs, uri).await?;
    println!("{}", describe(vfs, &node)?);
    let mut current = node;
    let mut depth = 1;
    while let Some(parent) = vfs.parent(&current).await.or_raise(|| ErrorKind::Vfs)? {
        println!("{}{}", "  ".repeat(depth), describe(vfs, &parent)?);
        current = parent;
        depth += 1;
    }
    Ok(())
}

async fn get(vfs: &Vfs, uri: &str, output: Option<PathBuf>) -> Result<()> {
    let node = lookup(vfs, uri).await?;
    let content = vfs.content(&node).await.or_raise(|| ErrorKind::Vfs)?;
    match output {
        Some(path) => {
            tokio::fs::write(&path, &*content).await.or_raise(|| ErrorKind::Output)?;
            tracing::info!(path = %path.display(), bytes = content.len(), "Saved");
        },
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&content).await.or_raise(|| ErrorKind::Output)?;
            stdout.flush().await.or_raise(|| ErrorKind::Output)?;
        },
    }
    Ok(())
}

async fn stats(app: &App) -> Result<()> {
    let statistics = app.repository().statistics().await.or_raise(|| ErrorKind::Index)?;
    for table in &statistics.tables {
        println!("{:<16} {:>10} rows", table.name, table.rows);
    }
    println!("{:<16} {:>10}", "size", format_bytes(statistics.size));
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
    fn test_parse_ls_with_limit() {
        let cli = Cli::try_parse_from(["modvfs", "-v", "ls", "modland:/Authors/B", "--limit", "3"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Ls { uri: Some(_), limit: Some(3) }));
    }

    #[test]
    fn test_parse_get_output() {
        let cli = Cli::try_parse_from(["modvfs", "get", "modland:/x", "-o", "out.mod", "--config", "c.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
        match cli.command {
            Command::Get { output, .. } => assert_eq!(output, Some(PathBuf::from("out.mod"))),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
