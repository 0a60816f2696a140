use anyhow::Context;
use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

use ftp_batch::{BatchOptions, DirectoryStore, LocalFs, Session};

#[derive(Parser, Debug)]
#[command(
    name = "ftp-batch",
    version,
    about = "Run a batch of ls/get/put/append/rename/delete/cd/mkdir/rmdir/pwd commands"
)]
struct Cli {
    /// Directory served as the remote store
    #[arg(long, default_value = ".")]
    remote_root: PathBuf,

    /// Directory relative local paths resolve against
    #[arg(long, default_value = ".")]
    local_root: PathBuf,

    /// Abort with the first error instead of reporting it in the outcome
    #[arg(long)]
    propagate: bool,

    /// Read commands from a file, one per line, after the positional ones
    #[arg(long)]
    script: Option<PathBuf>,

    /// More logging, repeat for trace output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Command lines, e.g. `"put ./a.txt dir/"`
    lines: Vec<String>,
}

fn level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::builder()
        .filter_level(level(cli.verbose))
        .parse_default_env()
        .init();

    let mut lines = cli.lines;
    if let Some(script) = &cli.script {
        let text = tokio::fs::read_to_string(script)
            .await
            .with_context(|| format!("reading {}", script.display()))?;
        lines.extend(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(ToOwned::to_owned),
        );
    }

    let options = BatchOptions::new().propagate_errors(cli.propagate);
    let mut session = Session::new(
        DirectoryStore::new(cli.remote_root),
        LocalFs::new(cli.local_root),
    );

    let outcome = ftp_batch::run(&mut session, &lines, &options).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if !outcome.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
