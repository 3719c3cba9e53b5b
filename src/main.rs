use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    chaptershelf::logging::init(chaptershelf::logging::CLI_FILTER).context("init logging")?;

    let cli = chaptershelf::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        chaptershelf::cli::Command::Probe(args) => {
            chaptershelf::probe::run(args).await.context("probe")?;
        }
        chaptershelf::cli::Command::Manifest(args) => {
            chaptershelf::manifest::run(args).await.context("manifest")?;
        }
        chaptershelf::cli::Command::List(args) => {
            chaptershelf::query::run_list(args).await.context("list")?;
        }
        chaptershelf::cli::Command::Show(args) => {
            chaptershelf::query::run_show(args).await.context("show")?;
        }
        chaptershelf::cli::Command::Split(args) => {
            chaptershelf::split::run(args).context("split")?;
        }
    }

    Ok(())
}
