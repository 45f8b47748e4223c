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
    let cli = shelfscan::cli::Cli::parse();
    shelfscan::logging::init(cli.verbose).context("init logging")?;
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        shelfscan::cli::Command::Scan(args) => {
            shelfscan::scan::run(args).await.context("scan")?;
        }
        shelfscan::cli::Command::Extract(args) => {
            shelfscan::extract::run(args).await.context("extract")?;
        }
        shelfscan::cli::Command::Toc(args) => {
            shelfscan::toc::run(args).await.context("toc")?;
        }
        shelfscan::cli::Command::Archive(args) => {
            shelfscan::export::run_archive(args).context("archive")?;
        }
    }

    Ok(())
}
