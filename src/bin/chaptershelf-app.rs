use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use chaptershelf::cli::CorpusArgs;
use chaptershelf::library::Library;

const MANIFEST_CACHE_ENV: &str = "CHAPTERSHELF_MANIFEST_CACHE";

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct AppArgs {
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    #[command(flatten)]
    corpus: CorpusArgs,

    /// Persisted manifest, served when the source is down at startup
    /// (default: $CHAPTERSHELF_MANIFEST_CACHE).
    #[arg(long)]
    manifest_cache: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    chaptershelf::logging::init(chaptershelf::logging::APP_FILTER)?;

    let args = AppArgs::parse();
    tracing::info!(?args, "starting chaptershelf-app");

    let cache_path = args.manifest_cache.clone().or_else(|| {
        std::env::var(MANIFEST_CACHE_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    });

    let config = args.corpus.to_config()?;
    let source = chaptershelf::source::open(&args.corpus.source, &config.layout)?;
    let library = Arc::new(Library::new(source, config, cache_path)?);
    let manifest = library.load().await;
    tracing::info!(
        total = manifest.total_chapters(),
        generated_at = %manifest.generated_at(),
        "initial manifest ready"
    );

    let app = chaptershelf::app::router(library);
    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {}: {err}", args.addr))?;
    tracing::info!(addr = %args.addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
