//! HelpIN tutor gateway entry point.
//!
//! Binary name: `helpin`
//!
//! Parses CLI arguments, sets up tracing, then either runs a one-shot
//! command or wires the gateway and serves the REST API.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "info,helpin=debug,tower_http=debug",
        _ => "trace",
    };

    if let Err(e) = helpin_observe::tracing_setup::init_tracing(filter, cli.otel) {
        eprintln!("failed to initialise tracing: {e}");
    }

    // Shell completions don't need config or state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "helpin", &mut std::io::stdout());
        return Ok(());
    }

    let result = match cli.command {
        Commands::Serve { host, port } => serve(&host, port).await,
        Commands::Quota { json } => cli::quota::quota(json).await,
        Commands::Token { user_id, ttl_hours } => cli::token::issue_token(&user_id, ttl_hours),
        Commands::Completions { .. } => unreachable!("handled above"),
    };

    helpin_observe::tracing_setup::shutdown_tracing();
    result
}

async fn serve(host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::init().await?;
    tracing::info!(data_dir = %state.data_dir.display(), "gateway state initialised");
    let sweeper = state.spawn_sweeper();

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!(
        "  {} HelpIN gateway listening on {}",
        console::style("⚡").bold(),
        console::style(format!("http://{addr}")).cyan()
    );
    println!("  {}", console::style("Press Ctrl+C to stop").dim());

    let shutdown = state.shutdown.clone();
    let router = http::router::build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        })
        .await?;

    let _ = sweeper.await;
    println!("\n  Server stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
