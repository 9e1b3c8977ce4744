//! Monitoring commands: `aura run` and `aura once`.

use anyhow::Result;
use console::style;
use tokio_util::sync::CancellationToken;

use crate::state::AppState;

/// Poll until Ctrl+C or SIGTERM. The in-flight interaction finishes first.
pub async fn run(state: &AppState) -> Result<()> {
    let engine = state.engine().await?;
    let cancel = CancellationToken::new();

    let signal_token = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        signal_token.cancel();
    });

    println!(
        "  {} Aura is listening as {}",
        style("⚡").bold(),
        style(format!("@{}", engine.bot().handle)).cyan()
    );
    println!("  {}", style("Press Ctrl+C to stop").dim());

    engine.run(cancel).await;

    println!("\n  Stopped.");
    Ok(())
}

/// One poll cycle, then print what happened.
pub async fn once(state: &AppState, json: bool) -> Result<()> {
    let engine = state.engine().await?;
    let report = engine.poll_once(&CancellationToken::new()).await?;

    if json {
        let value = serde_json::json!({
            "fetched": report.fetched,
            "handled": report.handled,
            "ignored": report.ignored,
            "failed": report.failed,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    println!("  {}", style("── Poll cycle ──").dim());
    println!("  Fetched: {}", style(report.fetched).bold());
    println!("  Handled: {}", style(report.handled).green());
    println!("  Ignored: {}", style(report.ignored).dim());
    if report.failed > 0 {
        println!("  Failed:  {}", style(report.failed).red());
    }
    println!();
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
