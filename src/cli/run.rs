//! `run` and `sweep` command handlers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info, warn};

use sidekick::channels::UpdateLoop;
use sidekick::config::Config;
use sidekick::schedule::SweepOutcome;

use super::common::{build_assistant, ensure_valid};

/// Run the assistant until a termination signal or a panic.
pub(crate) async fn cmd_run(config: Config) -> Result<()> {
    ensure_valid(&config)?;
    let assistant = build_assistant(&config).await?;

    let bot = assistant
        .transport
        .check()
        .await
        .with_context(|| "Telegram token check failed")?;
    info!(bot = %bot, owner = assistant.owner_id, "Connected to Telegram");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    install_panic_hook(shutdown_tx.clone());

    let engine = assistant.engine.clone();
    let engine_task = tokio::spawn(engine.clone().run(shutdown_rx.clone()));

    let mut update_loop = UpdateLoop::new(
        assistant.transport.clone(),
        assistant.orchestrator.clone(),
        assistant.owner_id,
    )
    .with_poll_timeout(config.telegram.poll_timeout_secs);
    if let Some(transcriber) = assistant.transcriber.clone() {
        update_loop = update_loop.with_transcriber(transcriber);
    }
    let update_loop = Arc::new(update_loop);
    let loop_task = {
        let update_loop = update_loop.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { update_loop.run(shutdown).await })
    };

    let mut panicked = shutdown_rx.clone();
    let reason = tokio::select! {
        signal = wait_for_signal() => signal,
        _ = panicked.wait_for(|stop| *stop) => "panic",
    };
    info!(reason, "Shutting down");

    engine.begin_shutdown();
    let _ = shutdown_tx.send(true);

    let grace = Duration::from_secs(config.schedule.shutdown_grace_secs);
    let stopped = tokio::time::timeout(grace, async {
        if let Err(e) = engine_task.await {
            error!(error = %e, "Schedule task ended abnormally");
        }
        if let Err(e) = loop_task.await {
            error!(error = %e, "Update loop ended abnormally");
        }
    })
    .await;
    if stopped.is_err() {
        warn!(
            grace_secs = grace.as_secs(),
            sweeping = engine.is_sweeping(),
            "Work still in flight after grace period, exiting anyway"
        );
    }

    info!("Sidekick stopped");
    Ok(())
}

/// Run one schedule sweep against persisted state and exit.
pub(crate) async fn cmd_sweep(config: Config) -> Result<()> {
    ensure_valid(&config)?;
    let assistant = build_assistant(&config).await?;

    match assistant.engine.sweep().await {
        SweepOutcome::Skipped => println!("Sweep skipped"),
        SweepOutcome::Completed { performed, failed } => {
            println!("Sweep finished: {} bucket(s) performed, {} failed", performed, failed);
            if failed > 0 {
                anyhow::bail!("{} schedule bucket(s) failed and were kept for retry", failed);
            }
        }
    }
    Ok(())
}

/// Turn any panic into a shutdown request; the default hook still prints it.
fn install_panic_hook(shutdown: watch::Sender<bool>) {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        error!(panic = %info, "Panic, requesting shutdown");
        let _ = shutdown.send(true);
        default_hook(info);
    }));
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut term, mut usr2) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::user_defined2()),
    ) {
        (Ok(term), Ok(usr2)) => (term, usr2),
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "Failed to install signal handlers, only Ctrl-C will stop");
            let _ = tokio::signal::ctrl_c().await;
            return "SIGINT";
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = term.recv() => "SIGTERM",
        _ = usr2.recv() => "SIGUSR2",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "Ctrl-C"
}
