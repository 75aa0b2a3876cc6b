use std::{
    io::{self, BufRead},
    sync::Arc,
};

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::unbounded;
use point_repo::HttpRepository;
use tracing::info;

use crate::{
    session::{
        SessionConfig,
        console::{ConsoleCommand, HELP, parse_command, render_event},
        controller::{Intent, SessionController, spawn_session_controller},
        state::Session,
    },
    telemetry,
};

/// Run `geomark session`: hydrate from the points service, then read commands
/// from stdin until `quit` or end of input.
pub fn run(config: SessionConfig) -> Result<()> {
    let _telemetry_guard = telemetry::enter_runtime(&config.telemetry);
    let session_span = tracing::info_span!(
        "session",
        user = %config.user,
        service = %config.service_url,
        timeout_ms = config.timeout.as_millis() as u64
    );
    let _session_span_guard = session_span.enter();

    let repository = HttpRepository::new(&config.service_url, config.timeout)
        .context("Failed to build points service client")?;
    let session = Session::hydrate(config.user.clone(), Arc::new(repository)).with_context(|| {
        format!(
            "Failed to load points for {} from {}",
            config.user, config.service_url
        )
    })?;
    info!("session ready for {}", config.user);

    let (intent_tx, intent_rx) = unbounded::<Intent>();
    let (event_tx, event_rx) = unbounded();
    let controller = SessionController::new(session, event_tx);
    let controller_handle = spawn_session_controller(controller, intent_rx)
        .context("Failed to spawn session controller thread")?;
    let renderer_handle = telemetry::spawn_thread("session-renderer", move || {
        for event in event_rx.iter() {
            println!("{}", render_event(&event));
        }
    })
    .context("Failed to spawn session renderer thread")?;

    println!("{HELP}");
    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read from stdin")?;
        match parse_command(&line) {
            Ok(None) => {}
            Ok(Some(ConsoleCommand::Help)) => println!("{HELP}"),
            Ok(Some(ConsoleCommand::Quit)) => break,
            Ok(Some(ConsoleCommand::Intent(intent))) => {
                if intent_tx.send(intent).is_err() {
                    break;
                }
            }
            Err(err) => eprintln!("error: {err:#}"),
        }
    }

    let _ = intent_tx.send(Intent::Shutdown);
    drop(intent_tx);
    controller_handle
        .join()
        .map_err(|_| anyhow!("session controller thread panicked"))?;
    renderer_handle
        .join()
        .map_err(|_| anyhow!("session renderer thread panicked"))?;
    Ok(())
}
