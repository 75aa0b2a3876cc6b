//! Line-oriented stand-in for the map UI: parses commands into intents and
//! renders session events as text.

use std::fmt::Write as _;

use anyhow::{Context, Result, anyhow, bail};
use geo_core::{Coordinate, MetricsPanel};

use crate::session::{
    controller::{Intent, PendingChange, SessionEvent},
    state::Snapshot,
};

pub(crate) const HELP: &str = "\
Commands:
  add <lon> <lat>   ask to add a point (confirm with yes/no)
  delete <index>    ask to delete a point (confirm with yes/no)
  yes | no          confirm or cancel the pending change
  show              list points and metrics
  reload            re-sync with the points service
  help              this text
  quit              leave the session";

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ConsoleCommand {
    Intent(Intent),
    Help,
    Quit,
}

/// Parse one input line; blank lines yield `None`.
pub(crate) fn parse_command(line: &str) -> Result<Option<ConsoleCommand>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match verb.to_ascii_lowercase().as_str() {
        "add" | "a" => {
            let [lon, lat] = args.as_slice() else {
                bail!("usage: add <lon> <lat>");
            };
            let lon: f64 = lon
                .parse()
                .with_context(|| format!("longitude {lon:?} is not a number"))?;
            let lat: f64 = lat
                .parse()
                .with_context(|| format!("latitude {lat:?} is not a number"))?;
            let coordinate = Coordinate::new(lon, lat)?;
            ConsoleCommand::Intent(Intent::RequestAdd(coordinate))
        }
        "delete" | "del" | "rm" => {
            let [index] = args.as_slice() else {
                bail!("usage: delete <index>");
            };
            let index: usize = index
                .trim_start_matches('#')
                .parse()
                .map_err(|_| anyhow!("index {index:?} must be a non-negative integer"))?;
            ConsoleCommand::Intent(Intent::RequestDelete(index))
        }
        "yes" | "y" => ConsoleCommand::Intent(Intent::Confirm),
        "no" | "n" => ConsoleCommand::Intent(Intent::Cancel),
        "show" | "ls" => ConsoleCommand::Intent(Intent::Show),
        "reload" => ConsoleCommand::Intent(Intent::Rehydrate),
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        other => bail!("unknown command {other:?}; type `help`"),
    };
    Ok(Some(command))
}

/// Text shown for one session event.
pub(crate) fn render_event(event: &SessionEvent) -> String {
    match event {
        SessionEvent::Ready(snapshot) => {
            format!("Loaded {} points.\n{}", snapshot.points.len(), render_snapshot(snapshot))
        }
        SessionEvent::ConfirmationRequired(PendingChange::Add(coordinate)) => {
            format!("Add point at {coordinate}? [yes/no]")
        }
        SessionEvent::ConfirmationRequired(PendingChange::Delete { index, coordinate }) => {
            format!("Delete point #{index} ({coordinate})? [yes/no]")
        }
        SessionEvent::Applied { change, snapshot } => {
            let headline = match change {
                PendingChange::Add(coordinate) => format!(
                    "Added point #{} at {coordinate}.",
                    snapshot.points.len().saturating_sub(1)
                ),
                PendingChange::Delete { index, .. } => format!("Deleted point #{index}."),
            };
            format!("{headline}\n{}", render_snapshot(snapshot))
        }
        SessionEvent::Cancelled(_) => "Cancelled.".to_string(),
        SessionEvent::Current(snapshot) => render_snapshot(snapshot),
        SessionEvent::Rehydrated(snapshot) => format!(
            "Reloaded {} points.\n{}",
            snapshot.points.len(),
            render_snapshot(snapshot)
        ),
        SessionEvent::Rejected(message) => format!("error: {message}"),
        SessionEvent::Invalidated(message) => format!(
            "session invalidated: {message}\nType `reload` to re-sync with the points service."
        ),
    }
}

fn render_snapshot(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    for (idx, point) in snapshot.points.iter().enumerate() {
        let _ = writeln!(out, "  #{idx:<3} {point}");
    }
    let _ = write!(out, "{}", MetricsPanel::new(&snapshot.points, &snapshot.report));
    out
}
