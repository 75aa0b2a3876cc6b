use std::{io, ops::ControlFlow, thread};

use crossbeam_channel::{Receiver, Sender};
use geo_core::{Coordinate, GeoError};
use tracing::{debug, warn};

use crate::{
    session::state::{Session, SessionError, Snapshot},
    telemetry,
};

/// User intent captured by the UI, applied serially by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    RequestAdd(Coordinate),
    RequestDelete(usize),
    Confirm,
    Cancel,
    Show,
    Rehydrate,
    Shutdown,
}

impl Intent {
    fn label(&self) -> &'static str {
        match self {
            Intent::RequestAdd(_) => "request_add",
            Intent::RequestDelete(_) => "request_delete",
            Intent::Confirm => "confirm",
            Intent::Cancel => "cancel",
            Intent::Show => "show",
            Intent::Rehydrate => "rehydrate",
            Intent::Shutdown => "shutdown",
        }
    }
}

/// A change waiting for explicit confirmation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PendingChange {
    Add(Coordinate),
    Delete { index: usize, coordinate: Coordinate },
}

impl PendingChange {
    fn kind(&self) -> &'static str {
        match self {
            PendingChange::Add(_) => "add",
            PendingChange::Delete { .. } => "remove",
        }
    }
}

/// Everything the renderer needs to redraw after an intent.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Ready(Snapshot),
    ConfirmationRequired(PendingChange),
    Applied {
        change: PendingChange,
        snapshot: Snapshot,
    },
    Cancelled(PendingChange),
    Current(Snapshot),
    Rehydrated(Snapshot),
    Rejected(String),
    Invalidated(String),
}

/// Single-threaded owner of a [`Session`].
///
/// At most one change is pending at a time. Because nothing else touches the
/// session, the index captured by a delete request is still valid when the
/// confirmation arrives.
pub struct SessionController {
    session: Session,
    pending: Option<PendingChange>,
    events: Sender<SessionEvent>,
}

impl SessionController {
    pub fn new(session: Session, events: Sender<SessionEvent>) -> Self {
        Self {
            session,
            pending: None,
            events,
        }
    }

    /// Process intents until `Shutdown` arrives or every sender is dropped.
    pub fn run(mut self, intents: Receiver<Intent>) {
        self.emit(SessionEvent::Ready(self.session.snapshot()));
        for intent in intents.iter() {
            if self.handle(intent).is_break() {
                break;
            }
        }
        debug!("session controller for {} stopped", self.session.user());
    }

    pub fn handle(&mut self, intent: Intent) -> ControlFlow<()> {
        let span = tracing::info_span!(
            "session.intent",
            user = %self.session.user(),
            intent = intent.label()
        );
        let _span_guard = span.enter();

        match intent {
            Intent::RequestAdd(coordinate) => self.request_add(coordinate),
            Intent::RequestDelete(index) => self.request_delete(index),
            Intent::Confirm => self.confirm(),
            Intent::Cancel => match self.pending.take() {
                Some(change) => self.emit(SessionEvent::Cancelled(change)),
                None => self.reject("nothing to cancel".into()),
            },
            Intent::Show => self.emit(SessionEvent::Current(self.session.snapshot())),
            Intent::Rehydrate => {
                self.pending = None;
                match self.session.rehydrate() {
                    Ok(snapshot) => self.emit(SessionEvent::Rehydrated(snapshot)),
                    Err(err) => self.fail(err),
                }
            }
            Intent::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn request_add(&mut self, coordinate: Coordinate) {
        if !self.session.is_valid() {
            return self.fail(SessionError::Invalidated);
        }
        if let Err(err) = coordinate.validate() {
            return self.fail(err.into());
        }
        self.ask(PendingChange::Add(coordinate));
    }

    fn request_delete(&mut self, index: usize) {
        if !self.session.is_valid() {
            return self.fail(SessionError::Invalidated);
        }
        let len = self.session.points().len();
        match self.session.points().get(index).copied() {
            Some(coordinate) => self.ask(PendingChange::Delete { index, coordinate }),
            None => self.fail(GeoError::IndexOutOfRange { index, len }.into()),
        }
    }

    fn ask(&mut self, change: PendingChange) {
        if let Some(previous) = self.pending.replace(change) {
            debug!("replacing unconfirmed {} request", previous.kind());
        }
        self.emit(SessionEvent::ConfirmationRequired(change));
    }

    fn confirm(&mut self) {
        let Some(change) = self.pending.take() else {
            return self.reject("nothing to confirm".into());
        };
        let result = match change {
            PendingChange::Add(coordinate) => self.session.add(coordinate),
            PendingChange::Delete { index, .. } => self.session.remove_at(index),
        };
        match result {
            Ok(snapshot) => {
                metrics::counter!("geomark_mutations_total", "kind" => change.kind()).increment(1);
                self.emit(SessionEvent::Applied { change, snapshot });
            }
            Err(err) => self.fail(err),
        }
    }

    fn fail(&mut self, err: SessionError) {
        metrics::counter!("geomark_rejections_total", "kind" => err.kind()).increment(1);
        match err {
            SessionError::PersistenceUnavailable(_) => {
                self.pending = None;
                let message = error_chain(&err);
                warn!("{message}");
                self.emit(SessionEvent::Invalidated(message));
            }
            other => self.reject(other.to_string()),
        }
    }

    fn reject(&self, message: String) {
        debug!("intent rejected: {message}");
        self.emit(SessionEvent::Rejected(message));
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!("renderer gone; dropping session event");
        }
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Run `controller` on its own thread, consuming `intents` in order.
pub fn spawn_session_controller(
    controller: SessionController,
    intents: Receiver<Intent>,
) -> io::Result<thread::JoinHandle<()>> {
    telemetry::spawn_thread("session-controller", move || controller.run(intents))
}
