//! Async driver for a [`Workspace`].
//!
//! [`run`] owns the workspace on one task and interleaves three sources:
//! engine events from the caller, image decode completions from blocking
//! worker threads, and the autosave deadline. Everything that touches the
//! workspace happens on that task, so the engine stays single-threaded.

use std::time::Instant;

use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, info, warn};

use crate::entity::NoteId;
use crate::error::Result;
use crate::scene::{ingest, ImageItem, SceneSurface};
use crate::workspace::{Notice, Workspace};

/// A change applied to the scene surface, as an editing UI would make it.
pub type SceneEdit<S> = Box<dyn FnOnce(&mut S) + Send>;

/// Arbitrary access to the workspace on the engine task.
pub type WorkspaceCall<S> = Box<dyn FnOnce(&mut Workspace<S>, Instant) + Send>;

pub enum EngineEvent<S: SceneSurface> {
    Edit(SceneEdit<S>),
    Select(NoteId),
    /// Create a note and switch to it.
    CreateNote(Option<String>),
    Delete { id: NoteId, confirmed: bool },
    /// Decode `bytes` off the engine task, then add the image to `target`.
    ImageBytes { target: NoteId, bytes: Vec<u8> },
    Call(WorkspaceCall<S>),
    Shutdown,
}

impl<S: SceneSurface> EngineEvent<S> {
    pub fn edit<F>(edit: F) -> Self
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        Self::Edit(Box::new(edit))
    }

    pub fn call<F>(call: F) -> Self
    where
        F: FnOnce(&mut Workspace<S>, Instant) + Send + 'static,
    {
        Self::Call(Box::new(call))
    }
}

struct DecodedImage {
    target: NoteId,
    result: Result<ImageItem>,
}

/// The engine clock. Goes through tokio so paused test time applies.
fn now() -> Instant {
    time::Instant::now().into_std()
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

/// Drive `workspace` until [`EngineEvent::Shutdown`] arrives or every sender
/// is dropped. Pending autosaves are flushed before the workspace is handed
/// back. Notices are forwarded to `notices` as they are raised.
pub async fn run<S>(
    mut workspace: Workspace<S>,
    mut events: mpsc::UnboundedReceiver<EngineEvent<S>>,
    notices: mpsc::UnboundedSender<Notice>,
) -> Workspace<S>
where
    S: SceneSurface + Send + 'static,
{
    let (decoded_tx, mut decoded_rx) = mpsc::unbounded_channel::<DecodedImage>();
    info!("engine started");

    loop {
        let deadline = workspace.next_deadline();

        tokio::select! {
            // Caller events first: a switch queued behind an image request
            // must be seen before that image's completion.
            biased;

            event = events.recv() => {
                match event {
                    Some(EngineEvent::Shutdown) | None => break,
                    Some(event) => handle_event(&mut workspace, event, &decoded_tx),
                }
            }
            Some(decoded) = decoded_rx.recv() => {
                let now = now();
                match decoded.result {
                    Ok(image) => {
                        workspace.complete_ingest(&decoded.target, image, now);
                    }
                    Err(e) => workspace.report_ingest_failure(&e),
                }
            }
            _ = wait_until(deadline) => {
                workspace.tick(now());
            }
        }

        forward_notices(&mut workspace, &notices);
    }

    workspace.close(now());
    forward_notices(&mut workspace, &notices);
    info!("engine stopped");
    workspace
}

fn handle_event<S>(
    workspace: &mut Workspace<S>,
    event: EngineEvent<S>,
    decoded_tx: &mpsc::UnboundedSender<DecodedImage>,
) where
    S: SceneSurface,
{
    let now = now();
    match event {
        EngineEvent::Edit(edit) => {
            edit(workspace.scene_mut());
            workspace.pump_events(now);
        }
        EngineEvent::Select(id) => {
            if let Err(e) = workspace.select(&id, now) {
                warn!(note = %id, error = %e, "switch rejected");
            }
        }
        EngineEvent::CreateNote(title) => {
            let note = workspace.create_note(title);
            if let Err(e) = workspace.select(&note.id, now) {
                warn!(note = %note.id, error = %e, "new note could not be opened");
            }
        }
        EngineEvent::Delete { id, confirmed } => {
            let outcome = workspace.delete(&id, confirmed, now);
            debug!(note = %id, ?outcome, "delete handled");
        }
        EngineEvent::ImageBytes { target, bytes } => {
            let tx = decoded_tx.clone();
            tokio::task::spawn_blocking(move || {
                let result = ingest::decode_image(&bytes);
                // The engine may already have stopped.
                let _ = tx.send(DecodedImage { target, result });
            });
        }
        EngineEvent::Call(call) => call(workspace, now),
        EngineEvent::Shutdown => {}
    }
}

fn forward_notices<S: SceneSurface>(workspace: &mut Workspace<S>, notices: &mpsc::UnboundedSender<Notice>) {
    for notice in workspace.take_notices() {
        if notices.send(notice).is_err() {
            debug!("notice receiver dropped");
        }
    }
}
