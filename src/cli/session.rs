//! Line-driven interactive session.
//!
//! Each line is one command. Commands are turned into engine events and
//! sent to [`runtime::run`], which keeps the autosave timer running between
//! lines, so edits are saved after the configured quiet period while the
//! session is still open.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};

use super::handlers::{describe_note, describe_object};
use crate::entity::NoteId;
use crate::error::{EaselError, Result};
use crate::runtime::{self, EngineEvent};
use crate::scene::{MemoryScene, SceneObject, SceneSurface, Transform};
use crate::workspace::Workspace;

const HELP: &str = "\
Commands:
  list                  list notes
  new [title]           create a note and open it
  open <note>           open a note by position or id prefix
  show                  list objects on the open note
  text <content>        add a text object
  move <n> <x> <y>      move object n
  scale <n> <factor>    scale object n
  rotate <n> <degrees>  rotate object n
  remove <n>            remove object n
  image <path>          add an image file
  rename <title>        rename the open note
  delete                delete the open note
  save                  write pending edits now
  quit                  save and leave";

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SessionCommand {
    Help,
    List,
    New(Option<String>),
    Open(String),
    Show,
    Text(String),
    Move { position: usize, x: f64, y: f64 },
    Scale { position: usize, factor: f64 },
    Rotate { position: usize, angle: f64 },
    Remove(usize),
    Image(PathBuf),
    Rename(String),
    Delete,
    Save,
    Quit,
}

fn number<T: std::str::FromStr>(raw: Option<&str>, what: &str) -> std::result::Result<T, String> {
    let raw = raw.ok_or_else(|| format!("missing {}", what))?;
    raw.parse().map_err(|_| format!("'{}' is not a valid {}", raw, what))
}

fn position(raw: Option<&str>) -> std::result::Result<usize, String> {
    match number::<usize>(raw, "object position")? {
        0 => Err("object positions start at 1".to_string()),
        n => Ok(n),
    }
}

pub(crate) fn parse_line(line: &str) -> std::result::Result<SessionCommand, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let mut args = rest.split_whitespace();

    let command = match word {
        "help" | "?" => SessionCommand::Help,
        "list" | "ls" => SessionCommand::List,
        "new" => SessionCommand::New((!rest.is_empty()).then(|| rest.to_string())),
        "open" if !rest.is_empty() => SessionCommand::Open(rest.to_string()),
        "show" => SessionCommand::Show,
        "text" if !rest.is_empty() => SessionCommand::Text(rest.to_string()),
        "move" => SessionCommand::Move {
            position: position(args.next())?,
            x: number(args.next(), "x coordinate")?,
            y: number(args.next(), "y coordinate")?,
        },
        "scale" => SessionCommand::Scale {
            position: position(args.next())?,
            factor: number(args.next(), "scale factor")?,
        },
        "rotate" => SessionCommand::Rotate {
            position: position(args.next())?,
            angle: number(args.next(), "angle")?,
        },
        "remove" | "rm" => SessionCommand::Remove(position(args.next())?),
        "image" if !rest.is_empty() => SessionCommand::Image(PathBuf::from(rest)),
        "rename" if !rest.is_empty() => SessionCommand::Rename(rest.to_string()),
        "delete" => SessionCommand::Delete,
        "save" => SessionCommand::Save,
        "quit" | "exit" | "q" => SessionCommand::Quit,
        "open" | "text" | "image" | "rename" => return Err(format!("'{}' needs an argument", word)),
        other => return Err(format!("unknown command '{}' (try 'help')", other)),
    };
    Ok(command)
}

type Events = mpsc::UnboundedSender<EngineEvent<MemoryScene>>;

fn send(events: &Events, event: EngineEvent<MemoryScene>) -> Result<()> {
    events
        .send(event)
        .map_err(|_| EaselError::Io(io::Error::other("engine stopped")))
}

/// Run `call` on the engine task and wait for its answer.
async fn ask<T, F>(events: &Events, call: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Workspace, Instant) -> T + Send + 'static,
{
    let (reply, answer) = oneshot::channel();
    send(
        events,
        EngineEvent::call(move |workspace: &mut Workspace, now| {
            let _ = reply.send(call(workspace, now));
        }),
    )?;
    answer
        .await
        .map_err(|_| EaselError::Io(io::Error::other("engine stopped")))
}

fn report(result: Result<String>) {
    match result {
        Ok(message) => println!("{}", message),
        Err(e) => eprintln!("Error: {}", e),
    }
}

async fn active(events: &Events) -> Result<NoteId> {
    ask(events, |workspace, _| workspace.active().cloned())
        .await?
        .ok_or(EaselError::NoActiveNote)
}

fn transform_object<F>(events: &Events, position: usize, apply: F) -> Result<()>
where
    F: Fn(&mut Transform) + Send + 'static,
{
    send(
        events,
        EngineEvent::call(move |workspace: &mut Workspace, now| {
            let result = workspace.edit_object(position - 1, |object| apply(&mut object.transform), now);
            let objects = workspace.scene().objects();
            report(
                result
                    .map_err(|_| EaselError::ObjectNotFound(position))
                    .map(|()| objects.get(position - 1).map(|o| describe_object(position, o)).unwrap_or_default()),
            );
        }),
    )
}

async fn dispatch<R>(command: SessionCommand, events: &Events, lines: &mut tokio::io::Lines<R>) -> Result<()>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    match command {
        SessionCommand::Help => println!("{}", HELP),
        SessionCommand::List => send(
            events,
            EngineEvent::call(|workspace: &mut Workspace, _| {
                if workspace.notes().is_empty() {
                    println!("No notes found.");
                }
                let active = workspace.active().cloned();
                for (i, note) in workspace.notes().iter().enumerate() {
                    println!("{}", describe_note(i + 1, note, active.as_ref() == Some(&note.id)));
                }
            }),
        )?,
        SessionCommand::New(title) => {
            send(events, EngineEvent::CreateNote(title))?;
            send(
                events,
                EngineEvent::call(|workspace: &mut Workspace, _| {
                    if let Some(note) = workspace.active().and_then(|id| workspace.note(id)) {
                        println!("Opened new note ({}) - {}", note.id.short(), note.title);
                    }
                }),
            )?;
        }
        SessionCommand::Open(reference) => {
            let resolved = ask(events, move |workspace, _| workspace.resolve(&reference)).await?;
            match resolved {
                Ok(id) => {
                    send(events, EngineEvent::Select(id.clone()))?;
                    send(
                        events,
                        EngineEvent::call(move |workspace: &mut Workspace, _| {
                            if let Some(note) = workspace.note(&id) {
                                println!("Opened ({}) {} [{} objects]", id.short(), note.title, workspace.scene().len());
                            }
                        }),
                    )?;
                }
                Err(e) => eprintln!("Error: {}", e),
            }
        }
        SessionCommand::Show => send(
            events,
            EngineEvent::call(|workspace: &mut Workspace, _| {
                if workspace.active().is_none() {
                    eprintln!("Error: {}", EaselError::NoActiveNote);
                    return;
                }
                let objects = workspace.scene().objects();
                if objects.is_empty() {
                    println!("Scene is empty.");
                }
                for (i, object) in objects.iter().enumerate() {
                    println!("{}", describe_object(i + 1, object));
                }
            }),
        )?,
        SessionCommand::Text(text) => send(
            events,
            EngineEvent::call(move |workspace: &mut Workspace, now| {
                let object = SceneObject::text(text, Transform::at(80.0, 80.0));
                report(
                    workspace
                        .add_object(object, now)
                        .map(|_| format!("Added text object {}", workspace.scene().len())),
                );
            }),
        )?,
        SessionCommand::Move { position, x, y } => transform_object(events, position, move |t| {
            t.left = x;
            t.top = y;
        })?,
        SessionCommand::Scale { position, factor } => transform_object(events, position, move |t| {
            t.scale_x = factor;
            t.scale_y = factor;
        })?,
        SessionCommand::Rotate { position, angle } => {
            transform_object(events, position, move |t| t.angle = angle)?
        }
        SessionCommand::Remove(position) => send(
            events,
            EngineEvent::call(move |workspace: &mut Workspace, now| {
                report(
                    workspace
                        .remove_object(position - 1, now)
                        .map_err(|_| EaselError::ObjectNotFound(position))
                        .map(|removed| format!("Removed {}", describe_object(position, &removed).trim_start())),
                );
            }),
        )?,
        SessionCommand::Image(path) => {
            let target = match active(events).await {
                Ok(target) => target,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return Ok(());
                }
            };
            match fs::read(&path) {
                // Decoding happens off the engine task; the image lands only
                // if this note is still open by then.
                Ok(bytes) => send(events, EngineEvent::ImageBytes { target, bytes })?,
                Err(e) => eprintln!("Error: {}: {}", path.display(), e),
            }
        }
        SessionCommand::Rename(title) => send(
            events,
            EngineEvent::call(move |workspace: &mut Workspace, _| {
                let result = workspace
                    .active()
                    .cloned()
                    .ok_or(EaselError::NoActiveNote)
                    .map(|id| {
                        workspace.rename(&id, &title);
                        format!("Renamed ({}) to {}", id.short(), title)
                    });
                report(result);
            }),
        )?,
        SessionCommand::Delete => {
            let target = ask(events, |workspace, _| {
                workspace
                    .active()
                    .and_then(|id| workspace.note(id))
                    .map(|note| (note.id.clone(), note.title.clone()))
            })
            .await?;
            let Some((id, title)) = target else {
                eprintln!("Error: {}", EaselError::NoActiveNote);
                return Ok(());
            };

            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(format!("Delete note ({}) - {}? [y/N] ", id.short(), title).as_bytes())
                .await?;
            stdout.flush().await?;
            let answer = lines.next_line().await?.unwrap_or_default();
            let confirmed = answer.trim().eq_ignore_ascii_case("y");

            send(events, EngineEvent::Delete { id, confirmed })?;
            if !confirmed {
                println!("Cancelled.");
            }
        }
        SessionCommand::Save => {
            let written = ask(events, |workspace, now| workspace.flush_now(now)).await?;
            println!("{}", if written { "Saved." } else { "Nothing to save." });
        }
        SessionCommand::Quit => {}
    }
    Ok(())
}

pub(crate) async fn run_session(workspace: Workspace) -> Result<()> {
    let (events, receiver) = mpsc::unbounded_channel();
    let (notice_tx, mut notice_rx) = mpsc::unbounded_channel();

    let engine = tokio::spawn(runtime::run(workspace, receiver, notice_tx));
    let printer = tokio::spawn(async move {
        while let Some(notice) = notice_rx.recv().await {
            eprintln!("Warning: {}", notice);
        }
    });

    if let Some(id) = ask(&events, |workspace, _| workspace.notes().first().map(|n| n.id.clone())).await? {
        send(&events, EngineEvent::Select(id))?;
    }
    println!("easel session; type 'help' for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let outcome = read_commands(&events, &mut lines).await;

    // Shutdown flushes the pending edit; send it even when input failed.
    let _ = events.send(EngineEvent::Shutdown);
    let workspace = engine.await.map_err(|e| EaselError::Io(io::Error::other(e)))?;
    printer.await.map_err(|e| EaselError::Io(io::Error::other(e)))?;
    println!("Saved {} notes.", workspace.notes().len());
    outcome
}

async fn read_commands<R>(events: &Events, lines: &mut tokio::io::Lines<R>) -> Result<()>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(&line) {
            Ok(SessionCommand::Quit) => break,
            Ok(command) => dispatch(command, events, lines).await?,
            Err(message) => eprintln!("{}", message),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EaselConfig;
    use crate::storage::MemoryStore;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_line("list"), Ok(SessionCommand::List));
        assert_eq!(parse_line("  quit  "), Ok(SessionCommand::Quit));
        assert_eq!(parse_line("new"), Ok(SessionCommand::New(None)));
        assert_eq!(parse_line("new Weekly plan"), Ok(SessionCommand::New(Some("Weekly plan".to_string()))));
    }

    #[test]
    fn test_parse_text_keeps_spacing() {
        assert_eq!(
            parse_line("text hello   world"),
            Ok(SessionCommand::Text("hello   world".to_string()))
        );
    }

    #[test]
    fn test_parse_move() {
        assert_eq!(
            parse_line("move 2 10.5 -3"),
            Ok(SessionCommand::Move {
                position: 2,
                x: 10.5,
                y: -3.0
            })
        );
    }

    #[test]
    fn test_parse_rejects_zero_position() {
        assert!(parse_line("remove 0").unwrap_err().contains("start at 1"));
    }

    #[test]
    fn test_parse_reports_bad_numbers() {
        let err = parse_line("scale 1 big").unwrap_err();
        assert!(err.contains("'big'"));
        assert!(parse_line("rotate 1").unwrap_err().contains("missing"));
    }

    #[test]
    fn test_parse_requires_arguments() {
        assert!(parse_line("open").unwrap_err().contains("needs an argument"));
        assert!(parse_line("image").is_err());
    }

    #[test]
    fn test_parse_unknown_command() {
        assert!(parse_line("paint").unwrap_err().contains("unknown command"));
    }

    #[tokio::test]
    async fn test_unreadable_input_keeps_pending_edit() {
        let store = MemoryStore::new();
        let workspace = Workspace::open(Box::new(store.clone()), MemoryScene::new(), EaselConfig::default());
        let (events, receiver) = mpsc::unbounded_channel();
        let (notice_tx, _notices) = mpsc::unbounded_channel();
        let engine = tokio::spawn(runtime::run(workspace, receiver, notice_tx));

        let input: &[u8] = b"new Kept\ntext unsaved edit\n\xff\xfe\nquit\n";
        let mut lines = BufReader::new(input).lines();
        let outcome = read_commands(&events, &mut lines).await;
        assert!(matches!(outcome, Err(EaselError::Io(_))));

        events.send(EngineEvent::Shutdown).unwrap();
        let workspace = engine.await.unwrap();
        assert!(workspace.next_deadline().is_none());
        let raw = store.value("canvas-notes").unwrap();
        assert!(raw.contains("unsaved edit"));
        assert!(raw.contains("Kept"));
    }
}
