use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Instant;

use crate::config::{EaselConfig, CONFIG_FILE};
use crate::entity::{Note, NoteId};
use crate::error::{EaselError, Result};
use crate::scene::{raster, MemoryScene, SceneItem, SceneObject, SceneSurface, Transform};
use crate::storage::{FileStore, EASEL_DIR};
use crate::workspace::{DeleteOutcome, IngestOutcome, Workspace};

/// Find the project root by looking for .easel/ or .git/
pub(crate) fn find_project_root() -> PathBuf {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let mut current = cwd.as_path();
    loop {
        if current.join(EASEL_DIR).exists() || current.join(".git").exists() {
            return current.to_path_buf();
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return cwd,
        }
    }
}

pub(crate) fn open_workspace() -> Result<Workspace> {
    let root = find_project_root();
    let store = FileStore::open(&root)?;
    let config = EaselConfig::load(store.easel_dir())?;
    let mut workspace = Workspace::open(Box::new(store), MemoryScene::new(), config);
    print_notices(&mut workspace);
    Ok(workspace)
}

pub(crate) fn print_notices(workspace: &mut Workspace) {
    for notice in workspace.take_notices() {
        eprintln!("Warning: {}", notice);
    }
}

/// Flush pending edits and report anything that went wrong on the way.
fn finish(mut workspace: Workspace) {
    workspace.close(Instant::now());
    print_notices(&mut workspace);
}

fn open_note(workspace: &mut Workspace, reference: &str) -> Result<NoteId> {
    let id = workspace.resolve(reference)?;
    workspace.select(&id, Instant::now())?;
    print_notices(workspace);
    Ok(id)
}

fn note_title(workspace: &Workspace, id: &NoteId) -> String {
    workspace
        .note(id)
        .map(|n| n.title.clone())
        .unwrap_or_default()
}

/// Object positions are shown to users starting at 1.
fn object_index(position: usize) -> Result<usize> {
    position.checked_sub(1).ok_or(EaselError::ObjectNotFound(position))
}

fn with_user_position<T>(result: Result<T>, position: usize) -> Result<T> {
    result.map_err(|e| match e {
        EaselError::ObjectNotFound(_) => EaselError::ObjectNotFound(position),
        other => other,
    })
}

pub(crate) fn describe_object(position: usize, object: &SceneObject) -> String {
    let t = &object.transform;
    let placement = format!("at ({:.0}, {:.0})", t.left, t.top);
    let mut extra = String::new();
    if (t.scale_x - 1.0).abs() > f64::EPSILON || (t.scale_y - 1.0).abs() > f64::EPSILON {
        extra.push_str(&format!(" scale {:.2}", t.scale_x));
    }
    if t.angle.abs() > f64::EPSILON {
        extra.push_str(&format!(" angle {:.0}", t.angle));
    }

    match &object.item {
        SceneItem::Text(text) => format!(
            "  {:>2}. text  \"{}\" {} size {:.0}{}",
            position, text.text, placement, text.font_size, extra
        ),
        SceneItem::Image(image) => format!(
            "  {:>2}. image {}x{} {}{}",
            position, image.width, image.height, placement, extra
        ),
    }
}

pub(crate) fn describe_note(position: usize, note: &Note, active: bool) -> String {
    let objects = note
        .snapshot
        .as_ref()
        .and_then(|s| s.object_count())
        .map(|n| format!("{} objects", n))
        .unwrap_or_else(|| "empty".to_string());
    format!(
        "{} {:03} ({}) {} [{}] {}",
        if active { "*" } else { " " },
        position,
        note.id.short(),
        note.title,
        objects,
        note.updated_at.format("%Y-%m-%d %H:%M"),
    )
}

pub fn handle_init() -> Result<()> {
    let root = env::current_dir()?;

    let store = FileStore::init(&root)?;
    let config = serde_yaml::to_string(&EaselConfig::default()).map_err(|e| EaselError::Config(e.to_string()))?;
    fs::write(store.easel_dir().join(CONFIG_FILE), config)?;

    println!("Initialized easel project in {}", root.display());
    Ok(())
}

pub fn handle_new(title: Option<String>, json: bool) -> Result<()> {
    let mut workspace = open_workspace()?;
    let note = workspace.create_note(title);
    workspace.select(&note.id, Instant::now())?;

    if json {
        if let Some(note) = workspace.note(&note.id) {
            println!("{}", serde_json::to_string_pretty(note)?);
        }
    } else {
        println!("Created note ({}) - {}", note.id.short(), note.title);
    }

    finish(workspace);
    Ok(())
}

pub fn handle_list(json: bool) -> Result<()> {
    let workspace = open_workspace()?;
    let notes = workspace.notes();

    if json {
        println!("{}", serde_json::to_string_pretty(notes)?);
    } else if notes.is_empty() {
        println!("No notes found.");
    } else {
        println!("Notes:\n");
        for (i, note) in notes.iter().enumerate() {
            println!("{}", describe_note(i + 1, note, false));
        }
    }

    Ok(())
}

pub fn handle_show(note: String, json: bool) -> Result<()> {
    let mut workspace = open_workspace()?;
    let id = open_note(&mut workspace, &note)?;

    if json {
        if let Some(note) = workspace.note(&id) {
            println!("{}", serde_json::to_string_pretty(note)?);
        }
    } else if let Some(note) = workspace.note(&id) {
        println!("Note ({})", note.id);
        println!("Title: {}", note.title);
        println!("Updated: {}", note.updated_at.format("%Y-%m-%d %H:%M:%S"));

        let objects = workspace.scene().objects();
        if objects.is_empty() {
            println!("\nScene is empty.");
        } else {
            println!("\nObjects:");
            for (i, object) in objects.iter().enumerate() {
                println!("{}", describe_object(i + 1, object));
            }
        }
    }

    finish(workspace);
    Ok(())
}

pub fn handle_rename(note: String, title: String) -> Result<()> {
    let mut workspace = open_workspace()?;
    let id = workspace.resolve(&note)?;
    let old_title = note_title(&workspace, &id);

    if !workspace.rename(&id, &title) {
        return Err(EaselError::NoteNotFound(note));
    }
    println!("Renamed ({}) {} -> {}", id.short(), old_title, title);

    finish(workspace);
    Ok(())
}

pub fn handle_delete(note: String, force: bool) -> Result<()> {
    let mut workspace = open_workspace()?;
    let id = workspace.resolve(&note)?;
    let title = note_title(&workspace, &id);

    // Confirm deletion unless --force is used
    let confirmed = if force {
        true
    } else {
        eprintln!("Delete note ({}) - {}? [y/N] ", id.short(), title);

        // Check if stdin is a tty for interactive confirmation
        if atty::is(atty::Stream::Stdin) {
            let mut input = String::new();
            io::stdin().read_line(&mut input)?;
            input.trim().eq_ignore_ascii_case("y")
        } else {
            return Err(EaselError::ConfirmationRequired);
        }
    };

    match workspace.delete(&id, confirmed, Instant::now()) {
        DeleteOutcome::Cancelled => println!("Cancelled."),
        DeleteOutcome::NotFound => return Err(EaselError::NoteNotFound(note)),
        DeleteOutcome::Deleted { .. } => println!("Deleted note ({}) - {}", id.short(), title),
    }

    finish(workspace);
    Ok(())
}

pub fn handle_add_text(note: String, text: String, x: f64, y: f64, size: f64) -> Result<()> {
    let mut workspace = open_workspace()?;
    let id = open_note(&mut workspace, &note)?;

    let mut object = SceneObject::text(text, Transform::at(x, y));
    if let SceneItem::Text(item) = &mut object.item {
        item.font_size = size;
    }
    workspace.add_object(object, Instant::now())?;

    println!(
        "Added text object {} to ({}) {}",
        workspace.scene().len(),
        id.short(),
        note_title(&workspace, &id)
    );

    finish(workspace);
    Ok(())
}

pub fn handle_add_image(note: String, path: PathBuf) -> Result<()> {
    let bytes = fs::read(&path)?;
    let mut workspace = open_workspace()?;
    let id = open_note(&mut workspace, &note)?;

    match workspace.ingest_image(&id, &bytes, Instant::now())? {
        IngestOutcome::Added(_) => {
            let objects = workspace.scene().objects();
            if let Some(object) = objects.last() {
                println!("Added {}", describe_object(objects.len(), object).trim_start());
            }
        }
        IngestOutcome::Discarded => println!("Note changed before the image was ready; nothing added."),
    }

    finish(workspace);
    Ok(())
}

pub fn handle_transform(
    note: String,
    index: usize,
    x: Option<f64>,
    y: Option<f64>,
    scale: Option<f64>,
    angle: Option<f64>,
) -> Result<()> {
    let mut workspace = open_workspace()?;
    open_note(&mut workspace, &note)?;

    let result = workspace.edit_object(
        object_index(index)?,
        |object| {
            let t = &mut object.transform;
            if let Some(x) = x {
                t.left = x;
            }
            if let Some(y) = y {
                t.top = y;
            }
            if let Some(scale) = scale {
                t.scale_x = scale;
                t.scale_y = scale;
            }
            if let Some(angle) = angle {
                t.angle = angle;
            }
        },
        Instant::now(),
    );
    with_user_position(result, index)?;

    let objects = workspace.scene().objects();
    if let Some(object) = objects.get(index - 1) {
        println!("{}", describe_object(index, object).trim_start());
    }

    finish(workspace);
    Ok(())
}

pub fn handle_remove_object(note: String, index: usize) -> Result<()> {
    let mut workspace = open_workspace()?;
    open_note(&mut workspace, &note)?;

    let removed = with_user_position(workspace.remove_object(object_index(index)?, Instant::now()), index)?;
    println!("Removed {}", describe_object(index, &removed).trim_start());

    finish(workspace);
    Ok(())
}

pub fn handle_export(output: Option<PathBuf>) -> Result<()> {
    let mut workspace = open_workspace()?;
    let json = workspace.export_json(Instant::now())?;

    match output {
        Some(path) => {
            fs::write(&path, json)?;
            println!("Exported {} notes to {}", workspace.notes().len(), path.display());
        }
        None => println!("{}", json),
    }

    finish(workspace);
    Ok(())
}

pub fn handle_import(path: PathBuf) -> Result<()> {
    let json = fs::read_to_string(&path)?;
    let mut workspace = open_workspace()?;

    let count = workspace.import_json(&json)?;
    println!("Imported {} notes from {}", count, path.display());

    finish(workspace);
    Ok(())
}

pub fn handle_render(note: String, output: PathBuf) -> Result<()> {
    let mut workspace = open_workspace()?;
    let id = open_note(&mut workspace, &note)?;

    let image = workspace.render()?;
    raster::save_png(&image, &output)?;
    println!(
        "Rendered ({}) {} to {} ({}x{})",
        id.short(),
        note_title(&workspace, &id),
        output.display(),
        image.width(),
        image.height()
    );

    finish(workspace);
    Ok(())
}

pub fn handle_session() -> Result<()> {
    let workspace = open_workspace()?;
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(super::session::run_session(workspace))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::scene::ImageItem;

    #[test]
    fn test_object_index_is_one_based() {
        assert_eq!(object_index(1).unwrap(), 0);
        assert!(matches!(object_index(0), Err(EaselError::ObjectNotFound(0))));
    }

    #[test]
    fn test_error_reports_user_position() {
        let result: Result<()> = Err(EaselError::ObjectNotFound(4));
        assert!(matches!(with_user_position(result, 5), Err(EaselError::ObjectNotFound(5))));
    }

    #[test]
    fn test_describe_text_object() {
        let mut object = SceneObject::text("Hello", Transform::at(10.0, 20.0));
        object.transform.angle = 45.0;
        let line = describe_object(1, &object);
        assert!(line.contains("text"));
        assert!(line.contains("\"Hello\""));
        assert!(line.contains("at (10, 20)"));
        assert!(line.contains("angle 45"));
        assert!(!line.contains("scale"));
    }

    #[test]
    fn test_describe_image_object() {
        let item = ImageItem {
            src: "data:image/png;base64,".to_string(),
            width: 64,
            height: 32,
        };
        let mut object = SceneObject::image(item, Transform::default());
        object.transform.scale_x = 0.5;
        object.transform.scale_y = 0.5;
        let line = describe_object(2, &object);
        assert!(line.contains("image 64x32"));
        assert!(line.contains("scale 0.50"));
    }

    #[test]
    fn test_describe_note_without_snapshot() {
        let note = Note::new("Plan".to_string());
        let line = describe_note(1, &note, true);
        assert!(line.starts_with("* 001"));
        assert!(line.contains("Plan"));
        assert!(line.contains("[empty]"));
    }

    #[test]
    fn test_find_project_root_falls_back_to_cwd() {
        let root = find_project_root();
        assert!(root.is_absolute() || root == Path::new("."));
    }
}
