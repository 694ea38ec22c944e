use thiserror::Error;

#[derive(Error, Debug)]
pub enum EaselError {
    #[error("Not in an easel project. Run 'easel init' first.")]
    NotInitialized,

    #[error("Already initialized. Remove .easel/ to reinitialize.")]
    AlreadyInitialized,

    #[error("Note not found: {0}")]
    NoteNotFound(String),

    #[error("Note reference '{0}' is ambiguous; use a longer id prefix")]
    AmbiguousNote(String),

    #[error("No note is open")]
    NoActiveNote,

    #[error("No object at position {0}")]
    ObjectNotFound(usize),

    #[error("Use --force to delete in non-interactive mode")]
    ConfirmationRequired,

    #[error("Could not read stored notes: {0}")]
    StorageRead(String),

    #[error("Could not write notes to storage: {0}")]
    StorageWrite(String),

    #[error("Scene snapshot could not be loaded: {0}")]
    SceneLoad(String),

    #[error("Import rejected: {0}")]
    ImportFormat(String),

    #[error("Image could not be decoded: {0}")]
    ImageDecode(String),

    #[error("Scene cannot be rendered: {0}")]
    Render(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EaselError>;
