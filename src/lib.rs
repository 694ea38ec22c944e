pub mod autosave;
pub mod binder;
pub mod cli;
pub mod config;
pub mod entity;
pub mod error;
pub mod registry;
pub mod runtime;
pub mod scene;
pub mod storage;
pub mod workspace;

pub use config::EaselConfig;
pub use error::{EaselError, Result};
pub use workspace::{DeleteOutcome, Notice, NoticeKind, Workspace};
