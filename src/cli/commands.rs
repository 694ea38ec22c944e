use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "easel")]
#[command(version, about = "Canvas notes: many notes sharing one scene surface")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new easel project in the current directory
    Init,

    /// Create a note and open it
    New {
        /// Note title (defaults to the configured placeholder)
        #[arg(long, short = 't')]
        title: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List notes, most recently created first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a note and the objects on its scene
    Show {
        /// Note position like "2" or id prefix like "a1b2c"
        note: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rename a note
    Rename {
        /// Note position or id prefix
        note: String,

        /// New title
        title: String,
    },

    /// Delete a note
    Delete {
        /// Note position or id prefix
        note: String,

        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Add a text object to a note's scene
    AddText {
        /// Note position or id prefix
        note: String,

        /// Text content
        text: String,

        #[arg(long, default_value_t = 80.0)]
        x: f64,

        #[arg(long, default_value_t = 80.0)]
        y: f64,

        /// Font size in pixels
        #[arg(long, default_value_t = 24.0)]
        size: f64,
    },

    /// Add an image file to a note's scene
    AddImage {
        /// Note position or id prefix
        note: String,

        /// Path to a PNG, JPEG, GIF, WebP or BMP file
        path: PathBuf,
    },

    /// Move, scale or rotate an object
    Transform {
        /// Note position or id prefix
        note: String,

        /// Object position as printed by `show` (starting at 1)
        index: usize,

        #[arg(long)]
        x: Option<f64>,

        #[arg(long)]
        y: Option<f64>,

        /// Uniform scale factor
        #[arg(long)]
        scale: Option<f64>,

        /// Rotation in degrees
        #[arg(long)]
        angle: Option<f64>,
    },

    /// Remove an object from a note's scene
    RemoveObject {
        /// Note position or id prefix
        note: String,

        /// Object position as printed by `show` (starting at 1)
        index: usize,
    },

    /// Export every note as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Import notes from an exported JSON file
    Import {
        /// Path to the JSON file
        path: PathBuf,
    },

    /// Render a note's scene to a PNG file
    Render {
        /// Note position or id prefix
        note: String,

        /// Output PNG path
        output: PathBuf,
    },

    /// Interactive session reading commands from stdin
    Session,
}
