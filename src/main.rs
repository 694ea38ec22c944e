use clap::Parser;
use easel::cli::{
    handle_add_image, handle_add_text, handle_delete, handle_export, handle_import, handle_init,
    handle_list, handle_new, handle_remove_object, handle_rename, handle_render, handle_session,
    handle_show, handle_transform, Cli, Commands,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log filter, e.g. `EASEL_LOG=easel=debug`.
const LOG_ENV: &str = "EASEL_LOG";

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => handle_init(),
        Commands::New { title, json } => handle_new(title, json),
        Commands::List { json } => handle_list(json),
        Commands::Show { note, json } => handle_show(note, json),
        Commands::Rename { note, title } => handle_rename(note, title),
        Commands::Delete { note, force } => handle_delete(note, force),
        Commands::AddText {
            note,
            text,
            x,
            y,
            size,
        } => handle_add_text(note, text, x, y, size),
        Commands::AddImage { note, path } => handle_add_image(note, path),
        Commands::Transform {
            note,
            index,
            x,
            y,
            scale,
            angle,
        } => handle_transform(note, index, x, y, scale, angle),
        Commands::RemoveObject { note, index } => handle_remove_object(note, index),
        Commands::Export { output } => handle_export(output),
        Commands::Import { path } => handle_import(path),
        Commands::Render { note, output } => handle_render(note, output),
        Commands::Session => handle_session(),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
