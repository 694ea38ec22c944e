mod commands;
mod handlers;
mod session;

pub use commands::{Cli, Commands};
pub use handlers::{
    handle_add_image, handle_add_text, handle_delete, handle_export, handle_import, handle_init,
    handle_list, handle_new, handle_remove_object, handle_rename, handle_render, handle_session,
    handle_show, handle_transform,
};
