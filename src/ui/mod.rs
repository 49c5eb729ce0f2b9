mod common;
mod confirm_dialog;
mod explorer;
mod finish;
mod queue;

pub use confirm_dialog::render_confirm_dialog;
pub use explorer::render_explorer;
pub use finish::render_finish;
pub use queue::render_queue;
