//! Background services started alongside the HTTP server

mod compaction;
mod completion;

pub use compaction::spawn_compaction;
pub use completion::spawn_completion_watcher;
