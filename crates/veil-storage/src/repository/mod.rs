//! Repository modules for direct table access.

mod config;
mod events;

pub use config::ConfigRepo;
pub use events::{create_preview, hash_content, EventsRepo};
