//! State store adapters.
//!
//! The free functions operate directly on a project root and are what the
//! CLI and tests use when no long-lived store object is needed.

mod json_file;
mod memory;

pub use json_file::{
    JsonFileStateStore, LOCK_FILE, STATE_DIR, STATE_FILE, add_environment, allocate_port,
    get_environment, list_environments, load_state, remove_environment, save_state, state_path,
};
pub use memory::InMemoryStateStore;
