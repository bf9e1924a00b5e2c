//! Built-in apps: small, concrete [`crate::app::App`] implementations
//! shipped with the engine so a workspace always has something to spawn.

pub mod snapshot_app;
pub mod status_bar;
pub mod terminal;
pub mod welcome;
