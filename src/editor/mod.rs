//! Editing layer on top of the graph model.
//!
//! This module turns user gestures into undoable graph edits:
//!
//! - **Intents**: what the graphics layer, attribute editor and menus ask for
//! - **Scene handler**: validates intents, commits one transaction per
//!   logical action and keeps the scene and view models in step
//! - **Undo/Redo**: a linear command stack with exact inverses, a history
//!   limit, clean-state tracking and merging of repeated property edits

pub mod commands;
pub mod handler;
pub mod intent;

pub use commands::{CommandStack, SceneChangedCommand, SceneCommand, SceneNodesCommand};
pub use handler::SceneHandler;
pub use intent::{CommandResult, Intent, Outcome};
