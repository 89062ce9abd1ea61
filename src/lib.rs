//! Node-graph editor core.
//!
//! This crate keeps a canonical node graph, a graphics scene and several
//! list/table view models consistent under editing, with undo/redo.
//!
//! - [`graph`]: nodes, edges and connections with transactional mutation and
//!   change notification
//! - [`editor`]: intents, the scene handler and the undo/redo command stack
//! - [`scene`] and [`views`]: derived projections kept in step with the graph
//! - [`settings`] and [`config`]: persisted layouts, recent files and
//!   editor preferences
//!
//! The binary `scenegraph` manages the settings file and runs a small demo.

pub mod config;
pub mod editor;
pub mod error;
pub mod graph;
pub mod model;
pub mod scene;
pub mod settings;
pub mod views;

pub use config::EditorConfig;
pub use editor::{CommandResult, Intent, Outcome, SceneHandler};
pub use error::GraphError;
pub use settings::{Settings, WindowHost};
