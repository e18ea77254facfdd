pub mod catalog;
pub mod cli;
pub mod config;
pub mod demo;
pub mod events;
pub mod host;
pub mod layers;
pub mod load;
pub mod popup;
pub mod priority_queue;
pub mod registry;
pub mod resolution;
pub mod service;
pub mod time;
pub mod window;

pub use service::{UiCommand, UiCommands, UiService};
