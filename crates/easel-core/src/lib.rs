//! # Easel Core Library
//!
//! Async runtime pieces behind the Easel canvas: configuration, local
//! storage with debounced autosave, the inference client, generation
//! lifecycle tracking and file ingestion.
//!

pub mod config;
pub mod error;
pub mod events;
pub mod generation;
pub mod inference;
pub mod ingest;
pub mod store;

pub use config::StudioConfig;
pub use events::{NotificationVariant, StudioEvent, StudioEventBus};
