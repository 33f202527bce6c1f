//! Conference booking engine: rooms, speakers, sessions and attendance, with
//! conflict detection on both resources and an optional crash-safe journal.

pub mod compactor;
pub mod config;
pub mod engine;
pub mod journal;
pub mod limits;
pub mod model;
pub mod observability;

pub use config::EngineConfig;
pub use engine::{Engine, EngineError, Entity};
