// src/lib.rs
pub mod config;
pub mod drivers;
pub mod engine;
pub mod recorder;
pub mod store;
pub mod types;
pub use config::{BenchConfig, FrequencyPlan};
pub use drivers::BenchError;
pub use engine::{Engine, EngineHandle, EngineSettings};
