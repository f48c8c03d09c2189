//! # Core Engine Module
//!
//! Shared configuration used by the scene graph, the render system and the
//! engine context.
//!
//! ## Organization
//!
//! - **Config**: configuration structs for every subsystem

pub mod config;

pub use config::{
    Config,
    ConfigError,
    EngineConfig,
    OcclusionConfig,
    RenderConfig,
    SceneConfig,
};
