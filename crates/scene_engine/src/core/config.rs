//! # Engine Configuration
//!
//! Serializable configuration for the scene graph, the render pipeline and
//! the engine context. Every struct implements [`Config`] so it can be loaded
//! from `.toml` or `.ron` files, and every struct has a `validate` method that
//! reports the first inconsistent value.
//!
//! ## Configuration Categories
//!
//! - **Engine Config**: logging, worker threads
//! - **Scene Config**: world bounds and spatial index tuning, event draining
//! - **Render Config**: output resolution, render quality, occlusion culling

use serde::{Deserialize, Serialize};

pub use crate::config::{Config, ConfigError};
use crate::foundation::math::Vec3;
use crate::spatial::{Aabb, OctreeConfig};

/// # Occlusion Culling Configuration
///
/// Tunables for GPU occlusion queries issued by geometry stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcclusionConfig {
    /// Whether geometry stages issue occlusion queries at all
    pub enabled: bool,
    /// Maximum number of queries active or pending in one pass
    pub max_queries: usize,
    /// Frames to skip re-querying an instance that covered more than `threshold` fragments
    pub occluder_skips: u32,
    /// Frames to skip re-querying an instance that produced no fragments
    pub occludee_skips: u32,
    /// Frames to skip re-querying any other instance
    pub occlusion_skips: u32,
    /// Fragment count above which an instance is considered a strong occluder
    pub threshold: u64,
    /// Visibility assumed for instances that did not fit in the query budget
    pub overflow_visibility: bool,
}

impl Default for OcclusionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_queries: 256,
            occluder_skips: 4,
            occludee_skips: 1,
            occlusion_skips: 2,
            threshold: 64,
            overflow_visibility: true,
        }
    }
}

impl OcclusionConfig {
    /// Disable occlusion queries
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Set the query budget
    #[must_use]
    pub fn with_max_queries(mut self, max_queries: usize) -> Self {
        self.max_queries = max_queries;
        self
    }

    /// Set the three skip counters
    #[must_use]
    pub fn with_skips(mut self, occluder: u32, occludee: u32, occlusion: u32) -> Self {
        self.occluder_skips = occluder;
        self.occludee_skips = occludee;
        self.occlusion_skips = occlusion;
        self
    }

    /// Set the strong-occluder fragment threshold
    #[must_use]
    pub fn with_threshold(mut self, threshold: u64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the visibility used when the query budget is exhausted
    #[must_use]
    pub fn with_overflow_visibility(mut self, visible: bool) -> Self {
        self.overflow_visibility = visible;
        self
    }

    /// Frames to reuse a query result that counted `fragments` samples
    pub fn skips_for(&self, fragments: u64) -> u32 {
        if fragments == 0 {
            self.occludee_skips
        } else if fragments > self.threshold {
            self.occluder_skips
        } else {
            self.occlusion_skips
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.enabled && self.max_queries == 0 {
            return Err("max_queries must be greater than 0 when occlusion is enabled".to_string());
        }
        Ok(())
    }
}

/// # Render Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Render-quality multiplier applied to the output resolution
    pub quality: f32,
    /// Group identical primitive/material pairs into instanced draws
    pub batching: bool,
    /// Occlusion culling tunables
    pub occlusion: OcclusionConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            quality: 1.0,
            batching: true,
            occlusion: OcclusionConfig::default(),
        }
    }
}

impl RenderConfig {
    /// Set output resolution
    #[must_use]
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set render quality multiplier
    #[must_use]
    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = quality;
        self
    }

    /// Set occlusion configuration
    #[must_use]
    pub fn with_occlusion(mut self, occlusion: OcclusionConfig) -> Self {
        self.occlusion = occlusion;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("Invalid resolution {}x{}", self.width, self.height));
        }
        if !(self.quality > 0.0 && self.quality <= 4.0) {
            return Err(format!("Render quality {} outside (0, 4]", self.quality));
        }
        self.occlusion.validate()
    }
}

/// # Scene Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Minimum corner of the region covered by the spatial index
    pub world_min: [f32; 3],
    /// Maximum corner of the region covered by the spatial index
    pub world_max: [f32; 3],
    /// Spatial index subdivision tuning
    pub octree: OctreeConfig,
    /// Events dispatched by each `update` call
    pub events_per_update: usize,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            world_min: [-1024.0; 3],
            world_max: [1024.0; 3],
            octree: OctreeConfig::default(),
            events_per_update: 1,
        }
    }
}

impl SceneConfig {
    /// Set the world bounds covered by the spatial index
    #[must_use]
    pub fn with_world_bounds(mut self, min: Vec3, max: Vec3) -> Self {
        self.world_min = [min.x, min.y, min.z];
        self.world_max = [max.x, max.y, max.z];
        self
    }

    /// World bounds as an AABB
    pub fn world_bounds(&self) -> Aabb {
        Aabb::new(Vec3::from(self.world_min), Vec3::from(self.world_max))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if (0..3).any(|i| self.world_min[i] >= self.world_max[i]) {
            return Err("world_min must be below world_max on every axis".to_string());
        }
        if self.octree.max_entities_per_node == 0 {
            return Err("octree.max_entities_per_node must be greater than 0".to_string());
        }
        if self.events_per_update == 0 {
            return Err("events_per_update must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// # Engine Configuration
///
/// Top-level configuration consumed by [`EngineContext`](crate::EngineContext).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// env_logger filter string
    pub log_level: String,
    /// Worker pool size; `None` picks one less than the available cores
    pub worker_threads: Option<usize>,
    /// Scene configuration
    pub scene: SceneConfig,
    /// Render configuration
    pub render: RenderConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            worker_threads: None,
            scene: SceneConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set log filter
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set worker pool size
    #[must_use]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    /// Set scene configuration
    #[must_use]
    pub fn with_scene(mut self, scene: SceneConfig) -> Self {
        self.scene = scene;
        self
    }

    /// Set render configuration
    #[must_use]
    pub fn with_render(mut self, render: RenderConfig) -> Self {
        self.render = render;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.log_level.trim().is_empty() {
            return Err("log_level must not be empty".to_string());
        }
        self.scene.validate()?;
        self.render.validate()
    }
}

impl Config for OcclusionConfig {}
impl Config for RenderConfig {}
impl Config for SceneConfig {}
impl Config for EngineConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let render = RenderConfig::default().with_quality(0.0);
        assert!(render.validate().is_err());

        let occlusion = OcclusionConfig::default().with_max_queries(0);
        assert!(occlusion.validate().is_err());
        assert!(OcclusionConfig::disabled().with_max_queries(0).validate().is_ok());

        let scene = SceneConfig::default()
            .with_world_bounds(Vec3::new(0.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 10.0));
        assert!(scene.validate().is_err());
    }

    #[test]
    fn test_skips_by_fragment_count() {
        let occlusion = OcclusionConfig::default().with_skips(5, 3, 2).with_threshold(10);
        assert_eq!(occlusion.skips_for(0), 3);
        assert_eq!(occlusion.skips_for(10), 2);
        assert_eq!(occlusion.skips_for(11), 5);
    }

    #[test]
    fn test_toml_and_ron_files() {
        let dir = std::env::temp_dir();
        let config = EngineConfig::new()
            .with_log_level("debug")
            .with_worker_threads(2)
            .with_render(RenderConfig::default().with_resolution(640, 480));

        for name in ["scene_engine_test_config.toml", "scene_engine_test_config.ron"] {
            let path = dir.join(name);
            config.save_to_file(&path).unwrap();
            let loaded = EngineConfig::load_from_file(&path).unwrap();
            assert_eq!(loaded, config);
            let _ = std::fs::remove_file(&path);
        }
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: EngineConfig = toml::from_str("log_level = \"warn\"\n[render]\nwidth = 800\n").unwrap();
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.render.width, 800);
        assert_eq!(config.render.height, 720);
        assert!(config.render.occlusion.enabled);
    }

    #[test]
    fn test_unsupported_extension() {
        let result = EngineConfig::load_from_file("config.json");
        assert!(matches!(result, Err(ConfigError::Io(_) | ConfigError::UnsupportedFormat(_))));
        let result = EngineConfig::default().save_to_file(std::env::temp_dir().join("engine.json"));
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
