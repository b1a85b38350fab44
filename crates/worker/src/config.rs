//! Worker configuration loaded from environment variables.
//!
//! | Env Var             | Default                          |
//! |---------------------|----------------------------------|
//! | `VEO_PROMPTS_FILE`  | `prompts.txt`                    |
//! | `VEO_OUTPUT_DIR`    | `output`                         |
//! | `VEO_MODEL`         | `veo-3.1-fast-generate-preview`  |
//! | `VEO_ASPECT_RATIO`  | `16:9`                           |
//! | `VEO_RESOLUTION`    | `720p`                           |
//! | `VEO_START_IMAGE`   | unset                            |
//! | `VEO_END_IMAGE`     | unset                            |
//!
//! Queue, scheduler and client settings are read by their own config
//! types; see [`QueueConfig`], [`SchedulerConfig`] and [`VeoConfig`].

use std::path::PathBuf;

use veoq_core::config::{parse_or, QueueConfig, SchedulerConfig};
use veoq_core::error::CoreError;
use veoq_core::options::{AspectRatio, InputMode, Resolution, VeoModel};
use veoq_veo::config::VeoConfig;

pub const DEFAULT_PROMPTS_FILE: &str = "prompts.txt";
pub const DEFAULT_OUTPUT_DIR: &str = "output";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub prompts_file: PathBuf,
    pub output_dir: PathBuf,
    pub model: VeoModel,
    pub aspect_ratio: AspectRatio,
    pub resolution: Resolution,
    pub start_image: Option<PathBuf>,
    pub end_image: Option<PathBuf>,
    pub queue: QueueConfig,
    pub scheduler: SchedulerConfig,
    pub veo: VeoConfig,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let path = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };

        let config = Self {
            prompts_file: path("VEO_PROMPTS_FILE")
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PROMPTS_FILE)),
            output_dir: path("VEO_OUTPUT_DIR").unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            model: parse_or(&lookup, "VEO_MODEL", VeoModel::default())?,
            aspect_ratio: parse_or(&lookup, "VEO_ASPECT_RATIO", AspectRatio::default())?,
            resolution: parse_or(&lookup, "VEO_RESOLUTION", Resolution::default())?,
            start_image: path("VEO_START_IMAGE"),
            end_image: path("VEO_END_IMAGE"),
            queue: QueueConfig::from_lookup(&lookup)?,
            scheduler: SchedulerConfig::from_lookup(&lookup)?,
            veo: VeoConfig::from_lookup(&lookup)?,
        };

        if config.end_image.is_some() && config.start_image.is_none() {
            return Err(CoreError::Config(
                "VEO_END_IMAGE requires VEO_START_IMAGE".to_string(),
            ));
        }
        Ok(config)
    }

    /// The input mode implied by which frame images are configured.
    pub fn input_mode(&self) -> InputMode {
        match (&self.start_image, &self.end_image) {
            (Some(_), Some(_)) => InputMode::FramesToVideo,
            (Some(_), None) => InputMode::ImageToVideo,
            _ => InputMode::TextOnly,
        }
    }
}
