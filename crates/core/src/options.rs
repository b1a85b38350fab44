//! Generation selectors carried by every job: input mode, model,
//! aspect ratio and resolution.
//!
//! Each selector maps to the exact string the Veo API expects and can be
//! parsed back from that string (used when loading configuration).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Input mode
// ---------------------------------------------------------------------------

/// Which reference images condition the generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputMode {
    /// Prompt only.
    #[default]
    TextOnly,
    /// Prompt plus a start frame.
    ImageToVideo,
    /// Prompt plus start and end frames.
    FramesToVideo,
}

impl InputMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TextOnly => "TEXT_ONLY",
            Self::ImageToVideo => "IMAGE_TO_VIDEO",
            Self::FramesToVideo => "FRAMES_TO_VIDEO",
        }
    }

    /// Whether the mode needs a start frame.
    pub fn needs_start_frame(self) -> bool {
        matches!(self, Self::ImageToVideo | Self::FramesToVideo)
    }

    /// Whether the mode needs an end frame.
    pub fn needs_end_frame(self) -> bool {
        matches!(self, Self::FramesToVideo)
    }
}

impl FromStr for InputMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TEXT_ONLY" | "TEXT" => Ok(Self::TextOnly),
            "IMAGE_TO_VIDEO" | "IMAGE" => Ok(Self::ImageToVideo),
            "FRAMES_TO_VIDEO" | "FRAMES" => Ok(Self::FramesToVideo),
            other => Err(CoreError::Validation(format!("Unknown input mode: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Veo model variants offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VeoModel {
    #[default]
    #[serde(rename = "veo-3.1-fast-generate-preview")]
    Veo31Fast,
    #[serde(rename = "veo-3.1-generate-preview")]
    Veo31Quality,
}

impl VeoModel {
    /// Model identifier used in the API path.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Veo31Fast => "veo-3.1-fast-generate-preview",
            Self::Veo31Quality => "veo-3.1-generate-preview",
        }
    }
}

impl FromStr for VeoModel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "veo-3.1-fast-generate-preview" | "fast" => Ok(Self::Veo31Fast),
            "veo-3.1-generate-preview" | "quality" | "hq" => Ok(Self::Veo31Quality),
            other => Err(CoreError::Validation(format!("Unknown model: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Aspect ratio
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "4:3")]
    Classic,
    #[serde(rename = "3:4")]
    ClassicPortrait,
}

impl AspectRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
            Self::Classic => "4:3",
            Self::ClassicPortrait => "3:4",
        }
    }
}

impl FromStr for AspectRatio {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1:1" => Ok(Self::Square),
            "16:9" => Ok(Self::Landscape),
            "9:16" => Ok(Self::Portrait),
            "4:3" => Ok(Self::Classic),
            "3:4" => Ok(Self::ClassicPortrait),
            other => Err(CoreError::Validation(format!(
                "Unknown aspect ratio: {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    #[serde(rename = "720p")]
    Hd,
    #[serde(rename = "1080p")]
    FullHd,
}

impl Resolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hd => "720p",
            Self::FullHd => "1080p",
        }
    }
}

impl FromStr for Resolution {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "720p" => Ok(Self::Hd),
            "1080p" => Ok(Self::FullHd),
            other => Err(CoreError::Validation(format!("Unknown resolution: {other}"))),
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),+) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )+
    };
}

display_as_str!(InputMode, VeoModel, AspectRatio, Resolution);
