//! Request, handle and result types for generation jobs

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{AppError, Result};

pub const MIN_DIMENSION: u32 = 64;
pub const MAX_DIMENSION: u32 = 2048;
pub const MAX_ITERATIONS: u32 = 150;
pub const MAX_GUIDANCE: f64 = 30.0;
pub const MAX_IMAGES: u32 = 4;

/// A text-to-image generation request as submitted by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model_id: String,
    #[serde(default = "default_dimension")]
    pub width: u32,
    #[serde(default = "default_dimension")]
    pub height: u32,
    /// Inference steps; the model's own default applies when unset
    #[serde(default)]
    pub iterations: Option<u32>,
    /// Guidance scale; the model's own default applies when unset
    #[serde(default)]
    pub guidance: Option<f64>,
    #[serde(default)]
    pub seed: Option<f64>,
    #[serde(rename = "numberImages", alias = "number_images", default = "default_number_images")]
    pub number_images: u32,
}

fn default_dimension() -> u32 {
    1024
}

fn default_number_images() -> u32 {
    1
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model_id: model_id.into(),
            width: default_dimension(),
            height: default_dimension(),
            iterations: None,
            guidance: None,
            seed: None,
            number_images: default_number_images(),
        }
    }

    /// Reject parameters no worker should ever see
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(AppError::InvalidRequest("prompt must not be empty".to_string()));
        }

        for (name, value) in [("width", self.width), ("height", self.height)] {
            if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&value) || value % 8 != 0 {
                return Err(AppError::InvalidRequest(format!(
                    "{} must be a multiple of 8 between {} and {}, got {}",
                    name, MIN_DIMENSION, MAX_DIMENSION, value
                )));
            }
        }

        if let Some(iterations) = self.iterations {
            if !(1..=MAX_ITERATIONS).contains(&iterations) {
                return Err(AppError::InvalidRequest(format!(
                    "iterations must be between 1 and {}, got {}",
                    MAX_ITERATIONS, iterations
                )));
            }
        }

        if let Some(guidance) = self.guidance {
            if !guidance.is_finite() || !(0.0..=MAX_GUIDANCE).contains(&guidance) {
                return Err(AppError::InvalidRequest(format!(
                    "guidance must be between 0 and {}, got {}",
                    MAX_GUIDANCE, guidance
                )));
            }
        }

        if let Some(seed) = self.seed {
            if !seed.is_finite() || seed < 0.0 {
                return Err(AppError::InvalidRequest(format!(
                    "seed must be a non-negative number, got {}",
                    seed
                )));
            }
        }

        if !(1..=MAX_IMAGES).contains(&self.number_images) {
            return Err(AppError::InvalidRequest(format!(
                "numberImages must be between 1 and {}, got {}",
                MAX_IMAGES, self.number_images
            )));
        }

        Ok(())
    }
}

/// Opaque token identifying one in-flight or retained job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    pub(crate) fn generate() -> Self {
        Self(format!("job-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobHandle {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for JobHandle {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// PNG images produced by one generation call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    images: Vec<Bytes>,
}

impl GenerationResult {
    pub const CONTENT_TYPE: &'static str = "image/png";

    pub fn new(images: Vec<Bytes>) -> Self {
        Self { images }
    }

    pub fn image(&self, index: usize) -> Option<&Bytes> {
        self.images.get(index)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Body returned when a job is accepted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAccepted {
    pub job_id: JobHandle,
}
