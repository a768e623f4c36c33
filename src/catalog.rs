//! Static model catalog served by `GET /models`

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

use crate::config::ModelConfig;
use crate::response::base64;

/// Human-readable description of one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub available: bool,
    pub tags: Vec<String>,
    pub trigger_word: Option<String>,
    /// Icon as a `data:image/...;base64,` URL
    pub image_data: Option<String>,
}

/// Catalog loaded once at startup and never mutated
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: Vec<ModelDescriptor>,
}

impl ModelCatalog {
    pub fn new(models: Vec<ModelDescriptor>) -> Self {
        Self { models }
    }

    /// Build descriptors from configuration, inlining icons found in `assets_dir`
    pub async fn load(models: &[ModelConfig], assets_dir: impl AsRef<Path>) -> Self {
        let assets_dir = assets_dir.as_ref();
        let mut descriptors = Vec::with_capacity(models.len());

        for model in models {
            let image_data = match &model.icon {
                Some(icon) => load_icon(assets_dir, icon).await,
                None => None,
            };

            descriptors.push(ModelDescriptor {
                id: model.id.clone(),
                name: model.name.clone(),
                description: model.description.clone(),
                available: model.available,
                tags: model.tags.clone(),
                trigger_word: model.trigger_word.clone(),
                image_data,
            });
        }

        let with_icons = descriptors.iter().filter(|d| d.image_data.is_some()).count();
        info!(models = descriptors.len(), with_icons, "Model catalog loaded");

        Self::new(descriptors)
    }

    pub fn list(&self) -> &[ModelDescriptor] {
        &self.models
    }

    pub fn get(&self, model_id: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.id == model_id)
    }
}

async fn load_icon(assets_dir: &Path, icon: &str) -> Option<String> {
    let path = assets_dir.join(icon.trim_start_matches('/'));

    match fs::read(&path).await {
        Ok(data) => {
            let format = match path.extension().and_then(|e| e.to_str()) {
                Some(ext) if ext.eq_ignore_ascii_case("jpg") => "jpeg".to_string(),
                Some(ext) => ext.to_ascii_lowercase(),
                None => "png".to_string(),
            };
            Some(base64::create_data_url(&data, &format))
        }
        Err(e) => {
            warn!(path = ?path, error = %e, "Model icon not readable");
            None
        }
    }
}
