pub mod mock;
pub mod model;

use crate::catalog::Catalog;
use image::DynamicImage;
use mock::MockDetector;
use model::ModelDetector;
use std::env;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("model inference failed: {0}")]
    Inference(#[from] tch::TchError),
    #[error("unexpected model output: {0}")]
    BadOutput(String),
}

/// Detection backend, chosen once at startup. The mode never changes
/// afterwards: a loaded model that fails at inference time surfaces the
/// error instead of quietly falling back to mock output.
pub enum Detector {
    Model(ModelDetector),
    Mock(MockDetector),
}

impl Detector {
    /// Selects real mode when the artifact at `MODEL_PATH` (default
    /// `yolo_combined.pt`) exists and loads, mock mode otherwise.
    pub fn from_env(catalog: &Catalog) -> Self {
        let model_path = env::var("MODEL_PATH").unwrap_or_else(|_| "yolo_combined.pt".to_string());
        if Path::new(&model_path).exists() {
            match ModelDetector::load(&model_path) {
                Ok(model) => {
                    log::info!("Detection model loaded from {}", model_path);
                    return Detector::Model(model);
                }
                Err(e) => {
                    log::error!("Failed to load detection model at {}: {}", model_path, e);
                }
            }
        } else {
            log::warn!("No model artifact at {}", model_path);
        }
        log::warn!("Running in mock mode; predictions are randomly generated");
        Detector::Mock(MockDetector::new(catalog.ids()))
    }

    /// Returns one class id per detected object instance. Confidence and
    /// box geometry are dropped at this layer.
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<i64>, DetectorError> {
        match self {
            Detector::Model(model) => model.detect(image),
            Detector::Mock(mock) => Ok(mock.detect()),
        }
    }

    pub fn model_loaded(&self) -> bool {
        matches!(self, Detector::Model(_))
    }
}
