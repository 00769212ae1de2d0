use super::DetectorError;
use image::imageops::FilterType;
use image::DynamicImage;
use std::sync::{Arc, Mutex};
use tch::{CModule, Device, Kind, Tensor};

/// Model input edge length. The TorchScript export is traced at this size.
const INPUT_SIZE: u32 = 640;

/// Detections below this confidence are discarded.
const CONFIDENCE_THRESHOLD: f64 = 0.25;

/// TorchScript detection model. The export bundles the detection head and
/// NMS, so the module output is a flat `[n, 6]` tensor of
/// `x1, y1, x2, y2, confidence, class` rows.
pub struct ModelDetector {
    module: Arc<Mutex<CModule>>,
    device: Device,
}

impl ModelDetector {
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        let device = Device::cuda_if_available();
        let module = CModule::load_on_device(model_path, device)?;
        Ok(Self {
            module: Arc::new(Mutex::new(module)),
            device,
        })
    }

    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<i64>, DetectorError> {
        let input = self.preprocess(image);
        let output = {
            let module = self.module.lock().unwrap();
            module.forward_ts(&[input])?
        };
        Self::class_ids(&output)
    }

    fn preprocess(&self, image: &DynamicImage) -> Tensor {
        let resized = image.resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);
        let rgb = resized.to_rgb8();
        let pixels: Vec<f32> = rgb.as_raw().iter().map(|&v| f32::from(v) / 255.0).collect();
        Tensor::from_slice(&pixels)
            .view([i64::from(INPUT_SIZE), i64::from(INPUT_SIZE), 3])
            .permute([2, 0, 1])
            .unsqueeze(0)
            .to_kind(Kind::Float)
            .to_device(self.device)
    }

    fn class_ids(output: &Tensor) -> Result<Vec<i64>, DetectorError> {
        let rows = output
            .f_view([-1, 6])
            .map_err(|e| DetectorError::BadOutput(e.to_string()))?;
        let count = rows.size()[0];
        let mut ids = Vec::with_capacity(count as usize);
        for i in 0..count {
            let confidence = rows.double_value(&[i, 4]);
            if confidence >= CONFIDENCE_THRESHOLD {
                ids.push(rows.int64_value(&[i, 5]));
            }
        }
        Ok(ids)
    }
}
