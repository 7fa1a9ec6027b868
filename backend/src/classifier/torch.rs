use std::path::Path;
use std::sync::{Arc, Mutex};

use image::ImageReader;
use image::imageops::FilterType;
use tch::nn::ModuleT;
use tch::{CModule, Device, Kind, Tensor};

use super::frames::FrameSampler;
use super::{Classifier, ClassifierBackend, ClassifierError};

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

impl From<tch::TchError> for ClassifierError {
    fn from(err: tch::TchError) -> Self {
        ClassifierError::Model(err.to_string())
    }
}

impl From<image::ImageError> for ClassifierError {
    fn from(err: image::ImageError) -> Self {
        ClassifierError::Preprocessing(err.to_string())
    }
}

pub struct TorchBackend {
    image_size: u32,
    human_class_index: usize,
}

impl TorchBackend {
    pub fn new(image_size: u32, human_class_index: usize) -> Self {
        Self {
            image_size,
            human_class_index,
        }
    }
}

impl ClassifierBackend for TorchBackend {
    fn name(&self) -> &'static str {
        "torchscript"
    }

    fn load(&self, artifact: &Path) -> Result<Arc<dyn Classifier>, ClassifierError> {
        tch::set_num_threads(1);
        let device = Device::cuda_if_available();
        log::info!("Loading TorchScript module {} on {:?}", artifact.display(), device);

        let module =
            CModule::load_on_device(artifact, device).map_err(|e| ClassifierError::LoadFailed {
                path: artifact.to_path_buf(),
                reason: e.to_string(),
            })?;

        Ok(Arc::new(TorchClassifier {
            model: Arc::new(Mutex::new(module)),
            device,
            image_size: self.image_size,
            human_class_index: self.human_class_index,
            sampler: FrameSampler::default(),
        }))
    }
}

pub struct TorchClassifier {
    model: Arc<Mutex<CModule>>,
    device: Device,
    image_size: u32,
    human_class_index: usize,
    sampler: FrameSampler,
}

impl TorchClassifier {
    fn preprocess(&self, path: &Path) -> Result<Tensor, ClassifierError> {
        let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
        let size = self.image_size;
        let rgb = image.resize_exact(size, size, FilterType::Triangle).to_rgb8();

        let plane = (size * size) as usize;
        let mut data = vec![0f32; 3 * plane];
        for (i, pixel) in rgb.pixels().enumerate() {
            for c in 0..3 {
                let value = pixel[c] as f32 / 255.0;
                data[c * plane + i] = (value - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            }
        }

        let tensor = Tensor::from_slice(&data)
            .view([1, 3, size as i64, size as i64])
            .to_device(self.device);
        Ok(tensor)
    }

    fn inference(&self, tensor: &Tensor) -> Result<Vec<f32>, ClassifierError> {
        let model = self
            .model
            .lock()
            .map_err(|_| ClassifierError::Model("model lock poisoned".to_string()))?;
        let output = tch::no_grad(|| model.forward_t(tensor, false));
        let output = output.softmax(-1, Kind::Float);
        let output_flat = output.to_kind(Kind::Float).view([-1]);
        let num_elements = output_flat.size()[0] as usize;
        let mut output_vec = vec![0.0f32; num_elements];
        output_flat.copy_data(&mut output_vec, num_elements);
        Ok(output_vec)
    }

    fn human_percentage(&self, predictions: &[f32]) -> Result<f64, ClassifierError> {
        predictions
            .get(self.human_class_index)
            .map(|p| *p as f64 * 100.0)
            .ok_or_else(|| {
                ClassifierError::Model(format!(
                    "model produced {} outputs, expected at least {}",
                    predictions.len(),
                    self.human_class_index + 1
                ))
            })
    }
}

impl Classifier for TorchClassifier {
    fn classify_image(&self, path: &Path) -> Result<f64, ClassifierError> {
        let tensor = self.preprocess(path)?;
        let predictions = self.inference(&tensor)?;
        self.human_percentage(&predictions)
    }

    fn classify_video(&self, path: &Path, samples: usize) -> Result<f64, ClassifierError> {
        let frames = self.sampler.extract(path, samples)?;
        let mut scores = Vec::with_capacity(frames.paths().len());
        for frame in frames.paths() {
            match self.classify_image(frame) {
                Ok(score) => scores.push(score),
                Err(e) => log::warn!("Skipping frame {}: {}", frame.display(), e),
            }
        }
        if scores.is_empty() {
            return Err(ClassifierError::Model(
                "no sampled frame could be classified".to_string(),
            ));
        }
        Ok(scores.iter().sum::<f64>() / scores.len() as f64)
    }
}
