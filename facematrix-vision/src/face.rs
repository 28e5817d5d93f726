use std::sync::Mutex;

use anyhow::{anyhow, Result};
use image::RgbImage;
use log::{debug, warn};
use ndarray::Array4;
use ort::{session::Session, value::Value};
use serde::Serialize;

use crate::compare::{self, CompareError};
use crate::embedder::Embedder;
use crate::model::{self, ModelOptions};

/// Face embedding (ArcFace output, L2-normalized)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embedding {
    vector: Vec<f32>,
}

impl Embedding {
    /// Normalize a raw network output into an embedding.
    pub fn from_raw(raw: Vec<f32>) -> Result<Self, CompareError> {
        Ok(Self {
            vector: compare::normalize(&raw)?,
        })
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.vector
    }

    pub fn len(&self) -> usize {
        self.vector.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vector.is_empty()
    }
}

impl AsRef<[f32]> for Embedding {
    fn as_ref(&self) -> &[f32] {
        &self.vector
    }
}

/// Shapes observed when running one blank image through the model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelProbe {
    pub input_name: String,
    pub input_shape: [usize; 4],
    pub output_name: String,
    pub output_shape: Vec<i64>,
    pub embedding_len: usize,
}

/// ArcFace recognizer backed by one ONNX session.
///
/// The session sits behind a mutex that is held only while `Session::run`
/// executes; tensor construction happens outside the lock.
pub struct ArcFace {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    input_size: u32,
}

impl ArcFace {
    pub fn new(options: &ModelOptions) -> Result<Self> {
        let session = model::recog_session(&options.model_path)?;
        Ok(Self {
            session: Mutex::new(session),
            input_name: options.input_name.clone(),
            output_name: options.output_name.clone(),
            input_size: options.input_size,
        })
    }

    /// Run a black image through the network and report tensor shapes.
    pub fn probe(&self) -> Result<ModelProbe> {
        let blank = RgbImage::new(self.input_size, self.input_size);
        let input = self.preprocess(&blank)?;
        let input_shape = [1, 3, self.input_size as usize, self.input_size as usize];
        let (output_name, output_shape, data) = self.run(input)?;
        Ok(ModelProbe {
            input_name: self.input_name.clone(),
            input_shape,
            output_name,
            output_shape,
            embedding_len: data.len(),
        })
    }

    fn run(&self, input: Array4<f32>) -> Result<(String, Vec<i64>, Vec<f32>)> {
        let input_tensor = Value::from_array(input)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("recognition session lock poisoned"))?;
        let outputs = session.run(ort::inputs![self.input_name.as_str() => input_tensor])?;

        let (name, (shape, data)) = match outputs.get(self.output_name.as_str()) {
            Some(value) => (self.output_name.clone(), value.try_extract_tensor::<f32>()?),
            None => {
                warn!(
                    "output '{}' not found, using the first model output",
                    self.output_name
                );
                ("output[0]".to_string(), outputs[0].try_extract_tensor::<f32>()?)
            }
        };

        // Expecting shape [1, 512]
        let embedding_size = if shape.len() == 2 {
            shape[1] as usize
        } else {
            data.len()
        };
        if embedding_size > data.len() {
            anyhow::bail!(
                "output '{}' declares {} values but holds {}",
                name,
                embedding_size,
                data.len()
            );
        }
        let shape_vec: Vec<i64> = shape.iter().copied().collect();
        Ok((name, shape_vec, data[..embedding_size].to_vec()))
    }
}

impl Embedder for ArcFace {
    fn preprocess(&self, image: &RgbImage) -> Result<Array4<f32>> {
        to_tensor(image, self.input_size)
    }

    fn infer(&self, input: Array4<f32>) -> Result<Vec<f32>> {
        let (name, shape, data) = self.run(input)?;
        debug!("inference output '{}' shape {:?}", name, shape);
        Ok(data)
    }
}

/// Convert an RGB image to a `[1, 3, size, size]` tensor in R, G, B plane
/// order with raw `[0, 255]` values, resizing when the dimensions differ.
pub fn to_tensor(image: &RgbImage, size: u32) -> Result<Array4<f32>> {
    let resized;
    let face_rgb = if image.dimensions() == (size, size) {
        image
    } else {
        resized =
            image::imageops::resize(image, size, size, image::imageops::FilterType::Triangle);
        &resized
    };

    let pixel_count = (size * size) as usize;
    let mut input_data = vec![0.0f32; 3 * pixel_count];

    let (r_channel, rest) = input_data.split_at_mut(pixel_count);
    let (g_channel, b_channel) = rest.split_at_mut(pixel_count);

    let pixels = face_rgb.as_raw();
    for i in 0..pixel_count {
        let idx = i * 3;
        r_channel[i] = pixels[idx] as f32;
        g_channel[i] = pixels[idx + 1] as f32;
        b_channel[i] = pixels[idx + 2] as f32;
    }

    let input_array = Array4::from_shape_vec((1, 3, size as usize, size as usize), input_data)?;
    Ok(input_array)
}
