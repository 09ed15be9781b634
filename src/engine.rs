use std::path::Path;
use std::sync::Arc;

use ndarray::{ArrayD, CowArray, IxDyn};
use ort::environment::Environment;
use ort::session::Session;
use ort::tensor::OrtOwnedTensor;
use ort::value::Value;
use ort::{GraphOptimizationLevel, OrtError, SessionBuilder};

use crate::types::EngineConfig;

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("ORT error: {0}")]
    Ort(#[from] OrtError),

    #[error("Image processing error: {0}")]
    Image(String),

    #[error("Invalid model output shape: {0}")]
    InvalidOutputShape(String),

    #[error("Preprocess error: {0}")]
    Preprocess(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<image::ImageError> for EngineError {
    fn from(err: image::ImageError) -> Self {
        EngineError::Image(err.to_string())
    }
}

/// The detection network, seen only through its forward pass.
///
/// EAST produces two tensors per invocation: a score map and a geometry map.
/// `forward` returns the raw outputs in the order the model declares them.
/// The session handle is `Send` but not `Sync`; concurrent use across threads
/// needs one instance per worker or external synchronization.
pub trait Backend: Send {
    fn forward(&self, input: ArrayD<f32>) -> Result<Vec<ArrayD<f32>>, EngineError>;
}

pub struct OrtSession {
    #[allow(dead_code)]
    env: Arc<Environment>,
    session: Session,
}

impl OrtSession {
    pub fn from_file(model_path: &Path, engine_cfg: &EngineConfig) -> Result<Self, EngineError> {
        let env = Environment::builder()
            .with_name("textspot")
            .build()?
            .into_arc();

        let mut builder = SessionBuilder::new(&env)?
            .with_optimization_level(GraphOptimizationLevel::Level3)?;

        if engine_cfg.intra_op_num_threads > 0 {
            builder = builder.with_intra_threads(engine_cfg.intra_op_num_threads as i16)?;
        }

        if engine_cfg.inter_op_num_threads > 0 {
            builder = builder.with_inter_threads(engine_cfg.inter_op_num_threads as i16)?;
        }

        let session = builder.with_model_from_file(model_path)?;

        Ok(Self { env, session })
    }
}

impl Backend for OrtSession {
    fn forward(&self, input: ArrayD<f32>) -> Result<Vec<ArrayD<f32>>, EngineError> {
        let allocator = self.session.allocator();

        let cow: CowArray<'_, f32, IxDyn> = CowArray::from(input);
        let input_value = Value::from_array(allocator, &cow)?;

        let outputs = self.session.run(vec![input_value])?;
        if outputs.is_empty() {
            return Err(EngineError::InvalidOutputShape(
                "model produced no outputs".to_string(),
            ));
        }

        let mut tensors = Vec::with_capacity(outputs.len());
        for output in outputs {
            let tensor: OrtOwnedTensor<f32, IxDyn> = output.try_extract()?;
            tensors.push(tensor.view().to_owned());
        }
        Ok(tensors)
    }
}
