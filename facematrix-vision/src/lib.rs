pub mod compare;
pub mod embedder;
pub mod face;
pub mod matrix;
pub mod model;
pub mod source;

// Re-export commonly used types
pub use compare::CompareError;
pub use embedder::{embed_image, Embedder};
pub use face::{ArcFace, Embedding, ModelProbe};
pub use matrix::{compute_matrices, Matrices, NoProgress, Progress};
pub use model::ModelOptions;
pub use source::SourceImage;
