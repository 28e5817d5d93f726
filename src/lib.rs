pub mod config;
pub mod report;
pub mod runner;

// Re-export vision types for convenience
pub use facematrix_vision::{
    compare, embedder, face, matrix, model, source, ArcFace, CompareError, Embedder, Embedding,
    Matrices,
};
