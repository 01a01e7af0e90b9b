pub mod error;
pub mod job;
pub mod partition;
pub mod poll;
pub mod predict;
pub mod reconcile;
pub mod records;
pub mod services;
pub mod status;
pub mod trainer;
pub mod version;

#[cfg(test)]
pub(crate) mod testing;

pub use error::RetrainError;
pub use predict::Predictor;
pub use trainer::Trainer;
