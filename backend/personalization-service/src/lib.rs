pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod jobs;
pub mod models;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::{AppError, Result};

// Re-export the service surface consumed by the API layer
pub use services::{ChatMemoryService, ProfileService, RecommendService, SignalStore};
