//! Model mapping: resolve requested model names to ones an upstream provider serves.

pub mod default;
pub mod load;
pub mod resolve;
pub mod types;

pub use load::*;
pub use resolve::*;
pub use types::*;

/// Resolvers for every supported provider.
#[derive(Debug, Clone)]
pub struct ModelMap {
    pub groq: ModelResolver,
    pub cohere: ModelResolver,
}
