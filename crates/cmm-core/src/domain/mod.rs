//! Domain value objects.

mod model;

pub use model::{
    Dependency, ImageMeta, ImageResource, ImageStats, ModelImage, ModelInfo, ModelStats, ModelType,
};
