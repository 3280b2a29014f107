pub mod engine;
pub mod shader;
pub mod texture;
pub mod vertex;

pub use engine::GraphicsEngine;
pub use shader::PresentPipeline;
pub use texture::FrameTexture;
pub use vertex::{Vertex, VertexBuffer};
