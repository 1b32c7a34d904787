pub mod cache;
pub mod handle;
pub mod mesh;
pub mod resource;

pub use cache::AssetCache;
pub use handle::Handle;
pub use mesh::MeshData;
pub use resource::VisualResource;

/// Library of visual resources referenced by entities.
pub type Resources = AssetCache<VisualResource>;
