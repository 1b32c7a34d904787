pub mod camera;
pub mod entity;
pub mod light;
pub mod scene;
pub mod terrain;
pub mod water;

pub use camera::Camera;
pub use entity::Entity;
pub use light::Light;
pub use scene::Scene;
pub use terrain::{HeightField, Terrain, TerrainTexturePack, TERRAIN_SIZE};
pub use water::{WaterTile, TILE_SIZE};
