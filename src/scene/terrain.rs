use glam::{Mat4, Vec2, Vec3};

use crate::asset::MeshData;
use crate::error::{RenderError, RenderResult};
use crate::renderer::device::{GraphicsDevice, MeshHandle, TextureHandle};
use crate::renderer::vertex::{v, Vertex};

/// Edge length of one terrain tile in world units.
pub const TERRAIN_SIZE: f32 = 800.0;
/// Largest height a heightmap pixel can encode, in either direction.
pub const MAX_HEIGHT: f32 = 40.0;
const MAX_PIXEL_COLOUR: f32 = 256.0 * 256.0 * 256.0;

/// The four ground textures blended by a terrain's blend map.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TerrainTexturePack {
    pub background: TextureHandle,
    pub r: TextureHandle,
    pub g: TextureHandle,
    pub b: TextureHandle,
}

/// Square grid of heights covering one terrain tile.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightField {
    vertex_count: usize,
    /// Indexed `[z * vertex_count + x]`.
    heights: Vec<f32>,
}

impl HeightField {
    /// Sample `height(local_x, local_z)` on a `vertex_count`² grid spanning
    /// the tile.
    pub fn from_fn(vertex_count: usize, height: impl Fn(f32, f32) -> f32) -> RenderResult<Self> {
        if vertex_count < 2 {
            return Err(RenderError::InvalidGeometry(format!(
                "height field needs at least 2 vertices per side, got {vertex_count}"
            )));
        }
        let step = TERRAIN_SIZE / (vertex_count - 1) as f32;
        let mut heights = Vec::with_capacity(vertex_count * vertex_count);
        for z in 0..vertex_count {
            for x in 0..vertex_count {
                heights.push(height(x as f32 * step, z as f32 * step));
            }
        }
        Ok(Self {
            vertex_count,
            heights,
        })
    }

    /// Decode a packed-RGB heightmap: the 24-bit colour is centred on its
    /// midpoint and scaled to ±[`MAX_HEIGHT`]. The image height sets the grid
    /// resolution.
    pub fn from_image(image: &image::RgbImage) -> RenderResult<Self> {
        let vertex_count = image.height() as usize;
        if image.width() < image.height() {
            return Err(RenderError::InvalidGeometry(format!(
                "heightmap is {}x{}, expected at least as wide as tall",
                image.width(),
                image.height()
            )));
        }
        let step = TERRAIN_SIZE / (vertex_count.max(2) - 1) as f32;
        Self::from_fn(vertex_count, |x, z| {
            let px = (x / step).round() as u32;
            let pz = (z / step).round() as u32;
            let [r, g, b] = image.get_pixel(px, pz).0;
            let packed = ((r as u32) << 16 | (g as u32) << 8 | b as u32) as f32;
            (packed / (MAX_PIXEL_COLOUR / 2.0) - 1.0) * MAX_HEIGHT
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Height at grid vertex (`x`, `z`), or `None` off the grid.
    pub fn get(&self, x: isize, z: isize) -> Option<f32> {
        let n = self.vertex_count as isize;
        if x < 0 || z < 0 || x >= n || z >= n {
            return None;
        }
        Some(self.heights[(z * n + x) as usize])
    }

    fn at(&self, x: usize, z: usize) -> f32 {
        self.heights[z * self.vertex_count + x]
    }

    fn grid_square_size(&self) -> f32 {
        TERRAIN_SIZE / (self.vertex_count - 1) as f32
    }

    /// Height at a tile-local position, interpolated across the grid triangle
    /// containing it. Zero outside the tile.
    pub fn height_at(&self, local_x: f32, local_z: f32) -> f32 {
        let square = self.grid_square_size();
        let grid_x = (local_x / square).floor();
        let grid_z = (local_z / square).floor();
        let last = (self.vertex_count - 1) as f32;
        if grid_x < 0.0 || grid_z < 0.0 || grid_x >= last || grid_z >= last {
            return 0.0;
        }
        let (gx, gz) = (grid_x as usize, grid_z as usize);
        let x_coord = (local_x - grid_x * square) / square;
        let z_coord = (local_z - grid_z * square) / square;
        let pos = Vec2::new(x_coord, z_coord);

        if x_coord <= 1.0 - z_coord {
            barycentric(
                Vec3::new(0.0, self.at(gx, gz), 0.0),
                Vec3::new(1.0, self.at(gx + 1, gz), 0.0),
                Vec3::new(0.0, self.at(gx, gz + 1), 1.0),
                pos,
            )
        } else {
            barycentric(
                Vec3::new(1.0, self.at(gx + 1, gz), 0.0),
                Vec3::new(1.0, self.at(gx + 1, gz + 1), 1.0),
                Vec3::new(0.0, self.at(gx, gz + 1), 1.0),
                pos,
            )
        }
    }

    /// Central-difference normal; edges clamp to the nearest vertex.
    fn normal(&self, x: usize, z: usize) -> Vec3 {
        let (xi, zi) = (x as isize, z as isize);
        let here = self.at(x, z);
        let left = self.get(xi - 1, zi).unwrap_or(here);
        let right = self.get(xi + 1, zi).unwrap_or(here);
        let down = self.get(xi, zi - 1).unwrap_or(here);
        let up = self.get(xi, zi + 1).unwrap_or(here);
        Vec3::new(left - right, 2.0, down - up).normalize()
    }

    /// Grid mesh in tile-local space. Triangles wind counter-clockwise seen
    /// from above.
    pub fn build_mesh(&self) -> MeshData {
        let n = self.vertex_count;
        let last = (n - 1) as f32;
        let mut vertices: Vec<Vertex> = Vec::with_capacity(n * n);
        for z in 0..n {
            for x in 0..n {
                let u = x as f32 / last;
                let w = z as f32 / last;
                let normal = self.normal(x, z);
                vertices.push(v(
                    [u * TERRAIN_SIZE, self.at(x, z), w * TERRAIN_SIZE],
                    normal.to_array(),
                    [u, w],
                    [1.0, 0.0, 0.0, 1.0],
                ));
            }
        }

        let mut indices = Vec::with_capacity(6 * (n - 1) * (n - 1));
        for gz in 0..n - 1 {
            for gx in 0..n - 1 {
                let top_left = (gz * n + gx) as u32;
                let top_right = top_left + 1;
                let bottom_left = ((gz + 1) * n + gx) as u32;
                let bottom_right = bottom_left + 1;
                indices.extend_from_slice(&[
                    top_left,
                    bottom_left,
                    top_right,
                    top_right,
                    bottom_left,
                    bottom_right,
                ]);
            }
        }
        MeshData::new(vertices, indices)
    }
}

fn barycentric(p1: Vec3, p2: Vec3, p3: Vec3, pos: Vec2) -> f32 {
    let det = (p2.z - p3.z) * (p1.x - p3.x) + (p3.x - p2.x) * (p1.z - p3.z);
    let l1 = ((p2.z - p3.z) * (pos.x - p3.x) + (p3.x - p2.x) * (pos.y - p3.z)) / det;
    let l2 = ((p3.z - p1.z) * (pos.x - p3.x) + (p1.x - p3.x) * (pos.y - p3.z)) / det;
    let l3 = 1.0 - l1 - l2;
    l1 * p1.y + l2 * p2.y + l3 * p3.y
}

/// One tile of ground at grid cell (`grid_x`, `grid_z`).
#[derive(Clone, Debug)]
pub struct Terrain {
    pub grid_x: i32,
    pub grid_z: i32,
    pub x: f32,
    pub z: f32,
    pub textures: TerrainTexturePack,
    pub blend_map: TextureHandle,
    pub mesh: MeshHandle,
    pub heights: HeightField,
}

impl Terrain {
    /// Build the tile's mesh from `heights` and upload it.
    pub fn new(
        device: &mut dyn GraphicsDevice,
        grid_x: i32,
        grid_z: i32,
        textures: TerrainTexturePack,
        blend_map: TextureHandle,
        heights: HeightField,
    ) -> RenderResult<Self> {
        let mesh = device.create_mesh(
            &format!("Terrain({grid_x},{grid_z})"),
            &heights.build_mesh(),
        )?;
        Ok(Self::from_parts(
            grid_x, grid_z, mesh, textures, blend_map, heights,
        ))
    }

    pub fn from_parts(
        grid_x: i32,
        grid_z: i32,
        mesh: MeshHandle,
        textures: TerrainTexturePack,
        blend_map: TextureHandle,
        heights: HeightField,
    ) -> Self {
        Self {
            grid_x,
            grid_z,
            x: grid_x as f32 * TERRAIN_SIZE,
            z: grid_z as f32 * TERRAIN_SIZE,
            textures,
            blend_map,
            mesh,
            heights,
        }
    }

    pub fn transformation_matrix(&self) -> Mat4 {
        Mat4::from_translation(Vec3::new(self.x, 0.0, self.z))
    }

    /// Ground height at a world position, or zero when it lies off this tile.
    pub fn height_at(&self, world_x: f32, world_z: f32) -> f32 {
        self.heights.height_at(world_x - self.x, world_z - self.z)
    }
}
