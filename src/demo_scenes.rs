use glam::Vec3;
use image::{Rgba, RgbaImage};
use log::info;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use wgpu_lakeside::app::SceneSetup;
use wgpu_lakeside::asset::{MeshData, VisualResource};
use wgpu_lakeside::error::RenderResult;
use wgpu_lakeside::renderer::{GraphicsDevice, WaterTextures};
use wgpu_lakeside::scene::{
    Camera, Entity, HeightField, Light, Scene, Terrain, TerrainTexturePack, WaterTile,
    TERRAIN_SIZE,
};

const SEED: u64 = 5666778;
const TEXTURE_SIZE: u32 = 256;
const HEIGHT_SAMPLES: usize = 128;

const LAKE_CENTER: Vec3 = Vec3::new(475.0, 0.0, -475.0);
const ORBIT_DISTANCE: f32 = 140.0;
const ORBIT_PITCH: f32 = 20.0;
const ORBIT_DEGREES_PER_SECOND: f32 = 6.0;
const SPIN_DEGREES_PER_SECOND: f32 = 60.0;

/// Terrain tile with a lake, foliage scattered around the shore, a lamp,
/// and spinning normal-mapped crates at the water's edge.
#[derive(Default)]
pub struct LakesideScene {
    spinning: Vec<usize>,
    orbit_angle: f32,
}

impl SceneSetup for LakesideScene {
    fn build(&mut self, device: &mut dyn GraphicsDevice) -> RenderResult<(Scene, WaterTextures)> {
        info!("Creating lakeside scene...");
        let mut rng = SmallRng::seed_from_u64(SEED);

        let sun = Light::new(Vec3::new(10000.0, 10000.0, -10000.0), Vec3::splat(1.3));
        let camera = Camera::orbiting(LAKE_CENTER, ORBIT_DISTANCE, ORBIT_PITCH, 0.0);
        let mut scene = Scene::new(sun, camera);

        let terrain = build_terrain(device, &mut rng)?;

        let fern = scene.add_resource(
            VisualResource::new(
                device.create_mesh("Fern", &MeshData::crossed_quads(4.0, 3.0))?,
                device.create_texture("FernAtlas", &foliage_atlas(&mut rng))?,
            )
            .with_transparency()
            .with_atlas_rows(2),
        );
        let pine = scene.add_resource(
            VisualResource::new(
                device.create_mesh("Pine", &MeshData::crossed_quads(8.0, 14.0))?,
                device.create_texture("Pine", &pine_texture(&mut rng))?,
            )
            .with_transparency(),
        );
        let lamp = scene.add_resource(
            VisualResource::new(
                device.create_mesh("Lamp", &MeshData::cube())?,
                device.create_texture("Lamp", &noise_texture(&mut rng, [230, 220, 170], 12))?,
            )
            .with_fake_lighting(),
        );
        let crate_resource = scene.add_resource(
            VisualResource::new(
                device.create_mesh("Crate", &MeshData::cube())?,
                device.create_texture("Crate", &plank_texture(&mut rng))?,
            )
            .with_normal_map(device.create_texture("CrateNormal", &plank_normals())?)
            .with_specular(10.0, 0.5),
        );

        for i in 0..60 {
            if i % 3 == 0 {
                if let Some((x, z)) = shore_position(&mut rng) {
                    let y = terrain.height_at(x, z);
                    scene.add_entity(
                        Entity::new(fern, Vec3::new(x, y, z))
                            .with_atlas_index(rng.gen_range(0..4))
                            .with_rotation(Vec3::new(0.0, rng.gen::<f32>() * 360.0, 0.0))
                            .with_scale(0.9),
                    );
                }
            }
            if i % 2 == 0 {
                if let Some((x, z)) = shore_position(&mut rng) {
                    let y = terrain.height_at(x, z);
                    scene.add_entity(
                        Entity::new(pine, Vec3::new(x, y, z))
                            .with_rotation(Vec3::new(0.0, rng.gen::<f32>() * 360.0, 0.0))
                            .with_scale(rng.gen::<f32>() * 0.6 + 0.8),
                    );
                }
            }
        }

        let lamp_position = LAKE_CENTER + Vec3::new(-70.0, 0.0, 40.0);
        let lamp_ground = terrain.height_at(lamp_position.x, lamp_position.z);
        scene.add_entity(
            Entity::new(lamp, Vec3::new(lamp_position.x, lamp_ground + 4.0, lamp_position.z))
                .with_non_uniform_scale(Vec3::new(0.4, 4.0, 0.4)),
        );
        scene.add_light(
            Light::new(
                Vec3::new(lamp_position.x, lamp_ground + 9.0, lamp_position.z),
                Vec3::new(2.0, 2.0, 0.0),
            )
            .with_attenuation(Vec3::new(1.0, 0.01, 0.002)),
        );

        for offset in [-12.0, 0.0, 12.0] {
            let x = LAKE_CENTER.x + offset;
            let z = LAKE_CENTER.z + 75.0;
            let y = terrain.height_at(x, z) + 3.0;
            self.spinning.push(scene.add_entity(
                Entity::new(crate_resource, Vec3::new(x, y, z)).with_scale(3.0),
            ));
        }

        scene.terrains.push(terrain);
        scene
            .water_tiles
            .push(WaterTile::new(LAKE_CENTER.x, LAKE_CENTER.z, 0.0));

        let water = WaterTextures {
            dudv: device.create_texture("WaterDuDv", &dudv_texture(&mut rng))?,
            normal: device.create_texture("WaterNormal", &water_normals(&mut rng))?,
        };

        info!(
            "Lakeside scene: {} entities, {} lights, {} water tiles",
            scene.entities.len(),
            scene.lights().len(),
            scene.water_tiles.len()
        );
        Ok((scene, water))
    }

    fn update(&mut self, scene: &mut Scene, delta_seconds: f32) {
        for &index in &self.spinning {
            if let Some(entity) = scene.entities.get_mut(index) {
                entity.increase_rotation(Vec3::new(0.0, SPIN_DEGREES_PER_SECOND * delta_seconds, 0.0));
            }
        }
        self.orbit_angle = (self.orbit_angle + ORBIT_DEGREES_PER_SECOND * delta_seconds) % 360.0;
        scene.camera = Camera::orbiting(LAKE_CENTER, ORBIT_DISTANCE, ORBIT_PITCH, self.orbit_angle);
        let ground = scene.height_at(scene.camera.position.x, scene.camera.position.z);
        scene.camera.position.y = scene.camera.position.y.max(ground + 2.0);
    }
}

fn build_terrain(device: &mut dyn GraphicsDevice, rng: &mut SmallRng) -> RenderResult<Terrain> {
    let lake_x = LAKE_CENTER.x;
    let lake_z = LAKE_CENTER.z + TERRAIN_SIZE;
    let heights = HeightField::from_fn(HEIGHT_SAMPLES, |x, z| {
        let hills = 6.0 * (x * 0.02).sin() * (z * 0.017).cos() + 3.0 * (x * 0.05 + z * 0.03).sin();
        let dx = x - lake_x;
        let dz = z - lake_z;
        let basin = 16.0 * (-(dx * dx + dz * dz) / (90.0 * 90.0)).exp();
        hills + 4.0 - basin
    })?;

    let textures = TerrainTexturePack {
        background: device.create_texture("Grass", &noise_texture(rng, [70, 120, 40], 25))?,
        r: device.create_texture("Mud", &noise_texture(rng, [95, 70, 45], 20))?,
        g: device.create_texture("GrassFlowers", &flower_texture(rng))?,
        b: device.create_texture("Path", &noise_texture(rng, [150, 135, 105], 18))?,
    };
    let blend_map = device.create_texture("BlendMap", &blend_map(&heights))?;
    Terrain::new(device, 0, -1, textures, blend_map, heights)
}

/// Somewhere near the lake but off the water itself.
fn shore_position(rng: &mut SmallRng) -> Option<(f32, f32)> {
    let x = LAKE_CENTER.x + rng.gen::<f32>() * 300.0 - 150.0;
    let z = LAKE_CENTER.z + rng.gen::<f32>() * 300.0 - 150.0;
    let on_water = (x - LAKE_CENTER.x).abs() < 70.0 && (z - LAKE_CENTER.z).abs() < 70.0;
    (!on_water).then_some((x, z))
}

/// Tileable value noise sampled at `(u, v)` in 0..1.
struct ValueNoise {
    cells: usize,
    values: Vec<f32>,
}

impl ValueNoise {
    fn new(rng: &mut SmallRng, cells: usize) -> Self {
        Self {
            cells,
            values: (0..cells * cells).map(|_| rng.gen()).collect(),
        }
    }

    fn sample(&self, u: f32, v: f32) -> f32 {
        let n = self.cells;
        let fx = u.rem_euclid(1.0) * n as f32;
        let fz = v.rem_euclid(1.0) * n as f32;
        let (x0, z0) = (fx as usize % n, fz as usize % n);
        let (x1, z1) = ((x0 + 1) % n, (z0 + 1) % n);
        let smooth = |t: f32| t * t * (3.0 - 2.0 * t);
        let (tx, tz) = (smooth(fx.fract()), smooth(fz.fract()));
        let at = |x: usize, z: usize| self.values[z * n + x];
        let top = at(x0, z0) + (at(x1, z0) - at(x0, z0)) * tx;
        let bottom = at(x0, z1) + (at(x1, z1) - at(x0, z1)) * tx;
        top + (bottom - top) * tz
    }

    fn octaves(&self, u: f32, v: f32) -> f32 {
        (self.sample(u, v) * 0.6 + self.sample(u * 2.0, v * 2.0) * 0.3 + self.sample(u * 4.0, v * 4.0) * 0.1)
            .clamp(0.0, 1.0)
    }
}

fn shade(base: [u8; 3], offset: f32) -> [u8; 3] {
    base.map(|c| (c as f32 + offset).clamp(0.0, 255.0) as u8)
}

fn noise_texture(rng: &mut SmallRng, base: [u8; 3], variance: u8) -> RgbaImage {
    let noise = ValueNoise::new(rng, 16);
    let size = TEXTURE_SIZE as f32;
    RgbaImage::from_fn(TEXTURE_SIZE, TEXTURE_SIZE, |x, y| {
        let n = noise.octaves(x as f32 / size, y as f32 / size) * 2.0 - 1.0;
        let [r, g, b] = shade(base, n * variance as f32);
        Rgba([r, g, b, 255])
    })
}

fn flower_texture(rng: &mut SmallRng) -> RgbaImage {
    let mut image = noise_texture(rng, [80, 125, 45], 20);
    for _ in 0..400 {
        let x = rng.gen_range(0..TEXTURE_SIZE);
        let y = rng.gen_range(0..TEXTURE_SIZE);
        let color = if rng.gen_bool(0.5) {
            [230, 220, 60]
        } else {
            [200, 80, 160]
        };
        image.put_pixel(x, y, Rgba([color[0], color[1], color[2], 255]));
    }
    image
}

/// Red marks mud around the shore, blue a path leading to the crates.
fn blend_map(heights: &HeightField) -> RgbaImage {
    let n = heights.vertex_count() as u32;
    let path_z = (LAKE_CENTER.z + TERRAIN_SIZE + 75.0) / TERRAIN_SIZE;
    RgbaImage::from_fn(n, n, |x, z| {
        let h = heights.get(x as isize, z as isize).unwrap_or(0.0);
        let mud = ((2.5 - h) / 2.5).clamp(0.0, 1.0);
        let v = z as f32 / (n - 1) as f32;
        let path = if (v - path_z).abs() < 0.008 { 1.0 } else { 0.0 };
        Rgba([(mud * 255.0) as u8, 0, (path * 255.0) as u8, 255])
    })
}

/// 2×2 atlas of leaf shapes in different greens.
fn foliage_atlas(rng: &mut SmallRng) -> RgbaImage {
    let half = TEXTURE_SIZE / 2;
    let tints = [[60, 130, 50], [80, 150, 40], [50, 110, 60], [100, 140, 50]];
    let noise = ValueNoise::new(rng, 8);
    RgbaImage::from_fn(TEXTURE_SIZE, TEXTURE_SIZE, |x, y| {
        let tile = (y / half * 2 + x / half) as usize;
        let u = (x % half) as f32 / half as f32 * 2.0 - 1.0;
        let v = 1.0 - (y % half) as f32 / half as f32;
        let fronds = (u * 9.0).sin().abs() * 0.35 + 0.65;
        let inside = u.abs() < fronds * v.sqrt() * (1.0 - v * 0.3);
        let [r, g, b] = shade(tints[tile], (noise.sample(u, v) - 0.5) * 40.0);
        Rgba([r, g, b, if inside { 255 } else { 0 }])
    })
}

fn pine_texture(rng: &mut SmallRng) -> RgbaImage {
    let noise = ValueNoise::new(rng, 12);
    let size = TEXTURE_SIZE as f32;
    RgbaImage::from_fn(TEXTURE_SIZE, TEXTURE_SIZE, |x, y| {
        let u = x as f32 / size * 2.0 - 1.0;
        let v = y as f32 / size;
        let trunk = v > 0.85 && u.abs() < 0.06;
        let tiers = (v * 5.0).fract() * 0.3 + 0.7;
        let canopy = v <= 0.85 && u.abs() < v * tiers;
        let n = (noise.sample(x as f32 / size, v) - 0.5) * 30.0;
        let [r, g, b] = if trunk {
            shade([90, 60, 35], n)
        } else {
            shade([30, 80, 40], n)
        };
        Rgba([r, g, b, if trunk || canopy { 255 } else { 0 }])
    })
}

const PLANKS: u32 = 4;

fn plank_texture(rng: &mut SmallRng) -> RgbaImage {
    let noise = ValueNoise::new(rng, 16);
    let size = TEXTURE_SIZE as f32;
    let plank = TEXTURE_SIZE / PLANKS;
    RgbaImage::from_fn(TEXTURE_SIZE, TEXTURE_SIZE, |x, y| {
        let grain = noise.sample(x as f32 / size * 0.5, y as f32 / size * 6.0);
        let gap = y % plank < 3;
        let [r, g, b] = shade([160, 115, 70], (grain - 0.5) * 50.0 - if gap { 60.0 } else { 0.0 });
        Rgba([r, g, b, 255])
    })
}

/// Tangent-space normals tilting toward the grooves between planks.
fn plank_normals() -> RgbaImage {
    let plank = TEXTURE_SIZE / PLANKS;
    RgbaImage::from_fn(TEXTURE_SIZE, TEXTURE_SIZE, |_, y| {
        let n = match y % plank {
            0 => Vec3::new(0.0, 0.6, 0.8),
            2 => Vec3::new(0.0, -0.6, 0.8),
            _ => Vec3::Z,
        };
        encode_normal(n)
    })
}

fn dudv_texture(rng: &mut SmallRng) -> RgbaImage {
    let du = ValueNoise::new(rng, 8);
    let dv = ValueNoise::new(rng, 8);
    let size = TEXTURE_SIZE as f32;
    RgbaImage::from_fn(TEXTURE_SIZE, TEXTURE_SIZE, |x, y| {
        let (u, v) = (x as f32 / size, y as f32 / size);
        Rgba([(du.octaves(u, v) * 255.0) as u8, (dv.octaves(u, v) * 255.0) as u8, 0, 255])
    })
}

/// Normals from the gradient of a tileable height noise.
fn water_normals(rng: &mut SmallRng) -> RgbaImage {
    let height = ValueNoise::new(rng, 8);
    let size = TEXTURE_SIZE as f32;
    let texel = 1.0 / size;
    RgbaImage::from_fn(TEXTURE_SIZE, TEXTURE_SIZE, |x, y| {
        let (u, v) = (x as f32 / size, y as f32 / size);
        let dx = height.octaves(u + texel, v) - height.octaves(u - texel, v);
        let dy = height.octaves(u, v + texel) - height.octaves(u, v - texel);
        encode_normal(Vec3::new(-dx * 40.0, -dy * 40.0, 1.0).normalize())
    })
}

fn encode_normal(n: Vec3) -> Rgba<u8> {
    let n = n.normalize() * 0.5 + Vec3::splat(0.5);
    Rgba([
        (n.x * 255.0) as u8,
        (n.y * 255.0) as u8,
        (n.z * 255.0) as u8,
        255,
    ])
}
