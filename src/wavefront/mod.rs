use super::*;

pub mod sampling;

mod aabb;
mod bvh;
mod camera;
mod geom;
mod intersect;
mod material;
mod path;
mod ray;
mod triangle;

use aabb::*;
use ray::*;

pub use camera::Camera;
pub use geom::{Geom, GeomKind};
pub use material::Material;
pub use path::{Intersection, PathSegment};
pub use triangle::Triangle;

pub(crate) const RUSSIAN_ROULETTE_MIN_DEPTH: u32 = 3;

//
// Scene
//

// Read-only scene arrays, built once at init and shared by every kernel.
pub struct Scene {
    pub geoms: Vec<Geom>,
    pub triangles: Vec<Triangle>,
    pub bvh_nodes: Vec<bvh::Node>,
    pub materials: Vec<Material>,
    pub camera: Camera,
}

impl Scene {
    pub fn create(desc: &scene::SceneDescription) -> Result<Self> {
        ensure!(!desc.materials.is_empty(), "Scene has no materials");
        if !desc.materials.iter().any(Material::is_emissive) {
            warn!("Scene has no emissive material; the render will be black");
        }

        // Flatten mesh triangles into one array and build a BVH per mesh.
        // The builder reorders each mesh's slice so leaves address
        // contiguous global ranges.
        let triangle_count = desc.meshes.iter().map(Vec::len).sum::<usize>();
        let mut triangles: Vec<Triangle> = Vec::with_capacity(triangle_count);
        let mut bvh_nodes = Vec::new();
        let mut mesh_ranges = Vec::with_capacity(desc.meshes.len());
        for mesh in &desc.meshes {
            ensure!(!mesh.is_empty(), "Mesh has no triangles");
            let tri_start = triangles.len() as u32;
            triangles.extend_from_slice(mesh);
            let tri_end = triangles.len() as u32;
            let bvh_root = bvh::build(
                &mut bvh_nodes,
                &mut triangles[tri_start as usize..],
                tri_start,
            );
            mesh_ranges.push((tri_start, tri_end, bvh_root));
        }

        let mut geoms = Vec::with_capacity(desc.objects.len());
        for object in &desc.objects {
            ensure!(
                (object.material as usize) < desc.materials.len(),
                "Object references material {} out of {}",
                object.material,
                desc.materials.len()
            );
            let kind = match object.shape {
                scene::ShapeDesc::Cube => GeomKind::Cube,
                scene::ShapeDesc::Sphere => GeomKind::Sphere,
                scene::ShapeDesc::Mesh(mesh_index) => {
                    let (tri_start, tri_end, bvh_root) = *mesh_ranges
                        .get(mesh_index)
                        .context("Object references a missing mesh")?;
                    GeomKind::Mesh {
                        tri_start,
                        tri_end,
                        bvh_root,
                    }
                }
            };
            geoms.push(Geom::new(
                kind,
                object.material,
                object.translation,
                object.rotation_deg,
                object.scale,
            )?);
        }

        info!(
            "Created scene: {} geoms, {} materials, {} triangles, {} BVH nodes",
            geoms.len(),
            desc.materials.len(),
            triangles.len(),
            bvh_nodes.len()
        );

        Ok(Self {
            geoms,
            triangles,
            bvh_nodes,
            materials: desc.materials.clone(),
            camera: desc.camera.clone(),
        })
    }
}

//
// Renderer
//

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderToggles {
    pub sort_by_material: bool,
    pub stream_compact: bool,
    pub cache_first_intersection: bool,
    pub enable_bvh: bool,
    pub enable_russian_roulette: bool,
    pub enable_hdr_gamma_correction: bool,
}

impl Default for RenderToggles {
    fn default() -> Self {
        Self {
            sort_by_material: false,
            stream_compact: false,
            cache_first_intersection: false,
            enable_bvh: true,
            enable_russian_roulette: true,
            enable_hdr_gamma_correction: true,
        }
    }
}

// Opaque render handle: owns the scene arrays, the path/intersection pools
// and the progressive image. Everything is sized once at init; iterations
// never allocate.
pub struct Renderer {
    scene: Scene,
    toggles: RenderToggles,
    trace_depth: u32,
    paths: Vec<PathSegment>,
    intersections: Vec<Intersection>,
    scratch_paths: Vec<PathSegment>,
    scratch_intersections: Vec<Intersection>,
    sort_order: Vec<usize>,
    first_bounce_cache: Option<Vec<Intersection>>,
    image: Vec<ColorRgb>,
    rays_traced: u64,
}

impl Renderer {
    pub fn new(desc: &scene::SceneDescription, toggles: RenderToggles) -> Result<Self> {
        ensure!(desc.trace_depth > 0, "Trace depth must be positive");
        let scene = Scene::create(desc)?;

        let (width, height) = scene.camera.resolution;
        let pixel_count = width as usize * height as usize;
        let paths = alloc_pool(pixel_count, PathSegment::default())?;
        let intersections = alloc_pool(pixel_count, Intersection::MISS)?;
        let scratch_paths = alloc_pool(pixel_count, PathSegment::default())?;
        let scratch_intersections = alloc_pool(pixel_count, Intersection::MISS)?;
        let mut sort_order = alloc_pool(pixel_count, 0_usize)?;
        sort_order.clear();
        let image = alloc_pool(pixel_count, ColorRgb::BLACK)?;
        info!("Allocated path pools for {width}x{height} ({pixel_count} paths)");

        Ok(Self {
            scene,
            toggles,
            trace_depth: desc.trace_depth,
            paths,
            intersections,
            scratch_paths,
            scratch_intersections,
            sort_order,
            first_bounce_cache: None,
            image,
            rays_traced: 0,
        })
    }

    // Runs iterations 1..=`iterations`, checking `stop` before each one;
    // cancellation lands on an iteration boundary so the partial image stays
    // a valid running mean. Returns the number of completed iterations.
    pub fn render(
        &mut self,
        iterations: u32,
        stop: &AtomicBool,
        mut on_iteration: impl FnMut(u32),
    ) -> u32 {
        let mut completed = 0;
        for iteration in 1..=iterations {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            self.render_iteration(iteration);
            completed = iteration;
            on_iteration(iteration);
        }
        completed
    }

    // One complete camera-to-image pass: one radiance sample per pixel,
    // folded into the running mean. `iteration` is 1-based and keys the
    // sample streams.
    pub fn render_iteration(&mut self, iteration: u32) {
        debug_assert!(iteration >= 1);
        let pixel_count = self.image.len();
        let trace_depth = self.trace_depth;
        // The first-bounce cache is only valid for reproducible primary
        // rays, so it pins the pixel and lens samples.
        let stochastic = !self.toggles.cache_first_intersection;

        // Generate camera rays for every pixel.
        {
            let camera = &self.scene.camera;
            self.paths
                .par_iter_mut()
                .enumerate()
                .for_each(|(index, path)| {
                    let pixel_index = index as u32;
                    let mut sampler =
                        sampling::PathSampler::seeded(iteration, pixel_index, trace_depth);
                    *path = PathSegment {
                        ray: camera.generate_ray(pixel_index, &mut sampler, stochastic),
                        throughput: ColorRgb::WHITE,
                        color: ColorRgb::BLACK,
                        pixel_index,
                        remaining_bounces: trace_depth,
                    };
                });
        }

        // Bounce until every path has terminated or the depth limit is
        // reached. Each stage is a bulk-synchronous kernel over the pool.
        let mut active = pixel_count;
        let mut live = pixel_count;
        let mut depth = 0;
        while depth < trace_depth && live > 0 {
            self.rays_traced += live as u64;
            self.compute_intersections(iteration, depth, active);
            if self.toggles.sort_by_material {
                self.sort_by_material(active);
            }
            self.shade(iteration, depth, active);
            if self.toggles.stream_compact {
                live = self.compact(active);
                active = live;
            } else {
                live = self.paths[..active]
                    .iter()
                    .filter(|path| path.alive())
                    .count();
            }
            depth += 1;
        }
        debug_assert!(self.paths.iter().all(|path| !path.alive()));

        // Fold the per-path colors into the progressive image. Compaction
        // permutes the pool, so address pixels through the segments.
        let weight = 1.0 / iteration as f32;
        for path in &self.paths {
            let pixel = path.pixel_index as usize;
            self.image[pixel] = lerp_color(&self.image[pixel], &path.color, weight);
        }
        debug!("Iteration {iteration}: {depth} bounces, {live} paths live at exit");
    }

    fn compute_intersections(&mut self, iteration: u32, depth: u32, active: usize) {
        let cache_stage = self.toggles.cache_first_intersection && depth == 0;
        if cache_stage && iteration > 1 {
            if let Some(cache) = &self.first_bounce_cache {
                self.intersections[..active].copy_from_slice(cache);
                return;
            }
        }

        let scene = &self.scene;
        let use_bvh = self.toggles.enable_bvh;
        self.paths[..active]
            .par_iter()
            .zip(self.intersections[..active].par_iter_mut())
            .for_each(|(path, intersection)| {
                *intersection = if path.alive() {
                    geom::intersect_scene(
                        &path.ray,
                        &scene.geoms,
                        &scene.triangles,
                        &scene.bvh_nodes,
                        use_bvh,
                    )
                } else {
                    Intersection::MISS
                };
            });

        if cache_stage && iteration == 1 {
            self.first_bounce_cache = Some(self.intersections[..active].to_vec());
        }
    }

    // Stable key sort applied jointly to both pools, so paths hitting the
    // same material shade back to back. Misses sort last.
    fn sort_by_material(&mut self, active: usize) {
        use itertools::Itertools;

        let intersections = &self.intersections;
        self.sort_order.clear();
        self.sort_order.extend((0..active).sorted_by_key(|&index| {
            let intersection = &intersections[index];
            if intersection.is_hit() {
                intersection.material
            } else {
                u32::MAX
            }
        }));
        for (dst, &src) in self.sort_order.iter().enumerate() {
            self.scratch_paths[dst] = self.paths[src];
            self.scratch_intersections[dst] = self.intersections[src];
        }
        self.paths[..active].copy_from_slice(&self.scratch_paths[..active]);
        self.intersections[..active].copy_from_slice(&self.scratch_intersections[..active]);
    }

    fn shade(&mut self, iteration: u32, depth: u32, active: usize) {
        let materials = &self.scene.materials;
        let russian_roulette = self.toggles.enable_russian_roulette;
        self.paths[..active]
            .par_iter_mut()
            .zip(self.intersections[..active].par_iter())
            .for_each(|(path, intersection)| {
                if !path.alive() {
                    return;
                }
                let mut sampler =
                    sampling::PathSampler::seeded(iteration, path.pixel_index, depth);
                material::scatter(
                    path,
                    intersection,
                    materials,
                    &mut sampler,
                    russian_roulette,
                    depth,
                );
            });
    }

    // Stable partition: live paths first, terminated paths after (they keep
    // their colors for accumulation). Returns the live count.
    fn compact(&mut self, active: usize) -> usize {
        let live = self.paths[..active]
            .iter()
            .filter(|path| path.alive())
            .count();
        let mut front = 0;
        let mut back = live;
        for index in 0..active {
            let path = self.paths[index];
            if path.alive() {
                self.scratch_paths[front] = path;
                front += 1;
            } else {
                self.scratch_paths[back] = path;
                back += 1;
            }
        }
        self.paths[..active].copy_from_slice(&self.scratch_paths[..active]);
        live
    }

    // The linear HDR image; after iteration N this is the mean of the N
    // per-iteration estimates.
    pub fn image(&self) -> &[ColorRgb] {
        &self.image
    }

    pub fn camera(&self) -> &Camera {
        &self.scene.camera
    }

    pub fn rays_traced(&self) -> u64 {
        self.rays_traced
    }

    // Writes the display image as 8-bit RGBA. The in-memory image stays
    // linear; Reinhard + gamma is applied on the way out when enabled.
    pub fn present(&self, pixel_buffer: &mut [u8]) {
        assert_eq!(pixel_buffer.len(), 4 * self.image.len());
        let tonemap = self.toggles.enable_hdr_gamma_correction;
        pixel_buffer
            .par_chunks_exact_mut(4)
            .zip(self.image.par_iter())
            .for_each(|(dst, color)| {
                let color = if tonemap {
                    color.tonemap().gamma_correct()
                } else {
                    color.clamp()
                };
                dst.copy_from_slice(&color.to_rgba8());
            });
    }
}

fn alloc_pool<T: Clone>(len: usize, value: T) -> Result<Vec<T>> {
    let mut pool = Vec::new();
    pool.try_reserve_exact(len)
        .context("Failed to allocate render pool")?;
    pool.resize(len, value);
    Ok(pool)
}

//
// Tests
//
