use super::*;

// Semantic material kinds. The scene file's reflective/refractive flag soup
// collapses into one variant each at load time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Material {
    Diffuse { base_color: ColorRgb },
    Mirror { specular_color: ColorRgb },
    Dielectric { specular_color: ColorRgb, ior: f32 },
    Emissive { base_color: ColorRgb, emittance: f32 },
}

impl Material {
    pub fn is_emissive(&self) -> bool {
        matches!(self, Self::Emissive { .. })
    }
}

// Applies one surface interaction to a live path: either terminates it
// (light hit, miss, roulette) or attenuates the throughput and writes the
// next ray into its slot. `depth` is the zero-based bounce index.
pub fn scatter(
    path: &mut PathSegment,
    intersection: &Intersection,
    materials: &[Material],
    sampler: &mut sampling::PathSampler,
    russian_roulette: bool,
    depth: u32,
) {
    debug_assert!(path.alive());

    // Escaped rays contribute nothing.
    if !intersection.is_hit() {
        path.terminate(ColorRgb::BLACK);
        return;
    }

    let normal = intersection.normal;
    let material = &materials[intersection.material as usize];
    let next_dir = match *material {
        Material::Emissive {
            base_color,
            emittance,
        } => {
            path.terminate(base_color * emittance * path.throughput);
            return;
        }
        Material::Diffuse { base_color } => {
            // Cosine-weighted sampling: the cosine and 1/pi cancel against
            // the pdf, leaving the albedo as the whole throughput update.
            let oriented = if path.ray.dir.dot(&normal) > 0.0 {
                -normal
            } else {
                normal
            };
            let onb = sampling::OrthonormalBasis::new(&oriented);
            let local = sampling::sample_hemisphere_cosine(sampler.sample(), sampler.sample());
            path.throughput *= base_color;
            onb.world_from_local(&local).normalize()
        }
        Material::Mirror { specular_color } => {
            path.throughput *= specular_color;
            reflect_vector(&path.ray.dir, &normal)
        }
        Material::Dielectric {
            specular_color,
            ior,
        } => {
            // `normal` is the outward geometric normal, so its sign against
            // the ray distinguishes entering from exiting.
            let entering = path.ray.dir.dot(&normal) < 0.0;
            let (eta_i, eta_t) = if entering { (1.0, ior) } else { (ior, 1.0) };
            let oriented = if entering { normal } else { -normal };
            let cos_i = (-path.ray.dir.dot(&oriented)).clamp(0.0, 1.0);

            // Schlick's approximation of the Fresnel reflectance.
            let r0 = ((eta_i - eta_t) / (eta_i + eta_t)).powi(2);
            let reflectance = r0 + (1.0 - r0) * (1.0 - cos_i).powi(5);

            path.throughput *= specular_color;
            if sampler.sample() < reflectance {
                reflect_vector(&path.ray.dir, &oriented)
            } else {
                // Total internal reflection falls back to the mirror branch.
                refract_vector(&path.ray.dir, &oriented, eta_i / eta_t)
                    .unwrap_or_else(|| reflect_vector(&path.ray.dir, &oriented))
            }
        }
    };

    // Anything non-finite or negative would poison the image; kill the path
    // with zero contribution instead.
    let dir_finite = next_dir.iter().all(|component| component.is_finite());
    if !path.throughput.is_finite() || path.throughput.min_channel() < 0.0 || !dir_finite {
        path.terminate(ColorRgb::BLACK);
        return;
    }

    // Spawn the continuation ray nudged off the surface.
    let hit_point = path.ray.point_at(intersection.t);
    let offset = if next_dir.dot(&normal) >= 0.0 {
        EPSILON
    } else {
        -EPSILON
    };
    path.ray = Ray::new(hit_point + offset * normal, next_dir);
    path.remaining_bounces -= 1;

    // Unbiased early termination once a path has attenuated enough to be
    // cheap to kill.
    if russian_roulette && path.alive() && depth >= RUSSIAN_ROULETTE_MIN_DEPTH {
        let q = path.throughput.max_channel().min(1.0);
        if q <= 0.0 || sampler.sample() >= q {
            path.terminate(ColorRgb::BLACK);
        } else {
            path.throughput /= q;
        }
    }
}

//
// Tests
//
