use super::*;

use crate::wavefront::{Camera, Material, Triangle};

//
// Description
//

// In-memory scene produced by the loader: everything the renderer needs,
// with material flags already collapsed into semantic kinds and mesh
// triangles already in object space.
#[derive(Debug)]
pub struct SceneDescription {
    pub materials: Vec<Material>,
    pub objects: Vec<ObjectDesc>,
    pub meshes: Vec<Vec<Triangle>>,
    pub camera: Camera,
    pub iterations: u32,
    pub trace_depth: u32,
    pub output_file: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeDesc {
    Cube,
    Sphere,
    Mesh(usize),
}

#[derive(Clone, Copy, Debug)]
pub struct ObjectDesc {
    pub shape: ShapeDesc,
    pub material: u32,
    pub translation: Vec3,
    pub rotation_deg: Vec3,
    pub scale: Vec3,
}

//
// Loader
//

pub fn load_from_file(path: &Path) -> Result<SceneDescription> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Reading scene file: {}", path.display()))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    parse(&text, base_dir).with_context(|| format!("Parsing scene file: {}", path.display()))
}

// Line-oriented, case-insensitive scene grammar: MATERIAL / CAMERA / OBJECT
// records with keyed property lines, `//` comments, records separated by
// blank lines.
pub fn parse(text: &str, base_dir: &Path) -> Result<SceneDescription> {
    let mut parser = Parser::new(text, base_dir);

    while let Some((number, line)) = parser.next_top_line() {
        let mut tokens = line.split_whitespace();
        let keyword = tokens.next().expect("top lines are non-empty");
        match keyword.to_ascii_uppercase().as_str() {
            "MATERIAL" => {
                let id = parse_u32(tokens.next(), number, "material id")?;
                parser.parse_material(id)?;
            }
            "CAMERA" => parser.parse_camera()?,
            "OBJECT" => {
                // The object id only documents ordering in the file.
                parse_u32(tokens.next(), number, "object id")?;
                parser.parse_object()?;
            }
            other => bail!("Line {number}: unexpected token `{other}`"),
        }
    }

    parser.finish()
}

struct Parser<'a> {
    lines: std::iter::Peekable<std::iter::Enumerate<std::str::Lines<'a>>>,
    base_dir: &'a Path,
    materials: Vec<Material>,
    material_slots: HashMap<u32, u32>,
    objects: Vec<(usize, ShapeDesc, u32, Vec3, Vec3, Vec3)>,
    meshes: Vec<Vec<Triangle>>,
    mesh_slots: HashMap<String, usize>,
    camera: Option<CameraRecord>,
}

struct CameraRecord {
    resolution: (u32, u32),
    fov_y_deg: f32,
    iterations: u32,
    trace_depth: u32,
    output_file: String,
    eye: Point3,
    look_at: Point3,
    up: Vec3,
    aperture_radius: f32,
    focal_length: f32,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str, base_dir: &'a Path) -> Self {
        Self {
            lines: text.lines().enumerate().peekable(),
            base_dir,
            materials: Vec::new(),
            material_slots: HashMap::new(),
            objects: Vec::new(),
            meshes: Vec::new(),
            mesh_slots: HashMap::new(),
            camera: None,
        }
    }

    // Next meaningful line at record scope, skipping blanks and comments.
    fn next_top_line(&mut self) -> Option<(usize, &'a str)> {
        loop {
            let (index, raw) = self.lines.next()?;
            let stripped = strip_comment(raw);
            if !stripped.is_empty() {
                return Some((index + 1, stripped));
            }
        }
    }

    // Next property line of the current record. A blank line or EOF ends
    // the record; comment-only lines are skipped.
    fn next_record_line(&mut self) -> Option<(usize, &'a str)> {
        loop {
            let (_, raw) = self.lines.peek()?;
            if raw.trim().is_empty() {
                self.lines.next();
                return None;
            }
            let (index, raw) = self.lines.next()?;
            let stripped = strip_comment(raw);
            if !stripped.is_empty() {
                return Some((index + 1, stripped));
            }
        }
    }

    fn parse_material(&mut self, id: u32) -> Result<()> {
        ensure!(
            !self.material_slots.contains_key(&id),
            "Material {id} is declared twice"
        );

        let mut rgb = ColorRgb::BLACK;
        let mut specular_exponent = 0.0;
        let mut specular_rgb = ColorRgb::BLACK;
        let mut reflective = false;
        let mut refractive = false;
        let mut ior = 0.0;
        let mut emittance = 0.0;

        while let Some((number, line)) = self.next_record_line() {
            let mut tokens = line.split_whitespace();
            let key = tokens.next().expect("record lines are non-empty");
            match key.to_ascii_uppercase().as_str() {
                "RGB" => rgb = parse_color(&mut tokens, number)?,
                "SPECEX" => specular_exponent = parse_f32(tokens.next(), number, "SPECEX")?,
                "SPECRGB" => specular_rgb = parse_color(&mut tokens, number)?,
                "REFL" => reflective = parse_f32(tokens.next(), number, "REFL")? > 0.0,
                "REFR" => refractive = parse_f32(tokens.next(), number, "REFR")? > 0.0,
                "REFRIOR" => ior = parse_f32(tokens.next(), number, "REFRIOR")?,
                "EMITTANCE" => emittance = parse_f32(tokens.next(), number, "EMITTANCE")?,
                other => bail!("Line {number}: unknown material property `{other}`"),
            }
        }

        // The flag soup in the file maps onto one semantic kind.
        ensure!(
            emittance >= 0.0,
            "Material {id}: emittance must be non-negative, got {emittance}"
        );
        let material = if emittance > 0.0 {
            validate_color(rgb, id, "RGB")?;
            Material::Emissive {
                base_color: rgb,
                emittance,
            }
        } else if reflective && refractive {
            validate_color(specular_rgb, id, "SPECRGB")?;
            ensure!(
                ior >= 1.0,
                "Material {id}: refractive index must be at least 1, got {ior}"
            );
            Material::Dielectric {
                specular_color: specular_rgb,
                ior,
            }
        } else if reflective {
            validate_color(specular_rgb, id, "SPECRGB")?;
            Material::Mirror {
                specular_color: specular_rgb,
            }
        } else {
            validate_color(rgb, id, "RGB")?;
            Material::Diffuse { base_color: rgb }
        };
        // Phong-style specular exponents have no counterpart among the
        // semantic kinds; they only gate nothing here.
        if specular_exponent != 0.0 {
            debug!("Material {id}: ignoring SPECEX {specular_exponent}");
        }

        self.material_slots
            .insert(id, self.materials.len() as u32);
        self.materials.push(material);
        Ok(())
    }

    fn parse_camera(&mut self) -> Result<()> {
        ensure!(self.camera.is_none(), "Scene declares two cameras");

        let mut resolution = None;
        let mut fov_y_deg = None;
        let mut iterations = None;
        let mut trace_depth = None;
        let mut output_file = None;
        let mut eye = None;
        let mut look_at = None;
        let mut up = None;
        let mut aperture_radius = 0.0;
        let mut focal_length = 0.0;

        while let Some((number, line)) = self.next_record_line() {
            let mut tokens = line.split_whitespace();
            let key = tokens.next().expect("record lines are non-empty");
            match key.to_ascii_uppercase().as_str() {
                "RES" => {
                    let width = parse_u32(tokens.next(), number, "RES width")?;
                    let height = parse_u32(tokens.next(), number, "RES height")?;
                    resolution = Some((width, height));
                }
                "FOVY" => fov_y_deg = Some(parse_f32(tokens.next(), number, "FOVY")?),
                "ITERATIONS" => {
                    iterations = Some(parse_u32(tokens.next(), number, "ITERATIONS")?);
                }
                "DEPTH" => trace_depth = Some(parse_u32(tokens.next(), number, "DEPTH")?),
                "FILE" => {
                    output_file = Some(
                        tokens
                            .next()
                            .with_context(|| format!("Line {number}: FILE needs a name"))?
                            .to_owned(),
                    );
                }
                "EYE" => eye = Some(parse_vec3(&mut tokens, number)?.into()),
                "LOOKAT" => look_at = Some(parse_vec3(&mut tokens, number)?.into()),
                "UP" => up = Some(parse_vec3(&mut tokens, number)?),
                "APERTURE" => {
                    aperture_radius = parse_f32(tokens.next(), number, "APERTURE")?;
                }
                "FOCALLENGTH" => {
                    focal_length = parse_f32(tokens.next(), number, "FOCALLENGTH")?;
                }
                other => bail!("Line {number}: unknown camera property `{other}`"),
            }
        }

        let iterations = iterations.context("Camera is missing ITERATIONS")?;
        let trace_depth = trace_depth.context("Camera is missing DEPTH")?;
        ensure!(iterations > 0, "Camera ITERATIONS must be positive");
        ensure!(trace_depth > 0, "Camera DEPTH must be positive");
        self.camera = Some(CameraRecord {
            resolution: resolution.context("Camera is missing RES")?,
            fov_y_deg: fov_y_deg.context("Camera is missing FOVY")?,
            iterations,
            trace_depth,
            output_file: output_file.context("Camera is missing FILE")?,
            eye: eye.context("Camera is missing EYE")?,
            look_at: look_at.context("Camera is missing LOOKAT")?,
            up: up.context("Camera is missing UP")?,
            aperture_radius,
            focal_length,
        });
        Ok(())
    }

    fn parse_object(&mut self) -> Result<()> {
        let (shape_number, shape_line) = self
            .next_record_line()
            .context("Object is missing its shape line")?;
        let mut shape_tokens = shape_line.split_whitespace();
        let shape_token = shape_tokens.next().expect("record lines are non-empty");
        let shape = match shape_token.to_ascii_lowercase().as_str() {
            "cube" => ShapeDesc::Cube,
            "sphere" => ShapeDesc::Sphere,
            "gltf" => {
                let relative = shape_tokens
                    .next()
                    .with_context(|| format!("Line {shape_number}: gltf needs a path"))?;
                ShapeDesc::Mesh(self.load_mesh(relative)?)
            }
            other => bail!("Line {shape_number}: unknown shape `{other}`"),
        };

        let mut material = None;
        let mut translation = Vec3::zeros();
        let mut rotation_deg = Vec3::zeros();
        let mut scale = vector![1.0, 1.0, 1.0];
        let mut material_line = 0;

        while let Some((number, line)) = self.next_record_line() {
            let mut tokens = line.split_whitespace();
            let key = tokens.next().expect("record lines are non-empty");
            match key.to_ascii_uppercase().as_str() {
                "MATERIAL" => {
                    material = Some(parse_u32(tokens.next(), number, "material id")?);
                    material_line = number;
                }
                "TRANS" => translation = parse_vec3(&mut tokens, number)?,
                "ROTAT" => rotation_deg = parse_vec3(&mut tokens, number)?,
                "SCALE" => {
                    scale = parse_vec3(&mut tokens, number)?;
                    ensure!(
                        scale.iter().all(|component| component.abs() > 0.0),
                        "Line {number}: SCALE components must be non-zero"
                    );
                }
                other => bail!("Line {number}: unknown object property `{other}`"),
            }
        }

        let material = material.context("Object is missing its material line")?;
        self.objects.push((
            material_line,
            shape,
            material,
            translation,
            rotation_deg,
            scale,
        ));
        Ok(())
    }

    fn load_mesh(&mut self, relative: &str) -> Result<usize> {
        if let Some(&slot) = self.mesh_slots.get(relative) {
            return Ok(slot);
        }
        let path = self.base_dir.join(relative);
        let triangles = gltf::load_mesh(&path)?;
        info!(
            "Loaded mesh {} ({} triangles)",
            path.display(),
            triangles.len()
        );
        let slot = self.meshes.len();
        self.meshes.push(triangles);
        self.mesh_slots.insert(relative.to_owned(), slot);
        Ok(slot)
    }

    fn finish(self) -> Result<SceneDescription> {
        let record = self.camera.context("Scene has no CAMERA record")?;
        let camera = Camera::new(
            record.resolution,
            record.eye,
            record.look_at,
            record.up,
            record.fov_y_deg,
            record.aperture_radius,
            record.focal_length,
        )?;

        // Material references resolve at the end, so declaration order in
        // the file does not matter.
        let mut objects = Vec::with_capacity(self.objects.len());
        for (line, shape, material_id, translation, rotation_deg, scale) in self.objects {
            let slot = self.material_slots.get(&material_id).with_context(|| {
                format!("Line {line}: object references undeclared material {material_id}")
            })?;
            objects.push(ObjectDesc {
                shape,
                material: *slot,
                translation,
                rotation_deg,
                scale,
            });
        }
        ensure!(!objects.is_empty(), "Scene has no objects");

        info!(
            "Parsed scene: {} materials, {} objects, {} meshes, {}x{} at {} iterations",
            self.materials.len(),
            objects.len(),
            self.meshes.len(),
            camera.resolution.0,
            camera.resolution.1,
            record.iterations
        );

        Ok(SceneDescription {
            materials: self.materials,
            objects,
            meshes: self.meshes,
            camera,
            iterations: record.iterations,
            trace_depth: record.trace_depth,
            output_file: record.output_file,
        })
    }
}

//
// Token helpers
//

fn strip_comment(line: &str) -> &str {
    line.split("//").next().unwrap_or("").trim()
}

fn parse_u32(token: Option<&str>, number: usize, what: &str) -> Result<u32> {
    token
        .with_context(|| format!("Line {number}: missing {what}"))?
        .parse::<u32>()
        .with_context(|| format!("Line {number}: invalid {what}"))
}

fn parse_f32(token: Option<&str>, number: usize, what: &str) -> Result<f32> {
    token
        .with_context(|| format!("Line {number}: missing {what}"))?
        .parse::<f32>()
        .with_context(|| format!("Line {number}: invalid {what}"))
}

fn parse_vec3<'a>(tokens: &mut impl Iterator<Item = &'a str>, number: usize) -> Result<Vec3> {
    let x = parse_f32(tokens.next(), number, "x component")?;
    let y = parse_f32(tokens.next(), number, "y component")?;
    let z = parse_f32(tokens.next(), number, "z component")?;
    Ok(vector![x, y, z])
}

fn parse_color<'a>(tokens: &mut impl Iterator<Item = &'a str>, number: usize) -> Result<ColorRgb> {
    let rgb = parse_vec3(tokens, number)?;
    Ok(ColorRgb::new(rgb.x, rgb.y, rgb.z))
}

fn validate_color(color: ColorRgb, id: u32, what: &str) -> Result<ColorRgb> {
    ensure!(
        color.min_channel() >= 0.0 && color.max_channel() <= 1.0,
        "Material {id}: {what} channels must be within [0, 1], got {color}"
    );
    Ok(color)
}

//
// Tests
//

#[cfg(test)]
mod tests {
    use super::*;

    const CORNELL: &str = "\
// Emissive material (light)
MATERIAL 0
RGB 1 1 1
SPECEX 0
SPECRGB 0 0 0
REFL 0
REFR 0
REFRIOR 0
EMITTANCE 5

// Diffuse white
MATERIAL 1
RGB .98 .98 .98
SPECEX 0
SPECRGB 0 0 0
REFL 0
REFR 0
REFRIOR 0
EMITTANCE 0

// Specular white
MATERIAL 2
RGB .98 .98 .98
SPECEX 0
SPECRGB .98 .98 .98
REFL 1
REFR 0
REFRIOR 0
EMITTANCE 0

// Glass
MATERIAL 3
RGB 0 0 0
SPECEX 0
SPECRGB 1 1 1
REFL 1
REFR 1
REFRIOR 1.55
EMITTANCE 0

CAMERA
RES 800 800
FOVY 45
ITERATIONS 64
DEPTH 8
FILE cornell
EYE 0.0 5 9.5
LOOKAT 0 5 0
UP 0 1 0

// Ceiling light
OBJECT 0
cube
material 0
TRANS 0 10 0
ROTAT 0 0 0
SCALE 3 .3 3

// Sphere
OBJECT 1
sphere
material 2
TRANS -1 4 -1
ROTAT 0 0 0
SCALE 3 3 3

// Glass ball
OBJECT 2
SPHERE
MATERIAL 3
TRANS 2 2 2
ROTAT 0 0 0
SCALE 2 2 2
";

    fn parse_str(text: &str) -> Result<SceneDescription> {
        parse(text, Path::new("."))
    }

    #[test]
    fn test_parse_cornell() {
        let desc = parse_str(CORNELL).expect("valid scene");
        assert_eq!(desc.materials.len(), 4);
        assert_eq!(desc.objects.len(), 3);
        assert!(desc.meshes.is_empty());
        assert_eq!(desc.iterations, 64);
        assert_eq!(desc.trace_depth, 8);
        assert_eq!(desc.output_file, "cornell");
        assert_eq!(desc.camera.resolution, (800, 800));

        assert_eq!(
            desc.materials[0],
            Material::Emissive {
                base_color: ColorRgb::WHITE,
                emittance: 5.0
            }
        );
        assert!(matches!(desc.materials[1], Material::Diffuse { .. }));
        assert!(matches!(desc.materials[2], Material::Mirror { .. }));
        assert_eq!(
            desc.materials[3],
            Material::Dielectric {
                specular_color: ColorRgb::WHITE,
                ior: 1.55
            }
        );

        assert_eq!(desc.objects[0].shape, ShapeDesc::Cube);
        assert_eq!(desc.objects[0].material, 0);
        assert_abs_diff_eq!(desc.objects[0].scale, vector![3.0, 0.3, 3.0], epsilon = 1e-6);
        // Case-insensitive shape and property tokens.
        assert_eq!(desc.objects[2].shape, ShapeDesc::Sphere);
        assert_eq!(desc.objects[2].material, 3);
    }

    #[test]
    fn test_camera_derivation() {
        let desc = parse_str(CORNELL).expect("valid scene");
        let camera = &desc.camera;
        assert_abs_diff_eq!(camera.view, vector![0.0, 0.0, -1.0], epsilon = 1e-6);
        // Square image, square pixels.
        assert_abs_diff_eq!(camera.pixel_length.x, camera.pixel_length.y, epsilon = 1e-6);
        assert_abs_diff_eq!(
            camera.pixel_length.y,
            2.0 * f32::tan(45.0_f32.to_radians() / 2.0) / 800.0,
            epsilon = 1e-6
        );
        assert_eq!(camera.aperture_radius, 0.0);
    }

    #[test]
    fn test_thin_lens_camera_keys() {
        let text = CORNELL.replace(
            "UP 0 1 0",
            "UP 0 1 0\nAPERTURE 0.15\nFOCALLENGTH 4",
        );
        let desc = parse_str(&text).expect("valid scene");
        assert_abs_diff_eq!(desc.camera.aperture_radius, 0.15);
        assert_abs_diff_eq!(desc.camera.focal_length, 4.0);
    }

    #[test]
    fn test_missing_material_reference() {
        let text = CORNELL.replace("material 2", "material 9");
        let err = parse_str(&text).expect_err("undeclared material");
        assert!(err.to_string().contains("undeclared material 9"));
    }

    #[test]
    fn test_zero_resolution_rejected() {
        let text = CORNELL.replace("RES 800 800", "RES 0 800");
        assert!(parse_str(&text).is_err());
    }

    #[test]
    fn test_bad_ior_rejected() {
        let text = CORNELL.replace("REFRIOR 1.55", "REFRIOR -1");
        assert!(parse_str(&text).is_err());
    }

    #[test]
    fn test_unknown_token_rejected() {
        assert!(parse_str("WOBBLE 3\n").is_err());
        let text = CORNELL.replace("TRANS 0 10 0", "SHEAR 0 10 0");
        assert!(parse_str(&text).is_err());
    }

    #[test]
    fn test_duplicate_material_rejected() {
        let text = format!("{CORNELL}\nMATERIAL 0\nRGB 1 1 1\n");
        assert!(parse_str(&text).is_err());
    }

    #[test]
    fn test_missing_camera_rejected() {
        let text = "MATERIAL 0\nRGB 1 1 1\nEMITTANCE 1\n\nOBJECT 0\ncube\nmaterial 0\n";
        let err = parse_str(text).expect_err("no camera");
        assert!(err.to_string().contains("no CAMERA"));
    }

    #[test]
    fn test_out_of_range_albedo_rejected() {
        let text = CORNELL.replace("RGB .98 .98 .98", "RGB 1.5 .98 .98");
        assert!(parse_str(&text).is_err());
    }
}
