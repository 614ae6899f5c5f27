use super::*;

use crate::wavefront::Triangle;

// Minimal GLB (binary glTF 2.0) mesh loader: triangle primitives with
// positions, optional vertex normals and optional indices. Node transforms
// are baked into the returned object-space triangles.

const COMPONENT_U8: u32 = 5121;
const COMPONENT_U16: u32 = 5123;
const COMPONENT_U32: u32 = 5125;
const COMPONENT_F32: u32 = 5126;

pub fn load_mesh(path: &Path) -> Result<Vec<Triangle>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Reading mesh: {}", path.display()))?;
    parse_glb(&bytes).with_context(|| format!("Parsing mesh: {}", path.display()))
}

pub fn parse_glb(glb: &[u8]) -> Result<Vec<Triangle>> {
    // Container layout: a 12-byte header followed by length-prefixed,
    // 4-byte-aligned chunks, JSON first and the geometry buffer second.
    ensure!(word_at(glb, 0)? == GLB_MAGIC, "Not a GLB container");
    let version = word_at(glb, 4)?;
    ensure!(version == 2, "Unsupported GLB version {version}");
    ensure!(
        word_at(glb, 8)? as usize == glb.len(),
        "GLB length field disagrees with the file size"
    );

    let json = chunk_at(glb, GLB_HEADER_LEN, CHUNK_JSON)?;
    let binary_at = (GLB_HEADER_LEN + CHUNK_HEADER_LEN + json.len() + 3) & !3;
    let binary = chunk_at(glb, binary_at, CHUNK_BIN)?;

    let json = std::str::from_utf8(json).context("GLB JSON chunk is not UTF-8")?;
    let gltf: Gltf = serde_json::from_str(json).context("Parsing glTF JSON chunk")?;

    let mut triangles = Vec::new();
    let mut degenerate = 0_usize;
    for node in &gltf.nodes {
        let Some(mesh_index) = node.mesh else {
            continue;
        };
        let mesh = gltf
            .meshes
            .get(mesh_index)
            .context("Node references a missing mesh")?;
        let transform = node.transform();
        let normal_matrix = transform
            .try_inverse()
            .context("Mesh node transform is singular")?
            .transpose();

        for primitive in &mesh.primitives {
            let positions = read_vec3s(&gltf, binary, primitive.attributes.position)?;
            let normals = match primitive.attributes.normal {
                Some(accessor) => Some(read_vec3s(&gltf, binary, accessor)?),
                None => None,
            };
            let indices = match primitive.indices {
                Some(accessor) => read_indices(&gltf, binary, accessor)?,
                None => (0..positions.len() as u32).collect(),
            };
            ensure!(
                indices.len() % 3 == 0,
                "Primitive index count {} is not a multiple of 3",
                indices.len()
            );

            for corner in indices.chunks_exact(3) {
                let fetch = |index: u32| -> Result<Point3> {
                    let position = positions
                        .get(index as usize)
                        .context("Index out of range of POSITION accessor")?;
                    Ok(transform.transform_point(&Point3::from(*position)))
                };
                let a = fetch(corner[0])?;
                let b = fetch(corner[1])?;
                let c = fetch(corner[2])?;
                if (b - a).cross(&(c - a)).norm() < EPSILON {
                    degenerate += 1;
                    continue;
                }
                let triangle = if let Some(normals) = &normals {
                    let fetch_normal = |index: u32| -> Result<Normal> {
                        let normal = normals
                            .get(index as usize)
                            .context("Index out of range of NORMAL accessor")?;
                        Ok(normal!(normal_matrix.transform_vector(normal)))
                    };
                    Triangle::new(
                        [a, b, c],
                        [
                            fetch_normal(corner[0])?,
                            fetch_normal(corner[1])?,
                            fetch_normal(corner[2])?,
                        ],
                    )
                } else {
                    Triangle::with_face_normal([a, b, c])
                };
                triangles.push(triangle);
            }
        }
    }
    if degenerate > 0 {
        debug!("Skipped {degenerate} degenerate triangles");
    }
    ensure!(!triangles.is_empty(), "GLB contains no triangles");
    Ok(triangles)
}

const GLB_MAGIC: u32 = 0x4654_6c67; // "glTF"
const CHUNK_JSON: u32 = 0x4e4f_534a;
const CHUNK_BIN: u32 = 0x004e_4942;
const GLB_HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;

// Little-endian u32 at a byte offset; errors instead of panicking on short
// files so a truncated download surfaces as a load failure.
fn word_at(glb: &[u8], at: usize) -> Result<u32> {
    let word = glb.get(at..at + 4).context("GLB file is truncated")?;
    Ok(u32::from_le_bytes(word.try_into().expect("4-byte slice")))
}

fn chunk_at(glb: &[u8], at: usize, kind: u32) -> Result<&[u8]> {
    let length = word_at(glb, at)? as usize;
    let found = word_at(glb, at + 4)?;
    ensure!(
        found == kind,
        "Expected GLB chunk {kind:#010x} at offset {at}, found {found:#010x}"
    );
    glb.get(at + CHUNK_HEADER_LEN..at + CHUNK_HEADER_LEN + length)
        .context("GLB chunk overruns the file")
}

//
// Accessors
//

fn accessor_bytes<'b>(
    gltf: &'b Gltf,
    binary: &'b [u8],
    index: usize,
) -> Result<(&'b [u8], &'b Accessor)> {
    let accessor = gltf.accessors.get(index).context("Missing accessor")?;
    let view = gltf
        .buffer_views
        .get(accessor.buffer_view)
        .context("Missing buffer view")?;
    let start = view.byte_offset + accessor.byte_offset;
    let end = view.byte_offset + view.byte_length;
    ensure!(end <= binary.len(), "Buffer view overruns the binary chunk");
    Ok((&binary[start..end], accessor))
}

fn read_vec3s(gltf: &Gltf, binary: &[u8], index: usize) -> Result<Vec<Vec3>> {
    let (bytes, accessor) = accessor_bytes(gltf, binary, index)?;
    ensure!(
        accessor.component_type == COMPONENT_F32 && accessor.ty == "VEC3",
        "Expected float VEC3 accessor, got {} {}",
        accessor.component_type,
        accessor.ty
    );
    let stride = gltf.buffer_views[accessor.buffer_view]
        .byte_stride
        .unwrap_or(12);
    ensure!(
        bytes.len() >= accessor.count.saturating_sub(1) * stride + 12,
        "VEC3 accessor overruns its buffer view"
    );
    Ok((0..accessor.count)
        .map(|element| {
            let at = element * stride;
            let f = |offset: usize| {
                f32::from_le_bytes(bytes[at + offset..at + offset + 4].try_into().unwrap())
            };
            vector![f(0), f(4), f(8)]
        })
        .collect())
}

fn read_indices(gltf: &Gltf, binary: &[u8], index: usize) -> Result<Vec<u32>> {
    let (bytes, accessor) = accessor_bytes(gltf, binary, index)?;
    ensure!(
        accessor.ty == "SCALAR",
        "Expected SCALAR index accessor, got {}",
        accessor.ty
    );
    let width = match accessor.component_type {
        COMPONENT_U8 => 1,
        COMPONENT_U16 => 2,
        COMPONENT_U32 => 4,
        other => bail!("Unsupported index component type {other}"),
    };
    ensure!(
        bytes.len() >= accessor.count * width,
        "Index accessor overruns its buffer view"
    );
    Ok((0..accessor.count)
        .map(|element| {
            let at = element * width;
            match width {
                1 => u32::from(bytes[at]),
                2 => u32::from(u16::from_le_bytes(bytes[at..at + 2].try_into().unwrap())),
                _ => u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap()),
            }
        })
        .collect())
}

//
// JSON model
//

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Gltf {
    #[serde(default)]
    accessors: Vec<Accessor>,
    #[serde(default)]
    buffer_views: Vec<BufferView>,
    #[serde(default)]
    meshes: Vec<Mesh>,
    #[serde(default)]
    nodes: Vec<Node>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Accessor {
    buffer_view: usize,
    #[serde(default)]
    byte_offset: usize,
    component_type: u32,
    count: usize,
    #[serde(rename = "type")]
    ty: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct BufferView {
    #[serde(default)]
    byte_offset: usize,
    byte_length: usize,
    byte_stride: Option<usize>,
}

#[derive(Deserialize, Debug)]
struct Mesh {
    primitives: Vec<Primitive>,
}

#[derive(Deserialize, Debug)]
struct Primitive {
    attributes: Attributes,
    indices: Option<usize>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "UPPERCASE")]
struct Attributes {
    position: usize,
    normal: Option<usize>,
}

#[derive(Deserialize, Debug)]
struct Node {
    mesh: Option<usize>,
    translation: Option<[f32; 3]>,
    rotation: Option<[f32; 4]>,
    scale: Option<[f32; 3]>,
}

impl Node {
    fn transform(&self) -> Mat4 {
        let translation = self.translation.unwrap_or([0.0, 0.0, 0.0]);
        let rotation = self.rotation.unwrap_or([0.0, 0.0, 0.0, 1.0]);
        let scale = self.scale.unwrap_or([1.0, 1.0, 1.0]);

        let translation = na::Translation3::from(translation).to_homogeneous();
        let rotation = na::Quaternion::new(rotation[3], rotation[0], rotation[1], rotation[2]);
        let rotation = na::UnitQuaternion::new_normalize(rotation).to_homogeneous();
        let scale = na::Scale3::from(scale).to_homogeneous();
        translation * rotation * scale
    }
}

//
// Tests
//
