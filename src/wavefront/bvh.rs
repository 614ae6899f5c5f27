use super::*;

// Flat BVH over one mesh's triangle range. Nodes are emitted depth-first
// into a shared array; `NO_NODE` children mark a leaf. A parent's bounds
// always enclose both children, a leaf's bounds enclose its triangles.

pub const NO_NODE: u32 = u32::MAX;

const LEAF_TRIANGLE_COUNT: usize = 4;

#[repr(C)]
#[derive(Pod, Zeroable, Clone, Copy, Debug)]
pub struct Node {
    pub bounds: Aabb,
    pub left: u32,
    pub right: u32,
    pub tri_start: u32,
    pub tri_count: u32,
    pub axis: u32,
}

impl Node {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.left == NO_NODE
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BuildStats {
    pub node_count: usize,
    pub leaf_count: usize,
    pub max_depth: usize,
}

// Builds the hierarchy for `triangles`, which is the mesh's slice of the
// scene triangle array starting at global index `tri_base`. The slice is
// reordered so every leaf covers a contiguous global range. Returns the
// root node index into `nodes`.
pub fn build(nodes: &mut Vec<Node>, triangles: &mut [Triangle], tri_base: u32) -> u32 {
    assert!(!triangles.is_empty());

    let mut primitives = triangles
        .iter()
        .enumerate()
        .map(|(id, triangle)| Primitive {
            id,
            centroid: triangle.bounds().center(),
            bounds: triangle.bounds(),
        })
        .collect::<Vec<_>>();

    let mut ordered = Vec::with_capacity(triangles.len());
    let mut stats = BuildStats::default();
    let root = build_recursive(&mut primitives, nodes, &mut ordered, tri_base, 0, &mut stats);

    // Commit the BVH ordering to the triangle array itself.
    let reordered = ordered
        .into_iter()
        .map(|id| triangles[id])
        .collect::<Vec<_>>();
    triangles.copy_from_slice(&reordered);

    debug!(
        "Built BVH: {} triangles, {} nodes ({} leafs), max depth {}",
        triangles.len(),
        stats.node_count,
        stats.leaf_count,
        stats.max_depth
    );

    root
}

fn build_recursive(
    primitives: &mut [Primitive],
    nodes: &mut Vec<Node>,
    ordered: &mut Vec<usize>,
    tri_base: u32,
    depth: usize,
    stats: &mut BuildStats,
) -> u32 {
    // Make a new node.
    let curr = nodes.len() as u32;
    nodes.push(Node::zeroed());
    stats.node_count += 1;
    stats.max_depth = stats.max_depth.max(depth);

    let bounds = primitives.iter().fold(Aabb::EMPTY, |bounds, primitive| {
        bounds.union(primitive.bounds)
    });

    let make_leaf = |nodes: &mut Vec<Node>, ordered: &mut Vec<usize>, stats: &mut BuildStats,
                     primitives: &[Primitive]| {
        nodes[curr as usize] = Node {
            bounds,
            left: NO_NODE,
            right: NO_NODE,
            tri_start: tri_base + ordered.len() as u32,
            tri_count: primitives.len() as u32,
            axis: 0,
        };
        ordered.extend(primitives.iter().map(|primitive| primitive.id));
        stats.leaf_count += 1;
    };

    // Small ranges terminate as leaves.
    if primitives.len() <= LEAF_TRIANGLE_COUNT {
        make_leaf(nodes, ordered, stats, primitives);
        return curr;
    }

    // Split along the widest centroid axis at the median centroid.
    let centroid_bounds =
        Aabb::enclosing(primitives.iter().map(|primitive| &primitive.centroid));
    let split_axis = centroid_bounds.widest_axis();

    // All centroids coincide on that axis; splitting cannot make progress.
    if approx::ulps_eq!(
        centroid_bounds.hi()[split_axis],
        centroid_bounds.lo()[split_axis],
        max_ulps = 0
    ) {
        make_leaf(nodes, ordered, stats, primitives);
        return curr;
    }

    primitives.sort_by(|primitive_a, primitive_b| {
        primitive_a.centroid[split_axis]
            .partial_cmp(&primitive_b.centroid[split_axis])
            .expect("Unable to compare centroids")
    });
    let split = primitives.len() / 2;

    // Recurse.
    let (left_primitives, right_primitives) = primitives.split_at_mut(split);
    let left = build_recursive(left_primitives, nodes, ordered, tri_base, depth + 1, stats);
    let right = build_recursive(right_primitives, nodes, ordered, tri_base, depth + 1, stats);
    nodes[curr as usize] = Node {
        bounds,
        left,
        right,
        tri_start: 0,
        tri_count: 0,
        axis: split_axis as u32,
    };

    curr
}

#[derive(Debug)]
struct Primitive {
    id: usize,
    centroid: Point3,
    bounds: Aabb,
}

// Deterministic triangle soup around the origin, shared by the BVH and
// pipeline tests.
#[cfg(test)]
pub fn triangle_soup(count: usize, seed: u32) -> Vec<Triangle> {
    let mut sampler = sampling::PathSampler::seeded(1, seed, 0);
    let mut point = |scale: f32| {
        Point3::new(
            scale * (2.0 * sampler.sample() - 1.0),
            scale * (2.0 * sampler.sample() - 1.0),
            scale * (2.0 * sampler.sample() - 1.0),
        )
    };
    (0..count)
        .map(|_| {
            let a = point(4.0);
            let b = a + (point(0.5) - Point3::origin());
            let c = a + (point(0.5) - Point3::origin());
            Triangle::with_face_normal([a, b, c])
        })
        .collect()
}

//
// Tests
//

#[cfg(test)]
mod tests {
    use super::*;

    fn check_node(
        nodes: &[Node],
        triangles: &[Triangle],
        index: u32,
        covered: &mut Vec<bool>,
    ) {
        let node = &nodes[index as usize];
        if node.is_leaf() {
            assert!(node.tri_count > 0);
            for i in node.tri_start..node.tri_start + node.tri_count {
                assert!(node.bounds.contains(&triangles[i as usize].bounds()));
                assert!(!covered[i as usize], "triangle referenced twice");
                covered[i as usize] = true;
            }
        } else {
            assert!(node.bounds.contains(&nodes[node.left as usize].bounds));
            assert!(node.bounds.contains(&nodes[node.right as usize].bounds));
            check_node(nodes, triangles, node.left, covered);
            check_node(nodes, triangles, node.right, covered);
        }
    }

    #[test]
    fn test_build_invariants() {
        let mut triangles = triangle_soup(257, 11);
        let mut nodes = Vec::new();
        let root = build(&mut nodes, &mut triangles, 0);

        let mut covered = vec![false; triangles.len()];
        check_node(&nodes, &triangles, root, &mut covered);
        assert!(covered.iter().all(|&covered| covered));
    }

    #[test]
    fn test_build_single_triangle() {
        let mut triangles = triangle_soup(1, 3);
        let mut nodes = Vec::new();
        let root = build(&mut nodes, &mut triangles, 0);
        assert_eq!(nodes.len(), 1);
        assert!(nodes[root as usize].is_leaf());
        assert_eq!(nodes[root as usize].tri_count, 1);
    }

    #[test]
    fn test_build_coincident_centroids() {
        // Identical triangles cannot be split; the builder must still
        // terminate with a single (oversized) leaf.
        let triangle = triangle_soup(1, 5)[0];
        let mut triangles = vec![triangle; 9];
        let mut nodes = Vec::new();
        let root = build(&mut nodes, &mut triangles, 0);
        assert!(nodes[root as usize].is_leaf());
        assert_eq!(nodes[root as usize].tri_count, 9);
    }

    #[test]
    fn test_build_respects_tri_base() {
        let mut triangles = triangle_soup(32, 7);
        let mut nodes = Vec::new();
        let root = build(&mut nodes, &mut triangles, 100);
        let mut min_start = u32::MAX;
        let mut max_end = 0;
        for node in &nodes {
            if node.is_leaf() {
                min_start = min_start.min(node.tri_start);
                max_end = max_end.max(node.tri_start + node.tri_count);
            }
        }
        assert_eq!(min_start, 100);
        assert_eq!(max_end, 132);
        assert!(!nodes[root as usize].is_leaf());
    }
}
