use std::collections::{HashMap, HashSet, VecDeque};

use nalgebra::Vector3;
use tracing::info;

use crate::{
    datatypes::{BemSurface, SurfaceId, COORD_FRAME_MRI},
    error::BemError,
    surface::compute_vertex_normals,
};

/// Maps an undirected edge (a, b) to the vertex that splits it
type EdgeMidpoints = HashMap<(usize, usize), usize>;

fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Rotates a triangle so that its `k`th vertex comes first, keeping the winding
fn rotate_to(tri: [usize; 3], k: usize) -> [usize; 3] {
    [tri[k], tri[(k + 1) % 3], tri[(k + 2) % 3]]
}

/// Returns the 12 vertices and 20 outward wound faces of the unit icosahedron
fn icosahedron() -> (Vec<Vector3<f64>>, Vec<[usize; 3]>) {
    let t = (1.0 + f64::sqrt(5.0)) / 2.0;

    let rr: Vec<Vector3<f64>> = [
        [-1.0, t, 0.0],
        [1.0, t, 0.0],
        [-1.0, -t, 0.0],
        [1.0, -t, 0.0],
        [0.0, -1.0, t],
        [0.0, 1.0, t],
        [0.0, -1.0, -t],
        [0.0, 1.0, -t],
        [t, 0.0, -1.0],
        [t, 0.0, 1.0],
        [-t, 0.0, -1.0],
        [-t, 0.0, 1.0],
    ]
    .iter()
    .map(|p| Vector3::new(p[0], p[1], p[2]).normalize())
    .collect();

    let faces: [[usize; 3]; 20] = [
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    // enforce outward winding
    let tris = faces
        .iter()
        .map(|&[a, b, c]| {
            let normal = (rr[b] - rr[a]).cross(&(rr[c] - rr[a]));
            if normal.dot(&(rr[a] + rr[b] + rr[c])) < 0.0 {
                [a, c, b]
            } else {
                [a, b, c]
            }
        })
        .collect();

    (rr, tris)
}

/// Returns the index of the unit-sphere midpoint of edge (a, b), appending it
/// to `rr` on first use
fn midpoint(
    rr: &mut Vec<Vector3<f64>>,
    cache: &mut EdgeMidpoints,
    a: usize,
    b: usize,
) -> usize {
    let key = edge_key(a, b);
    if let Some(index) = cache.get(&key) {
        return *index;
    }
    let mid = ((rr[a] + rr[b]) / 2.0).normalize();
    rr.push(mid);
    cache.insert(key, rr.len() - 1);
    rr.len() - 1
}

/// Splits every triangle into four. New vertices are appended after the
/// existing ones
///
/// # Returns
/// The new triangles and the vertex inserted on each old edge
fn subdivide(rr: &mut Vec<Vector3<f64>>, tris: &[[usize; 3]]) -> (Vec<[usize; 3]>, EdgeMidpoints) {
    let mut cache: EdgeMidpoints = HashMap::new();
    let mut new_tris: Vec<[usize; 3]> = Vec::with_capacity(tris.len() * 4);

    for &[a, b, c] in tris {
        let ab = midpoint(rr, &mut cache, a, b);
        let bc = midpoint(rr, &mut cache, b, c);
        let ca = midpoint(rr, &mut cache, c, a);

        new_tris.push([a, ab, ca]);
        new_tris.push([b, bc, ab]);
        new_tris.push([c, ca, bc]);
        new_tris.push([ab, bc, ca]);
    }

    (new_tris, cache)
}

/// Subdivides the icosahedron `grade` times, keeping the midpoints inserted
/// at every level
fn ico_hierarchy(grade: u32) -> (Vec<Vector3<f64>>, Vec<[usize; 3]>, Vec<EdgeMidpoints>) {
    let (mut rr, mut tris) = icosahedron();
    let mut levels: Vec<EdgeMidpoints> = Vec::with_capacity(grade as usize);
    for _ in 0..grade {
        let (new_tris, midpoints) = subdivide(&mut rr, &tris);
        tris = new_tris;
        levels.push(midpoints);
    }
    (rr, tris, levels)
}

/// Builds a unit-sphere icosahedron subdivided `grade` times
///
/// # Arguments
/// * `grade` - The number of subdivisions. Grade g has 20*4^g triangles
///
/// # Returns
/// A BemSurface whose normals equal its (unit) vertex positions
pub fn ico_surface(grade: u32) -> BemSurface {
    let (rr, tris, _) = ico_hierarchy(grade);

    BemSurface {
        id: SurfaceId::Unknown(9000 + grade as i32),
        sigma: 1.0,
        coord_frame: COORD_FRAME_MRI,
        nn: rr.clone(),
        rr,
        tris,
    }
}

/// Finds the ico grade of a triangle count, if it is one
///
/// # Returns
/// `Some(g)` when `n_tri == 20 * 4^g`
pub fn ico_grade_of(n_tri: usize) -> Option<u32> {
    if n_tri == 0 || n_tri % 20 != 0 {
        return None;
    }
    let mut remaining = n_tri / 20;
    let mut grade = 0;
    while remaining % 4 == 0 {
        remaining /= 4;
        grade += 1;
    }
    if remaining == 1 {
        Some(grade)
    } else {
        None
    }
}

/// Triangle adjacency of a closed, consistently wound mesh
struct Connectivity {
    /// (x, y) -> z for every triangle (x, y, z) and its rotations
    third: HashMap<(usize, usize), usize>,
    neighbors: Vec<Vec<usize>>,
}

impl Connectivity {
    /// Returns None if a directed edge is shared by two triangles or a
    /// vertex index is out of range
    fn new(n_vert: usize, tris: &[[usize; 3]]) -> Option<Connectivity> {
        let mut third = HashMap::with_capacity(3 * tris.len());
        let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); n_vert];
        for &[a, b, c] in tris {
            for (x, y, z) in [(a, b, c), (b, c, a), (c, a, b)] {
                if x >= n_vert || third.insert((x, y), z).is_some() {
                    return None;
                }
                neighbors[x].push(y);
            }
        }
        Some(Connectivity { third, neighbors })
    }

    fn degree(&self, v: usize) -> usize {
        self.neighbors[v].len()
    }

    /// The vertex across `center` from `v`, three steps around the ring of a
    /// degree 6 vertex
    fn opposite(&self, center: usize, v: usize) -> Option<usize> {
        let mut p = v;
        for _ in 0..3 {
            p = *self.third.get(&(center, p))?;
        }
        Some(p)
    }
}

/// One level up a subdivision hierarchy
struct Coarsened {
    tris: Vec<[usize; 3]>,
    /// The vertex that split each parent edge
    midpoints: EdgeMidpoints,
}

/// Undoes one 1-to-4 subdivision using connectivity alone
///
/// The 12 degree 5 vertices always survive. Every neighbor of a surviving
/// vertex is an edge midpoint of degree 6, and the vertex straight across it
/// survives too.
///
/// # Returns
/// None if `tris` is not a 1-to-4 subdivision of a closed mesh
fn coarsen(n_vert: usize, tris: &[[usize; 3]]) -> Option<Coarsened> {
    let conn = Connectivity::new(n_vert, tris)?;

    let seed = tris.iter().flatten().copied().find(|v| conn.degree(*v) == 5)?;
    let mut kept = vec![false; n_vert];
    let mut split = vec![false; n_vert];
    let mut midpoints: EdgeMidpoints = HashMap::new();
    let mut queue: VecDeque<usize> = VecDeque::from([seed]);
    kept[seed] = true;

    while let Some(v) = queue.pop_front() {
        for &m in conn.neighbors[v].iter() {
            if kept[m] || conn.degree(m) != 6 {
                return None;
            }
            let w = conn.opposite(m, v)?;
            split[m] = true;
            if let Some(previous) = midpoints.insert(edge_key(v, w), m) {
                if previous != m {
                    return None;
                }
            }
            if !kept[w] {
                kept[w] = true;
                queue.push_back(w);
            }
        }
    }

    // every vertex is either a survivor or a midpoint, never both
    let used: HashSet<usize> = tris.iter().flatten().copied().collect();
    if used.iter().any(|v| kept[*v] == split[*v]) {
        return None;
    }
    let n_kept = used.iter().filter(|v| kept[**v]).count();
    if n_kept != tris.len() / 8 + 2 {
        return None;
    }

    let mut seen: HashSet<[usize; 3]> = HashSet::new();
    let mut parents: Vec<[usize; 3]> = Vec::with_capacity(tris.len() / 4);
    for tri in tris {
        let corners: Vec<usize> = (0..3).filter(|k| kept[tri[*k]]).collect();
        match corners.as_slice() {
            // the center triangle of a split
            [] => continue,
            [k] => {
                let [x, m1, m2] = rotate_to(*tri, *k);
                let parent = [x, conn.opposite(m1, x)?, conn.opposite(m2, x)?];
                let mut key = parent;
                key.sort_unstable();
                if seen.insert(key) {
                    parents.push(parent);
                }
            }
            _ => return None,
        }
    }
    if parents.len() * 4 != tris.len() {
        return None;
    }

    Some(Coarsened {
        tris: parents,
        midpoints,
    })
}

/// Pairs the vertices of two icosahedra, seeding with their first triangles
/// and growing across shared edges
///
/// # Returns
/// `map[ours] = theirs`, or None if some triangle has no counterpart
fn match_icosahedron(ours: &[[usize; 3]], theirs: &[[usize; 3]], n_vert: usize) -> Option<Vec<usize>> {
    let conn = Connectivity::new(n_vert, theirs)?;
    let n_ours = ours.iter().flatten().max().map_or(0, |v| v + 1);
    let mut map: Vec<Option<usize>> = vec![None; n_ours];
    let (first_ours, first_theirs) = (ours.first()?, theirs.first()?);
    for k in 0..3 {
        map[first_ours[k]] = Some(first_theirs[k]);
    }

    let mut changed = true;
    while changed {
        changed = false;
        for tri in ours {
            for k in 0..3 {
                let [p, q, r] = rotate_to(*tri, k);
                if let (Some(mp), Some(mq), None) = (map[p], map[q], map[r]) {
                    map[r] = Some(*conn.third.get(&(mp, mq))?);
                    changed = true;
                }
            }
        }
    }

    let map: Vec<usize> = map.into_iter().collect::<Option<Vec<usize>>>()?;
    for &[p, q, r] in ours {
        if conn.third.get(&(map[p], map[q])) != Some(&map[r]) {
            return None;
        }
    }
    let distinct: HashSet<&usize> = map.iter().collect();
    if distinct.len() != map.len() {
        return None;
    }
    Some(map)
}

/// Decimates a surface that is isomorphic with a subdivided icosahedron
///
/// The correspondence with `ico_surface` is found from the triangle
/// connectivity, so any vertex numbering and triangle order is accepted as long
/// as the winding is consistent.
///
/// # Arguments
/// * `surface` - The source surface, a subdivided icosahedron of some grade k
/// * `dest_grade` - The requested grade, at most k
///
/// # Returns
/// A surface with the triangles of `ico_surface(dest_grade)` and the
/// positions of the matching source vertices
pub fn ico_downsample(surface: &BemSurface, dest_grade: u32) -> Result<BemSurface, BemError> {
    let n_tri = surface.ntri();

    let found = match ico_grade_of(n_tri) {
        Some(g) => g,
        None => {
            return Err(BemError::Decimation(format!(
                "Cannot decimate to requested ico grade {dest_grade}. The provided BEM surface has {n_tri} triangles, which cannot be isomorphic with a subdivided icosahedron. Consider manually decimating the surface to a suitable density and then omit --ico."
            )));
        }
    };

    if dest_grade > found {
        return Err(BemError::Decimation(format!(
            "For this surface, decimation grade should be {found} or less, not {dest_grade}."
        )));
    }

    let not_ico = || {
        BemError::Decimation(format!(
            "The {} surface has {n_tri} triangles but is not a subdivided icosahedron",
            surface.id.name()
        ))
    };

    // walk down to the 20 triangle base, remembering which vertex split
    // each edge on the way
    let n_vert = surface.np();
    let mut tris = surface.tris.clone();
    let mut source_levels: Vec<EdgeMidpoints> = Vec::with_capacity(found as usize);
    for _ in 0..found {
        let coarse = match coarsen(n_vert, &tris) {
            Some(c) => c,
            None => return Err(not_ico()),
        };
        tris = coarse.tris;
        source_levels.push(coarse.midpoints);
    }
    source_levels.reverse();

    let (_, base_tris) = icosahedron();
    let (_, dest_tris, dest_levels) = ico_hierarchy(dest_grade);
    info!(
        "Going from {found}th to {dest_grade}th subdivision of an icosahedron (n_tri: {} -> {})",
        n_tri,
        dest_tris.len()
    );

    let mut map = match match_icosahedron(&base_tris, &tris, n_vert) {
        Some(m) => m,
        None => return Err(not_ico()),
    };

    // climb back up along the destination's own subdivision
    let dest_np = 10 * 4usize.pow(dest_grade) + 2;
    map.resize(dest_np, usize::MAX);
    for (ours, theirs) in dest_levels.iter().zip(source_levels.iter()) {
        for (&(a, b), &m) in ours.iter() {
            map[m] = match theirs.get(&edge_key(map[a], map[b])) {
                Some(v) => *v,
                None => return Err(not_ico()),
            };
        }
    }

    let rr: Vec<Vector3<f64>> = map.iter().map(|index| surface.rr[*index]).collect();
    let nn = compute_vertex_normals(&rr, &dest_tris);

    Ok(BemSurface {
        id: surface.id,
        sigma: surface.sigma,
        coord_frame: surface.coord_frame,
        rr,
        tris: dest_tris,
        nn,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::total_solid_angle;

    #[test]
    fn ico_sizes() {
        for grade in 0..=4u32 {
            let ico = ico_surface(grade);
            assert_eq!(ico.ntri(), 20 * 4usize.pow(grade));
            assert_eq!(ico.np(), 10 * 4usize.pow(grade) + 2);
        }
    }

    #[test]
    fn ico_vertices_nest_across_grades() {
        let coarse = ico_surface(2);
        let fine = ico_surface(3);
        for (a, b) in coarse.rr.iter().zip(fine.rr.iter()) {
            assert!((a - b).norm() < 1e-12);
        }
        assert!(fine.rr.iter().all(|r| (r.norm() - 1.0).abs() < 1e-12));
    }

    #[test]
    fn ico_is_closed_and_outward() {
        let ico = ico_surface(3);
        let angle = total_solid_angle(&ico.rr, &ico.tris, &Vector3::zeros());
        assert!((angle / (4.0 * std::f64::consts::PI) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn grade_detection() {
        assert_eq!(ico_grade_of(20), Some(0));
        assert_eq!(ico_grade_of(5120), Some(4));
        assert_eq!(ico_grade_of(20480), Some(5));
        assert_eq!(ico_grade_of(40), None);
        assert_eq!(ico_grade_of(0), None);
        assert_eq!(ico_grade_of(1000), None);
    }

    #[test]
    fn downsample_keeps_subject_positions() {
        let mut head = ico_surface(4);
        head.id = SurfaceId::Head;
        head.sigma = 0.33;
        // stretch into an ellipsoid so positions differ from the unit sphere
        head.rr
            .iter_mut()
            .for_each(|r| *r = Vector3::new(r.x * 0.09, r.y * 0.11, r.z * 0.1));

        let decimated = ico_downsample(&head, 3).unwrap();
        assert_eq!(decimated.ntri(), 1280);
        assert_eq!(decimated.np(), 642);
        assert_eq!(decimated.id, SurfaceId::Head);
        assert_eq!(decimated.sigma, 0.33);
        for (a, b) in decimated.rr.iter().zip(head.rr.iter()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn downsample_to_own_grade_is_identity() {
        let ico = ico_surface(2);
        let same = ico_downsample(&ico, 2).unwrap();
        assert_eq!(same.tris, ico.tris);
        assert_eq!(same.rr, ico.rr);
    }

    #[test]
    fn downsample_rejects_finer_grade() {
        let ico = ico_surface(3);
        let err = ico_downsample(&ico, 4).unwrap_err();
        assert!(err.to_string().contains("should be 3 or less, not 4"));
    }

    #[test]
    fn downsample_rejects_non_ico_surface() {
        let mut ico = ico_surface(2);
        ico.tris.pop();
        let err = ico_downsample(&ico, 1).unwrap_err();
        assert!(err.to_string().contains("cannot be isomorphic"));
    }

    #[test]
    fn downsample_follows_connectivity_not_numbering() {
        let ico = ico_surface(3);
        let n = ico.np();
        let stretch = |r: &Vector3<f64>| Vector3::new(r.x * 0.09, r.y * 0.11, r.z * 0.1);

        // scatter the vertex numbers, reverse the triangle order and rotate
        // each triangle's starting corner
        let relabel = |v: usize| (v * 7919) % n;
        let mut rr = vec![Vector3::zeros(); n];
        for (v, r) in ico.rr.iter().enumerate() {
            rr[relabel(v)] = stretch(r);
        }
        let tris: Vec<[usize; 3]> = ico
            .tris
            .iter()
            .rev()
            .enumerate()
            .map(|(k, t)| rotate_to([relabel(t[0]), relabel(t[1]), relabel(t[2])], k % 3))
            .collect();
        let head = BemSurface {
            id: SurfaceId::Head,
            sigma: 0.3,
            coord_frame: COORD_FRAME_MRI,
            nn: compute_vertex_normals(&rr, &tris),
            rr,
            tris,
        };

        let decimated = ico_downsample(&head, 2).unwrap();
        assert_eq!(decimated.ntri(), 320);
        assert_eq!(decimated.np(), 162);

        // exactly the grade 2 vertices survive
        let expected: Vec<Vector3<f64>> = ico_surface(2).rr.iter().map(stretch).collect();
        let mut matched = vec![false; expected.len()];
        for r in decimated.rr.iter() {
            let k = expected
                .iter()
                .position(|e| (e - r).norm() < 1e-12)
                .expect("decimated vertex is a grade 2 vertex");
            assert!(!matched[k]);
            matched[k] = true;
        }

        let angle = total_solid_angle(&decimated.rr, &decimated.tris, &Vector3::zeros());
        assert!((angle / (4.0 * std::f64::consts::PI) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn downsample_from_grade_one_to_base() {
        let ico = ico_surface(1);
        let base = ico_downsample(&ico, 0).unwrap();
        assert_eq!(base.np(), 12);
        assert_eq!(base.rr, ico_surface(0).rr);
    }

    #[test]
    fn downsample_rejects_foreign_connectivity() {
        // flip the diagonal shared by the first triangle and its neighbor
        let mut ico = ico_surface(1);
        let [a, b, c] = ico.tris[0];
        let (j, k) = ico
            .tris
            .iter()
            .enumerate()
            .find_map(|(j, t)| {
                (0..3)
                    .find(|k| rotate_to(*t, *k)[..2] == [b, a])
                    .map(|k| (j, k))
            })
            .unwrap();
        let d = rotate_to(ico.tris[j], k)[2];
        ico.tris[0] = [a, d, c];
        ico.tris[j] = [d, b, c];

        let err = ico_downsample(&ico, 0).unwrap_err();
        assert!(matches!(err, BemError::Decimation(_)));
        assert!(err.to_string().contains("is not a subdivided icosahedron"));
    }

    #[test]
    fn downsample_rejects_open_mesh() {
        let mut ico = ico_surface(1);
        // same triangle count, but one triangle is repeated and one is missing
        ico.tris[5] = ico.tris[4];
        let err = ico_downsample(&ico, 0).unwrap_err();
        assert!(err.to_string().contains("is not a subdivided icosahedron"));
    }
}
