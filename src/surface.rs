use std::path::Path;

use nalgebra::Vector3;
use neuroformats::{BrainMesh, FsSurface, FsSurfaceHeader};
use tracing::{debug, info};

use crate::{
    datatypes::{BemSurface, SurfaceId, COORD_FRAME_MRI},
    error::BemError,
};

/// Smallest bounding box extent (in meters) a head surface may have
pub const MIN_SURFACE_EXTENT: f64 = 0.05;

/// Reads a FreeSurfer triangle surface into a BemSurface
///
/// # Arguments
/// * `path` - The path to the .surf file. Coordinates are in millimeters
/// * `id` - The compartment boundary this surface represents
/// * `sigma` - The conductivity of the compartment inside the surface
///
/// # Returns
/// A BemSurface with vertex positions in meters and vertex normals computed
pub fn read_surface(path: &Path, id: SurfaceId, sigma: f64) -> Result<BemSurface, BemError> {
    if !path.is_file() {
        return Err(BemError::Surface(format!(
            "Surface file {} does not exist",
            path.display()
        )));
    }

    let fs_surface = match neuroformats::read_surf(path) {
        Ok(s) => s,
        Err(err) => {
            return Err(BemError::Surface(format!(
                "Unable to read surface {}: {err}",
                path.display()
            )))
        }
    };

    let vertices = &fs_surface.mesh.vertices;
    let faces = &fs_surface.mesh.faces;

    if vertices.len() % 3 != 0 || faces.len() % 3 != 0 {
        return Err(BemError::Surface(format!(
            "Surface {} has a malformed vertex or face array",
            path.display()
        )));
    }

    // mm -> m
    let rr: Vec<Vector3<f64>> = vertices
        .chunks_exact(3)
        .map(|v| Vector3::new(v[0] as f64, v[1] as f64, v[2] as f64) / 1000.0)
        .collect();

    let mut tris: Vec<[usize; 3]> = Vec::with_capacity(faces.len() / 3);
    for face in faces.chunks_exact(3) {
        let mut tri = [0usize; 3];
        for (k, index) in face.iter().enumerate() {
            if *index < 0 || *index as usize >= rr.len() {
                return Err(BemError::Surface(format!(
                    "Surface {} references vertex {} but has only {} vertices",
                    path.display(),
                    index,
                    rr.len()
                )));
            }
            tri[k] = *index as usize;
        }
        tris.push(tri);
    }

    info!(
        "{} read from {}: {} vertices, {} triangles",
        id.name(),
        path.display(),
        rr.len(),
        tris.len()
    );

    let nn = compute_vertex_normals(&rr, &tris);

    Ok(BemSurface {
        id,
        sigma,
        coord_frame: COORD_FRAME_MRI,
        rr,
        tris,
        nn,
    })
}

/// Writes a FreeSurfer binary triangle surface
///
/// # Arguments
/// * `path` - The .surf file to create
/// * `rr` - The vertex positions in meters. They are stored in millimeters
/// * `tris` - The triangles as zero-based vertex indices
pub fn write_surface(path: &Path, rr: &[Vector3<f64>], tris: &[[usize; 3]]) -> Result<(), BemError> {
    // m -> mm
    let vertices: Vec<f32> = rr
        .iter()
        .flat_map(|r| [r.x, r.y, r.z])
        .map(|c| (c * 1000.0) as f32)
        .collect();
    let faces: Vec<i32> = tris.iter().flatten().map(|v| *v as i32).collect();

    let fs_surface = FsSurface {
        header: FsSurfaceHeader {
            info_line: String::from("created by bemsetup\n\n"),
            num_vertices: rr.len() as i32,
            num_faces: tris.len() as i32,
            ..FsSurfaceHeader::default()
        },
        mesh: BrainMesh { vertices, faces },
    };

    match neuroformats::write_surf(path, &fs_surface) {
        Ok(()) => {
            debug!(
                "wrote {} vertices and {} triangles to {}",
                rr.len(),
                tris.len(),
                path.display()
            );
            Ok(())
        }
        Err(err) => Err(BemError::Output(format!(
            "Unable to write {}: {err}",
            path.display()
        ))),
    }
}

/// Computes unit vertex normals from the area-weighted triangle normals
///
/// # Arguments
/// * `rr` - The vertex positions
/// * `tris` - The triangles, wound counter-clockwise when seen from outside
///
/// # Returns
/// One normal per vertex. Vertices not used by any triangle get a zero normal
pub fn compute_vertex_normals(rr: &[Vector3<f64>], tris: &[[usize; 3]]) -> Vec<Vector3<f64>> {
    let mut nn: Vec<Vector3<f64>> = vec![Vector3::zeros(); rr.len()];

    for tri in tris {
        // the cross product length is twice the triangle area
        let normal = (rr[tri[1]] - rr[tri[0]]).cross(&(rr[tri[2]] - rr[tri[0]]));
        for vertex in tri {
            nn[*vertex] += normal;
        }
    }

    nn.iter()
        .map(|n| n.try_normalize(1e-20).unwrap_or_else(Vector3::zeros))
        .collect()
}

/// Ensures a surface is large enough to be a head boundary given in meters
///
/// # Arguments
/// * `surface` - The surface to check
pub fn check_surface_size(surface: &BemSurface) -> Result<(), BemError> {
    if surface.rr.is_empty() {
        return Err(BemError::Topology(format!(
            "Surface {} has no vertices",
            surface.id.name()
        )));
    }

    let mut min = surface.rr[0];
    let mut max = surface.rr[0];
    for r in surface.rr.iter() {
        min = min.inf(r);
        max = max.sup(r);
    }
    let sizes = max - min;
    let smallest = sizes.min();

    debug!(
        "{} extent is {:.2} x {:.2} x {:.2} mm",
        surface.id.name(),
        1000.0 * sizes.x,
        1000.0 * sizes.y,
        1000.0 * sizes.z
    );

    if smallest < MIN_SURFACE_EXTENT {
        return Err(BemError::Topology(format!(
            "Dimensions of the surface {} seem too small ({:9.5} mm). Maybe the unit of measure is meters instead of mm",
            surface.id.name(),
            1000.0 * smallest
        )));
    }

    Ok(())
}
