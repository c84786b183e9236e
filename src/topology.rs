use std::f64::consts::PI;

use indicatif::ProgressBar;
use nalgebra::Vector3;
use tracing::info;

use crate::{datatypes::BemSurface, error::BemError};

/// Allowed deviation of a summed solid angle from a full sphere (as a fraction of 4*pi)
pub const SOLID_ANGLE_TOLERANCE: f64 = 1e-5;

/// Solid angle subtended by a triangle as seen from `fro`
///
/// Positive when the triangle is wound counter-clockwise seen from outside
/// and `fro` is on its inner side.
pub fn solid_angle(
    r1: &Vector3<f64>,
    r2: &Vector3<f64>,
    r3: &Vector3<f64>,
    fro: &Vector3<f64>,
) -> f64 {
    let v1 = r1 - fro;
    let v2 = r2 - fro;
    let v3 = r3 - fro;

    let triple = v1.dot(&v2.cross(&v3));
    let l1 = v1.norm();
    let l2 = v2.norm();
    let l3 = v3.norm();
    let s = l1 * l2 * l3 + v1.dot(&v2) * l3 + v1.dot(&v3) * l2 + v2.dot(&v3) * l1;

    2.0 * f64::atan2(triple, s)
}

/// Sums the solid angles of every triangle of a surface seen from one point
pub fn total_solid_angle(rr: &[Vector3<f64>], tris: &[[usize; 3]], fro: &Vector3<f64>) -> f64 {
    tris.iter()
        .map(|tri| solid_angle(&rr[tri[0]], &rr[tri[1]], &rr[tri[2]], fro))
        .sum()
}

/// Finds, for every point in `to`, the nearest point in `fro`
///
/// # Returns
/// A vector of (index into `fro`, distance) with one entry per point in `to`
pub fn compute_nearest(fro: &[Vector3<f64>], to: &[Vector3<f64>]) -> Vec<(usize, f64)> {
    to.iter()
        .map(|target| {
            let mut best = (0usize, f64::INFINITY);
            for (i, candidate) in fro.iter().enumerate() {
                let dist = (candidate - target).norm_squared();
                if dist < best.1 {
                    best = (i, dist);
                }
            }
            (best.0, best.1.sqrt())
        })
        .collect()
}

/// Verifies that a surface is closed by summing the solid angles seen from its
/// center of mass
pub fn assert_complete_surface(surface: &BemSurface) -> Result<(), BemError> {
    let cm = surface.center_of_mass();
    info!(
        "{} CM is {:6.2} {:6.2} {:6.2} mm",
        surface.id.name(),
        1000.0 * cm.x,
        1000.0 * cm.y,
        1000.0 * cm.z
    );

    let prop = total_solid_angle(&surface.rr, &surface.tris, &cm) / (4.0 * PI);
    if (prop - 1.0).abs() > SOLID_ANGLE_TOLERANCE {
        return Err(BemError::Topology(format!(
            "Surface {} is not complete (sum of solid angles yielded {}, should be 1.)",
            surface.id.name(),
            prop
        )));
    }

    Ok(())
}

/// Verifies that every vertex of `inner` lies inside the closed surface `outer`
///
/// # Arguments
/// * `inner` - The surface expected to be enclosed
/// * `outer` - The enclosing surface
/// * `show_progress` - Whether to draw a progress bar over the vertices of `inner`
pub fn assert_inside(
    inner: &BemSurface,
    outer: &BemSurface,
    show_progress: bool,
) -> Result<(), BemError> {
    let bar = if show_progress {
        ProgressBar::new(inner.np() as u64)
    } else {
        ProgressBar::hidden()
    };

    let mut n_outside: usize = 0;
    for point in inner.rr.iter() {
        bar.inc(1);
        let prop = total_solid_angle(&outer.rr, &outer.tris, point) / (4.0 * PI);
        if (prop - 1.0).abs() > SOLID_ANGLE_TOLERANCE {
            n_outside += 1;
        }
    }
    bar.finish_and_clear();

    if n_outside > 0 {
        return Err(BemError::Topology(format!(
            "Surface {} is not completely inside surface {} ({} of {} vertices outside)",
            inner.id.name(),
            outer.id.name(),
            n_outside,
            inner.np()
        )));
    }

    Ok(())
}

/// Runs the completeness check on every surface and the containment check on
/// consecutive surfaces. Surfaces must be ordered outermost first
pub fn check_surfaces(surfaces: &[BemSurface], show_progress: bool) -> Result<(), BemError> {
    for surface in surfaces {
        assert_complete_surface(surface)?;
    }

    for pair in surfaces.windows(2) {
        let (outer, inner) = (&pair[0], &pair[1]);
        info!(
            "Checking that {} surface is inside {} surface...",
            inner.id.name(),
            outer.id.name()
        );
        assert_inside(inner, outer, show_progress)?;
    }

    Ok(())
}

/// Logs the minimum vertex distance between consecutive surfaces
///
/// # Returns
/// The minimum distances in meters, one per consecutive pair
pub fn check_thicknesses(surfaces: &[BemSurface]) -> Vec<f64> {
    let mut min_dists: Vec<f64> = Vec::with_capacity(surfaces.len().saturating_sub(1));

    for pair in surfaces.windows(2) {
        let (fro, to) = (&pair[0], &pair[1]);
        info!(
            "Checking distance between {} and {} surfaces...",
            fro.id.name(),
            to.id.name()
        );
        let min_dist = compute_nearest(&fro.rr, &to.rr)
            .iter()
            .map(|(_, dist)| *dist)
            .fold(f64::INFINITY, f64::min);
        info!(
            "Minimum distance between the {} and {} surfaces is approximately {:6.1} mm",
            fro.id.name(),
            to.id.name(),
            1000.0 * min_dist
        );
        min_dists.push(min_dist);
    }

    min_dists
}
