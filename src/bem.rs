use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::{
    config::get_subjects_dir,
    datatypes::{BemSurface, SurfaceId},
    error::BemError,
    ico::ico_downsample,
    surface::{check_surface_size, read_surface},
    topology::{check_surfaces, check_thicknesses},
};

/// Vertex count of the first surface above which three-layer models are
/// considered too dense
pub const DENSE_BEM_VERTICES: usize = 10000;

/// Watershed surfaces in file order, innermost first
const BEM_LAYERS: [(&str, SurfaceId); 3] = [
    ("inner_skull.surf", SurfaceId::Brain),
    ("outer_skull.surf", SurfaceId::Skull),
    ("outer_skin.surf", SurfaceId::Head),
];

/// Inputs of the BEM model construction
#[derive(Debug, Clone)]
pub struct BemModelParams {
    pub subject: String,
    /// Ico grade to decimate to. `None` keeps the surfaces as they are
    pub ico: Option<u32>,
    /// One value for a single-compartment model, three (brain, skull, scalp) otherwise
    pub conductivity: Vec<f64>,
    pub subjects_dir: Option<PathBuf>,
    pub verbose: bool,
}

/// Builds the BEM surfaces of a subject
///
/// # Arguments
/// * `params` - The subject, decimation grade, conductivities and subjects directory
///
/// # Returns
/// The surfaces ordered outermost first, each carrying its conductivity
pub fn make_bem_model(params: &BemModelParams) -> Result<Vec<BemSurface>, BemError> {
    let n_sigma = params.conductivity.len();
    if n_sigma != 1 && n_sigma != 3 {
        return Err(BemError::Input(format!(
            "conductivity must have 1 or 3 elements, got {n_sigma}"
        )));
    }
    if params.subject.trim().is_empty() {
        return Err(BemError::Input("subject must not be empty".to_owned()));
    }

    let subjects_dir = get_subjects_dir(params.subjects_dir.as_deref())?;
    let bem_dir = subjects_dir.join(&params.subject).join("bem");

    info!("Creating the BEM geometry...");

    let mut surfaces: Vec<BemSurface> = Vec::with_capacity(n_sigma);
    for ((file_name, id), sigma) in BEM_LAYERS.iter().zip(params.conductivity.iter()) {
        surfaces.push(read_surface(&bem_dir.join(file_name), *id, *sigma)?);
    }

    if let Some(grade) = params.ico {
        surfaces = surfaces
            .iter()
            .map(|surface| ico_downsample(surface, grade))
            .collect::<Result<Vec<BemSurface>, BemError>>()?;
    }

    let surfaces = order_surfaces(surfaces)?;

    check_surfaces(&surfaces, params.verbose)?;
    for surface in surfaces.iter() {
        check_surface_size(surface)?;
    }
    check_thicknesses(&surfaces);
    info!("Surfaces passed the basic topology checks.");

    check_bem_size(&surfaces);
    info!("Complete.");

    Ok(surfaces)
}

/// Orders a three-layer model outermost first (head, skull, brain)
pub fn order_surfaces(surfaces: Vec<BemSurface>) -> Result<Vec<BemSurface>, BemError> {
    if surfaces.len() != 3 {
        return Ok(surfaces);
    }

    let mut ordered: Vec<BemSurface> = Vec::with_capacity(3);
    for id in [SurfaceId::Head, SurfaceId::Skull, SurfaceId::Brain] {
        match surfaces.iter().find(|s| s.id == id) {
            Some(surface) => ordered.push(surface.clone()),
            None => {
                let ids: Vec<i32> = surfaces.iter().map(|s| s.id.fiff_code()).collect();
                return Err(BemError::Topology(format!("bad surface ids: {ids:?}")));
            }
        }
    }

    Ok(ordered)
}

/// Warns when a three-layer model is denser than it needs to be
pub fn check_bem_size(surfaces: &[BemSurface]) -> bool {
    if surfaces.len() > 1 && surfaces[0].np() > DENSE_BEM_VERTICES {
        warn!(
            "The bem surfaces have {} data points. 5120 (ico grade=4) should be enough. Dense 3-layer bems may not save properly.",
            surfaces[0].np()
        );
        return true;
    }
    false
}

/// Chooses the name of the BEM file
///
/// # Arguments
/// * `subject` - The subject name
/// * `model` - The name requested on the command line, if any
/// * `surfaces` - The model, whose triangle counts name the file when `model` is absent
///
/// # Returns
/// A file name ending in `-bem.fif` or `_bem.fif`
pub fn bem_filename(subject: &str, model: Option<&str>, surfaces: &[BemSurface]) -> String {
    match model {
        Some(name) if name.ends_with("-bem.fif") || name.ends_with("_bem.fif") => name.to_owned(),
        Some(name) => format!("{name}-bem.fif"),
        None => {
            let n_faces: Vec<String> = surfaces.iter().map(|s| s.ntri().to_string()).collect();
            format!("{}-{}-bem.fif", subject, n_faces.join("-"))
        }
    }
}

/// Places a BEM file name in the subject's bem directory
pub fn bem_output_path(subjects_dir: &Path, subject: &str, filename: &str) -> PathBuf {
    subjects_dir.join(subject).join("bem").join(filename)
}
