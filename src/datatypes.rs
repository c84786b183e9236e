use nalgebra::Vector3;

/// FIF coordinate frame code for MRI (surface RAS) coordinates
pub const COORD_FRAME_MRI: i32 = 5;

/// Identity of a BEM compartment boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceId {
    Brain,
    Skull,
    Head,
    Unknown(i32),
}

impl SurfaceId {
    /// The id stored in FIF files
    pub fn fiff_code(&self) -> i32 {
        match self {
            SurfaceId::Brain => 1,
            SurfaceId::Skull => 3,
            SurfaceId::Head => 4,
            SurfaceId::Unknown(code) => *code,
        }
    }

    pub fn from_fiff_code(code: i32) -> SurfaceId {
        match code {
            1 => SurfaceId::Brain,
            3 => SurfaceId::Skull,
            4 => SurfaceId::Head,
            other => SurfaceId::Unknown(other),
        }
    }

    /// Human readable name of the boundary, as used in log messages
    pub fn name(&self) -> &'static str {
        match self {
            SurfaceId::Brain => "inner skull",
            SurfaceId::Skull => "outer skull",
            SurfaceId::Head => "outer skin",
            SurfaceId::Unknown(_) => "unknown",
        }
    }
}

/// A closed triangulated boundary of the head model
#[derive(Debug, Clone)]
pub struct BemSurface {
    pub id: SurfaceId,
    pub sigma: f64,
    pub coord_frame: i32,
    /// Vertex positions in meters
    pub rr: Vec<Vector3<f64>>,
    /// Zero-based vertex indices
    pub tris: Vec<[usize; 3]>,
    /// Unit vertex normals
    pub nn: Vec<Vector3<f64>>,
}

impl BemSurface {
    pub fn np(&self) -> usize {
        self.rr.len()
    }

    pub fn ntri(&self) -> usize {
        self.tris.len()
    }

    /// Mean of all vertex positions
    pub fn center_of_mass(&self) -> Vector3<f64> {
        if self.rr.is_empty() {
            return Vector3::zeros();
        }
        let sum: Vector3<f64> = self.rr.iter().sum();
        sum / self.rr.len() as f64
    }
}
