use std::{
    fs::File,
    io::{BufWriter, Cursor, Read, Seek, SeekFrom, Write},
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use nalgebra::Vector3;
use tracing::{debug, info};

use crate::{
    datatypes::{BemSurface, SurfaceId},
    error::BemError,
    surface::compute_vertex_normals,
};

pub const FIFFC_VERSION: i32 = (1 << 16) | 4;

pub const FIFFV_NEXT_SEQ: i32 = 0;
pub const FIFFV_NEXT_NONE: i32 = -1;

pub const FIFFT_VOID: i32 = 0;
pub const FIFFT_INT: i32 = 3;
pub const FIFFT_FLOAT: i32 = 4;
pub const FIFFT_DOUBLE: i32 = 5;
pub const FIFFT_ID_STRUCT: i32 = 31;
pub const FIFFT_MATRIX: i32 = 1 << 30;

pub const FIFF_FILE_ID: i32 = 100;
pub const FIFF_DIR_POINTER: i32 = 101;
pub const FIFF_BLOCK_START: i32 = 104;
pub const FIFF_BLOCK_END: i32 = 105;
pub const FIFF_FREE_LIST: i32 = 106;
pub const FIFF_NOP: i32 = 108;

pub const FIFFB_BEM: i32 = 310;
pub const FIFFB_BEM_SURF: i32 = 311;

pub const FIFF_BEM_SURF_ID: i32 = 3101;
pub const FIFF_BEM_SURF_NNODE: i32 = 3103;
pub const FIFF_BEM_SURF_NTRI: i32 = 3104;
pub const FIFF_BEM_SURF_NODES: i32 = 3105;
pub const FIFF_BEM_SURF_TRIANGLES: i32 = 3106;
pub const FIFF_BEM_SURF_NORMALS: i32 = 3107;
pub const FIFF_BEM_COORD_FRAME: i32 = 3112;
pub const FIFF_BEM_SIGMA: i32 = 3113;
pub const FIFF_MNE_COORD_FRAME: i32 = 3506;

const TAG_HEADER_SIZE: usize = 16;

/// Sequential writer of FIF tags
struct FiffWriter<W: Write> {
    inner: W,
}

impl<W: Write> FiffWriter<W> {
    fn new(inner: W) -> FiffWriter<W> {
        FiffWriter { inner }
    }

    fn write_header(
        &mut self,
        kind: i32,
        fiff_type: i32,
        size: usize,
        next: i32,
    ) -> std::io::Result<()> {
        self.inner.write_i32::<BigEndian>(kind)?;
        self.inner.write_i32::<BigEndian>(fiff_type)?;
        self.inner.write_i32::<BigEndian>(size as i32)?;
        self.inner.write_i32::<BigEndian>(next)
    }

    /// Writes the file id, directory pointer and free list that open every FIF file
    fn start_file(&mut self) -> std::io::Result<()> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        self.write_header(FIFF_FILE_ID, FIFFT_ID_STRUCT, 20, FIFFV_NEXT_SEQ)?;
        self.inner.write_i32::<BigEndian>(FIFFC_VERSION)?;
        self.inner.write_i32::<BigEndian>(std::process::id() as i32)?;
        self.inner.write_i32::<BigEndian>(0)?;
        self.inner.write_i32::<BigEndian>(now.as_secs() as i32)?;
        self.inner.write_i32::<BigEndian>(now.subsec_micros() as i32)?;

        self.write_int(FIFF_DIR_POINTER, -1)?;
        self.write_int(FIFF_FREE_LIST, -1)
    }

    fn end_file(&mut self) -> std::io::Result<()> {
        self.write_header(FIFF_NOP, FIFFT_VOID, 0, FIFFV_NEXT_NONE)?;
        self.inner.flush()
    }

    fn start_block(&mut self, block: i32) -> std::io::Result<()> {
        self.write_int(FIFF_BLOCK_START, block)
    }

    fn end_block(&mut self, block: i32) -> std::io::Result<()> {
        self.write_int(FIFF_BLOCK_END, block)
    }

    fn write_int(&mut self, kind: i32, value: i32) -> std::io::Result<()> {
        self.write_header(kind, FIFFT_INT, 4, FIFFV_NEXT_SEQ)?;
        self.inner.write_i32::<BigEndian>(value)
    }

    fn write_float(&mut self, kind: i32, value: f32) -> std::io::Result<()> {
        self.write_header(kind, FIFFT_FLOAT, 4, FIFFV_NEXT_SEQ)?;
        self.inner.write_f32::<BigEndian>(value)
    }

    /// Writes an n x 3 float matrix, row-major, followed by its dimensions
    fn write_float_matrix(&mut self, kind: i32, rows: &[Vector3<f64>]) -> std::io::Result<()> {
        let size = rows.len() * 3 * 4 + 4 * 3;
        self.write_header(kind, FIFFT_MATRIX | FIFFT_FLOAT, size, FIFFV_NEXT_SEQ)?;
        for row in rows {
            for value in row.iter() {
                self.inner.write_f32::<BigEndian>(*value as f32)?;
            }
        }
        self.write_matrix_dims(rows.len(), 3)
    }

    /// Writes an n x 3 int matrix, row-major, followed by its dimensions
    fn write_int_matrix(&mut self, kind: i32, rows: &[[i32; 3]]) -> std::io::Result<()> {
        let size = rows.len() * 3 * 4 + 4 * 3;
        self.write_header(kind, FIFFT_MATRIX | FIFFT_INT, size, FIFFV_NEXT_SEQ)?;
        for row in rows {
            for value in row {
                self.inner.write_i32::<BigEndian>(*value)?;
            }
        }
        self.write_matrix_dims(rows.len(), 3)
    }

    fn write_matrix_dims(&mut self, nrows: usize, ncols: usize) -> std::io::Result<()> {
        self.inner.write_i32::<BigEndian>(ncols as i32)?;
        self.inner.write_i32::<BigEndian>(nrows as i32)?;
        self.inner.write_i32::<BigEndian>(2)
    }

    fn write_surface(&mut self, surface: &BemSurface) -> std::io::Result<()> {
        self.start_block(FIFFB_BEM_SURF)?;
        self.write_float(FIFF_BEM_SIGMA, surface.sigma as f32)?;
        self.write_int(FIFF_BEM_SURF_ID, surface.id.fiff_code())?;
        self.write_int(FIFF_MNE_COORD_FRAME, surface.coord_frame)?;
        self.write_int(FIFF_BEM_SURF_NNODE, surface.np() as i32)?;
        self.write_int(FIFF_BEM_SURF_NTRI, surface.ntri() as i32)?;
        self.write_float_matrix(FIFF_BEM_SURF_NODES, &surface.rr)?;

        // triangles are one-based on disk
        let tris: Vec<[i32; 3]> = surface
            .tris
            .iter()
            .map(|t| [t[0] as i32 + 1, t[1] as i32 + 1, t[2] as i32 + 1])
            .collect();
        self.write_int_matrix(FIFF_BEM_SURF_TRIANGLES, &tris)?;

        if !surface.nn.is_empty() {
            self.write_float_matrix(FIFF_BEM_SURF_NORMALS, &surface.nn)?;
        }
        self.end_block(FIFFB_BEM_SURF)
    }

    fn write_bem(&mut self, surfaces: &[BemSurface]) -> std::io::Result<()> {
        self.start_file()?;
        self.start_block(FIFFB_BEM)?;
        self.write_int(FIFF_BEM_COORD_FRAME, surfaces[0].coord_frame)?;
        for surface in surfaces {
            self.write_surface(surface)?;
        }
        self.end_block(FIFFB_BEM)?;
        self.end_file()
    }
}

/// Writes BEM surfaces to a FIF file
///
/// # Arguments
/// * `path` - The output file
/// * `surfaces` - The surfaces, in model order
pub fn write_bem_surfaces(path: &Path, surfaces: &[BemSurface]) -> Result<(), BemError> {
    if surfaces.is_empty() {
        return Err(BemError::Output(
            "Refusing to write a BEM file without surfaces".to_owned(),
        ));
    }

    let file = match File::create(path) {
        Ok(f) => f,
        Err(err) => {
            return Err(BemError::Output(format!(
                "Failed to create {}: {err}",
                path.display()
            )));
        }
    };

    let mut writer = FiffWriter::new(BufWriter::new(file));
    if let Err(err) = writer.write_bem(surfaces) {
        return Err(BemError::Output(format!(
            "Failed to write {}: {err}",
            path.display()
        )));
    }

    info!("Wrote {} BEM surfaces to {}", surfaces.len(), path.display());

    Ok(())
}

/// A raw FIF tag
#[derive(Debug)]
pub struct Tag {
    pub kind: i32,
    pub fiff_type: i32,
    pub data: Vec<u8>,
}

impl Tag {
    fn as_int(&self) -> Result<i32, BemError> {
        if self.fiff_type != FIFFT_INT || self.data.len() < 4 {
            return Err(BemError::Input(format!(
                "Tag {} is not an int",
                self.kind
            )));
        }
        Ok(Cursor::new(&self.data).read_i32::<BigEndian>().unwrap_or(0))
    }

    fn as_float(&self) -> Result<f64, BemError> {
        let mut cursor = Cursor::new(&self.data);
        let value = match (self.fiff_type, self.data.len()) {
            (FIFFT_FLOAT, n) if n >= 4 => cursor.read_f32::<BigEndian>().map(|v| v as f64),
            (FIFFT_DOUBLE, n) if n >= 8 => cursor.read_f64::<BigEndian>(),
            _ => {
                return Err(BemError::Input(format!(
                    "Tag {} is not a float",
                    self.kind
                )))
            }
        };
        value.map_err(|err| BemError::Input(format!("Tag {}: {err}", self.kind)))
    }

    /// Splits matrix data into (rows, cols, element bytes)
    fn matrix_layout(&self) -> Result<(usize, usize, &[u8]), BemError> {
        if self.fiff_type & FIFFT_MATRIX == 0 || self.data.len() < 12 {
            return Err(BemError::Input(format!(
                "Tag {} is not a matrix",
                self.kind
            )));
        }
        let n = self.data.len();
        let mut tail = Cursor::new(&self.data[n - 12..]);
        let read_err = |err: std::io::Error| BemError::Input(format!("Tag {}: {err}", self.kind));
        let ncols = tail.read_i32::<BigEndian>().map_err(read_err)?;
        let nrows = tail.read_i32::<BigEndian>().map_err(read_err)?;
        let ndim = tail.read_i32::<BigEndian>().map_err(read_err)?;
        if ndim != 2 || ncols < 0 || nrows < 0 {
            return Err(BemError::Input(format!(
                "Tag {} has unsupported matrix dimensions",
                self.kind
            )));
        }
        Ok((nrows as usize, ncols as usize, &self.data[..n - 12]))
    }

    fn as_vector_matrix(&self) -> Result<Vec<Vector3<f64>>, BemError> {
        let (nrows, ncols, body) = self.matrix_layout()?;
        let elem_size = match self.fiff_type & !FIFFT_MATRIX {
            FIFFT_FLOAT => 4,
            FIFFT_DOUBLE => 8,
            _ => {
                return Err(BemError::Input(format!(
                    "Tag {} is not a float matrix",
                    self.kind
                )))
            }
        };
        if ncols != 3 || body.len() != nrows * ncols * elem_size {
            return Err(BemError::Input(format!(
                "Tag {} has an inconsistent matrix size",
                self.kind
            )));
        }

        let mut cursor = Cursor::new(body);
        let mut rows = Vec::with_capacity(nrows);
        for _ in 0..nrows {
            let mut row = [0.0f64; 3];
            for value in row.iter_mut() {
                *value = if elem_size == 4 {
                    cursor.read_f32::<BigEndian>().map(|v| v as f64)
                } else {
                    cursor.read_f64::<BigEndian>()
                }
                .map_err(|err| BemError::Input(format!("Tag {}: {err}", self.kind)))?;
            }
            rows.push(Vector3::new(row[0], row[1], row[2]));
        }
        Ok(rows)
    }

    fn as_int_matrix(&self) -> Result<Vec<[i32; 3]>, BemError> {
        let (nrows, ncols, body) = self.matrix_layout()?;
        if self.fiff_type & !FIFFT_MATRIX != FIFFT_INT
            || ncols != 3
            || body.len() != nrows * ncols * 4
        {
            return Err(BemError::Input(format!(
                "Tag {} is not an n x 3 int matrix",
                self.kind
            )));
        }

        let mut cursor = Cursor::new(body);
        let mut rows = Vec::with_capacity(nrows);
        for _ in 0..nrows {
            let mut row = [0i32; 3];
            for value in row.iter_mut() {
                *value = cursor
                    .read_i32::<BigEndian>()
                    .map_err(|err| BemError::Input(format!("Tag {}: {err}", self.kind)))?;
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

/// Reads every tag of a FIF file following the `next` pointers
pub fn read_tags(bytes: &[u8]) -> Result<Vec<Tag>, BemError> {
    let mut cursor = Cursor::new(bytes);
    let mut tags: Vec<Tag> = Vec::new();
    let len = bytes.len() as u64;

    while cursor.position() < len {
        let position = cursor.position();
        if len - position < TAG_HEADER_SIZE as u64 {
            return Err(BemError::Input(format!(
                "Truncated tag header at byte {position}"
            )));
        }
        // the length check above guarantees these reads succeed
        let kind = cursor.read_i32::<BigEndian>().unwrap_or(0);
        let fiff_type = cursor.read_i32::<BigEndian>().unwrap_or(0);
        let size = cursor.read_i32::<BigEndian>().unwrap_or(0);
        let next = cursor.read_i32::<BigEndian>().unwrap_or(0);

        if size < 0 || cursor.position() + size as u64 > len {
            return Err(BemError::Input(format!(
                "Truncated data in tag {kind} at byte {position}"
            )));
        }
        let mut data = vec![0u8; size as usize];
        cursor
            .read_exact(&mut data)
            .map_err(|err| BemError::Input(format!("Tag {kind}: {err}")))?;
        tags.push(Tag {
            kind,
            fiff_type,
            data,
        });

        match next {
            FIFFV_NEXT_SEQ => {}
            FIFFV_NEXT_NONE => break,
            // pointers may only move forward, past the tag just read
            offset if offset as u64 >= cursor.position() => {
                cursor
                    .seek(SeekFrom::Start(offset as u64))
                    .map_err(|err| BemError::Input(format!("Tag {kind}: {err}")))?;
            }
            other => {
                return Err(BemError::Input(format!(
                    "Invalid next pointer {other} in tag {kind}"
                )))
            }
        }
    }

    Ok(tags)
}

/// Fields of a BEM_SURF block collected while reading
#[derive(Default)]
struct SurfaceFields {
    sigma: Option<f64>,
    id: Option<i32>,
    coord_frame: Option<i32>,
    nnode: Option<i32>,
    ntri: Option<i32>,
    nodes: Option<Vec<Vector3<f64>>>,
    tris: Option<Vec<[i32; 3]>>,
    normals: Option<Vec<Vector3<f64>>>,
}

impl SurfaceFields {
    fn finish(self, bem_coord_frame: Option<i32>) -> Result<BemSurface, BemError> {
        let rr = match self.nodes {
            Some(n) => n,
            None => {
                return Err(BemError::Input(
                    "BEM surface block is missing its vertex positions".to_owned(),
                ))
            }
        };
        let raw_tris = match self.tris {
            Some(t) => t,
            None => {
                return Err(BemError::Input(
                    "BEM surface block is missing its triangles".to_owned(),
                ))
            }
        };
        let coord_frame = match self.coord_frame.or(bem_coord_frame) {
            Some(c) => c,
            None => {
                return Err(BemError::Input(
                    "BEM surface coordinate frame not found".to_owned(),
                ))
            }
        };

        if self.nnode.map_or(false, |n| n as usize != rr.len())
            || self.ntri.map_or(false, |n| n as usize != raw_tris.len())
        {
            return Err(BemError::Input(
                "BEM surface vertex or triangle count does not match its data".to_owned(),
            ));
        }

        let mut tris: Vec<[usize; 3]> = Vec::with_capacity(raw_tris.len());
        for raw in raw_tris {
            let mut tri = [0usize; 3];
            for (k, index) in raw.iter().enumerate() {
                if *index < 1 || *index as usize > rr.len() {
                    return Err(BemError::Input(format!(
                        "BEM surface triangle references vertex {index} of {}",
                        rr.len()
                    )));
                }
                tri[k] = *index as usize - 1;
            }
            tris.push(tri);
        }

        let nn = match self.normals {
            Some(nn) if nn.len() == rr.len() => nn,
            _ => compute_vertex_normals(&rr, &tris),
        };

        Ok(BemSurface {
            id: SurfaceId::from_fiff_code(self.id.unwrap_or(-1)),
            sigma: self.sigma.unwrap_or(1.0),
            coord_frame,
            rr,
            tris,
            nn,
        })
    }
}

/// Reads the BEM surfaces stored in a FIF file
///
/// # Arguments
/// * `path` - The FIF file
///
/// # Returns
/// The surfaces in file order, with zero-based triangles
pub fn read_bem_surfaces(path: &Path) -> Result<Vec<BemSurface>, BemError> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(err) => {
            return Err(BemError::Input(format!(
                "Unable to open {}: {err}",
                path.display()
            )))
        }
    };

    let tags = read_tags(&bytes)?;
    if tags.first().map(|t| t.kind) != Some(FIFF_FILE_ID) {
        return Err(BemError::Input(format!(
            "{} is not a FIF file",
            path.display()
        )));
    }

    let mut block_stack: Vec<i32> = Vec::new();
    let mut bem_coord_frame: Option<i32> = None;
    let mut current: Option<SurfaceFields> = None;
    let mut surfaces: Vec<BemSurface> = Vec::new();

    for tag in tags.iter() {
        match tag.kind {
            FIFF_BLOCK_START => {
                let block = tag.as_int()?;
                if block == FIFFB_BEM_SURF {
                    current = Some(SurfaceFields::default());
                }
                block_stack.push(block);
            }
            FIFF_BLOCK_END => {
                let block = tag.as_int()?;
                if block_stack.pop() != Some(block) {
                    return Err(BemError::Input(format!(
                        "Unbalanced block end {block} in {}",
                        path.display()
                    )));
                }
                if block == FIFFB_BEM_SURF {
                    if let Some(fields) = current.take() {
                        surfaces.push(fields.finish(bem_coord_frame)?);
                    }
                }
            }
            FIFF_BEM_COORD_FRAME if block_stack.last() == Some(&FIFFB_BEM) => {
                bem_coord_frame = Some(tag.as_int()?);
            }
            kind => {
                if let Some(fields) = current.as_mut() {
                    match kind {
                        FIFF_BEM_SIGMA => fields.sigma = Some(tag.as_float()?),
                        FIFF_BEM_SURF_ID => fields.id = Some(tag.as_int()?),
                        FIFF_MNE_COORD_FRAME => fields.coord_frame = Some(tag.as_int()?),
                        FIFF_BEM_SURF_NNODE => fields.nnode = Some(tag.as_int()?),
                        FIFF_BEM_SURF_NTRI => fields.ntri = Some(tag.as_int()?),
                        FIFF_BEM_SURF_NODES => fields.nodes = Some(tag.as_vector_matrix()?),
                        FIFF_BEM_SURF_TRIANGLES => fields.tris = Some(tag.as_int_matrix()?),
                        FIFF_BEM_SURF_NORMALS => fields.normals = Some(tag.as_vector_matrix()?),
                        _ => {}
                    }
                }
            }
        }
    }

    if surfaces.is_empty() {
        return Err(BemError::Input(format!(
            "No BEM surfaces found in {}",
            path.display()
        )));
    }

    debug!("read {} BEM surfaces from {}", surfaces.len(), path.display());

    Ok(surfaces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::COORD_FRAME_MRI;
    use crate::ico::ico_surface;

    fn layer(id: SurfaceId, sigma: f64, radius: f64, grade: u32) -> BemSurface {
        let mut surface = ico_surface(grade);
        surface.id = id;
        surface.sigma = sigma;
        surface.rr.iter_mut().for_each(|r| *r *= radius);
        surface
    }

    #[test]
    fn written_surfaces_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample-320-80-20-bem.fif");
        let surfaces = vec![
            layer(SurfaceId::Head, 0.3, 0.09, 2),
            layer(SurfaceId::Skull, 0.006, 0.085, 1),
            layer(SurfaceId::Brain, 0.3, 0.08, 0),
        ];
        write_bem_surfaces(&path, &surfaces).unwrap();

        let read = read_bem_surfaces(&path).unwrap();
        assert_eq!(read.len(), 3);
        for (a, b) in read.iter().zip(surfaces.iter()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.coord_frame, COORD_FRAME_MRI);
            assert!((a.sigma - b.sigma).abs() < 1e-7);
            assert_eq!(a.tris, b.tris);
            assert_eq!(a.np(), b.np());
            for (ra, rb) in a.rr.iter().zip(b.rr.iter()) {
                assert!((ra - rb).norm() < 1e-6);
            }
        }
    }

    #[test]
    fn file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brain-bem.fif");
        let brain = layer(SurfaceId::Brain, 0.3, 0.08, 0);
        write_bem_surfaces(&path, &[brain.clone()]).unwrap();

        let tags = read_tags(&std::fs::read(&path).unwrap()).unwrap();
        let kinds: Vec<i32> = tags.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                FIFF_FILE_ID,
                FIFF_DIR_POINTER,
                FIFF_FREE_LIST,
                FIFF_BLOCK_START,
                FIFF_BEM_COORD_FRAME,
                FIFF_BLOCK_START,
                FIFF_BEM_SIGMA,
                FIFF_BEM_SURF_ID,
                FIFF_MNE_COORD_FRAME,
                FIFF_BEM_SURF_NNODE,
                FIFF_BEM_SURF_NTRI,
                FIFF_BEM_SURF_NODES,
                FIFF_BEM_SURF_TRIANGLES,
                FIFF_BEM_SURF_NORMALS,
                FIFF_BLOCK_END,
                FIFF_BLOCK_END,
                FIFF_NOP,
            ]
        );
        assert_eq!(tags[0].fiff_type, FIFFT_ID_STRUCT);
        assert_eq!(tags[0].data.len(), 20);

        // triangles are stored one-based, with dims [ncols, nrows, ndim]
        let tris = &tags[12];
        assert_eq!(tris.fiff_type, FIFFT_MATRIX | FIFFT_INT);
        let stored = tris.as_int_matrix().unwrap();
        assert_eq!(stored.len(), 20);
        assert_eq!(stored[0][0], brain.tris[0][0] as i32 + 1);
        assert!(stored.iter().flatten().all(|v| *v >= 1 && *v <= 12));
        assert_eq!(&tris.data[tris.data.len() - 12..], &[0, 0, 0, 3, 0, 0, 0, 20, 0, 0, 0, 2]);
    }

    #[test]
    fn truncated_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brain-bem.fif");
        write_bem_surfaces(&path, &[layer(SurfaceId::Brain, 0.3, 0.08, 1)]).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
        let err = read_bem_surfaces(&path).unwrap_err();
        assert!(matches!(err, BemError::Input(_)));
    }

    #[test]
    fn non_fif_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes-bem.fif");
        let mut bytes: Vec<u8> = Vec::new();
        for v in [FIFF_NOP, FIFFT_VOID, 0, FIFFV_NEXT_NONE] {
            bytes.write_i32::<BigEndian>(v).unwrap();
        }
        std::fs::write(&path, bytes).unwrap();
        let err = read_bem_surfaces(&path).unwrap_err();
        assert!(err.to_string().contains("is not a FIF file"));
    }

    fn nop_tag(bytes: &mut Vec<u8>, next: i32) {
        for v in [FIFF_NOP, FIFFT_VOID, 0, next] {
            bytes.write_i32::<BigEndian>(v).unwrap();
        }
    }

    #[test]
    fn self_referencing_next_pointer_is_rejected() {
        let mut bytes: Vec<u8> = Vec::new();
        nop_tag(&mut bytes, FIFFV_NEXT_SEQ);
        nop_tag(&mut bytes, 16);
        let err = read_tags(&bytes).unwrap_err();
        assert!(matches!(err, BemError::Input(_)));
        assert!(err.to_string().contains("Invalid next pointer 16"));
    }

    #[test]
    fn backward_next_pointer_is_rejected() {
        let mut bytes: Vec<u8> = Vec::new();
        nop_tag(&mut bytes, FIFFV_NEXT_SEQ);
        nop_tag(&mut bytes, FIFFV_NEXT_SEQ);
        nop_tag(&mut bytes, 16);
        let err = read_tags(&bytes).unwrap_err();
        assert!(err.to_string().contains("Invalid next pointer 16 in tag 108"));
    }

    #[test]
    fn forward_next_pointer_skips_bytes() {
        let mut bytes: Vec<u8> = Vec::new();
        nop_tag(&mut bytes, 32);
        bytes.extend_from_slice(&[0xab; 16]);
        nop_tag(&mut bytes, FIFFV_NEXT_NONE);
        let tags = read_tags(&bytes).unwrap();
        assert_eq!(tags.len(), 2);
        assert!(tags.iter().all(|t| t.kind == FIFF_NOP));
    }

    #[test]
    fn unwritable_path_is_output_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("x-bem.fif");
        let err = write_bem_surfaces(&path, &[layer(SurfaceId::Brain, 0.3, 0.08, 0)]).unwrap_err();
        assert!(matches!(err, BemError::Output(_)));
    }
}
