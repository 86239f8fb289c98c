//! Durable storage for lattices, metrics and compression models.
//!
//! # Lattice dump format
//!
//! ```text
//! Header (52 bytes):
//!   Magic: "VXLD" (4 bytes)
//!   Version: u16
//!   Flags: u16 (compression in the lower 4 bits)
//!   Shape: 3 x u32 (x, y, z)
//!   Lattice count: u64
//!   Stored payload size: u64
//!   Reserved: 16 bytes
//!
//! Payload:
//!   count * x * y * z bytes, one cell label per byte, lattices back to back
//!   Optionally LZ4 compressed as a single block
//! ```

mod format;
mod store;

use std::io::{self, Read, Write};

pub use format::{CompressionType, DUMP_MAGIC, DUMP_VERSION, DumpHeader};
pub use store::FileStore;

use crate::schema::{CellLabel, Lattice};

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Lattice {index} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        index: usize,
        expected: [usize; 3],
        found: [usize; 3],
    },
    #[error("Corrupt lattice dump: {0}")]
    Corrupt(String),
}

/// Write `lattices` as a single dump using `compression`.
///
/// All lattices must share one shape; an empty slice writes a zero-shape
/// header. Requesting LZ4 without the `lz4` feature writes an uncompressed
/// dump and records that in the header.
pub fn write_lattices<W: Write>(
    w: &mut W,
    lattices: &[Lattice],
    compression: CompressionType,
) -> Result<(), StorageError> {
    let shape = lattices.first().map(|l| l.shape()).unwrap_or([0, 0, 0]);
    let mut payload = Vec::with_capacity(lattices.iter().map(|l| l.len()).sum());
    for (index, lattice) in lattices.iter().enumerate() {
        if lattice.shape() != shape {
            return Err(StorageError::ShapeMismatch {
                index,
                expected: shape,
                found: lattice.shape(),
            });
        }
        payload.extend(lattice.cells().iter().map(|c| *c as u8));
    }

    let (compression, stored) = match compression {
        CompressionType::None => (CompressionType::None, payload),
        CompressionType::Lz4 => match format::compress_lz4(&payload) {
            Some(packed) => (CompressionType::Lz4, packed),
            None => {
                log::warn!("LZ4 unavailable in this build, writing uncompressed dump");
                (CompressionType::None, payload)
            }
        },
    };

    let dim = |d: usize| {
        u32::try_from(d).map_err(|_| StorageError::Corrupt(format!("dimension {d} exceeds u32")))
    };
    let header = DumpHeader {
        shape: [dim(shape[0])?, dim(shape[1])?, dim(shape[2])?],
        count: lattices.len() as u64,
        compression,
    };
    header.write_to(w, stored.len() as u64)?;
    w.write_all(&stored)?;
    Ok(())
}

/// Read every lattice from a dump.
pub fn read_lattices<R: Read>(r: &mut R) -> Result<Vec<Lattice>, StorageError> {
    let (header, stored_size) = DumpHeader::read_from(r)?;
    let mut stored = vec![0u8; stored_size as usize];
    r.read_exact(&mut stored)?;

    let payload = match header.compression {
        CompressionType::None => stored,
        CompressionType::Lz4 => format::decompress_lz4(&stored)?,
    };
    if payload.len() != header.payload_size() {
        return Err(StorageError::Corrupt(format!(
            "payload holds {} bytes, header expects {}",
            payload.len(),
            header.payload_size()
        )));
    }

    let shape = header.shape.map(|d| d as usize);
    let cells_per_lattice: usize = shape.iter().product();
    if cells_per_lattice == 0 {
        return Ok(Vec::new());
    }

    payload
        .chunks_exact(cells_per_lattice)
        .map(|chunk| {
            let cells = chunk
                .iter()
                .map(|b| {
                    CellLabel::from_u8(*b)
                        .ok_or_else(|| StorageError::Corrupt(format!("invalid cell label {b}")))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Lattice::from_cells(shape, cells)
                .ok_or_else(|| StorageError::Corrupt("cell count mismatch".into()))
        })
        .collect()
}
