//! Binary format definitions for lattice dump files.

use std::io::{self, Read, Write};

/// Magic bytes identifying a lattice dump file.
pub const DUMP_MAGIC: &[u8; 4] = b"VXLD";

/// Current format version.
pub const DUMP_VERSION: u16 = 1;

/// Compression type for the cell payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CompressionType {
    /// One raw byte per cell.
    #[default]
    None = 0,
    /// LZ4 fast compression.
    Lz4 = 1,
}

impl CompressionType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(CompressionType::None),
            1 => Some(CompressionType::Lz4),
            _ => None,
        }
    }

    /// Best compression this build can write.
    pub fn preferred() -> Self {
        if cfg!(feature = "lz4") {
            CompressionType::Lz4
        } else {
            CompressionType::None
        }
    }
}

/// File header for the lattice dump format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpHeader {
    /// Lattice dimensions (x, y, z).
    pub shape: [u32; 3],
    /// Number of lattices in the file.
    pub count: u64,
    /// Payload compression (lower 4 bits of the flags word).
    pub compression: CompressionType,
}

impl DumpHeader {
    /// Size of header in bytes.
    /// Magic(4) + Version(2) + Flags(2) + Shape(12) + Count(8) +
    /// PayloadSize(8) + Reserved(16) = 52
    pub const SIZE: usize = 52;

    /// Uncompressed payload size in bytes.
    pub fn payload_size(&self) -> usize {
        self.shape.iter().map(|d| *d as usize).product::<usize>() * self.count as usize
    }

    /// Write header followed by the stored payload length.
    pub fn write_to<W: Write>(&self, w: &mut W, stored_size: u64) -> io::Result<()> {
        w.write_all(DUMP_MAGIC)?;
        w.write_all(&DUMP_VERSION.to_le_bytes())?;
        w.write_all(&(self.compression as u16).to_le_bytes())?;
        for d in self.shape {
            w.write_all(&d.to_le_bytes())?;
        }
        w.write_all(&self.count.to_le_bytes())?;
        w.write_all(&stored_size.to_le_bytes())?;
        // Reserved bytes
        w.write_all(&[0u8; 16])?;
        Ok(())
    }

    /// Read header and the stored payload length.
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<(Self, u64)> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != DUMP_MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Invalid VXLD magic bytes",
            ));
        }

        let mut buf2 = [0u8; 2];
        let mut buf4 = [0u8; 4];
        let mut buf8 = [0u8; 8];

        r.read_exact(&mut buf2)?;
        let version = u16::from_le_bytes(buf2);
        if version != DUMP_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unsupported VXLD version: {}", version),
            ));
        }

        r.read_exact(&mut buf2)?;
        let flags = u16::from_le_bytes(buf2);
        let compression = CompressionType::from_u8((flags & 0x0F) as u8).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unknown VXLD compression: {}", flags & 0x0F),
            )
        })?;

        let mut shape = [0u32; 3];
        for d in &mut shape {
            r.read_exact(&mut buf4)?;
            *d = u32::from_le_bytes(buf4);
        }

        r.read_exact(&mut buf8)?;
        let count = u64::from_le_bytes(buf8);

        r.read_exact(&mut buf8)?;
        let stored_size = u64::from_le_bytes(buf8);

        let mut reserved = [0u8; 16];
        r.read_exact(&mut reserved)?;

        Ok((
            Self {
                shape,
                count,
                compression,
            },
            stored_size,
        ))
    }
}

/// Compress data using LZ4.
#[cfg(feature = "lz4")]
pub fn compress_lz4(data: &[u8]) -> Option<Vec<u8>> {
    Some(lz4_flex::compress_prepend_size(data))
}

/// Decompress LZ4 data.
#[cfg(feature = "lz4")]
pub fn decompress_lz4(data: &[u8]) -> io::Result<Vec<u8>> {
    lz4_flex::decompress_size_prepended(data)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// LZ4 is not available in this build.
#[cfg(not(feature = "lz4"))]
pub fn compress_lz4(_data: &[u8]) -> Option<Vec<u8>> {
    None
}

#[cfg(not(feature = "lz4"))]
pub fn decompress_lz4(_data: &[u8]) -> io::Result<Vec<u8>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "LZ4-compressed dump requires the lz4 feature",
    ))
}
