//! Gzip streaming and checksums.
//!
//! Compression hashes the compressed bytes on their way to disk, so the
//! artifact checksum is known the moment the artifact is complete.

use crate::error::{Error, IoResultExt, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Default compression level (6 = balanced speed/ratio).
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Statistics about a compression operation.
#[derive(Debug, Clone)]
pub struct CompressionStats {
    /// Original uncompressed size in bytes
    pub original_size: u64,

    /// Compressed size in bytes
    pub compressed_size: u64,

    /// SHA256 checksum of compressed data
    pub checksum: String,
}

impl CompressionStats {
    /// Compression ratio (compressed / original)
    pub fn compression_ratio(&self) -> f64 {
        if self.original_size > 0 {
            self.compressed_size as f64 / self.original_size as f64
        } else {
            0.0
        }
    }
}

/// Which side of a copy failed.
#[derive(Debug)]
pub(crate) enum CopyError {
    Read(io::Error),
    Write(io::Error),
}

/// Copies `reader` into `writer`, keeping read and write failures apart.
pub(crate) fn copy_split<R: Read + ?Sized, W: Write + ?Sized>(
    reader: &mut R,
    writer: &mut W,
) -> std::result::Result<u64, CopyError> {
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CopyError::Read(e)),
        };
        writer.write_all(&buf[..n]).map_err(CopyError::Write)?;
        total += n as u64;
    }
}

/// Gzips `source` into the already opened `dest` file.
///
/// `dest_path` is only used for error reporting.
pub fn compress_into(
    source: &Path,
    dest: &File,
    dest_path: &Path,
    level: u32,
) -> Result<CompressionStats> {
    let source_file = File::open(source).at(source)?;
    let original_size = source_file.metadata().at(source)?.len();

    let checksum_writer = ChecksumWriter::new(BufWriter::new(dest));
    let mut encoder = GzEncoder::new(checksum_writer, Compression::new(level.clamp(1, 9)));

    let mut reader = BufReader::new(source_file);
    copy_split(&mut reader, &mut encoder).map_err(|e| match e {
        CopyError::Read(e) => Error::io(source, e),
        CopyError::Write(e) => Error::io(dest_path, e),
    })?;

    let mut checksum_writer = encoder.finish().at(dest_path)?;
    checksum_writer.flush().at(dest_path)?;
    let checksum = checksum_writer.checksum();
    let compressed_size = checksum_writer.bytes_written;

    Ok(CompressionStats {
        original_size,
        compressed_size,
        checksum,
    })
}

/// Decompresses the gzip artifact at `source` into the opened `dest` file.
///
/// Failures reading the gzip stream are reported as a corrupt artifact,
/// failures writing `dest` as IO errors on `dest_path`.
pub fn decompress_into(source: &Path, dest: &File, dest_path: &Path) -> Result<u64> {
    let source_file = File::open(source).at(source)?;
    if source_file.metadata().at(source)?.len() == 0 {
        return Err(Error::corrupt(source, "empty file"));
    }

    let mut decoder = GzDecoder::new(BufReader::new(source_file));
    let mut writer = BufWriter::new(dest);

    let bytes_written = copy_split(&mut decoder, &mut writer).map_err(|e| match e {
        CopyError::Read(e) => Error::corrupt(source, e.to_string()),
        CopyError::Write(e) => Error::io(dest_path, e),
    })?;
    writer.flush().at(dest_path)?;

    Ok(bytes_written)
}

/// Calculates SHA256 checksum of a file.
pub fn calculate_checksum(path: &Path) -> Result<String> {
    let mut file = File::open(path).at(path)?;

    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).at(path)?;

    Ok(format!("{:x}", hasher.finalize()))
}

/// Writer that calculates SHA256 checksum while writing.
struct ChecksumWriter<W: Write> {
    writer: W,
    hasher: Sha256,
    bytes_written: u64,
}

impl<W: Write> ChecksumWriter<W> {
    fn new(writer: W) -> Self {
        Self {
            writer,
            hasher: Sha256::new(),
            bytes_written: 0,
        }
    }

    fn checksum(&self) -> String {
        format!("{:x}", self.hasher.clone().finalize())
    }
}

impl<W: Write> Write for ChecksumWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.writer.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
