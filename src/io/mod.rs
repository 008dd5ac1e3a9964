//! Bounded file loading.
//!
//! `SafeReader` memory-maps the input read-only and refuses files that are
//! empty or larger than the configured limit. Every view handed out borrows
//! from the reader, so the mapping outlives whatever is parsed from it.

pub mod error;

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::{debug, warn};

use crate::config::IoConfig;
use crate::io::error::{IoError, Result};

/// A read-only, size-checked memory map of one file.
pub struct SafeReader {
    path: PathBuf,
    mmap: Mmap,
}

impl SafeReader {
    /// Opens a file and memory-maps it.
    ///
    /// Fails with `FileTooLarge` past `config.max_file_size` and with
    /// `EmptyFile` for zero-length files, which cannot be mapped.
    pub fn open<P: AsRef<Path>>(path: P, config: &IoConfig) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();

        debug!(
            path = %path.display(),
            size = file_size,
            max_file_size = config.max_file_size,
            "Opening file"
        );

        if file_size > config.max_file_size {
            warn!(
                path = %path.display(),
                size = file_size,
                limit = config.max_file_size,
                "File is too large"
            );
            return Err(IoError::FileTooLarge {
                limit: config.max_file_size,
                found: file_size,
            });
        }
        if file_size == 0 {
            return Err(IoError::EmptyFile);
        }

        // Safety: read-only map of a regular file; the bytes are never written through.
        let mmap = unsafe { Mmap::map(&file)? };

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the mapped file in bytes.
    pub fn size(&self) -> u64 {
        self.mmap.len() as u64
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }
}
