//! Persistent tile store laid out as `{root}/{zoom}/{i}/{j}.png`.
//!
//! Writes go through a temp file plus rename so a crash mid-write never
//! leaves a truncated tile that would later be served as a cache hit.

use crate::core::address::TileAddress;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Opens the cache under the platform cache directory
    /// (`~/.cache/slipmap-tiles` on Linux), falling back to the temp dir when
    /// the platform has no cache location.
    pub fn at_default_location() -> io::Result<Self> {
        let base = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
        Self::new(base.join("slipmap-tiles"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, address: TileAddress) -> PathBuf {
        self.root
            .join(address.zoom.to_string())
            .join(address.i.to_string())
            .join(format!("{}.png", address.j))
    }

    pub fn contains(&self, address: TileAddress) -> bool {
        self.path_for(address).is_file()
    }

    /// Cached bytes for the address, `None` on a miss. Read failures on an
    /// existing file are treated as misses so a damaged entry is re-fetched.
    pub fn read(&self, address: TileAddress) -> Option<Vec<u8>> {
        fs::read(self.path_for(address)).ok()
    }

    /// Persist tile bytes atomically: write to a unique temp file in the
    /// final directory, then rename over the destination.
    pub fn write(&self, address: TileAddress, bytes: &[u8]) -> io::Result<()> {
        let path = self.path_for(address);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp = path.with_extension(format!(
            "tmp-{}-{}",
            process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&temp, bytes)?;
        if let Err(error) = fs::rename(&temp, &path) {
            let _ = fs::remove_file(&temp);
            return Err(error);
        }
        Ok(())
    }
}
