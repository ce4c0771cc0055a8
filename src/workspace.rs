use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use geo::MultiPolygon;
use tempfile::TempDir;
use tracing::debug;

/// Run-scoped workspace handle passed to every pipeline stage: the CRS tag
/// of the (projected, meters) inputs and an exclusive scratch directory for
/// intermediate-layer dumps.
///
/// Each invocation gets its own timestamped scratch directory; nothing is
/// shared between runs. The directory is removed when the workspace drops
/// unless [`Workspace::keep_scratch`] was requested.
pub struct Workspace {
    epsg: Option<u32>,
    scratch: Option<TempDir>,
    keep: bool,
    dump_layers: bool,
}

impl Workspace {
    /// Create a workspace with a fresh scratch directory.
    pub fn new(epsg: Option<u32>) -> Result<Self> {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let scratch = tempfile::Builder::new()
            .prefix(&format!("consite_{stamp}_"))
            .tempdir()
            .context("failed to create scratch workspace")?;
        debug!(path = %scratch.path().display(), "scratch workspace created");
        Ok(Self {
            epsg,
            scratch: Some(scratch),
            keep: false,
            dump_layers: false,
        })
    }

    /// A workspace without a scratch directory; layer dumps become no-ops.
    pub fn in_memory(epsg: Option<u32>) -> Self {
        Self {
            epsg,
            scratch: None,
            keep: false,
            dump_layers: false,
        }
    }

    /// EPSG code of the projected CRS, if known.
    #[inline]
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Enable GeoJSON dumps of intermediate layers into the scratch
    /// directory, for inspection when a run misbehaves.
    pub fn dump_layers(mut self, on: bool) -> Self {
        self.dump_layers = on;
        self
    }

    /// Keep the scratch directory on disk after the run.
    pub fn keep_scratch(mut self) -> Self {
        self.keep = true;
        self
    }

    /// Path of the scratch directory, if one exists.
    pub fn scratch_path(&self) -> Option<&Path> {
        self.scratch.as_ref().map(|d| d.path())
    }

    /// Dump a named intermediate layer to the scratch directory.
    pub fn dump(&self, name: &str, geoms: &[MultiPolygon<f64>]) {
        if !self.dump_layers {
            return;
        }
        let Some(dir) = self.scratch_path() else { return };
        let path: PathBuf = dir.join(format!("{name}.geojson"));
        if let Err(err) = crate::io::write_geojson(&path, geoms) {
            debug!(%name, %err, "failed to dump scratch layer");
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.keep {
            if let Some(dir) = self.scratch.take() {
                let path = dir.keep();
                debug!(path = %path.display(), "scratch workspace kept");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Workspace;

    #[test]
    fn scratch_dirs_are_unique_per_run() {
        let a = Workspace::new(Some(32617)).unwrap();
        let b = Workspace::new(Some(32617)).unwrap();
        assert_ne!(a.scratch_path(), b.scratch_path());
        assert!(a.scratch_path().unwrap().exists());
    }

    #[test]
    fn in_memory_has_no_scratch() {
        let ws = Workspace::in_memory(None);
        assert!(ws.scratch_path().is_none());
        ws.dump("noop", &[]);
    }
}
