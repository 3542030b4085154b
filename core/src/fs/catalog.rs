//! Ordered listing of storage tile files; the position in the listing is the storage index.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tracing::debug;
use zip::read::ZipArchive;

use super::{Result, util};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Folder,
    Zip,
}

/// Storage tiles of one product, sorted in natural name order.
#[derive(Debug, Clone)]
pub struct TileCatalog {
    root: PathBuf,
    kind: CatalogKind,
    entries: Vec<PathBuf>,
}

impl TileCatalog {
    /// Open a directory or a zip archive of tile images.
    pub fn open(path: &Path) -> Result<Self> {
        if path.is_dir() { Self::from_folder(path) } else { Self::from_zip(path) }
    }

    pub fn from_folder(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(anyhow!("tile folder {:?} is not a directory", root));
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(root).with_context(|| format!("listing {}", root.display()))? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if util::is_hidden(&path) || !util::is_tile_file(&path) {
                continue;
            }
            entries.push(path.strip_prefix(root).unwrap_or(path.as_path()).to_path_buf());
        }
        entries.sort_by(|a, b| util::natural_cmp_path(a, b));

        debug!(target: "mosaic::fs", tiles = entries.len(), "catalogued tile folder {}", root.display());
        Ok(Self { root: root.to_path_buf(), kind: CatalogKind::Folder, entries })
    }

    pub fn from_zip(path: &Path) -> Result<Self> {
        let mut archive = open_zip(path)?;
        let mut entries = Vec::new();
        for idx in 0..archive.len() {
            let file = archive.by_index(idx).map_err(|err| anyhow!("{}", err))?;
            if file.is_dir() {
                continue;
            }
            let Some(enclosed) = file.enclosed_name() else {
                continue;
            };
            let Some(sanitized) = util::sanitize_zip_path(&enclosed) else {
                continue;
            };
            if util::is_hidden(&sanitized) || !util::is_tile_file(&sanitized) {
                continue;
            }
            entries.push(sanitized);
        }
        entries.sort_by(|a, b| util::natural_cmp_path(a, b));

        debug!(target: "mosaic::fs", tiles = entries.len(), "catalogued tile archive {}", path.display());
        Ok(Self { root: path.to_path_buf(), kind: CatalogKind::Zip, entries })
    }

    pub fn kind(&self) -> CatalogKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, storage_index: usize) -> Option<&Path> {
        self.entries.get(storage_index).map(PathBuf::as_path)
    }

    /// Raw encoded bytes of one storage tile.
    pub fn read(&self, storage_index: usize) -> Result<Vec<u8>> {
        let entry = self.entry(storage_index).ok_or_else(|| {
            anyhow!("storage tile {storage_index} not present in catalog of {} tiles", self.len())
        })?;

        match self.kind {
            CatalogKind::Folder => {
                let path = self.root.join(entry);
                fs::read(&path).with_context(|| format!("reading tile {}", path.display()))
            }
            CatalogKind::Zip => {
                let mut archive = open_zip(&self.root)?;
                let name = entry.to_string_lossy().replace('\\', "/");
                let mut file = archive.by_name(&name).map_err(|err| anyhow!("{name}: {err}"))?;
                let mut bytes = Vec::with_capacity(file.size() as usize);
                file.read_to_end(&mut bytes).with_context(|| format!("inflating tile {name}"))?;
                Ok(bytes)
            }
        }
    }
}

fn open_zip(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path).with_context(|| format!("opening tile archive {:?}", path))?;
    ZipArchive::new(file).map_err(|err| anyhow!("{}", err))
}
