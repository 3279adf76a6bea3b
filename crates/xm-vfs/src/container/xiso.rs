//! XISO container reader
//!
//! Mounts an Xbox disc image, optionally split into sibling slices named
//! `<base>.<digit>.iso`, and extracts its boot executable.

use super::{extract_default_executable, read_root_directory, ContainerReader, DirectoryEntry};
use crate::decoder::iso::{open_slices, IsoSectorDecoder};
use crate::formats::xgd::{XgdInfo, XgdLayout};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use xm_core::error::VfsError;

const ISO_EXTENSION: &str = "iso";

#[derive(Debug, Default)]
struct MountState {
    mount_count: usize,
    decoder: Option<IsoSectorDecoder>,
    disposed: bool,
}

/// Reader for `.iso` disc images
#[derive(Debug)]
pub struct XisoContainerReader {
    path: PathBuf,
    state: Mutex<MountState>,
}

impl XisoContainerReader {
    /// Create a reader for `path`. Nothing is opened until the first mount.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(MountState::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `path` is an existing file with an `.iso` extension
    pub fn is_iso(path: &Path) -> bool {
        path.is_file()
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(ISO_EXTENSION))
    }

    /// Every file making up the image `path` belongs to, in read order.
    ///
    /// `game.1.iso` selects all of `game.<digit>.iso` in the same directory,
    /// sorted by name. Any other name is a single-file image.
    pub fn slice_paths(path: &Path) -> Result<Vec<PathBuf>, VfsError> {
        let Some((base, extension)) = slice_pattern(path) else {
            return Ok(vec![path.to_path_buf()]);
        };

        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&directory)? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else { continue };
            if is_slice_name(&name, &base, &extension) && entry.path().is_file() {
                names.push(name);
            }
        }

        let slices = sibling_paths(path, names);
        debug!("Image {:?} has {} slice(s): {:?}", path, slices.len(), slices);
        Ok(slices)
    }

    /// Mount and return a guard that dismounts when dropped
    pub fn mount(&self) -> Option<MountGuard<'_>> {
        self.try_mount().then(|| MountGuard { reader: self, held: true })
    }

    /// Disc information of the mounted image
    pub fn xgd_info(&self) -> Result<XgdInfo, VfsError> {
        self.with_decoder(|decoder| decoder.xgd_info().cloned())
    }

    /// Detected layout of the mounted image
    pub fn layout(&self) -> Option<XgdLayout> {
        self.state.lock().decoder.as_ref().and_then(|decoder| decoder.layout())
    }

    /// Every entry of the root directory listing, in walk order
    pub fn root_entries(&self) -> Result<Vec<DirectoryEntry>, VfsError> {
        self.with_decoder(|decoder| {
            let info = decoder.xgd_info()?.clone();
            read_root_directory(decoder, &info)?.entries()
        })
    }

    /// Contents of the boot executable, reporting why it could not be read
    pub fn default_executable(&self) -> Result<Vec<u8>, VfsError> {
        self.with_decoder(|decoder| {
            let info = decoder.xgd_info()?.clone();
            extract_default_executable(decoder, &info)
        })
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    fn with_decoder<T, F>(&self, f: F) -> Result<T, VfsError>
    where
        F: FnOnce(&mut IsoSectorDecoder) -> Result<T, VfsError>,
    {
        let mut state = self.state.lock();
        if state.disposed {
            return Err(VfsError::Disposed);
        }
        if state.mount_count == 0 {
            return Err(VfsError::NotMounted);
        }
        let decoder = state.decoder.as_mut().ok_or(VfsError::NotMounted)?;
        f(decoder)
    }

    fn open(&self) -> Result<IsoSectorDecoder, VfsError> {
        if !self.path.exists() {
            return Err(VfsError::FileNotFound(self.path.clone()));
        }
        if !Self::is_iso(&self.path) {
            return Err(VfsError::UnsupportedExtension(self.path.clone()));
        }

        let paths = Self::slice_paths(&self.path)?;
        let mut decoder = IsoSectorDecoder::new(open_slices(&paths)?);
        if !decoder.init() {
            return Err(VfsError::UnknownLayout);
        }
        Ok(decoder)
    }

    /// Take another reference on an already mounted image
    fn retain(&self) -> bool {
        let mut state = self.state.lock();
        if state.disposed || state.mount_count == 0 {
            return false;
        }
        state.mount_count += 1;
        true
    }
}

impl ContainerReader for XisoContainerReader {
    fn try_mount(&self) -> bool {
        let mut state = self.state.lock();
        if state.disposed {
            warn!("Cannot mount {:?}: reader has been disposed", self.path);
            return false;
        }
        if state.decoder.is_some() {
            state.mount_count += 1;
            return true;
        }

        match self.open() {
            Ok(decoder) => {
                info!(
                    "Mounted ISO: {:?}, layout: {:?}, {} slice(s)",
                    self.path,
                    decoder.layout(),
                    decoder.slices().len()
                );
                state.decoder = Some(decoder);
                state.mount_count = 1;
                true
            }
            Err(e) => {
                error!("Failed to mount {:?}: {}", self.path, e);
                false
            }
        }
    }

    fn dismount(&self) {
        let mut state = self.state.lock();
        state.mount_count = state.mount_count.saturating_sub(1);
    }

    fn mount_count(&self) -> usize {
        self.state.lock().mount_count
    }

    fn try_get_default(&self) -> Option<Vec<u8>> {
        match self.default_executable() {
            Ok(data) => {
                info!("Extracted default executable from {:?} ({} bytes)", self.path, data.len());
                Some(data)
            }
            Err(e) => {
                error!("Failed to extract default executable from {:?}: {}", self.path, e);
                None
            }
        }
    }

    fn dispose(&self) {
        let mut state = self.state.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;
        state.mount_count = 0;
        if state.decoder.take().is_some() {
            debug!("Closed image streams for {:?}", self.path);
        }
    }
}

impl Drop for XisoContainerReader {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// One outstanding mount of an [`XisoContainerReader`].
///
/// Cloning takes another mount, dropping releases one. A clone made once the
/// count is already zero holds nothing and releases nothing. The image stays
/// open until the reader is disposed.
#[derive(Debug)]
pub struct MountGuard<'a> {
    reader: &'a XisoContainerReader,
    held: bool,
}

impl<'a> MountGuard<'a> {
    pub fn reader(&self) -> &'a XisoContainerReader {
        self.reader
    }

    /// Whether this guard owns one of the reader's mounts
    pub fn is_held(&self) -> bool {
        self.held
    }
}

impl Clone for MountGuard<'_> {
    fn clone(&self) -> Self {
        Self {
            reader: self.reader,
            held: self.reader.retain(),
        }
    }
}

impl Drop for MountGuard<'_> {
    fn drop(&mut self) {
        if self.held {
            self.reader.dismount();
        }
    }
}

/// `(base, extension)` when the file name looks like `<base>.<digit>.<extension>`
fn slice_pattern(path: &Path) -> Option<(String, String)> {
    let name = path.file_name()?.to_str()?;
    let (stem, extension) = name.rsplit_once('.')?;
    let (base, index) = stem.rsplit_once('.')?;
    let is_index = index.len() == 1 && index.bytes().all(|b| b.is_ascii_digit());
    (is_index && !base.is_empty()).then(|| (base.to_string(), extension.to_string()))
}

/// Paths of the slices `names`, sorted, built from `path` so they keep its form
fn sibling_paths(path: &Path, mut names: Vec<String>) -> Vec<PathBuf> {
    if names.is_empty() {
        return vec![path.to_path_buf()];
    }
    names.sort();
    names
        .into_iter()
        .map(|name| {
            if path.file_name().and_then(|n| n.to_str()) == Some(name.as_str()) {
                path.to_path_buf()
            } else {
                path.with_file_name(name)
            }
        })
        .collect()
}

fn is_slice_name(name: &str, base: &str, extension: &str) -> bool {
    let Some((stem, ext)) = name.rsplit_once('.') else {
        return false;
    };
    let Some((stem_base, index)) = stem.rsplit_once('.') else {
        return false;
    };
    stem_base == base
        && ext.eq_ignore_ascii_case(extension)
        && index.len() == 1
        && index.bytes().all(|b| b.is_ascii_digit())
}
