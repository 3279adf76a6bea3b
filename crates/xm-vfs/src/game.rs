//! Game identification
//!
//! Works out the Title ID, Media ID and title strings of a file the user adds
//! to the library, whatever kind of file it is.

use crate::container::xiso::XisoContainerReader;
use crate::bytes::hex_upper;
use crate::formats::stfs::{ContentType, StfsReader, StfsSignatureType};
use crate::formats::xex::{XexFile, XexIds};
use crate::formats::xgd::XgdLayout;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use xm_core::config::LibraryConfig;
use xm_core::error::VfsError;

/// Kind of file a game was identified from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameSource {
    /// Disc image (`.iso`)
    Iso,
    /// Bare executable (`.xex`)
    Xex,
    /// STFS package (Games on Demand, XBLA, DLC)
    Package,
}

impl GameSource {
    /// Pick the reader for `path` from its extension
    pub fn from_path(path: &Path) -> Self {
        match extension_of(path).as_deref() {
            Some("iso") => Self::Iso,
            Some("xex") => Self::Xex,
            _ => Self::Package,
        }
    }
}

/// What could be learned about a game
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameIdentity {
    pub path: PathBuf,
    pub source: GameSource,
    pub title_id: String,
    pub media_id: String,
    /// Only packages carry a title; [`import`] labels untitled ones
    pub title: Option<String>,
    pub display_name: Option<String>,
    pub layout: Option<XgdLayout>,
    pub content_type: Option<ContentType>,
}

impl GameIdentity {
    fn from_xex(path: &Path, source: GameSource, ids: XexIds) -> Self {
        Self {
            path: path.to_path_buf(),
            source,
            title_id: ids.title_id,
            media_id: ids.media_id,
            title: None,
            display_name: None,
            layout: None,
            content_type: None,
        }
    }
}

/// Whether the library accepts `path`, given the configured extensions.
///
/// Packages are named by their Title ID and have no extension, so a file
/// without one is always accepted.
pub fn is_recognised(path: &Path, extensions: &[String]) -> bool {
    match extension_of(path) {
        Some(ext) => extensions.iter().any(|known| known.eq_ignore_ascii_case(&ext)),
        None => true,
    }
}

/// Identify a file being added to the library.
///
/// Files with an extension outside `library.recognised_extensions` are
/// refused, and a package without a title gets `library.unknown_title`.
pub fn import(path: &Path, library: &LibraryConfig) -> Result<GameIdentity, VfsError> {
    if !is_recognised(path, &library.recognised_extensions) {
        warn!("Refusing {:?}: extension not in {:?}", path, library.recognised_extensions);
        return Err(VfsError::UnsupportedExtension(path.to_path_buf()));
    }

    let mut identity = identify(path)?;
    if identity.source == GameSource::Package && identity.title.is_none() {
        identity.title = Some(library.unknown_title.clone());
    }
    Ok(identity)
}

/// Identify the game stored at `path`
pub fn identify(path: &Path) -> Result<GameIdentity, VfsError> {
    if !path.exists() {
        return Err(VfsError::FileNotFound(path.to_path_buf()));
    }

    let source = GameSource::from_path(path);
    debug!("Identifying {:?} as {:?}", path, source);

    let identity = match source {
        GameSource::Iso => identify_iso(path)?,
        GameSource::Xex => {
            let xex = XexFile::load(path)?;
            GameIdentity::from_xex(path, source, execution_ids(&xex)?)
        }
        GameSource::Package => identify_package(path)?,
    };

    info!(
        "Identified {:?}: title_id={}, media_id={}, title={:?}",
        path, identity.title_id, identity.media_id, identity.title
    );
    Ok(identity)
}

fn identify_iso(path: &Path) -> Result<GameIdentity, VfsError> {
    let reader = XisoContainerReader::new(path);
    let guard = reader.mount().ok_or(VfsError::NotMounted)?;

    let data = guard.reader().default_executable()?;
    let xex = XexFile::parse(&data)?;

    let mut identity = GameIdentity::from_xex(path, GameSource::Iso, execution_ids(&xex)?);
    identity.layout = reader.layout();
    Ok(identity)
}

fn identify_package(path: &Path) -> Result<GameIdentity, VfsError> {
    let mut package = StfsReader::open(path)?;
    let metadata = package.metadata()?;
    package.close();

    if let StfsSignatureType::Unknown(magic) = metadata.signature {
        return Err(VfsError::InvalidMagic {
            what: "STFS",
            found: hex_upper(&magic),
        });
    }

    Ok(GameIdentity {
        path: path.to_path_buf(),
        source: GameSource::Package,
        title_id: metadata.title_id,
        media_id: metadata.media_id,
        title: metadata.title,
        display_name: Some(metadata.display_name),
        layout: None,
        content_type: Some(metadata.content_type),
    })
}

fn execution_ids(xex: &XexFile) -> Result<XexIds, VfsError> {
    xex.header.check_magic()?;
    xex.ids()
        .ok_or_else(|| VfsError::EntryNotFound("XEX execution info".to_string()))
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}
