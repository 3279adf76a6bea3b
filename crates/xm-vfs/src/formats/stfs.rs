//! STFS package reader
//!
//! Reads identifying fields from the fixed-offset header of Xbox 360 packages
//! (`CON `, `LIVE` and `PIRS`). Signatures and the block allocation tables are
//! not checked.

use crate::bytes::{hex_upper, read_u32_be, utf8_without_nulls};
use crate::constants::*;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use xm_core::error::VfsError;

/// Who signed the package, from the magic at offset 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StfsSignatureType {
    /// Console-signed (`CON `)
    Console,
    /// Signed by Xbox LIVE (`LIVE`)
    Live,
    /// Signed by Microsoft for offline distribution (`PIRS`)
    Pirs,
    Unknown([u8; 4]),
}

impl StfsSignatureType {
    pub fn from_magic(magic: [u8; 4]) -> Self {
        match &magic {
            b"CON " => Self::Console,
            b"LIVE" => Self::Live,
            b"PIRS" => Self::Pirs,
            _ => Self::Unknown(magic),
        }
    }

    pub fn is_known(self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl std::fmt::Display for StfsSignatureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Console => write!(f, "CON"),
            Self::Live => write!(f, "LIVE"),
            Self::Pirs => write!(f, "PIRS"),
            Self::Unknown(magic) => write!(f, "unknown ({})", hex_upper(magic)),
        }
    }
}

/// Kind of content held by a package (big-endian u32 at 0x344)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    SavedGame,
    MarketplaceContent,
    Publisher,
    Xbox360Title,
    IptvPauseBuffer,
    InstalledGame,
    XboxOriginalGame,
    GameOnDemand,
    AvatarItem,
    Profile,
    GamerPicture,
    Theme,
    CacheFile,
    StorageDownload,
    XboxSavedGame,
    XboxDownload,
    GameDemo,
    Video,
    GameTitle,
    Installer,
    GameTrailer,
    ArcadeTitle,
    Xna,
    LicenseStore,
    Movie,
    Tv,
    MusicVideo,
    GameVideo,
    PodcastVideo,
    ViralVideo,
    CommunityGame,
    Unknown(u32),
}

impl ContentType {
    pub fn code(self) -> u32 {
        match self {
            Self::SavedGame => 0x0000_0001,
            Self::MarketplaceContent => 0x0000_0002,
            Self::Publisher => 0x0000_0003,
            Self::Xbox360Title => 0x0000_1000,
            Self::IptvPauseBuffer => 0x0000_2000,
            Self::InstalledGame => 0x0000_4000,
            Self::XboxOriginalGame => 0x0000_5000,
            Self::GameOnDemand => 0x0000_7000,
            Self::AvatarItem => 0x0000_9000,
            Self::Profile => 0x0001_0000,
            Self::GamerPicture => 0x0002_0000,
            Self::Theme => 0x0003_0000,
            Self::CacheFile => 0x0004_0000,
            Self::StorageDownload => 0x0005_0000,
            Self::XboxSavedGame => 0x0006_0000,
            Self::XboxDownload => 0x0007_0000,
            Self::GameDemo => 0x0008_0000,
            Self::Video => 0x0009_0000,
            Self::GameTitle => 0x000A_0000,
            Self::Installer => 0x000B_0000,
            Self::GameTrailer => 0x000C_0000,
            Self::ArcadeTitle => 0x000D_0000,
            Self::Xna => 0x000E_0000,
            Self::LicenseStore => 0x000F_0000,
            Self::Movie => 0x0010_0000,
            Self::Tv => 0x0020_0000,
            Self::MusicVideo => 0x0030_0000,
            Self::GameVideo => 0x0040_0000,
            Self::PodcastVideo => 0x0050_0000,
            Self::ViralVideo => 0x0060_0000,
            Self::CommunityGame => 0x0200_0000,
            Self::Unknown(code) => code,
        }
    }

    /// Eight-digit uppercase hex code, as used for content folder names
    pub fn hex_code(self) -> String {
        format!("{:08X}", self.code())
    }
}

impl From<u32> for ContentType {
    fn from(code: u32) -> Self {
        const KNOWN: [ContentType; 31] = [
            ContentType::SavedGame,
            ContentType::MarketplaceContent,
            ContentType::Publisher,
            ContentType::Xbox360Title,
            ContentType::IptvPauseBuffer,
            ContentType::InstalledGame,
            ContentType::XboxOriginalGame,
            ContentType::GameOnDemand,
            ContentType::AvatarItem,
            ContentType::Profile,
            ContentType::GamerPicture,
            ContentType::Theme,
            ContentType::CacheFile,
            ContentType::StorageDownload,
            ContentType::XboxSavedGame,
            ContentType::XboxDownload,
            ContentType::GameDemo,
            ContentType::Video,
            ContentType::GameTitle,
            ContentType::Installer,
            ContentType::GameTrailer,
            ContentType::ArcadeTitle,
            ContentType::Xna,
            ContentType::LicenseStore,
            ContentType::Movie,
            ContentType::Tv,
            ContentType::MusicVideo,
            ContentType::GameVideo,
            ContentType::PodcastVideo,
            ContentType::ViralVideo,
            ContentType::CommunityGame,
        ];
        KNOWN
            .into_iter()
            .find(|kind| kind.code() == code)
            .unwrap_or(Self::Unknown(code))
    }
}

/// Every identifying field of a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StfsMetadata {
    pub signature: StfsSignatureType,
    pub content_type: ContentType,
    pub title_id: String,
    pub media_id: String,
    /// `None` when the title field is empty
    pub title: Option<String>,
    pub display_name: String,
}

/// Reader over an STFS package.
///
/// Every accessor seeks to its own field, so calls may come in any order.
/// After [`close`](Self::close) all accessors fail with [`VfsError::NotOpened`].
#[derive(Debug)]
pub struct StfsReader<R = File> {
    path: Option<PathBuf>,
    stream: Option<R>,
}

impl StfsReader<File> {
    /// Open a package file read-only
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VfsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VfsError::FileNotFound(path.to_path_buf()));
        }
        let file = File::open(path)?;
        info!("Opened STFS package: {:?}", path.file_name().unwrap_or(path.as_os_str()));
        Ok(Self {
            path: Some(path.to_path_buf()),
            stream: Some(file),
        })
    }
}

impl<R: Read + Seek> StfsReader<R> {
    /// Wrap an already open stream
    pub fn from_reader(stream: R) -> Self {
        Self {
            path: None,
            stream: Some(stream),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Release the underlying stream
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!("Closed STFS package {:?}", self.path);
        }
    }

    /// Read up to `len` bytes at `offset`; shorter near the end of the file
    fn read_field(&mut self, offset: u64, len: usize) -> Result<Vec<u8>, VfsError> {
        let stream = self.stream.as_mut().ok_or(VfsError::NotOpened)?;
        stream.seek(SeekFrom::Start(offset))?;
        let mut data = Vec::with_capacity(len);
        stream.by_ref().take(len as u64).read_to_end(&mut data)?;
        Ok(data)
    }

    /// Title ID as uppercase hex of the raw bytes at 0x360
    pub fn title_id(&mut self) -> Result<String, VfsError> {
        let bytes = self.read_field(STFS_TITLEID_OFFSET, STFS_TITLEID_LENGTH)?;
        Ok(hex_upper(&bytes))
    }

    /// Media ID as uppercase hex of the raw bytes at 0x354
    pub fn media_id(&mut self) -> Result<String, VfsError> {
        let bytes = self.read_field(STFS_MEDIAID_OFFSET, STFS_MEDIAID_LENGTH)?;
        Ok(hex_upper(&bytes))
    }

    /// Title name, or `"Not found"` when the field is empty
    pub fn title(&mut self) -> Result<String, VfsError> {
        Ok(self
            .stored_title()?
            .unwrap_or_else(|| STFS_TITLE_NOT_FOUND.to_string()))
    }

    /// Title name as stored, `None` when the field is empty
    pub fn stored_title(&mut self) -> Result<Option<String>, VfsError> {
        let bytes = self.read_field(STFS_TITLE_OFFSET, STFS_TITLE_LENGTH)?;
        let title = utf8_without_nulls(&bytes);
        if title.is_empty() {
            debug!("Title not found");
            return Ok(None);
        }
        debug!("Title found: {}", title);
        Ok(Some(title))
    }

    pub fn display_name(&mut self) -> Result<String, VfsError> {
        let bytes = self.read_field(STFS_DISPLAYNAME_OFFSET, STFS_TITLE_LENGTH)?;
        let display_name = utf8_without_nulls(&bytes);
        debug!("Display name: {}", display_name);
        Ok(display_name)
    }

    pub fn signature_type(&mut self) -> Result<StfsSignatureType, VfsError> {
        let bytes = self.read_field(STFS_MAGIC_OFFSET, 4)?;
        let magic: [u8; 4] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| VfsError::truncated("STFS magic", STFS_MAGIC_OFFSET as usize, 4, bytes.len()))?;
        Ok(StfsSignatureType::from_magic(magic))
    }

    pub fn content_type(&mut self) -> Result<ContentType, VfsError> {
        let bytes = self.read_field(STFS_CONTENT_TYPE_OFFSET, 4)?;
        let code = read_u32_be(&bytes, 0, "STFS content type")?;
        Ok(ContentType::from(code))
    }

    /// Read every identifying field at once
    pub fn metadata(&mut self) -> Result<StfsMetadata, VfsError> {
        Ok(StfsMetadata {
            signature: self.signature_type()?,
            content_type: self.content_type()?,
            title_id: self.title_id()?,
            media_id: self.media_id()?,
            title: self.stored_title()?,
            display_name: self.display_name()?,
        })
    }
}
