//! XGD (Xbox Game Disc) header
//!
//! The header occupies one full sector. All fields are little-endian:
//!
//! | Offset | Size  | Field                         |
//! |--------|-------|-------------------------------|
//! | 0x000  | 20    | magic `MICROSOFT*XBOX*MEDIA`  |
//! | 0x014  | 4     | root directory sector         |
//! | 0x018  | 4     | root directory size in bytes  |
//! | 0x01C  | 8     | creation time (FILETIME)      |
//! | 0x024  | 0x7C8 | padding                       |
//! | 0x7EC  | 20    | magic again                   |

use crate::bytes::{array_at, read_i64_le, read_u32_le};
use crate::constants::*;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use xm_core::error::VfsError;

/// FILETIME ticks (100ns) between 1601-01-01 and 1970-01-01
const FILETIME_UNIX_EPOCH: i64 = 116_444_736_000_000_000;

/// On-disc layout variant, in probe order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XgdLayout {
    /// XDK-built image, game partition starts at sector 0
    Xdki,
    /// Full original Xbox disc dump
    Xgd1,
    /// Full Xbox 360 XGD2 disc dump
    Xgd2,
    /// Full Xbox 360 XGD3 disc dump
    Xgd3,
}

impl XgdLayout {
    /// All layouts in the order they are probed
    pub const PROBE_ORDER: [XgdLayout; 4] = [Self::Xdki, Self::Xgd1, Self::Xgd2, Self::Xgd3];

    /// Absolute sector holding this layout's header
    pub fn magic_sector(self) -> u32 {
        match self {
            Self::Xdki => XGD_MAGIC_SECTOR_XDKI,
            Self::Xgd1 => XGD_MAGIC_SECTOR_XGD1,
            Self::Xgd2 => XGD_MAGIC_SECTOR_XGD2,
            Self::Xgd3 => XGD_MAGIC_SECTOR_XGD3,
        }
    }

    /// Translation between game partition sectors and image sectors
    pub fn base_sector(self) -> u32 {
        self.magic_sector() - XGD_ISO_BASE_SECTOR
    }
}

impl std::fmt::Display for XgdLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Xdki => write!(f, "XDKI"),
            Self::Xgd1 => write!(f, "XGD1"),
            Self::Xgd2 => write!(f, "XGD2"),
            Self::Xgd3 => write!(f, "XGD3"),
        }
    }
}

/// Decoded XGD header sector
#[derive(Debug, Clone)]
pub struct XgdHeader {
    pub magic: [u8; 20],
    pub root_dir_sector: u32,
    pub root_dir_size: u32,
    pub creation_file_time: i64,
    pub magic_tail: [u8; 20],
}

impl XgdHeader {
    /// Decode a header from one sector of data
    pub fn parse(sector: &[u8]) -> Result<Self, VfsError> {
        Ok(Self {
            magic: array_at(sector, 0x00, "XGD magic")?,
            root_dir_sector: read_u32_le(sector, 0x14, "XGD root directory sector")?,
            root_dir_size: read_u32_le(sector, 0x18, "XGD root directory size")?,
            creation_file_time: read_i64_le(sector, 0x1C, "XGD creation time")?,
            magic_tail: array_at(sector, XGD_MAGIC_TAIL_OFFSET, "XGD magic tail")?,
        })
    }

    /// Both copies of the magic must be present
    pub fn has_valid_magic(&self) -> bool {
        &self.magic == XGD_IMAGE_MAGIC && &self.magic_tail == XGD_IMAGE_MAGIC
    }
}

/// Disc information, available once a layout has been detected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XgdInfo {
    /// Added to game partition sectors to get image sectors
    pub base_sector: u32,
    /// Root directory sector, relative to the game partition
    pub root_dir_sector: u32,
    /// Root directory size in bytes
    pub root_dir_size: u32,
    /// Raw creation FILETIME
    pub creation_file_time: i64,
}

impl XgdInfo {
    pub fn from_header(layout: XgdLayout, header: &XgdHeader) -> Self {
        Self {
            base_sector: layout.base_sector(),
            root_dir_sector: header.root_dir_sector,
            root_dir_size: header.root_dir_size,
            creation_file_time: header.creation_file_time,
        }
    }

    /// Image sector of the first root directory sector
    pub fn root_dir_image_sector(&self) -> u64 {
        self.base_sector as u64 + self.root_dir_sector as u64
    }

    /// Number of sectors spanned by the root directory
    pub fn root_dir_sector_count(&self) -> u64 {
        (self.root_dir_size as u64).div_ceil(XGD_SECTOR_SIZE as u64)
    }

    /// Creation time of the image, if it falls after the Unix epoch
    pub fn creation_time(&self) -> Option<SystemTime> {
        filetime_to_system_time(self.creation_file_time)
    }
}

/// Convert a Windows FILETIME into a [`SystemTime`]
pub fn filetime_to_system_time(file_time: i64) -> Option<SystemTime> {
    let ticks = file_time.checked_sub(FILETIME_UNIX_EPOCH)?;
    if ticks < 0 {
        return None;
    }
    let ticks = ticks as u64;
    let since_epoch = Duration::from_secs(ticks / 10_000_000) + Duration::from_nanos((ticks % 10_000_000) * 100);
    UNIX_EPOCH.checked_add(since_epoch)
}
