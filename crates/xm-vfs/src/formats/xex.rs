//! XEX executable parser
//!
//! Decodes the big-endian XEX2 header, its security info and the execution
//! info optional header, which carries the Title ID and Media ID.

use crate::bytes::{array_at, hex_upper, read_u16_be, read_u32_be, read_u8, slice_at};
use crate::constants::*;
use std::path::Path;
use tracing::{debug, error, warn};
use xm_core::error::VfsError;

/// Fixed header at the start of every XEX image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XexHeader {
    pub magic: [u8; 4],
    pub module_flags: u32,
    pub size_of_headers: u32,
    pub size_of_discardable_headers: u32,
    /// Offset of the security info from the start of the image
    pub security_info: u32,
    pub header_directory_entry_count: u32,
}

impl XexHeader {
    pub fn parse(data: &[u8]) -> Result<Self, VfsError> {
        if data.len() < XEX_HEADER_SIZE {
            return Err(VfsError::truncated("XEX header", 0, XEX_HEADER_SIZE, data.len()));
        }

        Ok(Self {
            magic: array_at(data, 0x00, "XEX magic")?,
            module_flags: read_u32_be(data, 0x04, "XEX module flags")?,
            size_of_headers: read_u32_be(data, 0x08, "XEX header size")?,
            size_of_discardable_headers: read_u32_be(data, 0x0C, "XEX discardable header size")?,
            security_info: read_u32_be(data, 0x10, "XEX security info offset")?,
            header_directory_entry_count: read_u32_be(data, 0x14, "XEX directory entry count")?,
        })
    }

    pub fn has_valid_magic(&self) -> bool {
        self.magic == XEX_MAGIC
    }

    /// Reject anything that is not an XEX2 image
    pub fn check_magic(&self) -> Result<(), VfsError> {
        if self.has_valid_magic() {
            Ok(())
        } else {
            Err(VfsError::InvalidMagic {
                what: "XEX",
                found: hex_upper(&self.magic),
            })
        }
    }
}

/// Hypervisor view of the image, embedded in the security info
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HvImageInfo {
    pub signature: [u8; 0x100],
    pub info_size: u32,
    pub image_flags: u32,
    pub load_address: u32,
    pub image_hash: [u8; 0x14],
    pub import_table_count: u32,
    pub import_digest: [u8; 0x14],
    pub media_id: [u8; 0x10],
    pub image_key: [u8; 0x10],
    pub export_table_address: u32,
    pub header_hash: [u8; 0x14],
    pub game_region: u32,
}

impl HvImageInfo {
    fn parse(data: &[u8], base: usize) -> Result<Self, VfsError> {
        Ok(Self {
            signature: array_at(data, base, "XEX image signature")?,
            info_size: read_u32_be(data, base + 0x100, "XEX image info size")?,
            image_flags: read_u32_be(data, base + 0x104, "XEX image flags")?,
            load_address: read_u32_be(data, base + 0x108, "XEX load address")?,
            image_hash: array_at(data, base + 0x10C, "XEX image hash")?,
            import_table_count: read_u32_be(data, base + 0x120, "XEX import table count")?,
            import_digest: array_at(data, base + 0x124, "XEX import digest")?,
            media_id: array_at(data, base + 0x138, "XEX image media id")?,
            image_key: array_at(data, base + 0x148, "XEX image key")?,
            export_table_address: read_u32_be(data, base + 0x158, "XEX export table address")?,
            header_hash: array_at(data, base + 0x15C, "XEX header hash")?,
            game_region: read_u32_be(data, base + 0x170, "XEX game region")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XexSecurityInfo {
    pub size: u32,
    pub image_size: u32,
    pub image_info: HvImageInfo,
    pub allowed_media_types: u32,
    pub page_descriptor_count: u32,
}

impl XexSecurityInfo {
    /// Parse the security info at `offset`; the whole structure must fit in `data`
    pub fn parse(data: &[u8], offset: usize) -> Result<Self, VfsError> {
        slice_at(data, offset, XEX_SECURITY_INFO_SIZE, "XEX security info")?;

        let after_image_info = offset + 8 + XEX_HV_IMAGE_INFO_SIZE;
        Ok(Self {
            size: read_u32_be(data, offset, "XEX security info size")?,
            image_size: read_u32_be(data, offset + 4, "XEX image size")?,
            image_info: HvImageInfo::parse(data, offset + 8)?,
            allowed_media_types: read_u32_be(data, after_image_info, "XEX allowed media types")?,
            page_descriptor_count: read_u32_be(data, after_image_info + 4, "XEX page descriptor count")?,
        })
    }
}

/// One (key, offset) pair of the optional header directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XexDirectoryEntry {
    pub key: u32,
    pub offset: u32,
}

/// Execution info optional header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XexExecutionInfo {
    pub media_id: u32,
    pub version: u32,
    pub base_version: u32,
    pub title_id: u32,
    pub publisher_id: u16,
    pub game_id: u16,
    pub platform: u8,
    pub executable_type: u8,
    pub disc_number: u8,
    pub disc_total: u8,
    pub savegame_id: u32,
}

impl XexExecutionInfo {
    pub fn parse(data: &[u8], offset: usize) -> Result<Self, VfsError> {
        slice_at(data, offset, XEX_EXECUTION_INFO_SIZE, "XEX execution info")?;

        Ok(Self {
            media_id: read_u32_be(data, offset, "XEX media id")?,
            version: read_u32_be(data, offset + 4, "XEX version")?,
            base_version: read_u32_be(data, offset + 8, "XEX base version")?,
            title_id: read_u32_be(data, offset + 12, "XEX title id")?,
            publisher_id: read_u16_be(data, offset + 12, "XEX publisher id")?,
            game_id: read_u16_be(data, offset + 14, "XEX game id")?,
            platform: read_u8(data, offset + 16, "XEX platform")?,
            executable_type: read_u8(data, offset + 17, "XEX executable type")?,
            disc_number: read_u8(data, offset + 18, "XEX disc number")?,
            disc_total: read_u8(data, offset + 19, "XEX disc total")?,
            savegame_id: read_u32_be(data, offset + 20, "XEX savegame id")?,
        })
    }

    /// Title ID as uppercase hex of its on-disk (big-endian) bytes
    pub fn title_id_hex(&self) -> String {
        hex_upper(&self.title_id.to_be_bytes())
    }

    /// Media ID as uppercase hex of its on-disk (big-endian) bytes
    pub fn media_id_hex(&self) -> String {
        hex_upper(&self.media_id.to_be_bytes())
    }
}

/// Identifiers extracted from an executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XexIds {
    pub title_id: String,
    pub media_id: String,
}

/// Parsed XEX image headers
#[derive(Debug, Clone)]
pub struct XexFile {
    pub header: XexHeader,
    pub security_info: XexSecurityInfo,
    /// Directory entries up to and including the execution info entry
    pub directory: Vec<XexDirectoryEntry>,
    /// Absent when the directory has no execution info entry
    pub execution_info: Option<XexExecutionInfo>,
}

impl XexFile {
    /// Parse the headers of an in-memory image.
    ///
    /// The magic is not enforced; see [`XexHeader::check_magic`].
    pub fn parse(data: &[u8]) -> Result<Self, VfsError> {
        let header = XexHeader::parse(data)?;
        if !header.has_valid_magic() {
            warn!("Unexpected XEX magic {}", hex_upper(&header.magic));
        }

        let security_info = XexSecurityInfo::parse(data, header.security_info as usize)?;
        let directory = scan_directory(data, &header, XEX_EXECUTION_SEARCH_KEY)?;

        let execution_info = match directory.last().filter(|e| e.key == XEX_EXECUTION_SEARCH_KEY) {
            Some(entry) => {
                debug!("Execution info at 0x{:x}", entry.offset);
                Some(XexExecutionInfo::parse(data, entry.offset as usize)?)
            }
            None => None,
        };

        Ok(Self {
            header,
            security_info,
            directory,
            execution_info,
        })
    }

    /// Read and parse an executable from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, VfsError> {
        let data = std::fs::read(path.as_ref())?;
        Self::parse(&data)
    }

    /// Title ID and Media ID, when the execution info is present
    pub fn ids(&self) -> Option<XexIds> {
        self.execution_info.map(|info| XexIds {
            title_id: info.title_id_hex(),
            media_id: info.media_id_hex(),
        })
    }
}

/// Read directory entries in order, stopping after the first one keyed `key`.
///
/// An overstated entry count only fails when the table runs off the end of
/// `data` before `key` turns up.
fn scan_directory(data: &[u8], header: &XexHeader, key: u32) -> Result<Vec<XexDirectoryEntry>, VfsError> {
    let mut entries = Vec::new();
    for index in 0..header.header_directory_entry_count as usize {
        let offset = index
            .checked_mul(XEX_DIRECTORY_ENTRY_SIZE)
            .and_then(|o| o.checked_add(XEX_HEADER_SIZE))
            .ok_or_else(|| VfsError::truncated("XEX header directory", XEX_HEADER_SIZE, usize::MAX, data.len()))?;
        let entry = XexDirectoryEntry {
            key: read_u32_be(data, offset, "XEX directory key")?,
            offset: read_u32_be(data, offset + 4, "XEX directory offset")?,
        };
        entries.push(entry);
        if entry.key == key {
            break;
        }
    }
    Ok(entries)
}

/// Title ID and Media ID of an in-memory executable.
///
/// Never fails loudly: malformed images are logged and yield `None`.
pub fn extract_data(data: &[u8]) -> Option<XexIds> {
    let xex = match XexFile::parse(data) {
        Ok(xex) => xex,
        Err(e) => {
            error!("Failed to parse XEX ({} bytes): {}", data.len(), e);
            return None;
        }
    };

    let ids = xex.ids();
    match &ids {
        Some(ids) => debug!("XEX title_id={}, media_id={}", ids.title_id, ids.media_id),
        None => error!("Unable to find XEX execution info (key 0x{:x})", XEX_EXECUTION_SEARCH_KEY),
    }
    ids
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal image: header, directory, security info, execution info
    pub(crate) fn build_xex(title_id: u32, media_id: u32, extra_entries: &[(u32, u32)]) -> Vec<u8> {
        let entries = extra_entries.len() + 1;
        let security_offset = XEX_HEADER_SIZE + entries * XEX_DIRECTORY_ENTRY_SIZE;
        let execution_offset = security_offset + XEX_SECURITY_INFO_SIZE;
        let mut data = vec![0u8; execution_offset + XEX_EXECUTION_INFO_SIZE];

        let total = data.len() as u32;
        data[..4].copy_from_slice(&XEX_MAGIC);
        data[0x04..0x08].copy_from_slice(&1u32.to_be_bytes());
        data[0x08..0x0C].copy_from_slice(&total.to_be_bytes());
        data[0x10..0x14].copy_from_slice(&(security_offset as u32).to_be_bytes());
        data[0x14..0x18].copy_from_slice(&(entries as u32).to_be_bytes());

        let mut cursor = XEX_HEADER_SIZE;
        for (key, offset) in extra_entries.iter().copied().chain([(XEX_EXECUTION_SEARCH_KEY, execution_offset as u32)]) {
            data[cursor..cursor + 4].copy_from_slice(&key.to_be_bytes());
            data[cursor + 4..cursor + 8].copy_from_slice(&offset.to_be_bytes());
            cursor += XEX_DIRECTORY_ENTRY_SIZE;
        }

        data[security_offset..security_offset + 4].copy_from_slice(&(XEX_SECURITY_INFO_SIZE as u32).to_be_bytes());
        data[security_offset + 4..security_offset + 8].copy_from_slice(&0x0010_0000u32.to_be_bytes());
        let region = security_offset + 8 + 0x170;
        data[region..region + 4].copy_from_slice(&0xFFFF_FFFFu32.to_be_bytes());

        let e = execution_offset;
        data[e..e + 4].copy_from_slice(&media_id.to_be_bytes());
        data[e + 4..e + 8].copy_from_slice(&0x2000_0800u32.to_be_bytes());
        data[e + 12..e + 16].copy_from_slice(&title_id.to_be_bytes());
        data[e + 16] = 0;
        data[e + 17] = 1;
        data[e + 18] = 1;
        data[e + 19] = 2;
        data[e + 20..e + 24].copy_from_slice(&0x0000_0042u32.to_be_bytes());
        data
    }

    #[test]
    fn test_extract_data() {
        let data = build_xex(0x4D53_082B, 0x1A2B_3C4D, &[(0x0001_0001, 0), (0x0002_0104, 0)]);
        let ids = extract_data(&data).unwrap();
        assert_eq!(ids.title_id, "4D53082B");
        assert_eq!(ids.media_id, "1A2B3C4D");
    }

    #[test]
    fn test_full_records() {
        let data = build_xex(0x4D53_082B, 0x1A2B_3C4D, &[]);
        let xex = XexFile::parse(&data).unwrap();

        assert!(xex.header.has_valid_magic());
        assert_eq!(xex.header.header_directory_entry_count, 1);
        assert_eq!(xex.security_info.size as usize, XEX_SECURITY_INFO_SIZE);
        assert_eq!(xex.security_info.image_size, 0x0010_0000);
        assert_eq!(xex.security_info.image_info.game_region, 0xFFFF_FFFF);
        assert_eq!(xex.directory.len(), 1);

        let info = xex.execution_info.unwrap();
        assert_eq!(info.publisher_id, 0x4D53);
        assert_eq!(info.game_id, 0x082B);
        assert_eq!(info.version, 0x2000_0800);
        assert_eq!((info.disc_number, info.disc_total), (1, 2));
        assert_eq!(info.executable_type, 1);
        assert_eq!(info.savegame_id, 0x42);
    }

    #[test]
    fn test_short_buffer() {
        assert!(extract_data(&[]).is_none());
        assert!(extract_data(&XEX_MAGIC).is_none());
        assert!(matches!(XexHeader::parse(&[0u8; 0x17]), Err(VfsError::Truncated { .. })));
    }

    #[test]
    fn test_security_info_out_of_range() {
        let mut data = build_xex(1, 2, &[]);
        let bad = (data.len() - XEX_SECURITY_INFO_SIZE + 1) as u32;
        data[0x10..0x14].copy_from_slice(&bad.to_be_bytes());
        assert!(extract_data(&data).is_none());
        assert!(matches!(
            XexFile::parse(&data),
            Err(VfsError::Truncated { what: "XEX security info", .. })
        ));
    }

    #[test]
    fn test_missing_execution_info() {
        let mut data = build_xex(1, 2, &[]);
        data[XEX_HEADER_SIZE..XEX_HEADER_SIZE + 4].copy_from_slice(&0x0001_0001u32.to_be_bytes());

        let xex = XexFile::parse(&data).unwrap();
        assert!(xex.execution_info.is_none());
        assert!(xex.ids().is_none());
        assert!(extract_data(&data).is_none());
    }

    #[test]
    fn test_overstated_directory_count() {
        let mut data = build_xex(0x4D53_082B, 0x1A2B_3C4D, &[(0x0001_0001, 0)]);
        data[0x14..0x18].copy_from_slice(&0x1000u32.to_be_bytes());

        let xex = XexFile::parse(&data).unwrap();
        assert_eq!(xex.directory.len(), 2);
        assert_eq!(xex.directory[1].key, XEX_EXECUTION_SEARCH_KEY);
        assert_eq!(extract_data(&data).unwrap().title_id, "4D53082B");
    }

    #[test]
    fn test_directory_runs_past_end() {
        let mut data = build_xex(1, 2, &[]);
        data[XEX_HEADER_SIZE..XEX_HEADER_SIZE + 4].copy_from_slice(&0x0001_0001u32.to_be_bytes());
        data[0x14..0x18].copy_from_slice(&0x1000_0000u32.to_be_bytes());

        assert!(extract_data(&data).is_none());
        assert!(matches!(XexFile::parse(&data), Err(VfsError::Truncated { .. })));
    }

    #[test]
    fn test_bad_magic_still_parses() {
        let mut data = build_xex(0x5841_07D1, 0xDEAD_BEEF, &[]);
        data[..4].copy_from_slice(b"XEX1");
        let xex = XexFile::parse(&data).unwrap();
        assert!(!xex.header.has_valid_magic());
        assert_eq!(xex.ids().unwrap().title_id, "584107D1");

        match xex.header.check_magic() {
            Err(VfsError::InvalidMagic { what, found }) => {
                assert_eq!(what, "XEX");
                assert_eq!(found, "58455831");
            }
            other => panic!("expected InvalidMagic, got {:?}", other),
        }
    }
}
