//! Sector-addressed access to disc images
//!
//! A [`SectorDecoder`] only knows how to fetch raw 2048-byte sectors. Layout
//! detection is shared by all decoders through [`probe_xgd`].

pub mod iso;

pub use iso::{IsoSectorDecoder, IsoSlice};

use crate::constants::XGD_SECTOR_SIZE;
use crate::formats::xgd::{XgdHeader, XgdInfo, XgdLayout};
use tracing::{debug, info, warn};

/// Raw sector access over a disc image
pub trait SectorDecoder {
    /// Number of sectors addressable through this decoder
    fn total_sectors(&self) -> u64;

    /// Read one sector. Out-of-range sectors and I/O failures yield `None`;
    /// callers probe speculatively.
    fn try_read_sector(&mut self, sector: u64) -> Option<Vec<u8>>;

    /// Sector size in bytes
    fn sector_size(&self) -> u32 {
        XGD_SECTOR_SIZE
    }
}

/// Result of a successful layout probe
#[derive(Debug, Clone)]
pub struct XgdProbe {
    pub layout: XgdLayout,
    pub header: XgdHeader,
    pub info: XgdInfo,
}

/// Find which XGD layout the image uses.
///
/// The known header sectors are tried in [`XgdLayout::PROBE_ORDER`]; the first
/// one holding the magic at both ends of the sector wins.
pub fn probe_xgd<D: SectorDecoder + ?Sized>(decoder: &mut D) -> Option<XgdProbe> {
    let total = decoder.total_sectors();

    for layout in XgdLayout::PROBE_ORDER {
        let sector = layout.magic_sector() as u64;
        if sector >= total {
            debug!("Skipping {} probe: sector 0x{:x} beyond image ({} sectors)", layout, sector, total);
            continue;
        }

        let Some(data) = decoder.try_read_sector(sector) else {
            warn!("Failed to read {} header sector 0x{:x}", layout, sector);
            continue;
        };

        let header = match XgdHeader::parse(&data) {
            Ok(header) => header,
            Err(e) => {
                warn!("Failed to parse {} header at sector 0x{:x}: {}", layout, sector, e);
                continue;
            }
        };

        if !header.has_valid_magic() {
            debug!("No {} magic at sector 0x{:x}", layout, sector);
            continue;
        }

        let info = XgdInfo::from_header(layout, &header);
        info!(
            "Detected {} layout: base_sector=0x{:x}, root_dir_sector=0x{:x}, root_dir_size={}",
            layout, info.base_sector, info.root_dir_sector, info.root_dir_size
        );
        return Some(XgdProbe { layout, header, info });
    }

    warn!("No XGD magic found at any known header sector ({} sectors in image)", total);
    None
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::constants::XGD_ISO_BASE_SECTOR;
    use crate::formats::xgd::tests::header_sector;
    use std::collections::HashMap;

    /// Sparse in-memory image: unset sectors read as zeros
    pub(crate) struct SparseDecoder {
        pub total: u64,
        pub sectors: HashMap<u64, Vec<u8>>,
        pub reads: Vec<u64>,
    }

    impl SparseDecoder {
        pub(crate) fn new(total: u64) -> Self {
            Self {
                total,
                sectors: HashMap::new(),
                reads: Vec::new(),
            }
        }
    }

    impl SectorDecoder for SparseDecoder {
        fn total_sectors(&self) -> u64 {
            self.total
        }

        fn try_read_sector(&mut self, sector: u64) -> Option<Vec<u8>> {
            if sector >= self.total {
                return None;
            }
            self.reads.push(sector);
            Some(
                self.sectors
                    .get(&sector)
                    .cloned()
                    .unwrap_or_else(|| vec![0u8; XGD_SECTOR_SIZE as usize]),
            )
        }
    }

    #[test]
    fn test_probe_each_layout() {
        for layout in XgdLayout::PROBE_ORDER {
            let sector = layout.magic_sector() as u64;
            let mut decoder = SparseDecoder::new(0x40000);
            decoder.sectors.insert(sector, header_sector(0x10, 0x800));

            let probe = probe_xgd(&mut decoder).expect("layout should be detected");
            assert_eq!(probe.layout, layout);
            assert_eq!(probe.info.base_sector, layout.magic_sector() - XGD_ISO_BASE_SECTOR);
            assert_eq!(probe.info.root_dir_sector, 0x10);
        }
    }

    #[test]
    fn test_probe_stops_at_first_match() {
        let mut decoder = SparseDecoder::new(0x40000);
        decoder.sectors.insert(XgdLayout::Xgd1.magic_sector() as u64, header_sector(1, 0x800));
        decoder.sectors.insert(XgdLayout::Xgd3.magic_sector() as u64, header_sector(2, 0x800));

        let probe = probe_xgd(&mut decoder).unwrap();
        assert_eq!(probe.layout, XgdLayout::Xgd1);
        assert_eq!(
            decoder.reads,
            vec![XgdLayout::Xdki.magic_sector() as u64, XgdLayout::Xgd1.magic_sector() as u64]
        );
    }

    #[test]
    fn test_probe_skips_sectors_beyond_image() {
        // Large enough for XDKI and XGD3 only
        let mut decoder = SparseDecoder::new(XgdLayout::Xgd3.magic_sector() as u64 + 1);
        decoder.sectors.insert(XgdLayout::Xgd3.magic_sector() as u64, header_sector(3, 0x800));

        let probe = probe_xgd(&mut decoder).unwrap();
        assert_eq!(probe.layout, XgdLayout::Xgd3);
        assert_eq!(
            decoder.reads,
            vec![XgdLayout::Xdki.magic_sector() as u64, XgdLayout::Xgd3.magic_sector() as u64]
        );
    }

    #[test]
    fn test_probe_without_magic() {
        let mut decoder = SparseDecoder::new(0x40000);
        assert!(probe_xgd(&mut decoder).is_none());
        assert_eq!(decoder.reads.len(), 4);
    }

    #[test]
    fn test_probe_tiny_image() {
        let mut decoder = SparseDecoder::new(4);
        assert!(probe_xgd(&mut decoder).is_none());
        assert!(decoder.reads.is_empty());
    }
}
