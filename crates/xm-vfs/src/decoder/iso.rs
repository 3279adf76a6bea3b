//! ISO sector decoder
//!
//! Presents one or more physical files ("slices") as a single contiguous
//! sector space. Slice `n` covers the sectors directly following slice `n - 1`.

use super::{probe_xgd, SectorDecoder, XgdProbe};
use crate::constants::XGD_SECTOR_SIZE;
use crate::formats::xgd::{XgdInfo, XgdLayout};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};
use xm_core::error::VfsError;

/// One physical piece of a logical disc image
#[derive(Debug)]
pub struct IsoSlice<R = File> {
    path: PathBuf,
    stream: R,
    start_sector: u64,
    sector_count: u64,
}

impl<R: Read + Seek> IsoSlice<R> {
    /// First logical sector held by this slice
    pub fn start_sector(&self) -> u64 {
        self.start_sector
    }

    /// Last logical sector held by this slice (inclusive)
    pub fn end_sector(&self) -> u64 {
        self.start_sector + self.sector_count - 1
    }

    pub fn sector_count(&self) -> u64 {
        self.sector_count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, sector: u64) -> bool {
        sector >= self.start_sector && sector <= self.end_sector()
    }

    fn read_sector(&mut self, sector: u64) -> Result<Vec<u8>, VfsError> {
        let sector_size = XGD_SECTOR_SIZE as u64;
        let position = (sector - self.start_sector) * sector_size;
        self.stream.seek(SeekFrom::Start(position))?;

        let mut data = vec![0u8; XGD_SECTOR_SIZE as usize];
        self.stream.read_exact(&mut data)?;
        Ok(data)
    }
}

/// Build contiguous slice descriptors from already opened streams, in the order given.
///
/// Trailing bytes that do not fill a whole sector are ignored; a stream holding
/// less than one sector is skipped.
pub fn build_slices<R: Read + Seek>(streams: Vec<(PathBuf, R)>) -> Result<Vec<IsoSlice<R>>, VfsError> {
    let mut slices = Vec::with_capacity(streams.len());
    let mut next_sector = 0u64;

    for (path, mut stream) in streams {
        let length = stream.seek(SeekFrom::End(0))?;
        let sector_count = length / XGD_SECTOR_SIZE as u64;

        if sector_count == 0 {
            warn!("Skipping slice {:?}: {} bytes is less than one sector", path, length);
            continue;
        }

        debug!(
            "Slice {:?}: sectors {}..={} ({} bytes)",
            path,
            next_sector,
            next_sector + sector_count - 1,
            length
        );

        slices.push(IsoSlice {
            path,
            stream,
            start_sector: next_sector,
            sector_count,
        });
        next_sector += sector_count;
    }

    Ok(slices)
}

/// Open every slice file read-only and build its descriptor
pub fn open_slices(paths: &[PathBuf]) -> Result<Vec<IsoSlice>, VfsError> {
    let streams = paths
        .iter()
        .map(|path| File::open(path).map(|file| (path.clone(), file)))
        .collect::<Result<Vec<_>, _>>()?;
    build_slices(streams)
}

/// Sector decoder over a (possibly sliced) ISO image
#[derive(Debug)]
pub struct IsoSectorDecoder<R = File> {
    slices: Vec<IsoSlice<R>>,
    probe: Option<XgdProbe>,
}

impl<R: Read + Seek> IsoSectorDecoder<R> {
    /// Create a decoder over contiguous slices ordered by start sector
    pub fn new(slices: Vec<IsoSlice<R>>) -> Self {
        Self { slices, probe: None }
    }

    /// Detect the disc layout. Returns `false` when no known layout matches.
    pub fn init(&mut self) -> bool {
        let probe = probe_xgd(self);
        let found = probe.is_some();
        self.probe = probe;
        found
    }

    /// Disc information detected by [`init`](Self::init).
    ///
    /// Asking before a successful `init` is a caller bug and reported as
    /// [`VfsError::NotInitialized`], never as an invalid disc.
    pub fn xgd_info(&self) -> Result<&XgdInfo, VfsError> {
        self.probe
            .as_ref()
            .map(|probe| &probe.info)
            .ok_or(VfsError::NotInitialized)
    }

    /// Detected layout, if [`init`](Self::init) succeeded
    pub fn layout(&self) -> Option<XgdLayout> {
        self.probe.as_ref().map(|probe| probe.layout)
    }

    pub fn slices(&self) -> &[IsoSlice<R>] {
        &self.slices
    }

    /// Read one logical sector, reporting why it failed
    pub fn read_sector(&mut self, sector: u64) -> Result<Vec<u8>, VfsError> {
        let index = self.slices.partition_point(|slice| slice.end_sector() < sector);
        match self.slices.get_mut(index) {
            Some(slice) if slice.contains(sector) => slice.read_sector(sector),
            _ => Err(VfsError::SectorRead { sector }),
        }
    }
}

impl<R: Read + Seek> SectorDecoder for IsoSectorDecoder<R> {
    fn total_sectors(&self) -> u64 {
        self.slices.last().map_or(0, |slice| slice.end_sector() + 1)
    }

    fn try_read_sector(&mut self, sector: u64) -> Option<Vec<u8>> {
        match self.read_sector(sector) {
            Ok(data) => Some(data),
            Err(e) => {
                trace!("Sector {} unreadable: {}", sector, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{XGD_ISO_BASE_SECTOR, XGD_MAGIC_SECTOR_XDKI};
    use crate::formats::xgd::tests::header_sector;
    use std::io::Cursor;

    const SECTOR: usize = XGD_SECTOR_SIZE as usize;

    /// Image whose every sector is filled with its own index (mod 256)
    fn numbered_image(sectors: usize) -> Vec<u8> {
        (0..sectors).flat_map(|i| vec![i as u8; SECTOR]).collect()
    }

    fn cursor_slices(parts: Vec<Vec<u8>>) -> Vec<IsoSlice<Cursor<Vec<u8>>>> {
        let streams = parts
            .into_iter()
            .enumerate()
            .map(|(i, data)| (PathBuf::from(format!("part{}", i)), Cursor::new(data)))
            .collect();
        build_slices(streams).unwrap()
    }

    #[test]
    fn test_slices_are_contiguous() {
        let image = numbered_image(10);
        let slices = cursor_slices(vec![
            image[..3 * SECTOR].to_vec(),
            image[3 * SECTOR..7 * SECTOR].to_vec(),
            image[7 * SECTOR..].to_vec(),
        ]);

        assert_eq!(slices.len(), 3);
        assert_eq!((slices[0].start_sector(), slices[0].end_sector()), (0, 2));
        assert_eq!((slices[1].start_sector(), slices[1].end_sector()), (3, 6));
        assert_eq!((slices[2].start_sector(), slices[2].end_sector()), (7, 9));

        let mut decoder = IsoSectorDecoder::new(slices);
        assert_eq!(decoder.total_sectors(), 10);
        for sector in 0..10u64 {
            let data = decoder.try_read_sector(sector).unwrap();
            assert_eq!(data.len(), SECTOR);
            assert!(data.iter().all(|&b| b == sector as u8));
        }
    }

    #[test]
    fn test_partial_trailing_sector_ignored() {
        let mut data = numbered_image(2);
        data.extend_from_slice(&[0xAA; 100]);
        let slices = cursor_slices(vec![data]);
        assert_eq!(slices[0].sector_count(), 2);

        let mut decoder = IsoSectorDecoder::new(slices);
        assert!(decoder.try_read_sector(1).is_some());
        assert!(decoder.try_read_sector(2).is_none());
    }

    #[test]
    fn test_empty_slice_skipped() {
        let slices = cursor_slices(vec![numbered_image(1), vec![0u8; 10], numbered_image(2)]);
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[1].start_sector(), 1);
    }

    #[test]
    fn test_out_of_range_read() {
        let mut decoder = IsoSectorDecoder::new(cursor_slices(vec![numbered_image(2)]));
        assert!(decoder.try_read_sector(2).is_none());
        assert!(matches!(decoder.read_sector(u64::MAX), Err(VfsError::SectorRead { .. })));

        let mut empty: IsoSectorDecoder<Cursor<Vec<u8>>> = IsoSectorDecoder::new(Vec::new());
        assert_eq!(empty.total_sectors(), 0);
        assert!(empty.try_read_sector(0).is_none());
    }

    #[test]
    fn test_init_detects_xdki_across_slices() {
        let mut image = vec![0u8; (XGD_MAGIC_SECTOR_XDKI as usize + 2) * SECTOR];
        let offset = XGD_MAGIC_SECTOR_XDKI as usize * SECTOR;
        image[offset..offset + SECTOR].copy_from_slice(&header_sector(0x21, 0x800));

        // Split so the header lands in the second slice
        let split = 5 * SECTOR;
        let mut decoder = IsoSectorDecoder::new(cursor_slices(vec![
            image[..split].to_vec(),
            image[split..].to_vec(),
        ]));

        assert!(matches!(decoder.xgd_info(), Err(VfsError::NotInitialized)));
        assert!(decoder.init());
        assert_eq!(decoder.layout(), Some(XgdLayout::Xdki));

        let info = decoder.xgd_info().unwrap();
        assert_eq!(info.base_sector, XGD_MAGIC_SECTOR_XDKI - XGD_ISO_BASE_SECTOR);
        assert_eq!(info.root_dir_sector, 0x21);
        assert_eq!(info.root_dir_size, 0x800);
    }

    #[test]
    fn test_init_fails_without_magic() {
        let mut decoder = IsoSectorDecoder::new(cursor_slices(vec![numbered_image(40)]));
        assert!(!decoder.init());
        assert!(decoder.layout().is_none());
        assert!(matches!(decoder.xgd_info(), Err(VfsError::NotInitialized)));
    }
}
