//! Container readers
//!
//! A container owns a [`SectorDecoder`] and gives access to the files it holds.
//! The XGD directory walk lives here as free functions so any decoder can use it.

pub mod xiso;

pub use xiso::{MountGuard, XisoContainerReader};

use crate::bytes::{read_u16_le, read_u32_le, read_u8, slice_at};
use crate::constants::*;
use crate::decoder::SectorDecoder;
use crate::formats::xgd::XgdInfo;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, trace, warn};
use xm_core::error::VfsError;

/// Mount lifecycle and default executable lookup shared by container formats
pub trait ContainerReader {
    /// Mount the container. The first successful call opens the image, later
    /// calls only bump the mount count.
    fn try_mount(&self) -> bool;

    /// Decrement the mount count. Never closes the image.
    fn dismount(&self);

    fn mount_count(&self) -> usize;

    /// Contents of `default.xex` or `default.xbe` at the root of the disc
    fn try_get_default(&self) -> Option<Vec<u8>>;

    /// Release the image. Safe to call more than once.
    fn dispose(&self);
}

/// Attribute bit set on directory entries that are subdirectories
pub const ATTRIBUTE_DIRECTORY: u8 = 0x10;

/// Child link of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subtree {
    /// No child on this side
    Empty,
    /// `0xFFFF`: the branch ends here
    Terminal,
    /// Child entry at this offset (in 4-byte units)
    Node(u16),
}

impl From<u16> for Subtree {
    fn from(link: u16) -> Self {
        match link {
            0 => Self::Empty,
            DIRECTORY_TERMINATOR => Self::Terminal,
            offset => Self::Node(offset),
        }
    }
}

/// One decoded entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Position of the entry in the listing, in 4-byte units
    pub offset: u16,
    pub left: Subtree,
    pub right: Subtree,
    /// First sector of the file, relative to the game partition
    pub start_sector: u32,
    pub size: u32,
    pub attributes: u8,
    pub name: String,
}

impl DirectoryEntry {
    pub fn is_directory(&self) -> bool {
        self.attributes & ATTRIBUTE_DIRECTORY != 0
    }

    /// Whether this is the boot executable of an Xbox 360 or original Xbox title
    pub fn is_default_executable(&self) -> bool {
        self.name.eq_ignore_ascii_case(XEX_FILE_NAME) || self.name.eq_ignore_ascii_case(XBE_FILE_NAME)
    }
}

/// Pending position in the breadth-first directory walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalNode {
    pub offset: u16,
    pub path: String,
}

/// Raw bytes of one directory listing.
///
/// The listing is a packed binary search tree: each entry links to its left
/// and right siblings by offset within the same buffer.
#[derive(Debug, Clone)]
pub struct DirectoryTable {
    data: Vec<u8>,
}

impl DirectoryTable {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether an entry at `offset` starts inside the buffer
    pub fn contains(&self, offset: u16) -> bool {
        (offset as usize) * DIRECTORY_OFFSET_UNIT < self.data.len()
    }

    /// Decode the entry at `offset` (in 4-byte units)
    pub fn entry_at(&self, offset: u16) -> Result<DirectoryEntry, VfsError> {
        let base = offset as usize * DIRECTORY_OFFSET_UNIT;
        let data = &self.data;

        let name_len = read_u8(data, base + 13, "directory entry name length")? as usize;
        let name_bytes = slice_at(data, base + 14, name_len, "directory entry name")?;

        Ok(DirectoryEntry {
            offset,
            left: read_u16_le(data, base, "directory entry left link")?.into(),
            right: read_u16_le(data, base + 2, "directory entry right link")?.into(),
            start_sector: read_u32_le(data, base + 4, "directory entry sector")?,
            size: read_u32_le(data, base + 8, "directory entry size")?,
            attributes: read_u8(data, base + 12, "directory entry attributes")?,
            name: String::from_utf8_lossy(name_bytes).into_owned(),
        })
    }

    /// Breadth-first walk over the listing, starting at offset 0
    pub fn walk(&self) -> DirectoryWalk<'_> {
        DirectoryWalk {
            table: self,
            queue: VecDeque::from([TraversalNode {
                offset: 0,
                path: String::new(),
            }]),
            visited: HashSet::new(),
            failed: false,
        }
    }

    /// First entry, in walk order, for which `predicate` holds
    pub fn find<P>(&self, mut predicate: P) -> Result<Option<DirectoryEntry>, VfsError>
    where
        P: FnMut(&DirectoryEntry) -> bool,
    {
        for entry in self.walk() {
            let entry = entry?;
            if predicate(&entry) {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Every reachable entry, in walk order
    pub fn entries(&self) -> Result<Vec<DirectoryEntry>, VfsError> {
        self.walk().collect()
    }
}

/// Iterator returned by [`DirectoryTable::walk`].
///
/// Offsets past the end of the listing are skipped. A node whose left link is
/// terminal is yielded but its children are not followed. Stops after the
/// first decoding error.
pub struct DirectoryWalk<'a> {
    table: &'a DirectoryTable,
    queue: VecDeque<TraversalNode>,
    visited: HashSet<u16>,
    failed: bool,
}

impl DirectoryWalk<'_> {
    fn enqueue(&mut self, link: Subtree, path: &str) {
        if let Subtree::Node(offset) = link {
            self.queue.push_back(TraversalNode {
                offset,
                path: path.to_string(),
            });
        }
    }
}

impl Iterator for DirectoryWalk<'_> {
    type Item = Result<DirectoryEntry, VfsError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        while let Some(node) = self.queue.pop_front() {
            if !self.table.contains(node.offset) {
                debug!(
                    "Skipping directory offset 0x{:x}: beyond listing of {} bytes",
                    node.offset as usize * DIRECTORY_OFFSET_UNIT,
                    self.table.len()
                );
                continue;
            }
            if !self.visited.insert(node.offset) {
                warn!("Directory entry at offset 0x{:x} visited twice, ignoring", node.offset);
                continue;
            }

            let entry = match self.table.entry_at(node.offset) {
                Ok(entry) => entry,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            };
            trace!("{}{} (sector 0x{:x}, {} bytes)", node.path, entry.name, entry.start_sector, entry.size);

            // A terminal left link ends the whole branch, right side included
            if entry.left != Subtree::Terminal {
                self.enqueue(entry.left, &node.path);
                self.enqueue(entry.right, &node.path);
            }

            return Some(Ok(entry));
        }

        None
    }
}

/// Read the root directory listing described by `info`
pub fn read_root_directory<D>(decoder: &mut D, info: &XgdInfo) -> Result<DirectoryTable, VfsError>
where
    D: SectorDecoder + ?Sized,
{
    let first = info.root_dir_image_sector();
    let count = info.root_dir_sector_count();
    debug!("Reading root directory: {} sectors from 0x{:x}", count, first);

    let mut data = Vec::new();
    for sector in first..first + count {
        let chunk = decoder
            .try_read_sector(sector)
            .ok_or(VfsError::SectorRead { sector })?;
        data.extend_from_slice(&chunk);
    }

    Ok(DirectoryTable::new(data))
}

/// Read `entry`'s contents sector by sector
pub fn read_file_data<D>(decoder: &mut D, info: &XgdInfo, entry: &DirectoryEntry) -> Result<Vec<u8>, VfsError>
where
    D: SectorDecoder + ?Sized,
{
    let size = entry.size as usize;
    let sector_size = XGD_SECTOR_SIZE as usize;
    let mut sector = info.base_sector as u64 + entry.start_sector as u64;
    let mut data = Vec::new();

    while data.len() < size {
        let chunk = decoder
            .try_read_sector(sector)
            .ok_or(VfsError::SectorRead { sector })?;
        let take = (size - data.len()).min(sector_size);
        data.extend_from_slice(slice_at(&chunk, 0, take, "file sector")?);
        sector += 1;
    }

    Ok(data)
}

/// Locate and read the boot executable at the root of the disc.
///
/// Only the root listing is searched; boot executables never live in subdirectories.
pub fn extract_default_executable<D>(decoder: &mut D, info: &XgdInfo) -> Result<Vec<u8>, VfsError>
where
    D: SectorDecoder + ?Sized,
{
    let root = read_root_directory(decoder, info)?;
    let entry = root
        .find(DirectoryEntry::is_default_executable)?
        .ok_or_else(|| VfsError::EntryNotFound(format!("{} or {}", XEX_FILE_NAME, XBE_FILE_NAME)))?;

    debug!(
        "Found {} at sector 0x{:x} ({} bytes)",
        entry.name, entry.start_sector, entry.size
    );
    read_file_data(decoder, info, &entry)
}
