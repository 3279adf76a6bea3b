//! Synthetic fixtures shared by the integration tests

#![allow(dead_code)]

use xm_vfs::constants::*;

pub const SECTOR: usize = XGD_SECTOR_SIZE as usize;

/// XGD header sector pointing at the given root directory
pub fn header_sector(root_dir_sector: u32, root_dir_size: u32) -> Vec<u8> {
    let mut sector = vec![0u8; SECTOR];
    sector[..20].copy_from_slice(XGD_IMAGE_MAGIC);
    sector[0x14..0x18].copy_from_slice(&root_dir_sector.to_le_bytes());
    sector[0x18..0x1C].copy_from_slice(&root_dir_size.to_le_bytes());
    sector[XGD_MAGIC_TAIL_OFFSET..].copy_from_slice(XGD_IMAGE_MAGIC);
    sector
}

/// XDKI disc image whose root directory holds `files`, chained through right links
pub fn disc_image(files: &[(&str, &[u8])]) -> Vec<u8> {
    let root_sector = XGD_MAGIC_SECTOR_XDKI + 1;
    let mut next_sector = root_sector + 1;
    let mut root = Vec::new();
    let mut contents = Vec::new();

    for (i, (name, data)) in files.iter().enumerate() {
        let start = root.len();
        let mut entry = Vec::new();
        entry.extend_from_slice(&0u16.to_le_bytes());
        entry.extend_from_slice(&0u16.to_le_bytes());
        entry.extend_from_slice(&next_sector.to_le_bytes());
        entry.extend_from_slice(&(data.len() as u32).to_le_bytes());
        entry.push(0);
        entry.push(name.len() as u8);
        entry.extend_from_slice(name.as_bytes());
        entry.resize(entry.len().next_multiple_of(DIRECTORY_OFFSET_UNIT), 0);
        if i + 1 < files.len() {
            let right = ((start + entry.len()) / DIRECTORY_OFFSET_UNIT) as u16;
            entry[2..4].copy_from_slice(&right.to_le_bytes());
        }
        root.extend_from_slice(&entry);

        let sectors = data.len().div_ceil(SECTOR).max(1);
        let mut padded = data.to_vec();
        padded.resize(sectors * SECTOR, 0);
        contents.extend_from_slice(&padded);
        next_sector += sectors as u32;
    }
    root.resize(SECTOR, 0);

    let mut image = vec![0u8; XGD_MAGIC_SECTOR_XDKI as usize * SECTOR];
    image.extend_from_slice(&header_sector(root_sector, SECTOR as u32));
    image.extend_from_slice(&root);
    image.extend_from_slice(&contents);
    image
}

/// XEX image with only the execution info optional header
pub fn xex_image(title_id: u32, media_id: u32) -> Vec<u8> {
    let security_offset = XEX_HEADER_SIZE + XEX_DIRECTORY_ENTRY_SIZE;
    let execution_offset = security_offset + XEX_SECURITY_INFO_SIZE;
    let mut data = vec![0u8; execution_offset + XEX_EXECUTION_INFO_SIZE];

    data[..4].copy_from_slice(&XEX_MAGIC);
    data[0x10..0x14].copy_from_slice(&(security_offset as u32).to_be_bytes());
    data[0x14..0x18].copy_from_slice(&1u32.to_be_bytes());
    data[0x18..0x1C].copy_from_slice(&XEX_EXECUTION_SEARCH_KEY.to_be_bytes());
    data[0x1C..0x20].copy_from_slice(&(execution_offset as u32).to_be_bytes());
    data[execution_offset..execution_offset + 4].copy_from_slice(&media_id.to_be_bytes());
    data[execution_offset + 12..execution_offset + 16].copy_from_slice(&title_id.to_be_bytes());
    data
}
