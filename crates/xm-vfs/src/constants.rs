//! Fixed offsets and magic values of the Xbox 360 disc, package and executable formats

/// Size of one disc sector in bytes
pub const XGD_SECTOR_SIZE: u32 = 0x800;

/// Sector where the XGD header lives relative to the start of the game partition
pub const XGD_ISO_BASE_SECTOR: u32 = 0x20;

/// Absolute header sector of XDK-built images (game partition at 0)
pub const XGD_MAGIC_SECTOR_XDKI: u32 = XGD_ISO_BASE_SECTOR;

/// Absolute header sector of full XGD1 (original Xbox) dumps
pub const XGD_MAGIC_SECTOR_XGD1: u32 = 0x30620;

/// Absolute header sector of full XGD2 dumps
pub const XGD_MAGIC_SECTOR_XGD2: u32 = 0x1FB40;

/// Absolute header sector of full XGD3 dumps
pub const XGD_MAGIC_SECTOR_XGD3: u32 = 0x4120;

/// Magic found at the start and the end of the XGD header sector
pub const XGD_IMAGE_MAGIC: &[u8; 20] = b"MICROSOFT*XBOX*MEDIA";

/// Offset of the trailing copy of [`XGD_IMAGE_MAGIC`] within the header sector
pub const XGD_MAGIC_TAIL_OFFSET: usize = 0x7EC;

/// Size of the padding between the header fields and the trailing magic
pub const XGD_HEADER_PADDING: usize = 0x7C8;

/// Boot executable of Xbox 360 titles
pub const XEX_FILE_NAME: &str = "default.xex";

/// Boot executable of original Xbox titles
pub const XBE_FILE_NAME: &str = "default.xbe";

/// Directory entry link marking a subtree with no further entries
pub const DIRECTORY_TERMINATOR: u16 = 0xFFFF;

/// Directory entry offsets are stored in units of 4 bytes
pub const DIRECTORY_OFFSET_UNIT: usize = 4;

pub const STFS_MAGIC_OFFSET: u64 = 0x0000;
pub const STFS_CONTENT_TYPE_OFFSET: u64 = 0x0344;
pub const STFS_MEDIAID_OFFSET: u64 = 0x0354;
pub const STFS_MEDIAID_LENGTH: usize = 0x4;
pub const STFS_TITLEID_OFFSET: u64 = 0x0360;
pub const STFS_TITLEID_LENGTH: usize = 0x4;
pub const STFS_DISPLAYNAME_OFFSET: u64 = 0x0411;
pub const STFS_TITLE_OFFSET: u64 = 0x1691;
/// Length of both the title and the display name fields
pub const STFS_TITLE_LENGTH: usize = 0x80;

/// Returned by the STFS title accessor when the field is empty
pub const STFS_TITLE_NOT_FOUND: &str = "Not found";

/// "XEX2"
pub const XEX_MAGIC: [u8; 4] = *b"XEX2";

/// Size of the fixed XEX header; the optional header directory follows it
pub const XEX_HEADER_SIZE: usize = 0x18;

/// Size of one (key, offset) optional header directory entry
pub const XEX_DIRECTORY_ENTRY_SIZE: usize = 8;

/// Size of the hypervisor image info block inside the security info
pub const XEX_HV_IMAGE_INFO_SIZE: usize = 0x174;

/// Size of the security info structure
pub const XEX_SECURITY_INFO_SIZE: usize = 8 + XEX_HV_IMAGE_INFO_SIZE + 8;

/// Size of the execution info structure
pub const XEX_EXECUTION_INFO_SIZE: usize = 0x18;

/// Optional header id of the execution info
pub const XEX_EXECUTION_INFO_ID: u32 = 0x400;

/// Directory key of the execution info: the id in the upper bits, the size in dwords below
pub const XEX_EXECUTION_SEARCH_KEY: u32 =
    (XEX_EXECUTION_INFO_ID << 8) | ((XEX_EXECUTION_INFO_SIZE as u32) >> 2);
