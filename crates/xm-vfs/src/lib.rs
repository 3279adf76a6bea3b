//! Virtual file system containers for xenia-manager
//!
//! Readers for Xbox 360 disc images (XGD/XISO, optionally sliced), STFS
//! packages and XEX executables, enough to identify a game and pull its
//! boot executable off the disc.

pub mod bytes;
pub mod constants;
pub mod container;
pub mod decoder;
pub mod formats;
pub mod game;

pub use container::{ContainerReader, DirectoryEntry, DirectoryTable, MountGuard, XisoContainerReader};
pub use decoder::{probe_xgd, IsoSectorDecoder, IsoSlice, SectorDecoder, XgdProbe};
pub use formats::stfs::{ContentType, StfsMetadata, StfsReader, StfsSignatureType};
pub use formats::xex::{extract_data, XexFile, XexIds};
pub use formats::xgd::{XgdInfo, XgdLayout};
pub use game::{identify, import, GameIdentity, GameSource};
