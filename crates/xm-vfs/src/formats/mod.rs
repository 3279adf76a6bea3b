//! File format handlers

pub mod stfs;
pub mod xex;
pub mod xgd;

pub use stfs::{ContentType, StfsMetadata, StfsReader, StfsSignatureType};
pub use xex::{XexExecutionInfo, XexFile, XexHeader, XexIds, XexSecurityInfo};
pub use xgd::{XgdHeader, XgdInfo, XgdLayout};
