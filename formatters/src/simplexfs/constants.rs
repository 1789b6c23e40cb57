// SimplexFS on-disk constants
// Every multi-byte field is little-endian.

use static_assertions::const_assert_eq;

pub const SECTOR_SIZE: usize = 256;

pub const MIN_SECTORS: u32 = 5;
pub const MAX_SECTORS: u32 = 65535;
/// Below this the build goes ahead but warns.
pub const RECOMMENDED_MIN_SECTORS: u32 = 16;

/// Allocation table entries per sector (u16 each).
pub const FAT_ENTRIES_PER_SECTOR: usize = SECTOR_SIZE / 2;

pub const FAT_FREE: u16 = 0x0000;
/// Reserved system sector or last sector of a chain.
pub const FAT_END: u16 = 0xFFFF;

// Header layout (sector 0)
pub const MAGIC: [u8; 5] = [0xFE, 0xCA, 0x01, 0x32, 0x94];
pub const HDR_MAGIC: usize = 0;
pub const HDR_NUM_SECTORS: usize = 5;
pub const HDR_NUM_FAT_ENTRIES: usize = 7;
pub const HDR_FAT_SECTOR_COUNT: usize = 9;
pub const HDR_ROOT_DIR_START: usize = 11;
pub const HDR_VERSION_MAJOR: usize = 13;
pub const HDR_VERSION_MINOR: usize = 14;
pub const HDR_MEDIA_TYPE: usize = 15;
pub const HDR_IDENTIFIER: usize = 16;
pub const HDR_VOLUME_NAME: usize = 20;
pub const HDR_FAT_CHECKSUM: usize = 252;
pub const HDR_CHECKSUM: usize = 254;
pub const HEADER_SIZE: usize = 256;

pub const VOLUME_NAME_LEN: usize = 24;
pub const DEFAULT_VOLUME_NAME: &str = "nameless drive";

pub const VERSION_MAJOR: u8 = 1;
pub const VERSION_MINOR: u8 = 0;

// Directory content layout
pub const DIR_HEADER_SIZE: usize = 4;
pub const DIR_ENTRY_SIZE: usize = 16;
pub const ENTRY_FLAGS: usize = 0;
pub const ENTRY_OWNER: usize = 2;
pub const ENTRY_START: usize = 4;
pub const ENTRY_SIZE: usize = 6;
pub const ENTRY_CHECKSUM: usize = 9;
pub const ENTRY_NAME_PTR: usize = 11;

pub const TYPE_MASK: u16 = 0xF000;
pub const TYPE_DIRECTORY: u16 = 0x4000;
pub const TYPE_FILE: u16 = 0x0000;

/// Largest value the 24-bit size field can hold.
pub const MAX_FILE_SIZE: usize = 0x00FF_FFFF;

const_assert_eq!(HEADER_SIZE, SECTOR_SIZE);
const_assert_eq!(HDR_VOLUME_NAME + VOLUME_NAME_LEN, 44);
const_assert_eq!(HDR_CHECKSUM + 2, HEADER_SIZE);
const_assert_eq!(ENTRY_NAME_PTR + 2 + 3, DIR_ENTRY_SIZE);
