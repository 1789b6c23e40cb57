// SimplexFS header (sector 0)
// Magic, geometry, version, media type, identifier and volume name, closed
// by the allocation table checksum and the header's own checksum.

use super::checksum::{fold, Checksum};
use super::constants::*;
use super::fat::AllocationTable;
use super::layout::Geometry;
use byteorder::{ByteOrder, LittleEndian};
use log::debug;
use simplexfs_core::{BuildOptions, SimplexError, SimplexResult, Warning, WarningSink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub num_sectors: u16,
    pub num_fat_entries: u16,
    pub fat_sector_count: u16,
    pub root_dir_start: u16,
    pub version_major: u8,
    pub version_minor: u8,
    pub media_type: u8,
    pub identifier: u32,
    pub volume_name: [u8; VOLUME_NAME_LEN],
    pub fat_checksum: Checksum,
    pub header_checksum: Checksum,
}

impl Header {
    pub fn new(
        geometry: &Geometry,
        media_type: u8,
        identifier: u32,
        volume_name: [u8; VOLUME_NAME_LEN],
        fat_checksum: Checksum,
    ) -> Self {
        let mut header = Self {
            num_sectors: geometry.num_sectors,
            num_fat_entries: geometry.num_sectors,
            fat_sector_count: geometry.fat_sector_count,
            root_dir_start: geometry.root_dir_start,
            version_major: VERSION_MAJOR,
            version_minor: VERSION_MINOR,
            media_type,
            identifier,
            volume_name,
            fat_checksum,
            header_checksum: Checksum::default(),
        };
        header.header_checksum = fold(&header.to_bytes()[..HDR_CHECKSUM]);
        header
    }

    /// Header bytes for a build, with both checksums filled in. The volume
    /// name comes pre-encoded from `encode_volume_name`.
    pub fn build(
        geometry: &Geometry,
        options: &BuildOptions,
        volume_name: [u8; VOLUME_NAME_LEN],
        fat_checksum: Checksum,
    ) -> [u8; HEADER_SIZE] {
        Self::new(
            geometry,
            options.media_type,
            options.identifier,
            volume_name,
            fat_checksum,
        )
        .to_bytes()
    }

    /// Serialize as stored. The header checksum field is written as held;
    /// `new` is what computes it.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut hdr = [0u8; HEADER_SIZE];

        hdr[HDR_MAGIC..HDR_MAGIC + MAGIC.len()].copy_from_slice(&MAGIC);
        LittleEndian::write_u16(&mut hdr[HDR_NUM_SECTORS..], self.num_sectors);
        LittleEndian::write_u16(&mut hdr[HDR_NUM_FAT_ENTRIES..], self.num_fat_entries);
        LittleEndian::write_u16(&mut hdr[HDR_FAT_SECTOR_COUNT..], self.fat_sector_count);
        LittleEndian::write_u16(&mut hdr[HDR_ROOT_DIR_START..], self.root_dir_start);
        hdr[HDR_VERSION_MAJOR] = self.version_major;
        hdr[HDR_VERSION_MINOR] = self.version_minor;
        hdr[HDR_MEDIA_TYPE] = self.media_type;
        LittleEndian::write_u32(&mut hdr[HDR_IDENTIFIER..], self.identifier);
        hdr[HDR_VOLUME_NAME..HDR_VOLUME_NAME + VOLUME_NAME_LEN].copy_from_slice(&self.volume_name);
        hdr[HDR_FAT_CHECKSUM..HDR_FAT_CHECKSUM + 2].copy_from_slice(&self.fat_checksum.to_bytes());
        hdr[HDR_CHECKSUM..HDR_CHECKSUM + 2].copy_from_slice(&self.header_checksum.to_bytes());

        hdr
    }

    /// Validate and decode a header sector.
    pub fn parse(bytes: &[u8]) -> SimplexResult<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(SimplexError::corrupt("header length", HEADER_SIZE, bytes.len()));
        }
        let hdr = &bytes[..HEADER_SIZE];

        if hdr[HDR_MAGIC..HDR_MAGIC + MAGIC.len()] != MAGIC {
            return Err(SimplexError::corrupt(
                "magic",
                hex_bytes(&MAGIC),
                hex_bytes(&hdr[HDR_MAGIC..HDR_MAGIC + MAGIC.len()]),
            ));
        }

        let stored = Checksum::from_bytes([hdr[HDR_CHECKSUM], hdr[HDR_CHECKSUM + 1]]);
        let computed = fold(&hdr[..HDR_CHECKSUM]);
        if stored != computed {
            return Err(SimplexError::corrupt("header checksum", computed, stored));
        }

        let version_major = hdr[HDR_VERSION_MAJOR];
        let version_minor = hdr[HDR_VERSION_MINOR];
        if version_major != VERSION_MAJOR {
            return Err(SimplexError::UnsupportedVersion {
                major: version_major,
                minor: version_minor,
            });
        }

        let mut volume_name = [0u8; VOLUME_NAME_LEN];
        volume_name.copy_from_slice(&hdr[HDR_VOLUME_NAME..HDR_VOLUME_NAME + VOLUME_NAME_LEN]);

        let header = Self {
            num_sectors: LittleEndian::read_u16(&hdr[HDR_NUM_SECTORS..]),
            num_fat_entries: LittleEndian::read_u16(&hdr[HDR_NUM_FAT_ENTRIES..]),
            fat_sector_count: LittleEndian::read_u16(&hdr[HDR_FAT_SECTOR_COUNT..]),
            root_dir_start: LittleEndian::read_u16(&hdr[HDR_ROOT_DIR_START..]),
            version_major,
            version_minor,
            media_type: hdr[HDR_MEDIA_TYPE],
            identifier: LittleEndian::read_u32(&hdr[HDR_IDENTIFIER..]),
            volume_name,
            fat_checksum: Checksum::from_bytes([hdr[HDR_FAT_CHECKSUM], hdr[HDR_FAT_CHECKSUM + 1]]),
            header_checksum: stored,
        };
        header.geometry()?;

        debug!(
            "SimplexFS header: {} sectors, root at {}, volume \"{}\"",
            header.num_sectors,
            header.root_dir_start,
            header.volume_label()
        );
        Ok(header)
    }

    /// Geometry implied by the sector count, checked against the stored
    /// derived fields.
    pub fn geometry(&self) -> SimplexResult<Geometry> {
        let geometry = Geometry::new(self.num_sectors as u32)
            .map_err(|_| SimplexError::corrupt("num_sectors", "5..=65535", self.num_sectors))?;

        if self.num_fat_entries != self.num_sectors {
            return Err(SimplexError::corrupt("num_fat_entries", self.num_sectors, self.num_fat_entries));
        }
        if self.fat_sector_count != geometry.fat_sector_count {
            return Err(SimplexError::corrupt(
                "fat_sector_count",
                geometry.fat_sector_count,
                self.fat_sector_count,
            ));
        }
        if self.root_dir_start != geometry.root_dir_start {
            return Err(SimplexError::corrupt(
                "root_dir_start",
                geometry.root_dir_start,
                self.root_dir_start,
            ));
        }
        Ok(geometry)
    }

    pub fn verify_fat_checksum(&self, table: &AllocationTable) -> SimplexResult<()> {
        let computed = table.checksum();
        if computed != self.fat_checksum {
            return Err(SimplexError::corrupt("allocation table checksum", self.fat_checksum, computed));
        }
        Ok(())
    }

    /// Volume name up to the first zero byte.
    pub fn volume_label(&self) -> String {
        let end = self
            .volume_name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(VOLUME_NAME_LEN);
        String::from_utf8_lossy(&self.volume_name[..end]).into_owned()
    }
}

/// Encode a volume name as zero-padded ASCII.
///
/// Characters outside printable ASCII are reported but kept (non-ASCII
/// becomes `?`). Only an encoded length over 24 bytes is an error.
pub fn encode_volume_name(
    name: Option<&str>,
    sink: &mut dyn WarningSink,
) -> SimplexResult<[u8; VOLUME_NAME_LEN]> {
    let name = match name {
        Some(n) if !n.is_empty() => n,
        _ => DEFAULT_VOLUME_NAME,
    };

    let got_null = name.chars().any(|c| c == '\0');
    let got_ctrl = name.chars().any(|c| c != '\0' && (c as u32) < 0x20);
    let got_non_ascii = name.chars().any(|c| (c as u32) > 0x7F);
    if got_null {
        sink.warn(Warning::VolumeNameNull { name: name.to_string() });
    }
    if got_ctrl {
        sink.warn(Warning::VolumeNameControl { name: name.to_string() });
    }
    if got_non_ascii {
        sink.warn(Warning::VolumeNameNonAscii { name: name.to_string() });
    }

    let encoded: Vec<u8> = name
        .chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .collect();
    if encoded.len() > VOLUME_NAME_LEN {
        return Err(SimplexError::invalid(
            "volume_name",
            format!(
                "Volume name cannot be longer than {} ascii bytes (got {})",
                VOLUME_NAME_LEN,
                encoded.len()
            ),
        ));
    }

    let mut out = [0u8; VOLUME_NAME_LEN];
    out[..encoded.len()].copy_from_slice(&encoded);
    Ok(out)
}

fn hex_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
