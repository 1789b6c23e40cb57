// Geometry calculation
// Everything here derives from the sector count alone.

use super::constants::*;
use simplexfs_core::{SimplexError, SimplexResult, Warning, WarningSink};
use log::debug;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Geometry {
    pub num_sectors: u16,
    pub fat_sector_count: u16,
    pub root_dir_start: u16,
}

impl Geometry {
    /// Pure geometry for `num_sectors`, rejecting out-of-range counts.
    pub fn new(num_sectors: u32) -> SimplexResult<Self> {
        if num_sectors > MAX_SECTORS {
            return Err(SimplexError::invalid(
                "num_sectors",
                format!(
                    "SimplexFS cannot hold more than {} sectors (got {})",
                    MAX_SECTORS, num_sectors
                ),
            ));
        }
        if num_sectors < MIN_SECTORS {
            return Err(SimplexError::invalid(
                "num_sectors",
                format!(
                    "SimplexFS cannot hold less than {} sectors (got {})",
                    MIN_SECTORS, num_sectors
                ),
            ));
        }

        let fat_sector_count = (num_sectors as usize).div_ceil(FAT_ENTRIES_PER_SECTOR) as u16;
        let root_dir_start = 2 + 2 * fat_sector_count;

        Ok(Self {
            num_sectors: num_sectors as u16,
            fat_sector_count,
            root_dir_start,
        })
    }

    pub fn header_sector(&self) -> usize {
        0
    }

    pub fn header_mirror_sector(&self) -> usize {
        1
    }

    pub fn fat_start(&self) -> usize {
        2
    }

    pub fn fat_mirror_start(&self) -> usize {
        2 + self.fat_sector_count as usize
    }

    pub fn fat_bytes(&self) -> usize {
        self.fat_sector_count as usize * SECTOR_SIZE
    }

    /// Sectors available to chains, the root directory included.
    pub fn data_sectors(&self) -> usize {
        self.num_sectors as usize - self.root_dir_start as usize
    }

    pub fn image_bytes(&self) -> usize {
        self.num_sectors as usize * SECTOR_SIZE
    }

    pub fn is_discouraged(&self) -> bool {
        (self.num_sectors as u32) < RECOMMENDED_MIN_SECTORS
    }
}

/// Geometry for a new build. Small volumes are allowed but reported.
pub fn compute_layout(num_sectors: u32, sink: &mut dyn WarningSink) -> SimplexResult<Geometry> {
    let geometry = Geometry::new(num_sectors)?;
    if geometry.is_discouraged() {
        sink.warn(Warning::SmallVolume {
            num_sectors: geometry.num_sectors,
        });
    }

    debug!(
        "SimplexFS layout: {} sectors, {} FAT sectors, root directory at sector {}",
        geometry.num_sectors, geometry.fat_sector_count, geometry.root_dir_start
    );
    Ok(geometry)
}

/// Sectors needed to hold `len` bytes. Never zero, so every chain owns at
/// least one sector.
pub fn sectors_for(len: usize) -> usize {
    len.div_ceil(SECTOR_SIZE).max(1)
}
