// SimplexFS allocation table
// One u16 per sector: 0x0000 free, 0xFFFF end/reserved, anything else is the
// next sector of the chain.

use super::checksum::{fold, Checksum};
use super::constants::*;
use super::layout::Geometry;
use byteorder::{ByteOrder, LittleEndian};
use log::trace;
use simplexfs_core::{SimplexError, SimplexResult};

#[derive(Debug, Clone)]
pub struct AllocationTable {
    entries: Vec<u16>,
    fat_sector_count: u16,
    /// First sector a chain may use; everything below is system-reserved.
    reserved: u16,
    /// Every entry below this index is known to be in use.
    free_hint: usize,
}

impl AllocationTable {
    /// An all-free table for a new image.
    pub fn new(geometry: &Geometry) -> Self {
        Self {
            entries: vec![FAT_FREE; geometry.num_sectors as usize],
            fat_sector_count: geometry.fat_sector_count,
            reserved: 0,
            free_hint: 0,
        }
    }

    /// Load the on-disk table. Padding past `num_sectors` is ignored.
    pub fn from_bytes(bytes: &[u8], geometry: &Geometry) -> SimplexResult<Self> {
        if bytes.len() < geometry.fat_bytes() {
            return Err(SimplexError::corrupt(
                "allocation table length",
                geometry.fat_bytes(),
                bytes.len(),
            ));
        }

        let mut entries = vec![FAT_FREE; geometry.num_sectors as usize];
        LittleEndian::read_u16_into(&bytes[..entries.len() * 2], &mut entries);

        let mut table = Self {
            entries,
            fat_sector_count: geometry.fat_sector_count,
            reserved: geometry.root_dir_start,
            free_hint: 0,
        };
        table.free_hint = table.first_free_from(0);
        Ok(table)
    }

    pub fn entry(&self, index: u16) -> Option<u16> {
        self.entries.get(index as usize).copied()
    }

    pub fn free_count(&self) -> usize {
        self.entries[self.free_hint..]
            .iter()
            .filter(|&&e| e == FAT_FREE)
            .count()
    }

    /// Mark `[0, count)` as permanently in use.
    pub fn reserve_system_sectors(&mut self, count: u16) {
        let count = (count as usize).min(self.entries.len());
        for entry in &mut self.entries[..count] {
            *entry = FAT_END;
        }
        self.reserved = self.reserved.max(count as u16);
        self.free_hint = self.first_free_from(self.free_hint);
    }

    /// Turn one specific free sector into a single-sector chain.
    pub fn claim(&mut self, index: u16) -> SimplexResult<()> {
        match self.entries.get(index as usize) {
            Some(&FAT_FREE) => {
                self.entries[index as usize] = FAT_END;
                if index as usize == self.free_hint {
                    self.free_hint = self.first_free_from(self.free_hint);
                }
                Ok(())
            }
            Some(&value) => Err(SimplexError::invalid(
                "sector",
                format!("sector {} is not free (entry {:#06x})", index, value),
            )),
            None => Err(SimplexError::invalid(
                "sector",
                format!("sector {} is past the end of a {}-sector table", index, self.entries.len()),
            )),
        }
    }

    /// First-fit allocation of `count` sectors, linked in scan order.
    ///
    /// Nothing is written unless the whole chain fits.
    pub fn allocate_chain(&mut self, count: usize) -> SimplexResult<Vec<u16>> {
        if count == 0 {
            return Err(SimplexError::invalid("sector_count", "a chain needs at least one sector"));
        }

        let chain = self.find_free(count)?;
        self.link(&chain);
        trace!("Allocated chain of {} sectors starting at {}", count, chain[0]);
        Ok(chain)
    }

    /// Grow the single-sector chain at `head` to `count` sectors in total.
    /// Returns the whole chain, `head` first.
    pub fn extend_chain(&mut self, head: u16, count: usize) -> SimplexResult<Vec<u16>> {
        if self.entry(head) != Some(FAT_END) {
            return Err(SimplexError::invalid(
                "sector",
                format!("sector {} is not the end of a chain", head),
            ));
        }
        if count <= 1 {
            return Ok(vec![head]);
        }

        let mut chain = Vec::with_capacity(count);
        chain.push(head);
        chain.extend(self.find_free(count - 1)?);
        self.link(&chain);
        trace!("Extended chain at {} to {} sectors", head, count);
        Ok(chain)
    }

    /// Walk the chain starting at `start`.
    pub fn follow_chain(&self, start: u16) -> ChainIter<'_> {
        ChainIter {
            table: self,
            next: Some(start),
            visited: vec![false; self.entries.len()],
            failed: false,
        }
    }

    /// Collect a whole chain, stopping at the first error.
    pub fn chain(&self, start: u16) -> SimplexResult<Vec<u16>> {
        self.follow_chain(start).collect()
    }

    /// On-disk bytes, padded with zeros to whole sectors.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.fat_sector_count as usize * SECTOR_SIZE];
        LittleEndian::write_u16_into(&self.entries, &mut bytes[..self.entries.len() * 2]);
        bytes
    }

    pub fn checksum(&self) -> Checksum {
        fold(&self.to_bytes())
    }

    fn first_free_from(&self, from: usize) -> usize {
        self.entries[from.min(self.entries.len())..]
            .iter()
            .position(|&e| e == FAT_FREE)
            .map_or(self.entries.len(), |offset| from + offset)
    }

    fn find_free(&self, count: usize) -> SimplexResult<Vec<u16>> {
        let found: Vec<u16> = (self.free_hint..self.entries.len())
            .filter(|&i| self.entries[i] == FAT_FREE)
            .take(count)
            .map(|i| i as u16)
            .collect();

        if found.len() < count {
            return Err(SimplexError::OutOfSpace {
                requested: count,
                available: found.len(),
            });
        }
        Ok(found)
    }

    fn link(&mut self, chain: &[u16]) {
        for pair in chain.windows(2) {
            self.entries[pair[0] as usize] = pair[1];
        }
        if let Some(&last) = chain.last() {
            self.entries[last as usize] = FAT_END;
        }
        self.free_hint = self.first_free_from(self.free_hint);
    }

    fn check_link(&self, index: u16, what: &str) -> SimplexResult<()> {
        if index < self.reserved || index as usize >= self.entries.len() {
            return Err(SimplexError::corrupt(
                what,
                format!("sector in {}..{}", self.reserved, self.entries.len()),
                index,
            ));
        }
        Ok(())
    }
}

/// Lazy chain traversal. Yields each sector index in order and stops after
/// the sector whose entry is the terminator. Any corruption ends the walk
/// with a single `Err`.
pub struct ChainIter<'a> {
    table: &'a AllocationTable,
    next: Option<u16>,
    visited: Vec<bool>,
    failed: bool,
}

impl ChainIter<'_> {
    fn step(&mut self, index: u16) -> SimplexResult<u16> {
        self.table.check_link(index, "chain link")?;

        if self.visited[index as usize] {
            return Err(SimplexError::corrupt(
                "chain",
                "acyclic chain",
                format!("sector {} visited twice", index),
            ));
        }
        self.visited[index as usize] = true;

        match self.table.entries[index as usize] {
            FAT_FREE => Err(SimplexError::corrupt(
                format!("allocation entry {}", index),
                "allocated sector",
                "free sector inside chain",
            )),
            FAT_END => {
                self.next = None;
                Ok(index)
            }
            next => {
                self.next = Some(next);
                Ok(index)
            }
        }
    }
}

impl Iterator for ChainIter<'_> {
    type Item = SimplexResult<u16>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let index = self.next?;
        let result = self.step(index);
        if result.is_err() {
            self.failed = true;
            self.next = None;
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(num_sectors: u32) -> AllocationTable {
        let geometry = Geometry::new(num_sectors).unwrap();
        let mut table = AllocationTable::new(&geometry);
        table.reserve_system_sectors(geometry.root_dir_start);
        table
    }

    #[test]
    fn test_reserve_marks_terminators() {
        let t = table(16);
        for i in 0..4 {
            assert_eq!(t.entry(i), Some(FAT_END));
        }
        assert_eq!(t.entry(4), Some(FAT_FREE));
        assert_eq!(t.free_count(), 12);
    }

    #[test]
    fn test_first_fit_skips_used_sectors() {
        let mut t = table(16);
        t.claim(5).unwrap();
        let chain = t.allocate_chain(3).unwrap();
        assert_eq!(chain, vec![4, 6, 7]);
        assert_eq!(t.entry(4), Some(6));
        assert_eq!(t.entry(6), Some(7));
        assert_eq!(t.entry(7), Some(FAT_END));
        assert_eq!(t.chain(4).unwrap(), chain);
    }

    #[test]
    fn test_out_of_space_leaves_table_untouched() {
        let mut t = table(8);
        let before = t.to_bytes();
        match t.allocate_chain(5) {
            Err(SimplexError::OutOfSpace { requested, available }) => {
                assert_eq!((requested, available), (5, 4));
            }
            other => panic!("expected OutOfSpace, got {:?}", other),
        }
        assert_eq!(t.to_bytes(), before);
        assert_eq!(t.allocate_chain(4).unwrap(), vec![4, 5, 6, 7]);
        assert!(t.allocate_chain(1).is_err());
    }

    #[test]
    fn test_extend_pinned_head() {
        let mut t = table(16);
        t.claim(4).unwrap();
        t.allocate_chain(2).unwrap(); // 5, 6
        let chain = t.extend_chain(4, 3).unwrap();
        assert_eq!(chain, vec![4, 7, 8]);
        assert_eq!(t.chain(4).unwrap(), chain);
        assert!(t.extend_chain(4, 1).unwrap_err().to_string().contains("not the end"));
    }

    #[test]
    fn test_cycle_is_detected() {
        let mut t = table(16);
        t.allocate_chain(2).unwrap(); // 4 -> 5
        t.entries[5] = 4;
        let result: SimplexResult<Vec<u16>> = t.chain(4);
        assert!(result.unwrap_err().is_corrupt());
    }

    #[test]
    fn test_reserved_and_free_links_are_corrupt() {
        let mut t = table(16);
        assert!(t.chain(0).unwrap_err().is_corrupt());
        assert!(t.chain(4).unwrap_err().is_corrupt()); // free start
        t.allocate_chain(1).unwrap();
        t.entries[4] = 2;
        assert!(t.chain(4).unwrap_err().is_corrupt());
        t.entries[4] = 200;
        assert!(t.chain(4).unwrap_err().is_corrupt());
    }

    #[test]
    fn test_bytes_round_trip_and_checksum() {
        let mut t = table(200);
        t.allocate_chain(3).unwrap();
        let bytes = t.to_bytes();
        assert_eq!(bytes.len(), 2 * SECTOR_SIZE);

        let geometry = Geometry::new(200).unwrap();
        let loaded = AllocationTable::from_bytes(&bytes, &geometry).unwrap();
        assert_eq!(loaded.to_bytes(), bytes);
        assert_eq!(loaded.free_count(), t.free_count());

        let mut with_sum = bytes.clone();
        with_sum.extend_from_slice(&t.checksum().to_bytes());
        assert!(fold(&with_sum).is_zero());
    }
}
