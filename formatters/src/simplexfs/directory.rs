// Directory content codec
// entry_count (u16), reserved (u16), 16-byte records, then the name pool of
// zero-terminated ASCII names. Name pointers are offsets into the whole blob.

use super::checksum::Checksum;
use super::constants::*;
use byteorder::{ByteOrder, LittleEndian};
use simplexfs_core::tree::{name_problem, validate_name};
use simplexfs_core::{NodeKind, SimplexError, SimplexResult, PERMISSION_MASK};

/// What the write path hands back for each inserted file or directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertedFile {
    pub starting_block: u16,
    pub file_size: u32,
    pub checksum: Checksum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntryRecord {
    pub flags: u16,
    pub owner: u16,
    pub starting_block: u16,
    pub file_size: u32,
    pub checksum: Checksum,
    pub name_pointer: u16,
}

impl DirEntryRecord {
    pub fn flags_for(kind: NodeKind, permissions: u16) -> u16 {
        let type_bits = match kind {
            NodeKind::Directory => TYPE_DIRECTORY,
            NodeKind::File => TYPE_FILE,
        };
        type_bits | (permissions & PERMISSION_MASK)
    }

    pub fn kind(&self) -> SimplexResult<NodeKind> {
        match self.flags & TYPE_MASK {
            TYPE_DIRECTORY => Ok(NodeKind::Directory),
            TYPE_FILE => Ok(NodeKind::File),
            other => Err(SimplexError::corrupt(
                "entry type",
                format!("{:#06x} or {:#06x}", TYPE_FILE, TYPE_DIRECTORY),
                format!("{:#06x}", other),
            )),
        }
    }

    pub fn permissions(&self) -> u16 {
        self.flags & PERMISSION_MASK
    }

    pub fn to_bytes(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut rec = [0u8; DIR_ENTRY_SIZE];
        LittleEndian::write_u16(&mut rec[ENTRY_FLAGS..], self.flags);
        LittleEndian::write_u16(&mut rec[ENTRY_OWNER..], self.owner);
        LittleEndian::write_u16(&mut rec[ENTRY_START..], self.starting_block);
        LittleEndian::write_u24(&mut rec[ENTRY_SIZE..], self.file_size);
        rec[ENTRY_CHECKSUM..ENTRY_CHECKSUM + 2].copy_from_slice(&self.checksum.to_bytes());
        LittleEndian::write_u16(&mut rec[ENTRY_NAME_PTR..], self.name_pointer);
        rec
    }

    pub fn from_bytes(rec: &[u8]) -> Self {
        Self {
            flags: LittleEndian::read_u16(&rec[ENTRY_FLAGS..]),
            owner: LittleEndian::read_u16(&rec[ENTRY_OWNER..]),
            starting_block: LittleEndian::read_u16(&rec[ENTRY_START..]),
            file_size: LittleEndian::read_u24(&rec[ENTRY_SIZE..]),
            checksum: Checksum::from_bytes([rec[ENTRY_CHECKSUM], rec[ENTRY_CHECKSUM + 1]]),
            name_pointer: LittleEndian::read_u16(&rec[ENTRY_NAME_PTR..]),
        }
    }
}

/// Accumulates records and names, then lays out the blob.
#[derive(Debug, Default)]
pub struct DirectoryBuilder {
    records: Vec<DirEntryRecord>,
    /// Offset of each name within `pool`; rebased in `finish`.
    name_offsets: Vec<usize>,
    pool: Vec<u8>,
}

impl DirectoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        name: &str,
        kind: NodeKind,
        permissions: u16,
        inserted: InsertedFile,
    ) -> SimplexResult<()> {
        validate_name(name)?;

        self.records.push(DirEntryRecord {
            flags: DirEntryRecord::flags_for(kind, permissions),
            owner: 0,
            starting_block: inserted.starting_block,
            file_size: inserted.file_size,
            checksum: inserted.checksum,
            name_pointer: 0,
        });
        self.name_offsets.push(self.pool.len());
        self.pool.extend_from_slice(name.as_bytes());
        self.pool.push(0);
        Ok(())
    }

    pub fn finish(mut self) -> SimplexResult<Vec<u8>> {
        let count = self.records.len();
        if count > u16::MAX as usize {
            return Err(SimplexError::invalid(
                "entry_count",
                format!("a directory holds at most {} entries (got {})", u16::MAX, count),
            ));
        }

        let pool_start = DIR_HEADER_SIZE + count * DIR_ENTRY_SIZE;
        let mut blob = Vec::with_capacity(pool_start + self.pool.len());
        blob.extend_from_slice(&(count as u16).to_le_bytes());
        blob.extend_from_slice(&[0, 0]);

        for (record, offset) in self.records.iter_mut().zip(&self.name_offsets) {
            let pointer = pool_start + offset;
            if pointer > u16::MAX as usize {
                return Err(SimplexError::invalid(
                    "name_pointer",
                    format!("directory names overflow the 16-bit name pointer ({})", pointer),
                ));
            }
            record.name_pointer = pointer as u16;
            blob.extend_from_slice(&record.to_bytes());
        }

        blob.extend_from_slice(&self.pool);
        Ok(blob)
    }
}

/// Bytes a directory with these names will occupy.
pub fn directory_blob_len<'a>(names: impl IntoIterator<Item = &'a str>) -> usize {
    names
        .into_iter()
        .fold(DIR_HEADER_SIZE, |len, name| len + DIR_ENTRY_SIZE + name.len() + 1)
}

/// Check names and directory limits ahead of a build, without encoding.
pub fn check_directory<'a>(names: impl IntoIterator<Item = &'a str>) -> SimplexResult<()> {
    let names: Vec<&str> = names.into_iter().collect();
    if names.len() > u16::MAX as usize {
        return Err(SimplexError::invalid(
            "entry_count",
            format!("a directory holds at most {} entries (got {})", u16::MAX, names.len()),
        ));
    }

    let mut pointer = DIR_HEADER_SIZE + names.len() * DIR_ENTRY_SIZE;
    for name in names {
        validate_name(name)?;
        if pointer > u16::MAX as usize {
            return Err(SimplexError::invalid(
                "name_pointer",
                format!("directory names overflow the 16-bit name pointer ({})", pointer),
            ));
        }
        pointer += name.len() + 1;
    }
    Ok(())
}

/// Decode a directory blob into `(name, record)` pairs in entry order.
pub fn parse_directory(blob: &[u8]) -> SimplexResult<Vec<(String, DirEntryRecord)>> {
    if blob.len() < DIR_HEADER_SIZE {
        return Err(SimplexError::corrupt("directory length", DIR_HEADER_SIZE, blob.len()));
    }

    let count = LittleEndian::read_u16(&blob[0..2]) as usize;
    let records_end = DIR_HEADER_SIZE + count * DIR_ENTRY_SIZE;
    if records_end > blob.len() {
        return Err(SimplexError::corrupt(
            "directory entry count",
            format!("at most {} entries", (blob.len() - DIR_HEADER_SIZE) / DIR_ENTRY_SIZE),
            count,
        ));
    }

    blob[DIR_HEADER_SIZE..records_end]
        .chunks_exact(DIR_ENTRY_SIZE)
        .map(|rec| {
            let record = DirEntryRecord::from_bytes(rec);
            let name = read_name(blob, record.name_pointer as usize, records_end)?;
            Ok((name, record))
        })
        .collect()
}

fn read_name(blob: &[u8], pointer: usize, pool_start: usize) -> SimplexResult<String> {
    if pointer < pool_start || pointer >= blob.len() {
        return Err(SimplexError::corrupt(
            "name pointer",
            format!("offset in {}..{}", pool_start, blob.len()),
            pointer,
        ));
    }

    let len = blob[pointer..]
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| SimplexError::corrupt("name", "zero-terminated name", "unterminated name"))?;
    let bytes = &blob[pointer..pointer + len];

    let name = String::from_utf8_lossy(bytes).into_owned();
    if let Some(problem) = name_problem(&name) {
        return Err(SimplexError::corrupt("name", "valid entry name", format!("{:?}: {}", name, problem)));
    }
    Ok(name)
}
