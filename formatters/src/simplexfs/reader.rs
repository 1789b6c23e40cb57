// Tree codec, read path
// Rebuilds the host-side tree from the root directory chain, verifying each
// entry's size and checksum on the way down.

use super::checksum::{fold, Checksum};
use super::directory::{parse_directory, DirEntryRecord};
use super::fat::AllocationTable;
use super::image::Image;
use log::trace;
use simplexfs_core::{Directory, File, Node, NodeKind, SimplexError, SimplexResult};
use std::collections::HashSet;

pub struct TreeReader<'a> {
    image: &'a Image,
    table: &'a AllocationTable,
    /// Directory chains already entered; a repeat means a directory cycle.
    visited: HashSet<u16>,
}

impl<'a> TreeReader<'a> {
    pub fn new(image: &'a Image, table: &'a AllocationTable) -> Self {
        Self {
            image,
            table,
            visited: HashSet::new(),
        }
    }

    /// Read the directory whose chain starts at `start`. Used for the root,
    /// which has no record of its own and so no size or checksum to check.
    pub fn extract_directory(&mut self, start: u16) -> SimplexResult<Directory> {
        let blob = self.read_chain(start)?;
        self.decode_directory(start, &blob)
    }

    /// Bytes of the chain at `start`, whole sectors.
    pub fn read_chain(&self, start: u16) -> SimplexResult<Vec<u8>> {
        let chain = self.table.chain(start)?;
        Ok(self.image.read_chain(&chain))
    }

    fn decode_directory(&mut self, start: u16, blob: &[u8]) -> SimplexResult<Directory> {
        if !self.visited.insert(start) {
            return Err(SimplexError::corrupt(
                "directory chain",
                "each directory reached once",
                format!("directory at sector {} reached twice", start),
            ));
        }

        let mut dir = Directory::new();
        for (name, record) in parse_directory(blob)? {
            trace!(
                "Entry {:?}: flags {:#06x}, sector {}, {} bytes",
                name,
                record.flags,
                record.starting_block,
                record.file_size
            );

            let content = self.read_entry(&name, &record)?;
            let node = match record.kind()? {
                NodeKind::File => Node::File(File {
                    content,
                    permissions: record.permissions(),
                }),
                NodeKind::Directory => {
                    let mut child = self.decode_directory(record.starting_block, &content)?;
                    child.permissions = record.permissions();
                    Node::Directory(child)
                }
            };

            if dir.entries.insert(name.clone(), node).is_some() {
                return Err(SimplexError::corrupt(
                    "name",
                    "unique names per directory",
                    format!("duplicate {:?}", name),
                ));
            }
        }
        Ok(dir)
    }

    /// Content of one entry, truncated to its recorded size and checked
    /// against its recorded checksum.
    fn read_entry(&self, name: &str, record: &DirEntryRecord) -> SimplexResult<Vec<u8>> {
        let mut content = self.read_chain(record.starting_block)?;
        let size = record.file_size as usize;
        if content.len() < size {
            return Err(SimplexError::corrupt(
                format!("size of {:?}", name),
                format!("at most {} bytes in its chain", content.len()),
                size,
            ));
        }
        content.truncate(size);

        let computed: Checksum = fold(&content);
        if computed != record.checksum {
            return Err(SimplexError::corrupt(
                format!("checksum of {:?}", name),
                record.checksum,
                computed,
            ));
        }
        Ok(content)
    }
}
