// Tree codec, write path
// Depth-first: children are stored before the directory that lists them, so
// each record can carry its child's starting block, size and checksum.

use super::checksum::fold;
use super::constants::MAX_FILE_SIZE;
use super::directory::{DirectoryBuilder, InsertedFile};
use super::fat::AllocationTable;
use super::image::Image;
use super::layout::sectors_for;
use log::{debug, trace};
use simplexfs_core::{Directory, File, Node, SimplexError, SimplexResult};

pub struct TreeWriter<'a> {
    image: &'a mut Image,
    table: &'a mut AllocationTable,
}

impl<'a> TreeWriter<'a> {
    pub fn new(image: &'a mut Image, table: &'a mut AllocationTable) -> Self {
        Self { image, table }
    }

    pub fn insert(&mut self, node: &Node) -> SimplexResult<InsertedFile> {
        match node {
            Node::File(file) => self.insert_file(file),
            Node::Directory(dir) => self.insert_directory(dir),
        }
    }

    pub fn insert_file(&mut self, file: &File) -> SimplexResult<InsertedFile> {
        let chain = self.table.allocate_chain(sectors_for(checked_len(&file.content)?))?;
        Ok(self.store(&chain, &file.content))
    }

    pub fn insert_directory(&mut self, dir: &Directory) -> SimplexResult<InsertedFile> {
        let blob = self.directory_blob(dir)?;
        let chain = self.table.allocate_chain(sectors_for(checked_len(&blob)?))?;
        Ok(self.store(&chain, &blob))
    }

    /// Store the root directory with its first sector at `root_sector`.
    ///
    /// The sector is claimed up front so no child can take it, and extended
    /// once the blob size is known.
    pub fn insert_root(&mut self, root: &Directory, root_sector: u16) -> SimplexResult<InsertedFile> {
        self.table.claim(root_sector)?;
        let blob = self.directory_blob(root)?;
        let chain = self
            .table
            .extend_chain(root_sector, sectors_for(checked_len(&blob)?))?;

        debug!(
            "Root directory: {} entries, {} bytes over {} sectors",
            root.len(),
            blob.len(),
            chain.len()
        );
        Ok(self.store(&chain, &blob))
    }

    fn directory_blob(&mut self, dir: &Directory) -> SimplexResult<Vec<u8>> {
        let mut builder = DirectoryBuilder::new();
        for (name, child) in &dir.entries {
            let inserted = self.insert(child)?;
            trace!(
                "Inserted {:?} at sector {} ({} bytes)",
                name,
                inserted.starting_block,
                inserted.file_size
            );
            builder.push(name, child.kind(), child.permissions(), inserted)?;
        }
        builder.finish()
    }

    fn store(&mut self, chain: &[u16], data: &[u8]) -> InsertedFile {
        self.image.write_chain(chain, data);
        InsertedFile {
            starting_block: chain[0],
            file_size: data.len() as u32,
            checksum: fold(data),
        }
    }
}

fn checked_len(data: &[u8]) -> SimplexResult<usize> {
    if data.len() > MAX_FILE_SIZE {
        return Err(SimplexError::invalid(
            "file_size",
            format!("{} bytes does not fit the 24-bit size field", data.len()),
        ));
    }
    Ok(data.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::constants::{FAT_END, SECTOR_SIZE};
    use super::super::directory::parse_directory;
    use super::super::layout::Geometry;

    fn setup(num_sectors: u32) -> (Geometry, Image, AllocationTable) {
        let geometry = Geometry::new(num_sectors).unwrap();
        let image = Image::new(&geometry);
        let mut table = AllocationTable::new(&geometry);
        table.reserve_system_sectors(geometry.root_dir_start);
        (geometry, image, table)
    }

    #[test]
    fn test_file_spans_chain() {
        let (_, mut image, mut table) = setup(16);
        let content: Vec<u8> = (0..600u32).map(|i| i as u8).collect();
        let inserted = TreeWriter::new(&mut image, &mut table)
            .insert_file(&File::new(content.clone()))
            .unwrap();

        assert_eq!(inserted.starting_block, 4);
        assert_eq!(inserted.file_size, 600);
        assert_eq!(inserted.checksum, fold(&content));
        assert_eq!(table.chain(4).unwrap(), vec![4, 5, 6]);
        assert_eq!(&image.read_chain(&[4, 5, 6])[..600], &content[..]);
    }

    #[test]
    fn test_empty_file_owns_one_sector() {
        let (_, mut image, mut table) = setup(16);
        let inserted = TreeWriter::new(&mut image, &mut table)
            .insert_file(&File::new(Vec::new()))
            .unwrap();
        assert_eq!(inserted.file_size, 0);
        assert_eq!(table.entry(inserted.starting_block), Some(FAT_END));
    }

    #[test]
    fn test_root_is_pinned_after_children() {
        let (geometry, mut image, mut table) = setup(16);
        let root = Directory::new()
            .with("a.txt", File::new("hi"))
            .with("sub", Directory::new().with("b", File::new(vec![9u8; 300])));

        let inserted = TreeWriter::new(&mut image, &mut table)
            .insert_root(&root, geometry.root_dir_start)
            .unwrap();
        assert_eq!(inserted.starting_block, 4);

        let entries = parse_directory(image.sector(4)).unwrap();
        let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "sub"]);
        // a.txt first, then sub's child (two sectors), then sub itself
        assert_eq!(entries[0].1.starting_block, 5);
        assert_eq!(entries[1].1.starting_block, 8);
        assert_eq!(table.chain(6).unwrap(), vec![6, 7]);
    }

    #[test]
    fn test_large_root_extends_past_pinned_sector() {
        let (_, mut image, mut table) = setup(64);
        let mut root = Directory::new();
        for i in 0..20 {
            root.insert(format!("file{:02}", i), File::new(vec![i as u8]));
        }
        let inserted = TreeWriter::new(&mut image, &mut table).insert_root(&root, 4).unwrap();
        assert!(inserted.file_size as usize > SECTOR_SIZE);

        let chain = table.chain(4).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1], 25);
    }

    #[test]
    fn test_out_of_space_propagates() {
        let (_, mut image, mut table) = setup(5);
        let root = Directory::new().with("big", File::new(vec![1u8; 10]));
        let err = TreeWriter::new(&mut image, &mut table).insert_root(&root, 4).unwrap_err();
        assert!(matches!(err, SimplexError::OutOfSpace { requested: 1, available: 0 }));
    }
}
