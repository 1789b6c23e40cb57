// SimplexFS build and parse entry points
// Both work on in-memory buffers only; reading host files and flushing the
// image are the caller's job.

use super::checksum::fold;
use super::constants::*;
use super::directory::{check_directory, directory_blob_len};
use super::fat::AllocationTable;
use super::header::{encode_volume_name, Header};
use super::image::Image;
use super::layout::{compute_layout, sectors_for, Geometry};
use super::reader::TreeReader;
use super::writer::TreeWriter;
use log::{info, warn};
use serde::Serialize;
use simplexfs_core::{BuildOptions, Directory, Node, SimplexError, SimplexResult, WarningSink};

/// Build a complete image. On any error nothing is returned, so a partly
/// written buffer never escapes.
pub fn build_image(
    options: &BuildOptions,
    include: Option<&Directory>,
    sink: &mut dyn WarningSink,
) -> SimplexResult<Image> {
    let geometry = compute_layout(options.num_sectors, sink)?;
    let volume_name = encode_volume_name(options.volume_name.as_deref(), sink)?;

    let mut image = Image::new(&geometry);
    let mut table = AllocationTable::new(&geometry);
    table.reserve_system_sectors(geometry.root_dir_start);

    let empty = Directory::new();
    let root = include.unwrap_or(&empty);
    TreeWriter::new(&mut image, &mut table).insert_root(root, geometry.root_dir_start)?;

    let fat_bytes = table.to_bytes();
    image.write_sectors(geometry.fat_start(), &fat_bytes);
    image.write_sectors(geometry.fat_mirror_start(), &fat_bytes);

    let header = Header::build(&geometry, options, volume_name, fold(&fat_bytes));
    image.write_sectors(geometry.header_sector(), &header);
    image.write_sectors(geometry.header_mirror_sector(), &header);

    info!(
        "Built SimplexFS image: {} sectors, {} entries, {} sectors free",
        geometry.num_sectors,
        root.node_count(),
        table.free_count()
    );
    Ok(image)
}

#[derive(Debug, Clone)]
pub struct ParsedImage {
    pub header: Header,
    pub geometry: Geometry,
    pub root: Directory,
    pub free_sectors: usize,
    /// The primary header was damaged and sector 1 was used instead.
    pub used_header_mirror: bool,
    /// The primary allocation table was damaged and its mirror was used.
    pub used_fat_mirror: bool,
}

/// Validate an image and reconstruct its tree.
pub fn parse_image(bytes: &[u8]) -> SimplexResult<ParsedImage> {
    let (header, used_header_mirror) = read_header(bytes)?;
    let geometry = header.geometry()?;
    let image = Image::from_bytes(bytes, &geometry);
    let (table, used_fat_mirror) = read_table(&image, &header, &geometry)?;

    let root = TreeReader::new(&image, &table).extract_directory(geometry.root_dir_start)?;

    info!(
        "Parsed SimplexFS image \"{}\": {} sectors, {} entries",
        header.volume_label(),
        geometry.num_sectors,
        root.node_count()
    );
    Ok(ParsedImage {
        header,
        geometry,
        root,
        free_sectors: table.free_count(),
        used_header_mirror,
        used_fat_mirror,
    })
}

fn read_header(bytes: &[u8]) -> SimplexResult<(Header, bool)> {
    let primary = match Header::parse(bytes) {
        Ok(header) => return Ok((header, false)),
        Err(err) if err.is_corrupt() => err,
        Err(err) => return Err(err),
    };

    let mirror = bytes.get(SECTOR_SIZE..2 * SECTOR_SIZE).map(Header::parse);
    match mirror {
        Some(Ok(header)) => {
            warn!("Primary header is damaged ({}); using the mirror in sector 1", primary);
            Ok((header, true))
        }
        _ => Err(primary),
    }
}

fn read_table(
    image: &Image,
    header: &Header,
    geometry: &Geometry,
) -> SimplexResult<(AllocationTable, bool)> {
    let count = geometry.fat_sector_count as usize;
    let primary = AllocationTable::from_bytes(image.sectors(geometry.fat_start(), count), geometry)?;
    let primary_err = match header.verify_fat_checksum(&primary) {
        Ok(()) => return Ok((primary, false)),
        Err(err) => err,
    };

    let mirror = AllocationTable::from_bytes(image.sectors(geometry.fat_mirror_start(), count), geometry)?;
    if header.verify_fat_checksum(&mirror).is_ok() {
        warn!("Primary allocation table is damaged ({}); using the mirror", primary_err);
        return Ok((mirror, true));
    }
    Err(primary_err)
}

/// What a build would need, without building anything.
#[derive(Debug, Clone, Serialize)]
pub struct BuildPlan {
    pub geometry: Geometry,
    /// Chain sectors for every file and directory, root included.
    pub required_sectors: usize,
    pub free_sectors: usize,
}

impl BuildPlan {
    pub fn fits(&self) -> bool {
        self.required_sectors <= self.free_sectors
    }
}

pub fn plan_build(
    options: &BuildOptions,
    include: Option<&Directory>,
    sink: &mut dyn WarningSink,
) -> SimplexResult<BuildPlan> {
    let geometry = compute_layout(options.num_sectors, sink)?;
    encode_volume_name(options.volume_name.as_deref(), sink)?;

    let required_sectors = match include {
        Some(root) => directory_sectors(root)?,
        None => 1,
    };
    Ok(BuildPlan {
        geometry,
        required_sectors,
        free_sectors: geometry.data_sectors(),
    })
}

fn directory_sectors(dir: &Directory) -> SimplexResult<usize> {
    check_directory(dir.entries.keys().map(String::as_str))?;
    let mut total = sectors_for(directory_blob_len(dir.entries.keys().map(String::as_str)));
    for node in dir.entries.values() {
        total += match node {
            Node::File(file) => {
                if file.content.len() > MAX_FILE_SIZE {
                    return Err(SimplexError::invalid(
                        "file_size",
                        format!("{} bytes does not fit the 24-bit size field", file.content.len()),
                    ));
                }
                sectors_for(file.content.len())
            }
            Node::Directory(sub) => directory_sectors(sub)?,
        };
    }
    Ok(total)
}
