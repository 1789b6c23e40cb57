// Host directory I/O
// Turns a directory on the host filesystem into the in-memory tree and back.

use log::{debug, info};
use simplexfs_core::tree::validate_name;
use simplexfs_core::{Directory, File, Node, SimplexError, SimplexResult, Warning, WarningSink};
use std::fs;
use std::path::Path;

/// Read `path` recursively. Symlinks are followed; anything that is neither
/// a regular file nor a directory is skipped with a warning.
pub fn load_directory(path: &Path, sink: &mut dyn WarningSink) -> SimplexResult<Directory> {
    let metadata = fs::metadata(path)?;
    if !metadata.is_dir() {
        return Err(SimplexError::invalid(
            "include",
            format!("{} is not a directory", path.display()),
        ));
    }

    let dir = load_entries(path, sink)?;
    info!(
        "Loaded {} entries ({} bytes) from {}",
        dir.node_count(),
        dir.content_bytes(),
        path.display()
    );
    Ok(dir)
}

fn load_entries(path: &Path, sink: &mut dyn WarningSink) -> SimplexResult<Directory> {
    let mut dir = Directory::new();

    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let entry_path = entry.path();
        let name = entry.file_name().into_string().map_err(|raw| {
            SimplexError::invalid("name", format!("{:?} is not valid UTF-8", raw))
        })?;
        validate_name(&name)?;

        let metadata = fs::metadata(&entry_path)?;
        let node = if metadata.is_dir() {
            Node::Directory(load_entries(&entry_path, sink)?)
        } else if metadata.is_file() {
            debug!("Reading {} ({} bytes)", entry_path.display(), metadata.len());
            Node::File(File::new(fs::read(&entry_path)?))
        } else {
            sink.warn(Warning::SkippedHostEntry {
                path: entry_path.display().to_string(),
            });
            continue;
        };
        dir.insert(name, node);
    }

    Ok(dir)
}

/// Write `dir` out under `path`, creating it if needed. Existing files with
/// the same names are overwritten.
pub fn write_directory(dir: &Directory, path: &Path) -> SimplexResult<()> {
    fs::create_dir_all(path)?;

    for (name, node) in &dir.entries {
        // Names come from a parsed image; never let one escape `path`.
        validate_name(name)?;
        let target = path.join(name);
        match node {
            Node::File(file) => {
                debug!("Writing {} ({} bytes)", target.display(), file.content.len());
                fs::write(&target, &file.content)?;
            }
            Node::Directory(sub) => write_directory(sub, &target)?,
        }
    }
    Ok(())
}
