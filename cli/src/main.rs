use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use simplexfs_core::{BuildOptions, LogSink, Node};
use simplexfs_formatters::{build_image, hex_image, host, parse_image, plan_build};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "simplexfs")]
#[command(about = "Create and unpack SimplexFS disk images", long_about = None)]
struct Cli {
    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Make a new SimplexFS image
    Mksx {
        /// Size of the filesystem: `123` is 123 sectors of 256 bytes (max
        /// 65535), `64KB` is 64 kilobytes (max 16383KB)
        #[arg(long)]
        size: String,
        /// Volume name, at most 24 ASCII bytes
        #[arg(long = "vn")]
        volume_name: Option<String>,
        /// Directory to include as the root (optional)
        #[arg(long = "in")]
        input: Option<PathBuf>,
        /// Image file to write
        #[arg(long = "out")]
        output: PathBuf,
        /// Media type byte
        #[arg(long, default_value_t = 0, value_parser = parse_u8)]
        media_type: u8,
        /// Volume identifier
        #[arg(long, default_value_t = 0, value_parser = parse_u32)]
        identifier: u32,
        /// Write the simulator's hex-text format instead of a raw image
        #[arg(long)]
        hex: bool,
        /// Report what the image would need without writing it
        #[arg(long)]
        dry_run: bool,
    },
    /// Read a SimplexFS image (raw or hex-text) into a directory
    Unsx {
        #[arg(long = "in")]
        input: PathBuf,
        #[arg(long = "out")]
        output: PathBuf,
    },
    /// Show an image's header and file tree
    Info {
        #[arg(long = "in")]
        input: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Convert a raw image to hex-text
    Enbin {
        #[arg(long = "in")]
        input: PathBuf,
        #[arg(long = "out")]
        output: PathBuf,
    },
    /// Convert hex-text back to a raw image
    Unbin {
        #[arg(long = "in")]
        input: PathBuf,
        #[arg(long = "out")]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet { LevelFilter::Error } else { LevelFilter::Info };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match cli.command {
        Commands::Mksx {
            size,
            volume_name,
            input,
            output,
            media_type,
            identifier,
            hex,
            dry_run,
        } => {
            let options = BuildOptions {
                volume_name,
                num_sectors: parse_size(&size)?,
                media_type,
                identifier,
            };

            let mut sink = LogSink;
            let tree = match &input {
                Some(dir) => Some(
                    host::load_directory(dir, &mut sink)
                        .with_context(|| format!("Failed to read {}", dir.display()))?,
                ),
                None => None,
            };

            if dry_run {
                let plan = plan_build(&options, tree.as_ref(), &mut sink)?;
                println!("Simulation Report:");
                println!("  Sectors: {}", plan.geometry.num_sectors);
                println!("  Allocation table sectors: {}", plan.geometry.fat_sector_count);
                println!("  Root directory sector: {}", plan.geometry.root_dir_start);
                println!("  Sectors required: {}", plan.required_sectors);
                println!("  Sectors available: {}", plan.free_sectors);
                if !plan.fits() {
                    println!("  WARNING: the included tree does not fit");
                }
                return Ok(());
            }

            let image = build_image(&options, tree.as_ref(), &mut sink)?;
            write_image(&output, image.as_bytes(), hex)?;
            println!(
                "Wrote {} ({} sectors) to {}",
                if hex { "hex image" } else { "image" },
                options.num_sectors,
                output.display()
            );
        }
        Commands::Unsx { input, output } => {
            let bytes = read_image(&input)?;
            let parsed = parse_image(&bytes)?;
            host::write_directory(&parsed.root, &output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!(
                "Extracted {} entries from \"{}\" into {}",
                parsed.root.node_count(),
                parsed.header.volume_label(),
                output.display()
            );
        }
        Commands::Info { input, json } => {
            let bytes = read_image(&input)?;
            let parsed = parse_image(&bytes)?;
            let header = &parsed.header;

            if json {
                let report = serde_json::json!({
                    "volume_name": header.volume_label(),
                    "version": format!("{}.{}", header.version_major, header.version_minor),
                    "media_type": header.media_type,
                    "identifier": header.identifier,
                    "geometry": parsed.geometry,
                    "free_sectors": parsed.free_sectors,
                    "used_header_mirror": parsed.used_header_mirror,
                    "used_fat_mirror": parsed.used_fat_mirror,
                    "root": parsed.root,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }

            println!("Volume: {}", header.volume_label());
            println!("  Version: {}.{}", header.version_major, header.version_minor);
            println!("  Media type: {:#04x}", header.media_type);
            println!("  Identifier: {:#010x}", header.identifier);
            println!("  Sectors: {}", parsed.geometry.num_sectors);
            println!("  Allocation table sectors: {}", parsed.geometry.fat_sector_count);
            println!("  Root directory sector: {}", parsed.geometry.root_dir_start);
            println!("  Free sectors: {}", parsed.free_sectors);
            if parsed.used_header_mirror || parsed.used_fat_mirror {
                println!("  Recovered from mirror copies");
            }
            println!();
            print_tree(&parsed.root.entries, 1);
        }
        Commands::Enbin { input, output } => {
            let raw = fs::read(&input).with_context(|| format!("Failed to read {}", input.display()))?;
            fs::write(&output, hex_image::encode(&raw))
                .with_context(|| format!("Failed to write {}", output.display()))?;
        }
        Commands::Unbin { input, output } => {
            let text = fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            fs::write(&output, hex_image::decode(&text)?)
                .with_context(|| format!("Failed to write {}", output.display()))?;
        }
    }

    Ok(())
}

/// `123` sectors, or `NKB` kilobytes at four sectors per kilobyte.
fn parse_size(size: &str) -> anyhow::Result<u32> {
    let lower = size.trim().to_lowercase();
    let parsed = match lower.strip_suffix("kb") {
        Some(kb) => kb.parse::<u32>().ok().and_then(|n| n.checked_mul(4)),
        None => lower.parse::<u32>().ok(),
    };
    match parsed {
        Some(sectors) => Ok(sectors),
        None => bail!(
            "Number format was not right, did you mean:\n  --size 123KB\n  --size 123"
        ),
    }
}

fn parse_u8(s: &str) -> Result<u8, String> {
    parse_number(s).and_then(|n| u8::try_from(n).map_err(|e| e.to_string()))
}

fn parse_u32(s: &str) -> Result<u32, String> {
    parse_number(s).and_then(|n| u32::try_from(n).map_err(|e| e.to_string()))
}

/// Decimal, or hex with a `0x` prefix.
fn parse_number(s: &str) -> Result<u64, String> {
    let result = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(digits) => u64::from_str_radix(digits, 16),
        None => s.parse::<u64>(),
    };
    result.map_err(|e| format!("{}: {}", s, e))
}

/// Raw bytes of an image file, decoding hex-text if that's what it is.
fn read_image(path: &Path) -> anyhow::Result<Vec<u8>> {
    let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if hex_image::is_hex_image(&data) {
        let text = String::from_utf8(data).context("Hex image is not valid text")?;
        return Ok(hex_image::decode(&text)?);
    }
    Ok(data)
}

fn write_image(path: &Path, bytes: &[u8], hex: bool) -> anyhow::Result<()> {
    let result = if hex {
        fs::write(path, hex_image::encode(bytes))
    } else {
        fs::write(path, bytes)
    };
    result.with_context(|| format!("Failed to write {}", path.display()))
}

fn print_tree(entries: &std::collections::BTreeMap<String, Node>, depth: usize) {
    let indent = "  ".repeat(depth);
    for (name, node) in entries {
        match node {
            Node::File(file) => {
                println!("{}{} ({} bytes, {:04o})", indent, name, file.content.len(), file.permissions)
            }
            Node::Directory(dir) => {
                println!("{}{}/ ({:04o})", indent, name, dir.permissions);
                print_tree(&dir.entries, depth + 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("123").unwrap(), 123);
        assert_eq!(parse_size("64KB").unwrap(), 256);
        assert_eq!(parse_size("16kb").unwrap(), 64);
        assert!(parse_size("12MB").is_err());
        assert!(parse_size("").is_err());
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_u8("0x42").unwrap(), 0x42);
        assert_eq!(parse_u32("4096").unwrap(), 4096);
        assert!(parse_u8("256").is_err());
    }
}
