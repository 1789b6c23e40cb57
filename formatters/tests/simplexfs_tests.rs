// End-to-end tests for building and reading SimplexFS images

use simplexfs_core::{BuildOptions, Directory, File, Node, NullSink, SimplexError, Warning};
use simplexfs_formatters::simplexfs::fold;
use simplexfs_formatters::{build_image, hex_image, host, parse_image, plan_build};
use std::fs;
use std::sync::Once;

static INIT: Once = Once::new();

fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .try_init();
    });
}

fn sample_tree() -> Directory {
    Directory::new()
        .with("readme.txt", File::new("SimplexFS sample volume\n"))
        .with(
            "bin",
            Directory::new()
                .with("boot.img", File::new(vec![0xAAu8; 700]).with_permissions(0o755))
                .with("empty.dat", File::new(Vec::<u8>::new())),
        )
        .with("games", Directory::new().with_permissions(0o700))
}

#[test]
fn test_host_directory_round_trip() {
    init_logging();
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();

    fs::write(source.path().join("a.txt"), b"alpha").unwrap();
    fs::create_dir(source.path().join("nested")).unwrap();
    fs::write(source.path().join("nested").join("b.bin"), vec![7u8; 1000]).unwrap();

    let tree = host::load_directory(source.path(), &mut NullSink).unwrap();
    let options = BuildOptions::new(64).with_volume_name("HOSTDISK");
    let image = build_image(&options, Some(&tree), &mut NullSink).unwrap();

    let parsed = parse_image(image.as_bytes()).unwrap();
    assert_eq!(parsed.header.volume_label(), "HOSTDISK");
    host::write_directory(&parsed.root, target.path()).unwrap();

    assert_eq!(fs::read(target.path().join("a.txt")).unwrap(), b"alpha");
    assert_eq!(
        fs::read(target.path().join("nested").join("b.bin")).unwrap(),
        vec![7u8; 1000]
    );
}

#[test]
fn test_tree_and_permissions_survive() {
    let tree = sample_tree();
    let image = build_image(&BuildOptions::new(40), Some(&tree), &mut NullSink).unwrap();
    let parsed = parse_image(image.as_bytes()).unwrap();

    assert_eq!(parsed.root.entries, tree.entries);
    match parsed.root.lookup("bin/boot.img") {
        Some(Node::File(file)) => assert_eq!(file.permissions, 0o755),
        other => panic!("unexpected node {:?}", other),
    }
    match parsed.root.lookup("games") {
        Some(Node::Directory(dir)) => {
            assert!(dir.is_empty());
            assert_eq!(dir.permissions, 0o700);
        }
        other => panic!("unexpected node {:?}", other),
    }
}

#[test]
fn test_hex_image_round_trip() {
    let image = build_image(
        &BuildOptions::new(32).with_volume_name("HEX"),
        Some(&sample_tree()),
        &mut NullSink,
    )
    .unwrap();

    let text = hex_image::encode(image.as_bytes());
    assert!(hex_image::is_hex_image(text.as_bytes()));

    // Trailing zero sectors are dropped by the encoder and restored on parse
    let decoded = hex_image::decode(&text).unwrap();
    assert!(decoded.len() <= image.as_bytes().len());
    assert_eq!(decoded[..], image.as_bytes()[..decoded.len()]);

    let parsed = parse_image(&decoded).unwrap();
    assert_eq!(parsed.root.entries, sample_tree().entries);
}

#[test]
fn test_image_size_and_checksums() {
    for &num_sectors in &[5u32, 17, 128, 129, 1000] {
        let image = build_image(&BuildOptions::new(num_sectors), None, &mut NullSink).unwrap();
        let bytes = image.as_bytes();
        assert_eq!(bytes.len(), num_sectors as usize * 256);

        // The header folds to zero over itself once the checksum is in place
        assert!(fold(&bytes[..256]).is_zero(), "header of {} sectors", num_sectors);
        // Mirror matches the primary copy
        assert_eq!(bytes[..256], bytes[256..512]);
    }
}

#[test]
fn test_full_volume_boundary() {
    // 8 sectors: header, mirror, FAT, FAT mirror, root; three left for data
    let options = BuildOptions::new(8);
    let fits = Directory::new()
        .with("one", File::new(vec![1u8; 256]))
        .with("two", File::new(vec![2u8; 512]));
    let plan = plan_build(&options, Some(&fits), &mut NullSink).unwrap();
    assert!(plan.fits());
    let image = build_image(&options, Some(&fits), &mut NullSink).unwrap();
    assert_eq!(parse_image(image.as_bytes()).unwrap().free_sectors, 0);

    let too_big = fits.clone().with("three", File::new("x"));
    assert!(!plan_build(&options, Some(&too_big), &mut NullSink).unwrap().fits());
    let err = build_image(&options, Some(&too_big), &mut NullSink).unwrap_err();
    assert!(matches!(err, SimplexError::OutOfSpace { .. }));
}

#[test]
fn test_warnings_collected() {
    let mut warnings: Vec<Warning> = Vec::new();
    build_image(
        &BuildOptions::new(6).with_volume_name("caf\u{e9}"),
        None,
        &mut warnings,
    )
    .unwrap();

    assert!(warnings.iter().any(|w| matches!(w, Warning::SmallVolume { num_sectors: 6 })));
    assert!(warnings.iter().any(|w| matches!(w, Warning::VolumeNameNonAscii { .. })));
}

#[test]
fn test_corrupted_file_is_rejected() {
    init_logging();
    let tree = Directory::new().with("data.bin", File::new(vec![0x11u8; 300]));
    let image = build_image(&BuildOptions::new(16), Some(&tree), &mut NullSink).unwrap();
    let mut bytes = image.into_bytes();

    // Root directory sits in sector 4, the file right after it
    bytes[5 * 256 + 10] ^= 0xFF;
    let err = parse_image(&bytes).unwrap_err();
    assert!(err.is_corrupt(), "got {:?}", err);
}

#[test]
fn test_unknown_major_version() {
    let image = build_image(&BuildOptions::new(16), None, &mut NullSink).unwrap();
    let mut bytes = image.into_bytes();

    for sector in 0..2 {
        let base = sector * 256;
        bytes[base + 13] = 2;
        // Keep the header self-consistent so only the version is wrong
        bytes[base + 254] = 0;
        bytes[base + 255] = 0;
        let checksum = fold(&bytes[base..base + 256]);
        bytes[base + 254..base + 256].copy_from_slice(&checksum.to_bytes());
    }

    let err = parse_image(&bytes).unwrap_err();
    assert!(matches!(err, SimplexError::UnsupportedVersion { major: 2, .. }));
}
