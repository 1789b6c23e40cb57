// SimplexFS layout engine
// Flat 256-byte-sector images with one allocation table and recursive
// directories.

pub mod builder;
pub mod checksum;
pub mod constants;
pub mod directory;
pub mod fat;
pub mod header;
pub mod image;
pub mod layout;
pub mod reader;
pub mod writer;

pub use builder::{build_image, parse_image, plan_build, BuildPlan, ParsedImage};
pub use checksum::{fold, Checksum};
pub use directory::InsertedFile;
pub use fat::AllocationTable;
pub use header::Header;
pub use image::Image;
pub use layout::{compute_layout, Geometry};
