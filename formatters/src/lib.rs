pub mod hex_image;
pub mod host;
pub mod simplexfs;

pub use simplexfs::{build_image, parse_image, plan_build, BuildPlan, Geometry, Header, Image, ParsedImage};
