pub mod error;
pub mod options;
pub mod tree;
pub mod warning;

pub use error::{SimplexError, SimplexResult};
pub use options::BuildOptions;
pub use tree::{Directory, File, Node, NodeKind, DEFAULT_PERMISSIONS, PERMISSION_MASK};
pub use warning::{LogSink, NullSink, Warning, WarningSink};
