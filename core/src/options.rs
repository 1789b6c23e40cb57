use serde::{Deserialize, Serialize};

/// Parameters for building a new image.
///
/// The output target and the included host tree belong to the caller; the
/// builder only ever produces an in-memory buffer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildOptions {
    pub volume_name: Option<String>,
    /// Total sectors, including the system-reserved region. Kept wider than
    /// the on-disk `u16` so out-of-range requests can be rejected.
    pub num_sectors: u32,
    pub media_type: u8,
    pub identifier: u32,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            volume_name: None,
            num_sectors: 16,
            media_type: 0x00,
            identifier: 0,
        }
    }
}

impl BuildOptions {
    pub fn new(num_sectors: u32) -> Self {
        Self {
            num_sectors,
            ..Self::default()
        }
    }

    pub fn with_volume_name(mut self, name: impl Into<String>) -> Self {
        self.volume_name = Some(name.into());
        self
    }

    pub fn with_media_type(mut self, media_type: u8) -> Self {
        self.media_type = media_type;
        self
    }

    pub fn with_identifier(mut self, identifier: u32) -> Self {
        self.identifier = identifier;
        self
    }
}
