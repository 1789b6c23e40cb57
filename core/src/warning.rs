// Non-fatal build diagnostics
// A build reports these through a sink it is handed, so two builds running
// side by side never share warning state.

use log::warn;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Fewer than 16 sectors leaves almost no room after the reserved region.
    SmallVolume { num_sectors: u16 },
    VolumeNameNull { name: String },
    VolumeNameControl { name: String },
    VolumeNameNonAscii { name: String },
    /// A host entry that is neither a regular file nor a directory.
    SkippedHostEntry { path: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::SmallVolume { num_sectors } => write!(
                f,
                "Less than 16 sectors is highly discouraged (got {})",
                num_sectors
            ),
            Warning::VolumeNameNull { name } => {
                write!(f, "Got null character in volume name \"{}\"", escape_name(name))
            }
            Warning::VolumeNameControl { name } => write!(
                f,
                "Got ascii control character in volume name \"{}\"",
                escape_name(name)
            ),
            Warning::VolumeNameNonAscii { name } => write!(
                f,
                "Got non-ascii character in volume name \"{}\"",
                escape_name(name)
            ),
            Warning::SkippedHostEntry { path } => {
                write!(f, "Skipping {}: not a regular file or directory", path)
            }
        }
    }
}

/// Render a name so invisible characters show up in a terminal.
pub fn escape_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c == '\0' {
            out.push_str("\\0");
        } else if (c as u32) < 0x20 {
            out.push_str(&format!("\\x{:02x}", c as u32));
        } else if c.is_whitespace() && c != ' ' {
            if (c as u32) > 0xff {
                out.push_str(&format!("\\u{:04x}", c as u32));
            } else {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
        } else {
            out.push(c);
        }
    }
    out
}

pub trait WarningSink {
    fn warn(&mut self, warning: Warning);
}

/// Forwards every warning to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl WarningSink for LogSink {
    fn warn(&mut self, warning: Warning) {
        warn!("[SimplexFS] {}", warning);
    }
}

/// Drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl WarningSink for NullSink {
    fn warn(&mut self, _warning: Warning) {}
}

impl WarningSink for Vec<Warning> {
    fn warn(&mut self, warning: Warning) {
        self.push(warning);
    }
}
