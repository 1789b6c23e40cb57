// Paired XOR-fold checksum
// Even-offset bytes fold into `lo`, odd-offset bytes into `hi`.

/// Two-byte checksum as stored on disk (`lo` first).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct Checksum {
    pub lo: u8,
    pub hi: u8,
}

impl Checksum {
    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Self {
            lo: bytes[0],
            hi: bytes[1],
        }
    }

    pub fn to_bytes(self) -> [u8; 2] {
        [self.lo, self.hi]
    }

    pub fn is_zero(self) -> bool {
        self.lo == 0 && self.hi == 0
    }

    /// Continue folding more bytes. `data` must start at an even offset of
    /// the overall range for the result to match a single `fold`.
    pub fn update(mut self, data: &[u8]) -> Self {
        let mut pairs = data.chunks_exact(2);
        for pair in &mut pairs {
            self.lo ^= pair[0];
            self.hi ^= pair[1];
        }
        // Odd tail is padded with an implicit zero
        if let [last] = pairs.remainder() {
            self.lo ^= last;
        }
        self
    }
}

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02X}{:02X}", self.lo, self.hi)
    }
}

pub fn fold(data: &[u8]) -> Checksum {
    Checksum::default().update(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_pairs() {
        assert_eq!(fold(&[]), Checksum::default());
        assert_eq!(fold(b"hi"), Checksum { lo: b'h', hi: b'i' });
        assert_eq!(
            fold(&[0x01, 0x02, 0x10, 0x20]),
            Checksum { lo: 0x11, hi: 0x22 }
        );
    }

    #[test]
    fn test_odd_length_pads_with_zero() {
        assert_eq!(fold(&[0xAA, 0xBB, 0xCC]), fold(&[0xAA, 0xBB, 0xCC, 0x00]));
    }

    #[test]
    fn test_appended_checksum_cancels() {
        let mut data = b"some sector payload".to_vec();
        data.push(0); // even length so the checksum lands on a pair boundary
        let sum = fold(&data);
        data.extend_from_slice(&sum.to_bytes());
        assert!(fold(&data).is_zero());
    }
}
