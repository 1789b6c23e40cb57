// Hex-text image codec
// The circuit simulator loads memory contents from a "v2.0 raw" text file:
// one header line, then whitespace-separated hex bytes. It also accepts run
// lengths written as `N*XX`.

use crate::simplexfs::constants::{MAX_SECTORS, SECTOR_SIZE};
use log::debug;
use simplexfs_core::{SimplexError, SimplexResult};

pub const HEX_HEADER: &str = "v2.0 raw";

/// Largest decoded size: a full 65535-sector image.
const MAX_DECODED_LEN: usize = MAX_SECTORS as usize * SECTOR_SIZE;

/// Encode raw bytes, dropping trailing zero bytes.
pub fn encode(bytes: &[u8]) -> String {
    let len = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let digits = hex::encode_upper(&bytes[..len]);

    let mut out = String::with_capacity(HEX_HEADER.len() + 1 + len * 3);
    out.push_str(HEX_HEADER);
    out.push('\n');
    for (i, pair) in digits.as_bytes().chunks(2).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        // hex output is always ASCII
        out.push(pair[0] as char);
        out.push(pair[1] as char);
    }

    debug!("Encoded {} bytes as hex ({} trailing zero bytes dropped)", len, bytes.len() - len);
    out
}

pub fn is_hex_image(data: &[u8]) -> bool {
    data.starts_with(HEX_HEADER.as_bytes())
}

/// Decode hex text back into bytes. Trailing zeros dropped by `encode` are
/// not restored; the image parser zero-extends short buffers.
pub fn decode(text: &str) -> SimplexResult<Vec<u8>> {
    let mut lines = text.lines();
    match lines.next() {
        Some(first) if first.trim() == HEX_HEADER => {}
        Some(first) => {
            return Err(SimplexError::HexFormat(format!(
                "expected \"{}\" header, found {:?}",
                HEX_HEADER, first
            )))
        }
        None => return Err(SimplexError::HexFormat("empty input".to_string())),
    }

    let mut out = Vec::new();
    for (line_no, line) in lines.enumerate() {
        let line = line.split('#').next().unwrap_or("");
        for token in line.split_whitespace() {
            let (count, value) = match token.split_once('*') {
                Some((count, value)) => {
                    let count: usize = count.parse().map_err(|_| bad_token(token, line_no))?;
                    (count, value)
                }
                None => (1, token),
            };
            if value.is_empty() || value.len() > 2 {
                return Err(bad_token(token, line_no));
            }
            let byte = u8::from_str_radix(value, 16).map_err(|_| bad_token(token, line_no))?;
            match out.len().checked_add(count) {
                Some(total) if total <= MAX_DECODED_LEN => {}
                _ => {
                    return Err(SimplexError::HexFormat(format!(
                        "run {:?} on line {} exceeds the {} byte image limit",
                        token,
                        line_no + 2,
                        MAX_DECODED_LEN
                    )))
                }
            }
            out.extend(std::iter::repeat(byte).take(count));
        }
    }
    Ok(out)
}

fn bad_token(token: &str, line_no: usize) -> SimplexError {
    SimplexError::HexFormat(format!("invalid token {:?} on line {}", token, line_no + 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_trims_trailing_zeros() {
        assert_eq!(encode(&[0xFE, 0x0A, 0x00, 0x01, 0x00, 0x00]), "v2.0 raw\nFE 0A 00 01");
        assert_eq!(encode(&[0, 0, 0]), "v2.0 raw\n");
        assert_eq!(encode(&[]), "v2.0 raw\n");
    }

    #[test]
    fn test_decode_forms() {
        assert_eq!(decode("v2.0 raw\nFE 0a 0 1").unwrap(), vec![0xFE, 0x0A, 0x00, 0x01]);
        assert_eq!(decode("v2.0 raw\n3*ff 1\n2*0").unwrap(), vec![0xFF, 0xFF, 0xFF, 0x01, 0, 0]);
        assert_eq!(decode("v2.0 raw\n# comment\n7f # trailing\n").unwrap(), vec![0x7F]);
        assert!(decode("v2.0 raw\n").unwrap().is_empty());
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(decode(""), Err(SimplexError::HexFormat(_))));
        assert!(matches!(decode("raw\n00"), Err(SimplexError::HexFormat(_))));
        assert!(matches!(decode("v2.0 raw\n1FF"), Err(SimplexError::HexFormat(_))));
        assert!(matches!(decode("v2.0 raw\nzz"), Err(SimplexError::HexFormat(_))));
        assert!(matches!(decode("v2.0 raw\nx*01"), Err(SimplexError::HexFormat(_))));
    }

    #[test]
    fn test_decode_rejects_oversized_runs() {
        let huge = format!("v2.0 raw\n{}*00", usize::MAX);
        assert!(matches!(decode(&huge), Err(SimplexError::HexFormat(_))));

        // One byte past a full image, split over two runs
        let over = format!("v2.0 raw\n{}*00 1*01", MAX_DECODED_LEN);
        assert!(matches!(decode(&over), Err(SimplexError::HexFormat(_))));

        let full = format!("v2.0 raw\n{}*00", MAX_DECODED_LEN);
        assert_eq!(decode(&full).unwrap().len(), MAX_DECODED_LEN);
    }

    #[test]
    fn test_round_trip_restores_prefix() {
        let data = vec![0x10, 0x00, 0x20, 0xFF, 0x00];
        let decoded = decode(&encode(&data)).unwrap();
        assert_eq!(decoded, &data[..4]);
        assert!(is_hex_image(encode(&data).as_bytes()));
    }
}
