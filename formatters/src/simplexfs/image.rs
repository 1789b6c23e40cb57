// In-memory image: a flat buffer viewed as 256-byte sectors

use super::constants::SECTOR_SIZE;
use super::layout::Geometry;
use log::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    data: Vec<u8>,
}

impl Image {
    /// A zeroed image sized for `geometry`.
    pub fn new(geometry: &Geometry) -> Self {
        Self {
            data: vec![0u8; geometry.image_bytes()],
        }
    }

    /// Wrap raw bytes as an image of exactly `geometry.image_bytes()`.
    ///
    /// Short buffers are zero-extended, since text encodings drop trailing
    /// zero bytes. Anything past the last sector is dropped.
    pub fn from_bytes(bytes: &[u8], geometry: &Geometry) -> Self {
        let size = geometry.image_bytes();
        let mut data = vec![0u8; size];
        let copied = bytes.len().min(size);
        data[..copied].copy_from_slice(&bytes[..copied]);

        if bytes.len() < size {
            debug!("Image is {} bytes short; treating the tail as zero", size - bytes.len());
        } else if bytes.len() > size {
            debug!("Ignoring {} bytes past the last sector", bytes.len() - size);
        }
        Self { data }
    }

    pub fn sector(&self, index: u16) -> &[u8] {
        let start = index as usize * SECTOR_SIZE;
        &self.data[start..start + SECTOR_SIZE]
    }

    pub fn sector_mut(&mut self, index: u16) -> &mut [u8] {
        let start = index as usize * SECTOR_SIZE;
        &mut self.data[start..start + SECTOR_SIZE]
    }

    /// Contiguous run of whole sectors starting at `first`.
    pub fn sectors(&self, first: usize, count: usize) -> &[u8] {
        &self.data[first * SECTOR_SIZE..(first + count) * SECTOR_SIZE]
    }

    pub fn write_sectors(&mut self, first: usize, bytes: &[u8]) {
        let start = first * SECTOR_SIZE;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
    }

    /// Spread `data` over the sectors of `chain`, zero-padding the last one.
    pub fn write_chain(&mut self, chain: &[u16], data: &[u8]) {
        let mut chunks = data.chunks(SECTOR_SIZE);
        for &index in chain {
            let sector = self.sector_mut(index);
            match chunks.next() {
                Some(chunk) => {
                    sector[..chunk.len()].copy_from_slice(chunk);
                    sector[chunk.len()..].fill(0);
                }
                None => sector.fill(0),
            }
        }
    }

    /// Concatenated bytes of every sector in `chain`.
    pub fn read_chain(&self, chain: &[u16]) -> Vec<u8> {
        let mut out = Vec::with_capacity(chain.len() * SECTOR_SIZE);
        for &index in chain {
            out.extend_from_slice(self.sector(index));
        }
        out
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_write_pads_last_sector() {
        let geometry = Geometry::new(8).unwrap();
        let mut image = Image::new(&geometry);
        image.sector_mut(6).fill(0xEE);

        let data = vec![0x11u8; SECTOR_SIZE + 3];
        image.write_chain(&[5, 6], &data);

        assert!(image.sector(5).iter().all(|&b| b == 0x11));
        assert_eq!(&image.sector(6)[..3], &[0x11, 0x11, 0x11]);
        assert!(image.sector(6)[3..].iter().all(|&b| b == 0));
        assert_eq!(&image.read_chain(&[5, 6])[..data.len()], &data[..]);
    }

    #[test]
    fn test_from_bytes_normalizes_length() {
        let geometry = Geometry::new(5).unwrap();
        let short = Image::from_bytes(&[1, 2, 3], &geometry);
        assert_eq!(short.as_bytes().len(), 5 * SECTOR_SIZE);
        assert_eq!(&short.as_bytes()[..4], &[1, 2, 3, 0]);

        let long = Image::from_bytes(&vec![7u8; 6 * SECTOR_SIZE], &geometry);
        assert_eq!(long.as_bytes().len(), 5 * SECTOR_SIZE);
    }
}
