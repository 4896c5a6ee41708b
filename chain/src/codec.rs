//! Little-endian byte reader for canonical consensus encodings.
//!
//! The canonical block and transaction layouts are hand-rolled — they are
//! consensus-critical and version-dependent, so no serde derive touches them.

use crate::error::ValidationError;

pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], ValidationError> {
        if self.remaining() < n {
            return Err(ValidationError::not_valid(format!(
                "truncated encoding: wanted {} bytes, {} left",
                n,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn u8(&mut self) -> Result<u8, ValidationError> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, ValidationError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn u32(&mut self) -> Result<u32, ValidationError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn u64(&mut self) -> Result<u64, ValidationError> {
        let bytes: [u8; 8] = self.take(8)?.try_into().expect("slice length checked");
        Ok(u64::from_le_bytes(bytes))
    }

    pub fn array_32(&mut self) -> Result<[u8; 32], ValidationError> {
        Ok(self.take(32)?.try_into().expect("slice length checked"))
    }

    pub fn array_64(&mut self) -> Result<[u8; 64], ValidationError> {
        Ok(self.take(64)?.try_into().expect("slice length checked"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian() {
        let data = [0x01, 0x00, 0x02, 0x01, 0x00, 0x00, 0x00];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.u16().unwrap(), 1);
        assert_eq!(reader.u32().unwrap(), 0x0102);
        assert_eq!(reader.u8().unwrap(), 0);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn truncation_is_not_valid() {
        let mut reader = ByteReader::new(&[0x01]);
        let err = reader.u32().unwrap_err();
        assert!(err.is_permanent());
    }
}
