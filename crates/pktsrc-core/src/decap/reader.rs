use super::error::DecapError;

/// Bounds-checked access to a captured frame.
///
/// Offsets are absolute within the frame; every read fails with
/// `DecapError::Truncated` instead of reaching past the captured bytes.
pub struct FrameReader<'a> {
    data: &'a [u8],
}

impl<'a> FrameReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn require_len(&self, needed: usize) -> Result<(), DecapError> {
        if self.data.len() < needed {
            return Err(DecapError::Truncated {
                needed,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, DecapError> {
        self.data.get(offset).copied().ok_or(DecapError::Truncated {
            needed: offset + 1,
            actual: self.data.len(),
        })
    }

    pub fn read_u16_be(&self, range: std::ops::Range<usize>) -> Result<u16, DecapError> {
        let bytes = self.read_array::<2>(range)?;
        Ok(u16::from_be_bytes(bytes))
    }

    pub fn read_u32_le(&self, range: std::ops::Range<usize>) -> Result<u32, DecapError> {
        let bytes = self.read_array::<4>(range)?;
        Ok(u32::from_le_bytes(bytes))
    }

    pub fn read_slice(&self, range: std::ops::Range<usize>) -> Result<&'a [u8], DecapError> {
        self.data.get(range.clone()).ok_or(DecapError::Truncated {
            needed: range.end,
            actual: self.data.len(),
        })
    }

    fn read_array<const N: usize>(
        &self,
        range: std::ops::Range<usize>,
    ) -> Result<[u8; N], DecapError> {
        let bytes = self.read_slice(range)?;
        bytes.try_into().map_err(|_| DecapError::Truncated {
            needed: N,
            actual: bytes.len(),
        })
    }
}

/// Shift a layout range by an absolute base offset.
pub fn at(base: usize, range: std::ops::Range<usize>) -> std::ops::Range<usize> {
    base + range.start..base + range.end
}
