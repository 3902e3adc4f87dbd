pub type Offset = u64;

/// JPEG start-of-image marker followed by the JFIF APP0 marker.
pub const JPEG_START: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

/// JPEG end-of-image marker.
pub const JPEG_END: [u8; 2] = [0xFF, 0xD9];

/// An immutable byte pattern marking the start or end of an embedded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    bytes: Vec<u8>,
}

impl Signature {
    /// Panics if `bytes` is empty: an empty pattern matches at every offset
    /// and cannot delimit anything.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        assert!(!bytes.is_empty(), "signature must not be empty");
        Self { bytes }
    }

    pub fn jpeg_start() -> Self {
        Self::new(JPEG_START)
    }

    pub fn jpeg_end() -> Self {
        Self::new(JPEG_END)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A contiguous byte range recovered as one candidate object.
///
/// When produced by a successful signature match, `data` begins with the
/// start signature. An extent is immutable once built and is handed to the
/// sink exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extent {
    start_offset: Offset,
    data: Vec<u8>,
}

impl Extent {
    pub fn new(start_offset: Offset, data: Vec<u8>) -> Self {
        Self { start_offset, data }
    }

    #[inline]
    pub fn start_offset(&self) -> Offset {
        self.start_offset
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Offset of the first byte past this extent in the source.
    #[inline]
    pub fn end_offset(&self) -> Offset {
        self.start_offset + self.data.len() as u64
    }
}
