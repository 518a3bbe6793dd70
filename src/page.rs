/// Size of every page on disk and in the cache.
pub const PAGE_SIZE: usize = 4096;

/// The page struct that contains the raw bytes of one page.
///
/// All multi-byte integers are stored big-endian. Offsets are computed by the node
/// layout code from fixed constants, so every access here stays inside the page.
#[derive(Clone, PartialEq, Eq)]
pub struct Page {
    contents: Box<[u8; PAGE_SIZE]>,
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("kind", &self.contents[0])
            .field("is_root", &self.contents[1])
            .finish_non_exhaustive()
    }
}

impl Page {
    pub const U32_BYTES: usize = 4;

    /// Create a new zeroed page
    pub fn new() -> Self {
        Self {
            contents: Box::new([0; PAGE_SIZE]),
        }
    }

    /// Get a single byte from the page at the given offset
    pub fn get_u8(&self, offset: usize) -> u8 {
        self.contents[offset]
    }

    /// Set a single byte at the given offset
    pub fn set_u8(&mut self, offset: usize, value: u8) {
        self.contents[offset] = value;
    }

    /// Get an unsigned integer from the page at the given offset
    pub fn get_u32(&self, offset: usize) -> u32 {
        u32::from_be_bytes(*self.array::<{ Page::U32_BYTES }>(offset))
    }

    /// Set an unsigned integer at the given offset
    pub fn set_u32(&mut self, offset: usize, n: u32) {
        self.contents[offset..offset + Self::U32_BYTES].copy_from_slice(&n.to_be_bytes());
    }

    /// Borrow `len` bytes starting at `offset`
    pub fn bytes(&self, offset: usize, len: usize) -> &[u8] {
        &self.contents[offset..offset + len]
    }

    /// Mutably borrow `len` bytes starting at `offset`
    pub fn bytes_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        &mut self.contents[offset..offset + len]
    }

    /// Borrow exactly `N` bytes starting at `offset`
    pub fn array<const N: usize>(&self, offset: usize) -> &[u8; N] {
        self.contents[offset..offset + N]
            .try_into()
            .expect("range is exactly N bytes")
    }

    pub fn array_mut<const N: usize>(&mut self, offset: usize) -> &mut [u8; N] {
        (&mut self.contents[offset..offset + N])
            .try_into()
            .expect("range is exactly N bytes")
    }

    /// Copy `len` bytes inside the page from `src` to `dest`. The ranges may overlap.
    pub fn copy_within(&mut self, src: usize, dest: usize, len: usize) {
        self.contents.copy_within(src..src + len, dest);
    }

    /// Zero the whole page
    pub fn clear(&mut self) {
        self.contents.fill(0);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.contents[..]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.contents[..]
    }
}
