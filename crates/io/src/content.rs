use memmap2::Mmap;
use std::fmt;
use std::ops::Deref;

/// Owned payload bytes, either memory-mapped or heap-allocated.
///
/// Both variants dereference to `[u8]`; callers never need to care which one
/// they hold except for diagnostics.
pub enum Content {
    Mapped(Mmap),
    Heap(Vec<u8>),
}

impl Content {
    pub fn is_mapped(&self) -> bool {
        matches!(self, Self::Mapped(_))
    }

    /// Copy into an owned vector. Free for heap content.
    pub fn into_vec(self) -> Vec<u8> {
        match self {
            Self::Mapped(map) => map.to_vec(),
            Self::Heap(buffer) => buffer,
        }
    }
}

impl Deref for Content {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Mapped(map) => map,
            Self::Heap(buffer) => buffer,
        }
    }
}

impl AsRef<[u8]> for Content {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl From<Vec<u8>> for Content {
    fn from(buffer: Vec<u8>) -> Self {
        Self::Heap(buffer)
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_mapped() { "Mapped" } else { "Heap" };
        f.debug_struct("Content").field("kind", &kind).field("len", &self.len()).finish()
    }
}

impl PartialEq for Content {
    fn eq(&self, other: &Self) -> bool {
        **self == **other
    }
}
