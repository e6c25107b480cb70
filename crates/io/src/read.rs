use crate::alloc::{NoReclaim, Reclaim, ReclaimHandle, with_retry};
use crate::error::{ErrorKind, Result};
use crate::{Content, INITIAL_BUFFER_SIZE, MIN_MMAPED_FILE_SIZE};
use exn::ResultExt;
use memmap2::Mmap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

type Mapper = fn(&File) -> std::io::Result<Mmap>;

/// Blocking reader producing [`Content`] from files and streams.
///
/// # Examples
///
/// ```no_run
/// use modvfs_io::Reader;
/// use std::path::Path;
///
/// # fn example() -> modvfs_io::error::Result<()> {
/// let reader = Reader::new().with_reclaim(|| tracing::info!("dropping caches"));
/// let content = reader.read_file(Path::new("/tmp/intro.mod"))?;
/// println!("{} bytes (mapped: {})", content.len(), content.is_mapped());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Reader {
    mmap_threshold: u64,
    initial_buffer: usize,
    reclaim: ReclaimHandle,
    mapper: Mapper,
}

impl Default for Reader {
    fn default() -> Self {
        Self {
            mmap_threshold: MIN_MMAPED_FILE_SIZE,
            initial_buffer: INITIAL_BUFFER_SIZE,
            reclaim: Arc::new(NoReclaim),
            mapper: map,
        }
    }
}

impl Reader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mmap_threshold(mut self, threshold: u64) -> Self {
        self.mmap_threshold = threshold;
        self
    }

    /// Clamped to at least two bytes so that 1.5x growth always makes progress.
    pub fn with_initial_buffer(mut self, size: usize) -> Self {
        self.initial_buffer = size.max(2);
        self
    }

    pub fn with_reclaim(mut self, reclaim: impl Reclaim + 'static) -> Self {
        self.reclaim = Arc::new(reclaim);
        self
    }

    #[cfg(test)]
    fn with_mapper(mut self, mapper: Mapper) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn mmap_threshold(&self) -> u64 {
        self.mmap_threshold
    }

    /// Read a whole file.
    ///
    /// Files of at least [`mmap_threshold`](Self::mmap_threshold) bytes are
    /// mapped. A mapping failure is logged, a reclamation pass runs, and the
    /// file is read into the heap instead.
    pub fn read_file(&self, path: &Path) -> Result<Content> {
        let file = File::open(path).map_err(ErrorKind::Io)?;
        let size = file.metadata().map_err(ErrorKind::Io)?.len();
        if size == 0 {
            exn::bail!(ErrorKind::Empty);
        }
        if size >= self.mmap_threshold {
            match (self.mapper)(&file) {
                Ok(mapped) => return Ok(Content::Mapped(mapped)),
                Err(err) => {
                    tracing::warn!(path = %path.display(), bytes = size, error = %err, "Failed to map file, falling back to heap read");
                    self.reclaim.reclaim();
                },
            }
        }
        self.read_stream_sized(file, size)
    }

    /// Read a stream of unknown length to its end.
    pub fn read_stream(&self, mut stream: impl Read) -> Result<Content> {
        let mut buffer = Vec::new();
        let mut filled = 0;
        loop {
            self.grow(&mut buffer)?;
            filled = read_into(&mut stream, &mut buffer, filled)?;
            if filled < buffer.len() {
                break;
            }
        }
        if filled == 0 {
            exn::bail!(ErrorKind::Empty);
        }
        buffer.truncate(filled);
        buffer.shrink_to_fit();
        Ok(Content::Heap(buffer))
    }

    /// Read a stream that must deliver exactly `size` bytes.
    pub fn read_stream_sized(&self, mut stream: impl Read, size: u64) -> Result<Content> {
        if size == 0 {
            exn::bail!(ErrorKind::Empty);
        }
        let len = usize::try_from(size).or_raise(|| ErrorKind::TooLarge(size))?;
        let mut buffer = Vec::new();
        with_retry(self.reclaim.as_ref(), || buffer.try_reserve_exact(len))?;
        buffer.resize(len, 0);

        let filled = read_into(&mut stream, &mut buffer, 0)?;
        if filled != len {
            exn::bail!(ErrorKind::SizeMismatch { expected: size, actual: filled as u64 });
        }
        let trailing = std::io::copy(&mut stream, &mut std::io::sink()).map_err(ErrorKind::Io)?;
        if trailing != 0 {
            exn::bail!(ErrorKind::SizeMismatch { expected: size, actual: size + trailing });
        }
        Ok(Content::Heap(buffer))
    }

    fn grow(&self, buffer: &mut Vec<u8>) -> Result<()> {
        let target = match buffer.len() {
            0 => self.initial_buffer,
            len => len.saturating_add(len / 2),
        };
        let additional = target - buffer.len();
        with_retry(self.reclaim.as_ref(), || buffer.try_reserve_exact(additional))?;
        buffer.resize(target, 0);
        Ok(())
    }
}

fn map(file: &File) -> std::io::Result<Mmap> {
    // SAFETY: mapped read-only; cache files are published by rename and never
    // modified in place.
    unsafe { Mmap::map(file) }
}

/// Fill `buffer` from `offset` until it is full or the stream ends. Returns
/// the number of filled bytes.
fn read_into(stream: &mut impl Read, buffer: &mut [u8], mut offset: usize) -> Result<usize> {
    while offset < buffer.len() {
        match stream.read(&mut buffer[offset..]) {
            Ok(0) => break,
            Ok(read) => offset += read,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => exn::bail!(ErrorKind::Io(err)),
        }
    }
    Ok(offset)
}
