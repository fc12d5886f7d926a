use std::io::{self, Read, Write};

/// Usable bytes per connection buffer.
pub const BUFFER_CAPACITY: usize = 127;

/// Fixed-size byte buffer. `len() <= capacity()` holds for every value of
/// this type; there is no way to set the length directly.
#[derive(Clone)]
pub struct BoundedBuffer {
    data: [u8; BUFFER_CAPACITY],
    len: usize,
}

impl BoundedBuffer {
    pub const fn new() -> Self {
        Self {
            data: [0; BUFFER_CAPACITY],
            len: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        BUFFER_CAPACITY
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Replace the contents with one read from `src`, truncated to capacity.
    ///
    /// Existing contents are discarded first. Returns what `src.read` returned;
    /// on error the buffer is left empty.
    pub fn fill_from<R: Read>(&mut self, src: &mut R) -> io::Result<usize> {
        self.len = 0;
        let n = src.read(&mut self.data)?;
        self.len = n.min(BUFFER_CAPACITY);
        Ok(self.len)
    }

    /// One write of the buffered bytes into `dst`. The buffer is not modified.
    pub fn drain_into<W: Write>(&self, dst: &mut W) -> io::Result<usize> {
        dst.write(self.as_slice())
    }
}

impl Default for BoundedBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BoundedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedBuffer")
            .field("len", &self.len)
            .field("data", &String::from_utf8_lossy(self.as_slice()))
            .finish()
    }
}
