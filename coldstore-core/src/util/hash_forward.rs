use std::io::{Result, Write};

/// Write adapter that feeds every byte into a blake3 hasher before forwarding.
/// Used to digest an encoded plan without buffering it twice.
pub struct DigestForward<'a, W: Write> {
    inner: W,
    hasher: &'a mut blake3::Hasher,
    pub counted: u64,
}

impl<'a, W: Write> DigestForward<'a, W> {
    pub fn new(inner: W, hasher: &'a mut blake3::Hasher) -> Self {
        Self {
            inner,
            hasher,
            counted: 0,
        }
    }
}

impl<'a, W: Write> Write for DigestForward<'a, W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.counted += n as u64;
        Ok(n)
    }
    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }
}
