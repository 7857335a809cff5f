use std::io::{self, Read, Seek, SeekFrom};

/// Sequential, seekable supply of gif bytes.
///
/// Any `Read + Seek` type (files, `Cursor<Vec<u8>>`, ...) is a `ByteSource`.
pub trait ByteSource {
    /// Read one byte, failing with `UnexpectedEof` at the end of the source.
    fn read_byte(&mut self) -> io::Result<u8>;

    /// Read up to `buf.len()` bytes, returning how many were read.
    fn read_block(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn seek(&mut self, position: u64) -> io::Result<()>;

    fn tell(&mut self) -> io::Result<u64>;

    /// Total length of the source, when it is known.
    fn size(&mut self) -> Option<u64> {
        None
    }
}

impl<T: Read + Seek> ByteSource for T {
    fn read_byte(&mut self) -> io::Result<u8> {
        let mut buffer: [u8; 1] = [0; 1];
        self.read_exact(&mut buffer)?;
        Ok(buffer[0])
    }

    fn read_block(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn seek(&mut self, position: u64) -> io::Result<()> {
        Seek::seek(self, SeekFrom::Start(position)).map(|_| ())
    }

    fn tell(&mut self) -> io::Result<u64> {
        self.stream_position()
    }

    fn size(&mut self) -> Option<u64> {
        let current = self.stream_position().ok()?;
        let end = Seek::seek(self, SeekFrom::End(0)).ok()?;
        Seek::seek(self, SeekFrom::Start(current)).ok()?;
        Some(end)
    }
}
