//! Big-endian byte-stream codec over a single sequential log.
//!
//! ```text
//! Offset  Size  Field
//! ──────  ────  ─────────────
//! 0x00    4     version       ← patched in when recording finishes
//! 0x04    8     (reserved)
//! 0x0C    ...   tagged records
//! ```
//!
//! Arrays are a dword length prefix followed by the raw bytes.

use crate::error::LogError;
use crate::{HEADER_SIZE, REPLAY_VERSION};
use log::{debug, warn};
use std::io::{self, Read, Seek, SeekFrom, Write};

// ═══════════════════════════════════════════════════════════════════════
//  Writer
// ═══════════════════════════════════════════════════════════════════════

/// Append-only writer used in RECORD mode.
///
/// A failed write is reported once and then latches: every later `put_*`
/// becomes a no-op. Recording keeps going with an unusable log rather than
/// taking the running machine down.
pub struct LogWriter<W> {
    inner: W,
    offset: u64,
    write_error: bool,
    warnings_emitted: u32,
}

impl<W: Write + Seek> LogWriter<W> {
    /// Start a new log: reserve the header area and position at the body.
    ///
    /// The version dword stays zero until [`finalize`](Self::finalize), so
    /// an interrupted recording fails validation on replay.
    pub fn create(inner: W) -> Self {
        let mut writer = Self {
            inner,
            offset: 0,
            write_error: false,
            warnings_emitted: 0,
        };
        writer.put_bytes(&[0u8; HEADER_SIZE as usize]);
        writer
    }

    pub fn put_byte(&mut self, value: u8) {
        self.put_bytes(&[value]);
    }

    pub fn put_word(&mut self, value: u16) {
        self.put_bytes(&value.to_be_bytes());
    }

    pub fn put_dword(&mut self, value: u32) {
        self.put_bytes(&value.to_be_bytes());
    }

    pub fn put_qword(&mut self, value: u64) {
        self.put_bytes(&value.to_be_bytes());
    }

    /// Signed dword, stored as its two's complement bit pattern.
    pub fn put_i32(&mut self, value: i32) {
        self.put_dword(value as u32);
    }

    pub fn put_i64(&mut self, value: i64) {
        self.put_qword(value as u64);
    }

    pub fn put_array(&mut self, data: &[u8]) {
        let Ok(len) = u32::try_from(data.len()) else {
            self.write_failed(io::Error::new(
                io::ErrorKind::InvalidInput,
                "array longer than 4 GiB",
            ));
            return;
        };
        self.put_dword(len);
        self.put_bytes(data);
    }

    /// Byte offset of the next write.
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// Whether any write has failed since the log was created.
    pub fn has_write_error(&self) -> bool {
        self.write_error
    }

    /// How many write-error warnings were logged (at most one).
    pub fn warnings_emitted(&self) -> u32 {
        self.warnings_emitted
    }

    /// Patch the version into the header and flush.
    pub fn finalize(&mut self) {
        if self.write_error {
            return;
        }
        let result = self
            .inner
            .flush()
            .and_then(|_| self.inner.seek(SeekFrom::Start(0)))
            .and_then(|_| self.inner.write_all(&REPLAY_VERSION.to_be_bytes()))
            .and_then(|_| self.inner.flush());
        if let Err(err) = result {
            self.write_failed(err);
        } else {
            debug!("Replay log finalized at {} bytes", self.offset);
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        if self.write_error {
            return;
        }
        match self.inner.write_all(bytes) {
            Ok(()) => self.offset += bytes.len() as u64,
            Err(err) => self.write_failed(err),
        }
    }

    fn write_failed(&mut self, err: io::Error) {
        if self.warnings_emitted == 0 {
            warn!("replay write error at byte {}: {}", self.offset, err);
            self.warnings_emitted += 1;
        }
        self.write_error = true;
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Reader
// ═══════════════════════════════════════════════════════════════════════

/// Forward-only reader used in PLAY mode.
///
/// Every getter returns a [`LogError`]; the engine treats all of them as
/// fatal because replay cannot continue once the log and execution diverge.
pub struct LogReader<R> {
    inner: R,
    offset: u64,
}

impl<R: Read + Seek> LogReader<R> {
    /// Validate the header and position at the first record.
    pub fn open(inner: R) -> Result<Self, LogError> {
        let mut reader = Self { inner, offset: 0 };
        reader.seek_to(0)?;
        let version = reader.get_dword()?;
        if version != REPLAY_VERSION {
            return Err(LogError::VersionMismatch {
                found: version,
                expected: REPLAY_VERSION,
            });
        }
        reader.seek_to(HEADER_SIZE)?;
        Ok(reader)
    }

    pub fn get_byte(&mut self) -> Result<u8, LogError> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    pub fn get_word(&mut self) -> Result<u16, LogError> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    pub fn get_dword(&mut self) -> Result<u32, LogError> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    pub fn get_qword(&mut self) -> Result<u64, LogError> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    pub fn get_i32(&mut self) -> Result<i32, LogError> {
        Ok(self.get_dword()? as i32)
    }

    pub fn get_i64(&mut self) -> Result<i64, LogError> {
        Ok(self.get_qword()? as i64)
    }

    /// Length-prefixed byte array.
    pub fn get_array(&mut self) -> Result<Vec<u8>, LogError> {
        let len = u64::from(self.get_dword()?);
        let mut data = Vec::new();
        let read = (&mut self.inner).take(len).read_to_end(&mut data)?;
        self.offset += read as u64;
        if (read as u64) < len {
            return Err(LogError::UnexpectedEof {
                offset: self.offset,
            });
        }
        Ok(data)
    }

    /// Byte offset of the next read.
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// Reposition the stream, used when a snapshot restores a log offset.
    pub fn seek_to(&mut self, offset: u64) -> Result<(), LogError> {
        self.inner.seek(SeekFrom::Start(offset))?;
        self.offset = offset;
        Ok(())
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), LogError> {
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.offset += buf.len() as u64;
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                Err(LogError::UnexpectedEof {
                    offset: self.offset,
                })
            }
            Err(err) => Err(LogError::Io(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Storage that accepts `budget` bytes and then fails every write.
    struct ShortDisk {
        data: Vec<u8>,
        budget: usize,
        failures: u32,
    }

    impl Write for ShortDisk {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.data.len() + buf.len() > self.budget {
                self.failures += 1;
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for ShortDisk {
        fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
            Ok(self.data.len() as u64)
        }
    }

    fn finished_log(body: impl FnOnce(&mut LogWriter<Cursor<Vec<u8>>>)) -> Vec<u8> {
        let mut writer = LogWriter::create(Cursor::new(Vec::new()));
        body(&mut writer);
        writer.finalize();
        writer.into_inner().into_inner()
    }

    #[test]
    fn integers_are_big_endian() {
        let bytes = finished_log(|w| {
            w.put_word(0x0102);
            w.put_dword(0x0304_0506);
            w.put_qword(0x0708_090a_0b0c_0d0e);
        });
        assert_eq!(
            &bytes[HEADER_SIZE as usize..],
            &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14]
        );
    }

    #[test]
    fn header_version_is_patched_on_finalize() {
        let bytes = finished_log(|w| w.put_byte(0xAA));
        assert_eq!(bytes.len(), HEADER_SIZE as usize + 1);
        assert_eq!(&bytes[..4], &REPLAY_VERSION.to_be_bytes());
        assert_eq!(&bytes[4..12], &[0u8; 8]);
    }

    #[test]
    fn unfinished_log_fails_version_check() {
        let mut writer = LogWriter::create(Cursor::new(Vec::new()));
        writer.put_byte(1);
        let bytes = writer.into_inner().into_inner();
        let err = LogReader::open(Cursor::new(bytes)).err().unwrap();
        assert!(matches!(err, LogError::VersionMismatch { found: 0, .. }));
    }

    #[test]
    fn reader_mirrors_writer() {
        let bytes = finished_log(|w| {
            w.put_byte(7);
            w.put_i32(-2);
            w.put_i64(-3);
            w.put_array(b"hello");
            w.put_array(&[]);
        });
        let mut r = LogReader::open(Cursor::new(bytes)).unwrap();
        assert_eq!(r.position(), HEADER_SIZE);
        assert_eq!(r.get_byte().unwrap(), 7);
        assert_eq!(r.get_i32().unwrap(), -2);
        assert_eq!(r.get_i64().unwrap(), -3);
        assert_eq!(r.get_array().unwrap(), b"hello");
        assert!(r.get_array().unwrap().is_empty());
        assert!(matches!(r.get_byte(), Err(LogError::UnexpectedEof { .. })));
    }

    #[test]
    fn truncated_array_is_eof() {
        let mut bytes = finished_log(|w| w.put_array(b"abcdef"));
        bytes.truncate(bytes.len() - 2);
        let mut r = LogReader::open(Cursor::new(bytes)).unwrap();
        assert!(matches!(r.get_array(), Err(LogError::UnexpectedEof { .. })));
    }

    #[test]
    fn write_error_is_sticky_and_warned_once() {
        let disk = ShortDisk {
            data: Vec::new(),
            budget: HEADER_SIZE as usize + 4,
            failures: 0,
        };
        let mut w = LogWriter::create(disk);
        w.put_dword(1);
        assert!(!w.has_write_error());

        w.put_dword(2);
        assert!(w.has_write_error());
        w.put_qword(3);
        w.put_array(b"dropped");
        w.finalize();

        assert_eq!(w.warnings_emitted(), 1);
        assert_eq!(w.position(), HEADER_SIZE + 4);
        // Later puts never reach the storage once the flag latches.
        let disk = w.into_inner();
        assert_eq!(disk.failures, 1);
        assert_eq!(disk.data.len(), HEADER_SIZE as usize + 4);
    }
}
