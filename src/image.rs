//! The kernel image held in memory for the duration of a transfer.

use std::fmt::Write as _;
use std::fs;

use log::debug;

use crate::error::Error;

/// Number of leading bytes shown by [`ImagePayload::preview`]. The bootloader
/// prints the same amount of what it received, so both can be compared.
pub const PREVIEW_LEN: usize = 20;

/// The whole kernel image, read into memory before any byte is exchanged with
/// the device.
///
/// The payload is immutable once loaded and its length is computed a single
/// time, so the size declared to the bootloader always matches the bytes that
/// are pushed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    bytes: Vec<u8>,
    len: usize,
}

impl ImagePayload {
    /// Read the image at `path` entirely. Empty images are rejected.
    pub fn load(path: &str) -> Result<Self, Error> {
        let bytes = fs::read(path).map_err(|source| Error::Image {
            path: path.to_owned(),
            source,
        })?;
        if bytes.is_empty() {
            return Err(Error::EmptyImage(path.to_owned()));
        }
        debug!("`{}` loaded, {} bytes", path, bytes.len());
        Ok(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The first [`PREVIEW_LEN`] bytes as upper-case hex, e.g. `"00 00 A0 E1"`.
    pub fn preview(&self) -> String {
        let mut out = String::with_capacity(PREVIEW_LEN * 3);
        for (i, b) in self.bytes.iter().take(PREVIEW_LEN).enumerate() {
            if i > 0 {
                out.push(' ');
            }
            let _ = write!(out, "{:02X}", b);
        }
        out
    }
}

impl From<Vec<u8>> for ImagePayload {
    fn from(bytes: Vec<u8>) -> Self {
        let len = bytes.len();
        ImagePayload { bytes, len }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn load_reads_the_whole_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let content: Vec<u8> = (0..=255u8).cycle().take(3000).collect();
        file.write_all(&content).unwrap();

        let payload = ImagePayload::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(payload.len(), 3000);
        assert_eq!(payload.as_bytes(), content.as_slice());
    }

    #[test]
    fn load_rejects_empty_image() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        match ImagePayload::load(path) {
            Err(Error::EmptyImage(p)) => assert_eq!(p, path),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kernel8.img");
        let result = ImagePayload::load(path.to_str().unwrap());
        assert!(matches!(result, Err(Error::Image { .. })));
    }

    #[test]
    fn preview_is_capped() {
        let payload: ImagePayload = (0..32u8).collect::<Vec<_>>().into();
        assert_eq!(
            payload.preview(),
            "00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F 10 11 12 13"
        );

        let short: ImagePayload = vec![0xde, 0xad].into();
        assert_eq!(short.preview(), "DE AD");
    }
}
