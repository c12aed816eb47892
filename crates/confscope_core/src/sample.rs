//! Capped byte sampling for classification.
//!
//! Plugins never see more than the configured sample cap, which bounds
//! per-file memory and latency regardless of file size.

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Default maximum number of bytes read from a file for classification.
pub const DEFAULT_SAMPLE_CAP: usize = 128 * 1024;

/// Text encoding detected from a byte sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Valid UTF-8 without a byte-order mark.
    Utf8,
    /// UTF-8 with a leading byte-order mark.
    Utf8Bom,
    /// UTF-16 little-endian (BOM `FF FE`).
    Utf16Le,
    /// UTF-16 big-endian (BOM `FE FF`).
    Utf16Be,
    /// Not decodable as text.
    Binary,
}

impl Encoding {
    /// Returns the canonical lowercase name used in detection metadata.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Utf8Bom => "utf-8-bom",
            Self::Utf16Le => "utf-16le",
            Self::Utf16Be => "utf-16be",
            Self::Binary => "binary",
        }
    }
}

/// A capped byte sample of a file, with encoding and truncation metadata.
///
/// Construct with [`Sample::read`] for on-disk files or
/// [`Sample::from_bytes`] for already-loaded content.
#[derive(Debug, Clone)]
pub struct Sample {
    bytes: Vec<u8>,
    total_len: u64,
    encoding: Encoding,
}

impl Sample {
    /// Reads up to `cap` bytes from `path`.
    ///
    /// The file's true size is recorded so [`Sample::is_truncated`] can
    /// report whether the cap cut the content short.
    pub fn read(path: &Path, cap: usize) -> io::Result<Self> {
        let file = File::open(path)?;
        let total_len = file.metadata()?.len();

        let mut bytes = Vec::with_capacity(cap.min(usize::try_from(total_len).unwrap_or(cap)));
        file.take(cap as u64).read_to_end(&mut bytes)?;

        Ok(Self::with_total_len(bytes, total_len))
    }

    /// Builds a sample from in-memory content, applying the same cap.
    #[must_use]
    pub fn from_bytes(content: &[u8], cap: usize) -> Self {
        let total_len = content.len() as u64;
        let bytes = content[..content.len().min(cap)].to_vec();
        Self::with_total_len(bytes, total_len)
    }

    fn with_total_len(bytes: Vec<u8>, total_len: u64) -> Self {
        let encoding = detect_encoding(&bytes);
        Self {
            bytes,
            total_len,
            encoding,
        }
    }

    /// Returns the sampled bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the number of bytes actually read.
    #[must_use]
    pub fn bytes_sampled(&self) -> usize {
        self.bytes.len()
    }

    /// Returns the file's true size in bytes.
    #[must_use]
    pub const fn total_len(&self) -> u64 {
        self.total_len
    }

    /// Returns `true` iff the underlying resource is larger than the sample.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.total_len > self.bytes.len() as u64
    }

    /// Returns the detected encoding of the sampled bytes.
    #[must_use]
    pub const fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Decodes the sample as text.
    ///
    /// UTF-8 samples borrow; BOM-prefixed and UTF-16 samples allocate.
    /// Returns `None` for binary content - plugins treat that as
    /// "not detected", never as an error.
    #[must_use]
    pub fn text(&self) -> Option<Cow<'_, str>> {
        match self.encoding {
            Encoding::Utf8 => {
                let trimmed = trim_incomplete_utf8(&self.bytes);
                std::str::from_utf8(trimmed).ok().map(Cow::Borrowed)
            }
            Encoding::Utf8Bom => {
                let trimmed = trim_incomplete_utf8(&self.bytes[3..]);
                std::str::from_utf8(trimmed).ok().map(Cow::Borrowed)
            }
            Encoding::Utf16Le => decode_utf16(&self.bytes[2..], u16::from_le_bytes).map(Cow::Owned),
            Encoding::Utf16Be => decode_utf16(&self.bytes[2..], u16::from_be_bytes).map(Cow::Owned),
            Encoding::Binary => None,
        }
    }

    /// Returns the lowercase hex SHA-256 of the sampled bytes.
    ///
    /// Used as the `content_sha256` provenance key in detection metadata.
    #[must_use]
    pub fn content_sha256(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}

fn detect_encoding(bytes: &[u8]) -> Encoding {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return Encoding::Utf8Bom;
    }
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return Encoding::Utf16Le;
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return Encoding::Utf16Be;
    }
    if std::str::from_utf8(trim_incomplete_utf8(bytes)).is_ok() {
        return Encoding::Utf8;
    }
    Encoding::Binary
}

/// Drops up to 3 trailing bytes that form an incomplete UTF-8 sequence.
///
/// A capped read can split a multi-byte character at the sample boundary;
/// without trimming, an otherwise valid UTF-8 file would classify as binary.
fn trim_incomplete_utf8(bytes: &[u8]) -> &[u8] {
    match std::str::from_utf8(bytes) {
        Ok(_) => bytes,
        Err(e) if e.error_len().is_none() => &bytes[..e.valid_up_to()],
        Err(_) => bytes,
    }
}

fn decode_utf16(bytes: &[u8], read_unit: fn([u8; 2]) -> u16) -> Option<String> {
    // An odd trailing byte is a cap artefact, same as a split UTF-8 sequence.
    let pairs = bytes.len() / 2;
    let units = (0..pairs).map(|i| read_unit([bytes[i * 2], bytes[i * 2 + 1]]));
    char::decode_utf16(units).collect::<Result<String, _>>().ok()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn from_bytes_keeps_content_under_cap() {
        let sample = Sample::from_bytes(b"key = value", DEFAULT_SAMPLE_CAP);
        assert_eq!(sample.bytes_sampled(), 11);
        assert!(!sample.is_truncated());
    }

    #[test]
    fn from_bytes_truncates_at_cap() {
        let content = vec![b'a'; 100];
        let sample = Sample::from_bytes(&content, 64);

        assert_eq!(sample.bytes_sampled(), 64);
        assert_eq!(sample.total_len(), 100);
        assert!(sample.is_truncated());
    }

    #[test]
    fn truncated_is_false_when_size_equals_cap() {
        let content = vec![b'a'; 64];
        let sample = Sample::from_bytes(&content, 64);
        assert!(!sample.is_truncated());
    }

    #[test]
    fn read_respects_cap_on_disk() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", "x".repeat(1000)).unwrap();

        let sample = Sample::read(file.path(), 100).unwrap();

        assert_eq!(sample.bytes_sampled(), 100);
        assert_eq!(sample.total_len(), 1000);
        assert!(sample.is_truncated());
    }

    #[test]
    fn read_nonexistent_file_is_an_error() {
        let result = Sample::read(Path::new("/nonexistent/confscope-test"), 64);
        assert!(result.is_err());
    }

    #[test]
    fn plain_ascii_detects_utf8() {
        let sample = Sample::from_bytes(b"hello", DEFAULT_SAMPLE_CAP);
        assert_eq!(sample.encoding(), Encoding::Utf8);
        assert_eq!(sample.text().unwrap(), "hello");
    }

    #[test]
    fn utf8_bom_is_stripped_from_text() {
        let sample = Sample::from_bytes(b"\xEF\xBB\xBF<configuration/>", DEFAULT_SAMPLE_CAP);
        assert_eq!(sample.encoding(), Encoding::Utf8Bom);
        assert_eq!(sample.text().unwrap(), "<configuration/>");
    }

    #[test]
    fn utf16le_decodes() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "key=1".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let sample = Sample::from_bytes(&bytes, DEFAULT_SAMPLE_CAP);

        assert_eq!(sample.encoding(), Encoding::Utf16Le);
        assert_eq!(sample.text().unwrap(), "key=1");
    }

    #[test]
    fn utf16be_decodes() {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in "ab".encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        let sample = Sample::from_bytes(&bytes, DEFAULT_SAMPLE_CAP);

        assert_eq!(sample.encoding(), Encoding::Utf16Be);
        assert_eq!(sample.text().unwrap(), "ab");
    }

    #[test]
    fn null_bytes_detect_binary() {
        let sample = Sample::from_bytes(b"abc\x00def\x80\x81", DEFAULT_SAMPLE_CAP);
        assert_eq!(sample.encoding(), Encoding::Binary);
        assert!(sample.text().is_none());
    }

    #[test]
    fn cap_splitting_a_multibyte_char_still_detects_utf8() {
        // "é" is 2 bytes; cap at 4 cuts the second one in half.
        let content = "abcé".as_bytes();
        let sample = Sample::from_bytes(content, 4);

        assert_eq!(sample.encoding(), Encoding::Utf8);
        assert_eq!(sample.text().unwrap(), "abc");
    }

    #[test]
    fn content_sha256_is_deterministic() {
        let s1 = Sample::from_bytes(b"same", DEFAULT_SAMPLE_CAP);
        let s2 = Sample::from_bytes(b"same", DEFAULT_SAMPLE_CAP);
        assert_eq!(s1.content_sha256(), s2.content_sha256());
        assert_eq!(s1.content_sha256().len(), 64);
    }

    #[test]
    fn content_sha256_differs_for_different_content() {
        let s1 = Sample::from_bytes(b"one", DEFAULT_SAMPLE_CAP);
        let s2 = Sample::from_bytes(b"two", DEFAULT_SAMPLE_CAP);
        assert_ne!(s1.content_sha256(), s2.content_sha256());
    }

    #[test]
    fn encoding_names_are_stable() {
        assert_eq!(Encoding::Utf8.as_str(), "utf-8");
        assert_eq!(Encoding::Utf8Bom.as_str(), "utf-8-bom");
        assert_eq!(Encoding::Utf16Le.as_str(), "utf-16le");
        assert_eq!(Encoding::Utf16Be.as_str(), "utf-16be");
        assert_eq!(Encoding::Binary.as_str(), "binary");
    }
}
