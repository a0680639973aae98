//! Blob decompression and line splitting.
//!
//! GH Archive publishes one gzip-compressed NDJSON blob per hour. A blob
//! may consist of several concatenated gzip members, so gzip input is read
//! with a multi-member decoder.

use bytes::Bytes;
use flate2::read::MultiGzDecoder;
use snafu::prelude::*;
use std::io::Read;
use tracing::debug;

use crate::config::CompressionFormat;
use crate::emit;
use crate::error::{GzipDecompressionSnafu, ReaderError, ZstdDecompressionSnafu};
use crate::metrics::events::BytesRead;

/// Decompresses raw blobs according to the configured format.
#[derive(Debug, Clone, Copy)]
pub struct BlobReader {
    compression: CompressionFormat,
}

impl BlobReader {
    pub fn new(compression: CompressionFormat) -> Self {
        Self { compression }
    }

    /// Decompress a blob into its NDJSON text.
    ///
    /// `path` is only used for error messages and logging.
    pub fn decompress(&self, compressed: &Bytes, path: &str) -> Result<Bytes, ReaderError> {
        emit!(BytesRead {
            bytes: compressed.len() as u64,
        });

        let decompressed = match self.compression {
            CompressionFormat::Gzip => {
                let mut buf = Vec::with_capacity(compressed.len() * 8);
                MultiGzDecoder::new(&compressed[..])
                    .read_to_end(&mut buf)
                    .context(GzipDecompressionSnafu { path })?;
                Bytes::from(buf)
            }
            CompressionFormat::Zstd => Bytes::from(
                zstd::decode_all(&compressed[..]).context(ZstdDecompressionSnafu { path })?,
            ),
            CompressionFormat::None => compressed.clone(),
        };

        debug!(
            "Decompressed {} -> {} bytes for {}",
            compressed.len(),
            decompressed.len(),
            path
        );

        Ok(decompressed)
    }
}

/// Split NDJSON text into numbered lines.
///
/// Line numbers are 1-based. A trailing `\r` is stripped from every line.
/// Whitespace after the last non-blank line is not a line at all; blank
/// lines between records are kept so the decoder reports them.
pub fn lines(text: &[u8]) -> impl Iterator<Item = (u64, &[u8])> {
    let end = text
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);

    text[..end]
        .split(|&b| b == b'\n')
        .filter(move |_| end > 0)
        .enumerate()
        .map(|(i, line)| {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            (i as u64 + 1, line)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_gzip_multi_member() {
        let mut blob = gzip(b"{\"a\":1}\n");
        blob.extend(gzip(b"{\"a\":2}\n"));

        let reader = BlobReader::new(CompressionFormat::Gzip);
        let text = reader.decompress(&Bytes::from(blob), "x.json.gz").unwrap();
        assert_eq!(&text[..], b"{\"a\":1}\n{\"a\":2}\n");
    }

    #[test]
    fn test_zstd_and_plain() {
        let compressed = zstd::encode_all(&b"{\"a\":1}\n"[..], 0).unwrap();
        let text = BlobReader::new(CompressionFormat::Zstd)
            .decompress(&Bytes::from(compressed), "x.json.zst")
            .unwrap();
        assert_eq!(&text[..], b"{\"a\":1}\n");

        let plain = Bytes::from_static(b"{}\n");
        let text = BlobReader::new(CompressionFormat::None)
            .decompress(&plain, "x.json")
            .unwrap();
        assert_eq!(text, plain);
    }

    #[test]
    fn test_corrupt_gzip_fails() {
        let err = BlobReader::new(CompressionFormat::Gzip)
            .decompress(&Bytes::from_static(b"not gzip at all"), "bad.json.gz")
            .unwrap_err();
        assert!(matches!(err, ReaderError::GzipDecompression { .. }));
        assert!(err.to_string().contains("bad.json.gz"));
    }

    #[test]
    fn test_lines_crlf_and_trailing_blank() {
        let text = b"{\"a\":1}\r\n\n{\"a\":2}\r\n  \n\n";
        let got: Vec<_> = lines(text).collect();
        assert_eq!(
            got,
            vec![
                (1, &b"{\"a\":1}"[..]),
                (2, &b""[..]),
                (3, &b"{\"a\":2}"[..]),
            ]
        );
    }

    #[test]
    fn test_lines_empty_input() {
        assert_eq!(lines(b"").count(), 0);
        assert_eq!(lines(b"\n \r\n").count(), 0);
        assert_eq!(lines(b"{}").collect::<Vec<_>>(), vec![(1, &b"{}"[..])]);
    }
}
