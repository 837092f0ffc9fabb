//! Streaming decompression of release artifacts.
//!
//! Gzip artifacts are inflated chunk by chunk as bytes arrive. Zip artifacts
//! keep their directory at the end of the file, so the archive is buffered
//! (up to a configured limit) before the first file entry is read back out
//! in fixed-size chunks. Both decoders run on the polling task; no threads
//! are spawned.

use crate::artifact::ArchiveType;
use crate::config::NetworkConfig;
use crate::{RelfetchError, Result};
use bytes::Bytes;
use flate2::read::DeflateDecoder;
use flate2::write::GzDecoder;
use flate2::Crc;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::io::{Cursor, ErrorKind, Read, Write};
use tracing::debug;
use zip::{CompressionMethod, ZipArchive};

/// Byte stream shared by the download and decompression stages.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Wrap `input` in the decoder for `archive_type`.
///
/// `expected_size` is the advertised compressed size (0 when unknown) and
/// only hints the initial zip buffer size.
pub fn decompress(
    input: ByteStream,
    archive_type: ArchiveType,
    expected_size: u64,
    zip_buffer_limit: u64,
) -> ByteStream {
    match archive_type {
        ArchiveType::Gz => gunzip(input),
        ArchiveType::Zip => {
            let capacity = expected_size.min(zip_buffer_limit);
            unzip_first_entry(input, capacity, zip_buffer_limit)
        }
    }
}

struct Gunzip {
    input: ByteStream,
    decoder: GzDecoder<Vec<u8>>,
}

impl Gunzip {
    fn take_output(&mut self) -> Option<Bytes> {
        let out = std::mem::take(self.decoder.get_mut());
        (!out.is_empty()).then(|| Bytes::from(out))
    }
}

/// Inflate a single gzip member. A truncated stream, a bad trailer
/// checksum or bytes after the member end the stream with an archive error.
pub fn gunzip(input: ByteStream) -> ByteStream {
    let state = Gunzip {
        input,
        decoder: GzDecoder::new(Vec::new()),
    };

    stream::unfold(Some(state), |state| async move {
        let mut gz = state?;
        loop {
            match gz.input.next().await {
                Some(Ok(chunk)) => {
                    if let Err(e) = gz.decoder.write_all(&chunk) {
                        let err = if e.kind() == ErrorKind::WriteZero {
                            RelfetchError::archive("trailing data after gzip stream")
                        } else {
                            invalid_gzip(e)
                        };
                        return Some((Err(err), None));
                    }
                    if let Some(out) = gz.take_output() {
                        return Some((Ok(out), Some(gz)));
                    }
                }
                Some(Err(e)) => return Some((Err(e), None)),
                None => {
                    if let Err(e) = gz.decoder.try_finish() {
                        return Some((Err(invalid_gzip(e)), None));
                    }
                    return gz.take_output().map(|out| (Ok(out), None));
                }
            }
        }
    })
    .boxed()
}

fn invalid_gzip(err: std::io::Error) -> RelfetchError {
    RelfetchError::archive(format!("invalid gzip data: {}", err))
}

/// Reader over the first file entry of a buffered zip archive.
struct ZipEntry {
    name: String,
    reader: Box<dyn Read + Send>,
    crc: Crc,
    read: u64,
    expected_crc: u32,
    expected_size: u64,
}

impl ZipEntry {
    fn open(archive: Vec<u8>) -> Result<Self> {
        let mut zip = ZipArchive::new(Cursor::new(archive))?;

        let index = (0..zip.len())
            .find(|&i| zip.by_index_raw(i).map(|e| !e.is_dir()).unwrap_or(false))
            .ok_or_else(|| RelfetchError::archive("zip archive contains no file entries"))?;

        let (name, method, data_start, compressed_size, expected_size, expected_crc) = {
            let entry = zip.by_index_raw(index)?;
            (
                entry.name().to_string(),
                entry.compression(),
                entry.data_start(),
                entry.compressed_size(),
                entry.size(),
                entry.crc32(),
            )
        };
        debug!(
            "zip entry {}: method={:?}, compressed={}, size={}",
            name, method, compressed_size, expected_size
        );

        let mut cursor = zip.into_inner();
        cursor.set_position(data_start);
        let raw = cursor.take(compressed_size);
        let reader: Box<dyn Read + Send> = match method {
            CompressionMethod::Stored => Box::new(raw),
            CompressionMethod::Deflated => Box::new(DeflateDecoder::new(raw)),
            other => {
                return Err(RelfetchError::archive(format!(
                    "unsupported compression method {:?} for {}",
                    other, name
                )))
            }
        };

        Ok(Self {
            name,
            reader,
            crc: Crc::new(),
            read: 0,
            expected_crc,
            expected_size,
        })
    }

    /// Next chunk of the entry, or `None` once it is exhausted and verified.
    fn read_chunk(&mut self) -> Result<Option<Bytes>> {
        let mut buf = vec![0u8; NetworkConfig::ZIP_READ_CHUNK_SIZE];
        let n = self.reader.read(&mut buf).map_err(|e| {
            RelfetchError::archive(format!("failed to inflate {}: {}", self.name, e))
        })?;

        if n == 0 {
            self.verify()?;
            return Ok(None);
        }

        buf.truncate(n);
        self.crc.update(&buf);
        self.read += n as u64;
        Ok(Some(Bytes::from(buf)))
    }

    fn verify(&self) -> Result<()> {
        if self.read != self.expected_size {
            return Err(RelfetchError::archive(format!(
                "{} is truncated: expected {} bytes, got {}",
                self.name, self.expected_size, self.read
            )));
        }
        if self.crc.sum() != self.expected_crc {
            return Err(RelfetchError::archive(format!(
                "CRC mismatch for {}: expected {:08x}, got {:08x}",
                self.name,
                self.expected_crc,
                self.crc.sum()
            )));
        }
        Ok(())
    }
}

enum Unzip {
    Buffering {
        input: ByteStream,
        capacity: u64,
        limit: u64,
    },
    Reading(ZipEntry),
}

/// Up-front reservation for a zip buffer. The advertised size is only a
/// hint; the buffer grows as bytes actually arrive.
fn initial_capacity(hint: u64) -> usize {
    usize::try_from(hint)
        .unwrap_or(usize::MAX)
        .min(NetworkConfig::ZIP_INITIAL_CAPACITY)
}

async fn buffer_archive(mut input: ByteStream, capacity: u64, limit: u64) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(initial_capacity(capacity));
    while let Some(chunk) = input.next().await {
        let chunk = chunk?;
        if (buf.len() + chunk.len()) as u64 > limit {
            return Err(RelfetchError::archive(format!(
                "zip archive exceeds the {} byte buffer limit",
                limit
            )));
        }
        buf.extend_from_slice(&chunk);
    }
    debug!("buffered zip archive: {} bytes", buf.len());
    Ok(buf)
}

/// Yield the contents of the first non-directory entry of a zip archive.
///
/// Stored and deflated entries are supported; the entry CRC is checked once
/// the last chunk has been produced. At most `limit` bytes are buffered;
/// `capacity` is a size hint for the buffer.
pub fn unzip_first_entry(input: ByteStream, capacity: u64, limit: u64) -> ByteStream {
    stream::unfold(
        Some(Unzip::Buffering {
            input,
            capacity,
            limit,
        }),
        |state| async move {
            let mut entry = match state? {
                Unzip::Buffering {
                    input,
                    capacity,
                    limit,
                } => {
                    let buffered = buffer_archive(input, capacity, limit).await;
                    match buffered.and_then(ZipEntry::open) {
                        Ok(entry) => entry,
                        Err(e) => return Some((Err(e), None)),
                    }
                }
                Unzip::Reading(entry) => entry,
            };

            match entry.read_chunk() {
                Ok(Some(chunk)) => Some((Ok(chunk), Some(Unzip::Reading(entry)))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        },
    )
    .boxed()
}
