// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Compression and size framing of individual resources.

Each resource is stored as a *framed payload*: a 4 byte big-endian
integer holding the decompressed length followed by the zlib compressed
content. Consumers read the header to allocate an exact-size buffer and
then inflate the remaining bytes into it.
*/

use {
    crate::error::{PackError, Result},
    byteorder::{BigEndian, ByteOrder, WriteBytesExt},
    flate2::{bufread::ZlibDecoder, write::ZlibEncoder, Compression},
    std::{
        io::{Read, Write},
        path::Path,
    },
};

/// Length in bytes of the decompressed size header.
pub const SIZE_HEADER_LENGTH: usize = 4;

/// Compression level used when none is specified. zlib's maximum.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 9;

/// Highest zlib compression level.
pub const MAX_COMPRESSION_LEVEL: u32 = 9;

/// Upper bound on the decode buffer reserved from an untrusted size header.
const MAX_DECODE_PREALLOCATION: usize = 16 * 1024 * 1024;

/// Compress data with zlib at the given level.
///
/// Levels above [MAX_COMPRESSION_LEVEL] are treated as the maximum. Output
/// is deterministic for a given level and flate2 backend version.
pub fn compress(data: &[u8], level: u32) -> std::io::Result<Vec<u8>> {
    let level = Compression::new(level.min(MAX_COMPRESSION_LEVEL));
    let mut encoder = ZlibEncoder::new(Vec::new(), level);
    encoder.write_all(data)?;

    encoder.finish()
}

/// A compressed resource and its metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackedEntry {
    /// Position of this entry in the bundle.
    pub index: usize,

    /// Name the resource is looked up by.
    pub logical_name: String,

    /// Length of the resource before compression.
    pub original_size: u32,

    /// zlib compressed resource content.
    pub compressed: Vec<u8>,
}

impl PackedEntry {
    /// Construct an instance by compressing raw resource data.
    ///
    /// `source_path` is only used for error reporting.
    pub fn from_data(
        index: usize,
        logical_name: impl ToString,
        source_path: &Path,
        data: &[u8],
        level: u32,
    ) -> Result<Self> {
        let original_size =
            u32::try_from(data.len()).map_err(|_| PackError::ResourceTooLarge {
                path: source_path.to_path_buf(),
                size: data.len() as u64,
            })?;

        let compressed =
            compress(data, level).map_err(|source| PackError::CompressionFailure {
                path: source_path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            index,
            logical_name: logical_name.to_string(),
            original_size,
            compressed,
        })
    }

    /// The 4 byte big-endian decompressed size header.
    pub fn size_header(&self) -> [u8; SIZE_HEADER_LENGTH] {
        let mut header = [0u8; SIZE_HEADER_LENGTH];
        BigEndian::write_u32(&mut header, self.original_size);

        header
    }

    /// Length of the framed payload: size header plus compressed data.
    pub fn stored_size(&self) -> usize {
        SIZE_HEADER_LENGTH + self.compressed.len()
    }

    /// Whether compression made this resource larger than its raw form.
    pub fn is_incompressible(&self) -> bool {
        self.compressed.len() >= self.original_size as usize
    }

    /// Write the framed payload to a writer.
    pub fn write_framed<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_u32::<BigEndian>(self.original_size)?;
        dest.write_all(&self.compressed)?;

        Ok(())
    }

    /// Obtain the framed payload as a new buffer.
    pub fn framed_payload(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.stored_size());
        data.extend_from_slice(&self.size_header());
        data.extend_from_slice(&self.compressed);

        data
    }
}

/// The complete set of packed entries produced by a single pack operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bundle {
    pub entries: Vec<PackedEntry>,
}

impl Bundle {
    /// Number of entries in the bundle.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Find an entry by logical name.
    pub fn find(&self, logical_name: &str) -> Option<&PackedEntry> {
        self.entries
            .iter()
            .find(|entry| entry.logical_name == logical_name)
    }
}

/// Decode a framed payload back into the original resource data.
///
/// Every byte after the size header must belong to a single zlib stream
/// and the decompressed length must equal the value advertised in the size
/// header.
pub fn decode_framed_payload(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < SIZE_HEADER_LENGTH {
        return Err(PackError::MalformedFramedPayload(
            "payload shorter than size header",
        ));
    }

    let (header, compressed) = data.split_at(SIZE_HEADER_LENGTH);
    let expected = BigEndian::read_u32(header);

    // Reading one byte past the advertised size is enough to detect an
    // oversized stream without inflating all of it.
    let mut decoded =
        Vec::with_capacity((expected as usize).min(MAX_DECODE_PREALLOCATION));
    let mut reader = ZlibDecoder::new(compressed).take(u64::from(expected) + 1);
    reader
        .read_to_end(&mut decoded)
        .map_err(|_| PackError::MalformedFramedPayload("zlib stream is corrupt"))?;

    if decoded.len() != expected as usize {
        return Err(PackError::FramedSizeMismatch {
            expected,
            actual: decoded.len(),
        });
    }

    if reader.into_inner().total_in() != compressed.len() as u64 {
        return Err(PackError::MalformedFramedPayload(
            "trailing data after zlib stream",
        ));
    }

    Ok(decoded)
}
