//! Binary record stored for each chunk in the block store.
//!
//! ## Layout
//!
//! | Field | Size | Notes |
//! |-------|------|-------|
//! | version | 1 | 1 (legacy) or 2 (current) |
//! | flags | 1 | `0x01` underground, `0x04` lighting expired, `0x08` not generated |
//! | timestamp | 4 | v2 only, `0xffffffff` = unknown |
//! | name-id map | var | v2 only: `u16` count, then (`u16` id, `u16` len, name) |
//! | body | var | v1 raw, v2 LZ4 with prepended size |
//!
//! The body holds 4096 big-endian content ids, 4096 `param1` bytes, 4096
//! `param2` bytes, the metadata table and the timer table.
//!
//! Content ids in a v2 record are the writer's ids; readers remap them by
//! name so that worlds survive changes in registration order.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use tracing::warn;

use crate::chunk::Chunk;
use crate::content::ContentRegistry;
use crate::metadata::{NodeMetadata, NodeTimer};
use crate::node::{ContentId, Node};
use crate::pos::{CHUNK_VOLUME, ChunkPos};

/// Oldest record version this build can read.
pub const SER_FMT_VER_LOWEST_READ: u8 = 1;

/// Version written by this build.
pub const SER_FMT_VER_HIGHEST: u8 = 2;

const FLAG_UNDERGROUND: u8 = 0x01;
const FLAG_LIGHTING_EXPIRED: u8 = 0x04;
const FLAG_NOT_GENERATED: u8 = 0x08;

const TIMESTAMP_UNDEFINED: u32 = 0xffff_ffff;

/// Errors that can occur while encoding or decoding a chunk record.
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    /// The record ended before a field was complete.
    #[error("record truncated: needed {needed} more bytes at offset {offset}")]
    Truncated {
        /// Byte offset of the field.
        offset: usize,
        /// Bytes missing.
        needed: usize,
    },
    /// The version byte is outside the supported range.
    #[error("unsupported record version {0}")]
    UnsupportedVersion(u8),
    /// The LZ4 body could not be decompressed.
    #[error("failed to decompress record body: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),
    /// A name or metadata string is not valid UTF-8.
    #[error("invalid UTF-8 in record")]
    InvalidUtf8,
    /// A metadata or timer entry names a node outside the chunk.
    #[error("node index {0} outside the chunk")]
    InvalidNodeIndex(u16),
    /// Bytes remain after the last table.
    #[error("{0} trailing bytes after record body")]
    TrailingData(usize),
    /// Dummy chunks have no data to persist.
    #[error("cannot serialize dummy chunk {0:?}")]
    DummyChunk(ChunkPos),
}

impl SerializationError {
    /// Whether the record is from an incompatible format rather than damaged.
    pub fn is_version_mismatch(&self) -> bool {
        matches!(self, SerializationError::UnsupportedVersion(_))
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encodes `chunk` as a record of the given `version`.
pub fn serialize_chunk(
    chunk: &Chunk,
    registry: &ContentRegistry,
    version: u8,
) -> Result<Vec<u8>, SerializationError> {
    if !(SER_FMT_VER_LOWEST_READ..=SER_FMT_VER_HIGHEST).contains(&version) {
        return Err(SerializationError::UnsupportedVersion(version));
    }
    let nodes = chunk
        .nodes()
        .ok_or(SerializationError::DummyChunk(chunk.pos()))?;

    let mut out = Vec::with_capacity(16 + CHUNK_VOLUME * 4);
    out.push(version);

    let mut flags = 0u8;
    if chunk.is_underground() {
        flags |= FLAG_UNDERGROUND;
    }
    if chunk.lighting_expired() {
        flags |= FLAG_LIGHTING_EXPIRED;
    }
    if !chunk.is_generated() {
        flags |= FLAG_NOT_GENERATED;
    }
    out.push(flags);

    let body = encode_body(chunk, nodes);

    if version == 1 {
        out.extend_from_slice(&body);
        return Ok(out);
    }

    out.extend_from_slice(&chunk.timestamp().unwrap_or(TIMESTAMP_UNDEFINED).to_be_bytes());

    let mut present: BTreeMap<u16, &str> = BTreeMap::new();
    for node in nodes {
        present
            .entry(node.content.0)
            .or_insert_with(|| registry.name_of(node.content));
    }
    out.extend_from_slice(&(present.len() as u16).to_be_bytes());
    for (id, name) in present {
        out.extend_from_slice(&id.to_be_bytes());
        out.extend_from_slice(&(name.len() as u16).to_be_bytes());
        out.extend_from_slice(name.as_bytes());
    }

    out.extend_from_slice(&lz4_flex::compress_prepend_size(&body));
    Ok(out)
}

fn encode_body(chunk: &Chunk, nodes: &[Node]) -> Vec<u8> {
    let mut body = Vec::with_capacity(CHUNK_VOLUME * 4 + 4);
    for node in nodes {
        body.extend_from_slice(&node.content.0.to_be_bytes());
    }
    body.extend(nodes.iter().map(|n| n.param1));
    body.extend(nodes.iter().map(|n| n.param2));

    body.extend_from_slice(&(chunk.metadata.len() as u16).to_be_bytes());
    for (index, meta) in chunk.metadata.iter() {
        body.extend_from_slice(&index.to_be_bytes());
        body.extend_from_slice(&(meta.len() as u32).to_be_bytes());
        for (key, value) in meta.iter() {
            body.extend_from_slice(&(key.len() as u16).to_be_bytes());
            body.extend_from_slice(key.as_bytes());
            body.extend_from_slice(&(value.len() as u32).to_be_bytes());
            body.extend_from_slice(value.as_bytes());
        }
    }

    body.extend_from_slice(&(chunk.timers.len() as u16).to_be_bytes());
    for (index, timer) in chunk.timers.iter() {
        body.extend_from_slice(&index.to_be_bytes());
        body.extend_from_slice(&((timer.timeout * 1000.0) as i32).to_be_bytes());
        body.extend_from_slice(&((timer.elapsed * 1000.0) as i32).to_be_bytes());
    }
    body
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decodes a record into a chunk at `pos`, remapping content ids through
/// `registry`. The returned chunk is clean.
pub fn deserialize_chunk(
    pos: ChunkPos,
    data: &[u8],
    registry: &ContentRegistry,
) -> Result<Chunk, SerializationError> {
    let mut reader = ByteReader::new(data);
    let version = reader.u8()?;
    if !(SER_FMT_VER_LOWEST_READ..=SER_FMT_VER_HIGHEST).contains(&version) {
        return Err(SerializationError::UnsupportedVersion(version));
    }
    let flags = reader.u8()?;

    let mut chunk = Chunk::new(pos);
    chunk.restore_flags(
        flags & FLAG_NOT_GENERATED == 0,
        flags & FLAG_UNDERGROUND != 0,
        flags & FLAG_LIGHTING_EXPIRED != 0,
    );

    let (mapping, body) = if version == 1 {
        (None, reader.rest().to_vec())
    } else {
        let timestamp = reader.u32()?;
        chunk.set_timestamp((timestamp != TIMESTAMP_UNDEFINED).then_some(timestamp));
        let mapping = read_name_id_map(&mut reader, registry, pos)?;
        let body = lz4_flex::decompress_size_prepended(reader.rest())?;
        (Some(mapping), body)
    };

    decode_body(&mut chunk, &body, mapping.as_ref(), registry)?;
    Ok(chunk)
}

fn read_name_id_map(
    reader: &mut ByteReader<'_>,
    registry: &ContentRegistry,
    pos: ChunkPos,
) -> Result<FxHashMap<u16, ContentId>, SerializationError> {
    let count = reader.u16()?;
    let mut mapping = FxHashMap::default();
    for _ in 0..count {
        let stored_id = reader.u16()?;
        let len = reader.u16()? as usize;
        let name = reader.str(len)?;
        let id = match registry.id_of(name) {
            Some(id) => id,
            None => {
                warn!(?pos, name, "unknown content name in stored chunk");
                ContentId::UNKNOWN
            }
        };
        mapping.insert(stored_id, id);
    }
    Ok(mapping)
}

fn decode_body(
    chunk: &mut Chunk,
    body: &[u8],
    mapping: Option<&FxHashMap<u16, ContentId>>,
    registry: &ContentRegistry,
) -> Result<(), SerializationError> {
    let mut reader = ByteReader::new(body);
    let content = reader.bytes(CHUNK_VOLUME * 2)?;
    let param1 = reader.bytes(CHUNK_VOLUME)?;
    let param2 = reader.bytes(CHUNK_VOLUME)?;

    if let Some(nodes) = chunk.nodes_mut() {
        for (i, node) in nodes.iter_mut().enumerate() {
            let raw = u16::from_be_bytes([content[i * 2], content[i * 2 + 1]]);
            let id = match mapping {
                Some(map) => map.get(&raw).copied().unwrap_or(ContentId::UNKNOWN),
                None if (raw as usize) < registry.len() => ContentId(raw),
                None => ContentId::UNKNOWN,
            };
            *node = Node::with_params(id, param1[i], param2[i]);
        }
    }

    let meta_count = reader.u16()?;
    for _ in 0..meta_count {
        let index = reader.node_index()?;
        let pairs = reader.u32()?;
        let mut meta = NodeMetadata::new();
        for _ in 0..pairs {
            let key_len = reader.u16()? as usize;
            let key = reader.str(key_len)?.to_string();
            let value_len = reader.u32()? as usize;
            let value = reader.str(value_len)?;
            meta.set(&key, value);
        }
        chunk.metadata.set(index, meta);
    }

    let timer_count = reader.u16()?;
    for _ in 0..timer_count {
        let index = reader.node_index()?;
        let timeout = reader.i32()? as f32 / 1000.0;
        let elapsed = reader.i32()? as f32 / 1000.0;
        chunk.timers.set(index, NodeTimer::new(timeout, elapsed));
    }

    match reader.remaining() {
        0 => Ok(()),
        n => Err(SerializationError::TrailingData(n)),
    }
}

/// Cursor over a byte slice that reports truncation as an error.
struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8], SerializationError> {
        let end = self.offset + len;
        if end > self.data.len() {
            return Err(SerializationError::Truncated {
                offset: self.offset,
                needed: end - self.data.len(),
            });
        }
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], SerializationError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, SerializationError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, SerializationError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    fn node_index(&mut self) -> Result<u16, SerializationError> {
        let index = self.u16()?;
        if usize::from(index) >= CHUNK_VOLUME {
            return Err(SerializationError::InvalidNodeIndex(index));
        }
        Ok(index)
    }

    fn u32(&mut self) -> Result<u32, SerializationError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn i32(&mut self) -> Result<i32, SerializationError> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    fn str(&mut self, len: usize) -> Result<&'a str, SerializationError> {
        std::str::from_utf8(self.bytes(len)?).map_err(|_| SerializationError::InvalidUtf8)
    }

    fn rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.offset..];
        self.offset = self.data.len();
        rest
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
