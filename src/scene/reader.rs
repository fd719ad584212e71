//! Low-level readers for the tagged binary scene format.
//!
//! A scene file is a header followed by length-prefixed blocks. Inside a
//! block every value is preceded by a varuint tag packing a field index
//! (high bits) and a value kind (low nibble).

use super::SceneError;

/// Kind of value that follows a tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TagType {
    Byte4 = 0x4,
    Length4 = 0xC,
    Id = 0xF,
}

/// Little-endian cursor over a borrowed byte slice.
#[derive(Clone, Debug)]
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], SceneError> {
        if len > self.remaining() {
            return Err(SceneError::Truncated {
                offset: self.pos,
                wanted: len,
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, SceneError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u32(&mut self) -> Result<u32, SceneError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_f64(&mut self) -> Result<f64, SceneError> {
        let bytes = self.read_bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(f64::from_le_bytes(buf))
    }

    /// LEB128 unsigned integer.
    pub fn read_varuint(&mut self) -> Result<u64, SceneError> {
        let start = self.pos;
        let mut result = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            if shift > 63 {
                return Err(SceneError::VarintOverflow { offset: start });
            }
            result |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    pub fn peek_varuint(&self) -> Option<u64> {
        self.clone().read_varuint().ok()
    }
}

/// Reader for tagged values inside one block or sub-block.
#[derive(Clone, Debug)]
pub(crate) struct TaggedReader<'a> {
    bytes: ByteReader<'a>,
}

impl<'a> TaggedReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            bytes: ByteReader::new(data),
        }
    }

    pub fn data(&mut self) -> &mut ByteReader<'a> {
        &mut self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn has_tag(&self, index: u64, tag_type: TagType) -> bool {
        self.bytes
            .peek_varuint()
            .is_some_and(|tag| tag == (index << 4) | tag_type as u64)
    }

    fn read_tag(&mut self, index: u64, tag_type: TagType) -> Result<(), SceneError> {
        let offset = self.bytes.position();
        let tag = self.bytes.read_varuint()?;
        let expected = (index << 4) | tag_type as u64;
        if tag != expected {
            return Err(SceneError::UnexpectedTag {
                offset,
                expected,
                found: tag,
            });
        }
        Ok(())
    }

    /// CRDT ids are an author byte plus a varuint counter. Item ordering is
    /// not reconstructed, so they are only validated and skipped.
    pub fn skip_id(&mut self, index: u64) -> Result<(), SceneError> {
        self.read_tag(index, TagType::Id)?;
        self.bytes.read_u8()?;
        self.bytes.read_varuint()?;
        Ok(())
    }

    pub fn read_int(&mut self, index: u64) -> Result<u32, SceneError> {
        self.read_tag(index, TagType::Byte4)?;
        self.bytes.read_u32()
    }

    pub fn read_int_optional(&mut self, index: u64) -> Result<Option<u32>, SceneError> {
        if self.has_tag(index, TagType::Byte4) {
            self.read_int(index).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Consume a length-prefixed sub-block and return a reader scoped to it.
    pub fn read_subblock(&mut self, index: u64) -> Result<TaggedReader<'a>, SceneError> {
        self.read_tag(index, TagType::Length4)?;
        let len = self.bytes.read_u32()? as usize;
        let body = self.bytes.read_bytes(len)?;
        Ok(TaggedReader::new(body))
    }

    pub fn read_subblock_optional(
        &mut self,
        index: u64,
    ) -> Result<Option<TaggedReader<'a>>, SceneError> {
        if self.has_tag(index, TagType::Length4) {
            self.read_subblock(index).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Strings are a sub-block holding a varuint length, an ASCII flag byte
    /// and the UTF-8 payload.
    pub fn read_string_optional(&mut self, index: u64) -> Result<Option<String>, SceneError> {
        let Some(mut block) = self.read_subblock_optional(index)? else {
            return Ok(None);
        };
        let data = block.data();
        let len = data.read_varuint()? as usize;
        let _is_ascii = data.read_u8()?;
        let offset = data.position();
        let raw = data.read_bytes(len)?;
        String::from_utf8(raw.to_vec())
            .map(Some)
            .map_err(|_| SceneError::InvalidUtf8 { offset })
    }
}

/// One top-level block of a scene file.
#[derive(Clone, Debug)]
pub(crate) struct RawBlock<'a> {
    pub block_type: u8,
    pub min_version: u8,
    pub current_version: u8,
    pub body: &'a [u8],
}

/// Split the post-header payload into blocks.
pub(crate) fn read_blocks(data: &[u8]) -> Result<Vec<RawBlock<'_>>, SceneError> {
    let mut reader = ByteReader::new(data);
    let mut blocks = Vec::new();

    while !reader.is_empty() {
        let len = reader.read_u32()? as usize;
        let _reserved = reader.read_u8()?;
        let min_version = reader.read_u8()?;
        let current_version = reader.read_u8()?;
        let block_type = reader.read_u8()?;
        let body = reader.read_bytes(len)?;
        blocks.push(RawBlock {
            block_type,
            min_version,
            current_version,
            body,
        });
    }

    Ok(blocks)
}
