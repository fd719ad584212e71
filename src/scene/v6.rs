//! Reader for the version 6 scene tree format.

use log::debug;

use super::reader::{RawBlock, TaggedReader, read_blocks};
use super::{RawGlyphRun, SceneError, SceneParser};

/// Fixed-width ASCII header, space padded.
pub(crate) const HEADER_V6: &[u8; 43] = b"reMarkable .lines file, version=6          ";
const HEADER_PREFIX: &[u8] = b"reMarkable .lines file, version=";

pub(crate) const BLOCK_GLYPH_ITEM: u8 = 0x03;
pub(crate) const ITEM_TYPE_GLYPH: u8 = 0x01;

/// Highest glyph block revision this reader was written against.
const KNOWN_GLYPH_BLOCK_VERSION: u8 = 1;

/// Parses v6 scene files, yielding glyph ranges in file order.
#[derive(Clone, Copy, Debug, Default)]
pub struct V6SceneParser;

impl SceneParser for V6SceneParser {
    fn parse_glyph_runs(&self, data: &[u8]) -> Result<Vec<RawGlyphRun>, SceneError> {
        let body = strip_header(data)?;
        let mut runs = Vec::new();

        for block in read_blocks(body)? {
            if block.block_type != BLOCK_GLYPH_ITEM {
                continue;
            }
            if block.min_version > KNOWN_GLYPH_BLOCK_VERSION {
                debug!(
                    "Glyph block v{} requires reader v{} (known v{}), reading best-effort",
                    block.current_version, block.min_version, KNOWN_GLYPH_BLOCK_VERSION
                );
            }
            if let Some(run) = parse_glyph_block(&block)? {
                runs.push(run);
            }
        }

        Ok(runs)
    }
}

fn strip_header(data: &[u8]) -> Result<&[u8], SceneError> {
    if data.starts_with(HEADER_V6) {
        return Ok(&data[HEADER_V6.len()..]);
    }

    if data.starts_with(HEADER_PREFIX) {
        let tail = &data[HEADER_PREFIX.len()..data.len().min(HEADER_V6.len())];
        let version = String::from_utf8_lossy(tail).trim().to_string();
        return Err(SceneError::UnsupportedVersion(version));
    }

    Err(SceneError::BadHeader)
}

/// A glyph item block carries CRDT bookkeeping followed by an optional value
/// sub-block. Deleted items have no value.
fn parse_glyph_block(block: &RawBlock<'_>) -> Result<Option<RawGlyphRun>, SceneError> {
    let mut reader = TaggedReader::new(block.body);
    reader.skip_id(1)?; // parent
    reader.skip_id(2)?; // item
    reader.skip_id(3)?; // left neighbour
    reader.skip_id(4)?; // right neighbour
    let _deleted_length = reader.read_int(5)?;

    if reader.is_empty() {
        return Ok(None);
    }
    let Some(mut value) = reader.read_subblock_optional(6)? else {
        return Ok(None);
    };

    let item_type = value.data().read_u8()?;
    if item_type != ITEM_TYPE_GLYPH {
        return Err(SceneError::ItemTypeMismatch {
            expected: ITEM_TYPE_GLYPH,
            found: item_type,
        });
    }

    let _start = value.read_int_optional(2)?;
    let _length = value.read_int(3)?;
    let color = value.read_int(4)?;
    let text = value.read_string_optional(5)?.unwrap_or_default();

    let mut y = None;
    if let Some(mut rects) = value.read_subblock_optional(6)? {
        let data = rects.data();
        let count = data.read_varuint()?;
        if count > 0 {
            let _x = data.read_f64()?;
            y = Some(data.read_f64()?);
        }
    }

    Ok(Some(RawGlyphRun { text, y, color }))
}
