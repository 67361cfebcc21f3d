use tracing::trace;

use super::{binary, uint};
use crate::cursor::ByteCursor;
use crate::ebml::{self, ElementHeader};
use crate::elements::*;
use crate::error::Result;
use crate::source::ByteSource;
use crate::walker::{walk, walk_nested, Walk};

/// One SeekHead entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SeekEntry {
    /// Element ID the entry points at.
    pub id: u32,
    /// Position relative to the segment data start.
    pub position: u64,
}

/// Parse a `SeekHead` element. Incomplete entries are dropped.
pub(crate) fn parse_seek_head<S: ByteSource>(
    c: &mut ByteCursor<S>,
    element: &ElementHeader,
) -> Result<Vec<SeekEntry>> {
    let mut entries = Vec::new();

    walk(c, element.size, TOP_LEVEL_IDS, |c, h| {
        if h.id != SEEK {
            return Ok(Walk::Skip);
        }
        let mut id = None;
        let mut position = None;
        walk_nested(c, h.size, &[], 1, |c, h| {
            match h.id {
                SEEK_ID => {
                    let raw = binary(c, h)?;
                    if (1..=4).contains(&raw.len()) {
                        id = Some(ebml::read_unsigned_int(&raw) as u32);
                    }
                }
                SEEK_POSITION => position = Some(uint(c, h)?),
                _ => return Ok(Walk::Skip),
            }
            Ok(Walk::Handled)
        })?;

        if let (Some(id), Some(position)) = (id, position) {
            trace!(element = top_level_name(id), position, "seek entry");
            entries.push(SeekEntry { id, position });
        }
        Ok(Walk::Handled)
    })?;

    Ok(entries)
}
