//! Recursive descent over nested EBML containers.
//!
//! Parsers call [`walk`] at the first byte of a container body and get one
//! callback per child. Nested containers are handled by calling
//! [`walk_nested`] from inside the callback with `depth + 1`.

use crate::cursor::ByteCursor;
use crate::ebml::{ElementHeader, MAX_RECURSION_DEPTH};
use crate::error::{MkvError, Result};
use crate::source::ByteSource;

/// What a walk callback did with the element it was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    /// The callback consumed the body (or part of it; the walker realigns to
    /// the element end when the size is known).
    Handled,
    /// The walker should skip the body.
    Skip,
    /// Stop walking; the cursor is left after this element.
    Stop,
}

/// Walk the children of a container at depth 0.
///
/// See [`walk_nested`].
pub fn walk<S, F>(
    cursor: &mut ByteCursor<S>,
    size: Option<u64>,
    stop_at: &[u32],
    on_element: F,
) -> Result<()>
where
    S: ByteSource,
    F: FnMut(&mut ByteCursor<S>, &ElementHeader) -> Result<Walk>,
{
    walk_nested(cursor, size, stop_at, 0, on_element)
}

/// Walk the children of a container whose body starts at the cursor.
///
/// With `size == Some(len)` the walk ends exactly at `start + len`. With
/// `size == None` (EBML unknown size) the walk ends at end of data or, without
/// consuming it, at the first child whose ID is in `stop_at`.
pub fn walk_nested<S, F>(
    cursor: &mut ByteCursor<S>,
    size: Option<u64>,
    stop_at: &[u32],
    depth: u32,
    mut on_element: F,
) -> Result<()>
where
    S: ByteSource,
    F: FnMut(&mut ByteCursor<S>, &ElementHeader) -> Result<Walk>,
{
    if depth > MAX_RECURSION_DEPTH {
        return Err(MkvError::RecursionLimit { depth });
    }

    let start = cursor.tell();
    let end = match size {
        Some(len) => Some(
            start
                .checked_add(len)
                .ok_or_else(|| MkvError::malformed(start, "container size overflows"))?,
        ),
        None => None,
    };

    loop {
        match end {
            Some(end) if cursor.tell() >= end => break,
            None if cursor.at_end() => break,
            _ => {}
        }

        let header = cursor.read_element_header()?;

        if end.is_none() && stop_at.contains(&header.id) {
            cursor.seek(header.position);
            break;
        }

        let child_end = match (header.end(), end) {
            (Some(child_end), Some(end)) if child_end > end => {
                return Err(MkvError::malformed(
                    header.position,
                    format!(
                        "element 0x{:X} ends at {} past its parent end {}",
                        header.id, child_end, end
                    ),
                ));
            }
            (Some(child_end), _) => Some(child_end),
            // An unknown-size child of a bounded parent extends to the parent end.
            (None, parent_end) => parent_end,
        };

        if cursor.tell() > end.unwrap_or(u64::MAX) {
            return Err(MkvError::malformed(
                header.position,
                "element header crosses its parent end",
            ));
        }

        match on_element(cursor, &header)? {
            Walk::Handled => {
                if let Some(child_end) = child_end {
                    cursor.seek(child_end);
                }
            }
            Walk::Skip => match child_end {
                Some(child_end) => cursor.seek(child_end),
                None => {
                    return Err(MkvError::malformed(
                        header.position,
                        format!("cannot skip unknown-size element 0x{:X}", header.id),
                    ))
                }
            },
            Walk::Stop => {
                if let Some(child_end) = child_end {
                    cursor.seek(child_end);
                }
                break;
            }
        }
    }

    Ok(())
}
