use tracing::debug;

use super::{binary, flag, string, uint};
use crate::cursor::ByteCursor;
use crate::ebml::ElementHeader;
use crate::elements::*;
use crate::error::Result;
use crate::model::{SimpleTag, Tag, TagTargets};
use crate::source::ByteSource;
use crate::walker::{walk, walk_nested, Walk};

/// Parse the `Tags` element.
pub(crate) fn parse_tags<S: ByteSource>(
    c: &mut ByteCursor<S>,
    element: &ElementHeader,
) -> Result<Vec<Tag>> {
    let mut tags = Vec::new();

    walk(c, element.size, TOP_LEVEL_IDS, |c, h| {
        if h.id != TAG {
            return Ok(Walk::Skip);
        }
        let mut tag = Tag::default();
        walk_nested(c, h.size, &[], 1, |c, h| {
            match h.id {
                TARGETS => tag.targets = parse_targets(c, h)?,
                SIMPLE_TAG => tag.simple_tags.push(parse_simple_tag(c, h, 2)?),
                _ => return Ok(Walk::Skip),
            }
            Ok(Walk::Handled)
        })?;
        tags.push(tag);
        Ok(Walk::Handled)
    })?;

    debug!(tags = tags.len(), "tags parsed");
    Ok(tags)
}

fn parse_targets<S: ByteSource>(c: &mut ByteCursor<S>, element: &ElementHeader) -> Result<TagTargets> {
    let mut targets = TagTargets::default();

    walk_nested(c, element.size, &[], 2, |c, h| {
        match h.id {
            TARGET_TYPE_VALUE => targets.type_value = uint(c, h)?,
            TARGET_TYPE => targets.target_type = Some(string(c, h)?),
            TAG_TRACK_UID => targets.track_uids.push(uint(c, h)?),
            TAG_EDITION_UID => targets.edition_uids.push(uint(c, h)?),
            TAG_CHAPTER_UID => targets.chapter_uids.push(uint(c, h)?),
            TAG_ATTACHMENT_UID => targets.attachment_uids.push(uint(c, h)?),
            _ => return Ok(Walk::Skip),
        }
        Ok(Walk::Handled)
    })?;

    Ok(targets)
}

fn parse_simple_tag<S: ByteSource>(
    c: &mut ByteCursor<S>,
    element: &ElementHeader,
    depth: u32,
) -> Result<SimpleTag> {
    let mut tag = SimpleTag::default();

    walk_nested(c, element.size, &[], depth, |c, h| {
        match h.id {
            TAG_NAME => tag.name = string(c, h)?,
            TAG_LANGUAGE => tag.language = string(c, h)?,
            TAG_DEFAULT => tag.default = flag(c, h)?,
            TAG_STRING => tag.string = Some(string(c, h)?),
            TAG_BINARY => tag.binary = Some(binary(c, h)?),
            SIMPLE_TAG => tag.children.push(parse_simple_tag(c, h, depth + 1)?),
            _ => return Ok(Walk::Skip),
        }
        Ok(Walk::Handled)
    })?;

    Ok(tag)
}
