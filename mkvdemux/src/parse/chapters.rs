use tracing::debug;

use super::{binary, flag, string, uint};
use crate::cursor::ByteCursor;
use crate::ebml::ElementHeader;
use crate::elements::*;
use crate::error::Result;
use crate::model::{
    ChapterAtom, ChapterCommand, ChapterDisplay, ChapterProcess, Edition, DEFAULT_LANGUAGE,
};
use crate::source::ByteSource;
use crate::walker::{walk, walk_nested, Walk};

/// Parse the `Chapters` element. Times are left absolute; the demuxer
/// rebases them once the first cluster timecode is known.
pub(crate) fn parse_chapters<S: ByteSource>(
    c: &mut ByteCursor<S>,
    element: &ElementHeader,
) -> Result<Vec<Edition>> {
    let mut editions = Vec::new();

    walk(c, element.size, TOP_LEVEL_IDS, |c, h| {
        if h.id != EDITION_ENTRY {
            return Ok(Walk::Skip);
        }
        editions.push(parse_edition(c, h)?);
        Ok(Walk::Handled)
    })?;

    debug!(editions = editions.len(), "chapters parsed");
    Ok(editions)
}

fn parse_edition<S: ByteSource>(c: &mut ByteCursor<S>, element: &ElementHeader) -> Result<Edition> {
    let mut edition = Edition::default();

    walk_nested(c, element.size, &[], 1, |c, h| {
        match h.id {
            EDITION_UID => edition.uid = uint(c, h)?,
            EDITION_FLAG_HIDDEN => edition.hidden = flag(c, h)?,
            EDITION_FLAG_DEFAULT => edition.default = flag(c, h)?,
            EDITION_FLAG_ORDERED => edition.ordered = flag(c, h)?,
            CHAPTER_ATOM => edition.chapters.push(parse_atom(c, h, 2)?),
            _ => return Ok(Walk::Skip),
        }
        Ok(Walk::Handled)
    })?;

    Ok(edition)
}

fn parse_atom<S: ByteSource>(
    c: &mut ByteCursor<S>,
    element: &ElementHeader,
    depth: u32,
) -> Result<ChapterAtom> {
    let mut atom = ChapterAtom::default();

    walk_nested(c, element.size, &[], depth, |c, h| {
        match h.id {
            CHAPTER_UID => atom.uid = uint(c, h)?,
            CHAPTER_STRING_UID => atom.string_uid = Some(string(c, h)?),
            CHAPTER_TIME_START => atom.start = uint(c, h)?,
            CHAPTER_TIME_END => atom.end = Some(uint(c, h)?),
            CHAPTER_FLAG_HIDDEN => atom.hidden = flag(c, h)?,
            CHAPTER_FLAG_ENABLED => atom.enabled = flag(c, h)?,
            CHAPTER_SEGMENT_UID => atom.segment_uid = Some(binary(c, h)?),
            CHAPTER_TRACK => {
                walk_nested(c, h.size, &[], depth + 1, |c, h| {
                    if h.id != CHAPTER_TRACK_NUMBER {
                        return Ok(Walk::Skip);
                    }
                    atom.tracks.push(uint(c, h)?);
                    Ok(Walk::Handled)
                })?;
            }
            CHAPTER_DISPLAY => atom.displays.push(parse_display(c, h, depth + 1)?),
            CHAP_PROCESS => atom.processes.push(parse_process(c, h, depth + 1)?),
            CHAPTER_ATOM => atom.children.push(parse_atom(c, h, depth + 1)?),
            _ => return Ok(Walk::Skip),
        }
        Ok(Walk::Handled)
    })?;

    Ok(atom)
}

fn parse_display<S: ByteSource>(
    c: &mut ByteCursor<S>,
    element: &ElementHeader,
    depth: u32,
) -> Result<ChapterDisplay> {
    let mut title = String::new();
    let mut languages = Vec::new();
    let mut countries = Vec::new();

    walk_nested(c, element.size, &[], depth, |c, h| {
        match h.id {
            CHAP_STRING => title = string(c, h)?,
            CHAP_LANGUAGE => languages.push(string(c, h)?),
            CHAP_COUNTRY => countries.push(string(c, h)?),
            _ => return Ok(Walk::Skip),
        }
        Ok(Walk::Handled)
    })?;

    if languages.is_empty() {
        languages.push(DEFAULT_LANGUAGE.to_string());
    }
    Ok(ChapterDisplay {
        title,
        languages,
        countries,
    })
}

fn parse_process<S: ByteSource>(
    c: &mut ByteCursor<S>,
    element: &ElementHeader,
    depth: u32,
) -> Result<ChapterProcess> {
    let mut process = ChapterProcess::default();

    walk_nested(c, element.size, &[], depth, |c, h| {
        match h.id {
            CHAP_PROCESS_CODEC_ID => process.codec_id = uint(c, h)?,
            CHAP_PROCESS_PRIVATE => process.private = binary(c, h)?,
            CHAP_PROCESS_COMMAND => {
                let mut command = ChapterCommand::default();
                walk_nested(c, h.size, &[], depth + 1, |c, h| {
                    match h.id {
                        CHAP_PROCESS_TIME => command.time = uint(c, h)?,
                        CHAP_PROCESS_DATA => command.data = binary(c, h)?,
                        _ => return Ok(Walk::Skip),
                    }
                    Ok(Walk::Handled)
                })?;
                process.commands.push(command);
            }
            _ => return Ok(Walk::Skip),
        }
        Ok(Walk::Handled)
    })?;

    Ok(process)
}
