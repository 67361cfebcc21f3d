use tracing::{debug, warn};

use super::{float, sint, string, uid128, uint};
use crate::cursor::ByteCursor;
use crate::ebml::ElementHeader;
use crate::elements::*;
use crate::error::Result;
use crate::model::SegmentInfo;
use crate::source::ByteSource;
use crate::walker::{walk, Walk};

/// Parse the segment `Info` element.
pub(crate) fn parse_info<S: ByteSource>(
    c: &mut ByteCursor<S>,
    element: &ElementHeader,
) -> Result<SegmentInfo> {
    let mut info = SegmentInfo::default();

    walk(c, element.size, TOP_LEVEL_IDS, |c, h| {
        match h.id {
            TIMECODE_SCALE => {
                let scale = uint(c, h)?;
                if scale == 0 {
                    warn!("TimecodeScale of 0 ignored");
                } else {
                    info.timecode_scale = scale;
                }
            }
            DURATION => info.duration = Some(float(c, h)?),
            SEGMENT_UID => info.uid = uid128(c, h)?,
            PREV_UID => info.prev_uid = uid128(c, h)?,
            NEXT_UID => info.next_uid = uid128(c, h)?,
            SEGMENT_FILENAME => info.filename = Some(string(c, h)?),
            TITLE => info.title = Some(string(c, h)?),
            MUXING_APP => info.muxing_app = Some(string(c, h)?),
            WRITING_APP => info.writing_app = Some(string(c, h)?),
            DATE_UTC => info.date_utc = Some(sint(c, h)?),
            _ => return Ok(Walk::Skip),
        }
        Ok(Walk::Handled)
    })?;

    debug!(
        timecode_scale = info.timecode_scale,
        duration = ?info.duration,
        title = ?info.title,
        "segment info"
    );
    Ok(info)
}
