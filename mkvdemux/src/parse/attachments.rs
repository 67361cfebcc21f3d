use tracing::{debug, warn};

use super::{leaf_size, string, uint};
use crate::cursor::ByteCursor;
use crate::ebml::ElementHeader;
use crate::elements::*;
use crate::error::Result;
use crate::model::Attachment;
use crate::source::ByteSource;
use crate::walker::{walk, walk_nested, Walk};

/// Parse the `Attachments` element. File data is located, not read.
pub(crate) fn parse_attachments<S: ByteSource>(
    c: &mut ByteCursor<S>,
    element: &ElementHeader,
) -> Result<Vec<Attachment>> {
    let mut attachments = Vec::new();

    walk(c, element.size, TOP_LEVEL_IDS, |c, h| {
        if h.id != ATTACHED_FILE {
            return Ok(Walk::Skip);
        }
        let mut file = Attachment::default();
        let mut has_data = false;
        walk_nested(c, h.size, &[], 1, |c, h| {
            match h.id {
                FILE_UID => file.uid = uint(c, h)?,
                FILE_NAME => file.name = string(c, h)?,
                FILE_MEDIA_TYPE => file.mime_type = string(c, h)?,
                FILE_DESCRIPTION => file.description = Some(string(c, h)?),
                FILE_DATA => {
                    file.position = h.data_offset();
                    file.length = leaf_size(h)?;
                    has_data = true;
                    return Ok(Walk::Skip);
                }
                _ => return Ok(Walk::Skip),
            }
            Ok(Walk::Handled)
        })?;

        if has_data {
            attachments.push(file);
        } else {
            warn!(name = %file.name, "attachment without FileData ignored");
        }
        Ok(Walk::Handled)
    })?;

    debug!(attachments = attachments.len(), "attachments parsed");
    Ok(attachments)
}
