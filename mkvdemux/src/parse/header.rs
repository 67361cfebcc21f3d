use tracing::{debug, warn};

use super::{string, uint};
use crate::cursor::ByteCursor;
use crate::ebml::{EbmlHeader, MAX_ID_LENGTH, MAX_VINT_LENGTH};
use crate::elements::*;
use crate::error::{MkvError, Result};
use crate::source::ByteSource;
use crate::walker::{walk, Walk};

/// Highest DocTypeReadVersion this demuxer knows how to read.
const SUPPORTED_READ_VERSION: u64 = 4;

/// Read and validate the EBML header at the cursor.
pub(crate) fn parse_ebml_header<S: ByteSource>(c: &mut ByteCursor<S>) -> Result<EbmlHeader> {
    let element = c
        .read_element_header()
        .map_err(|e| MkvError::InvalidEbmlHeader(e.to_string()))?;
    if element.id != EBML {
        return Err(MkvError::InvalidEbmlHeader(format!(
            "expected EBML element, found 0x{:X}",
            element.id
        )));
    }

    let mut header = EbmlHeader::default();
    let mut doc_type = None;

    walk(c, element.size, &[SEGMENT], |c, h| {
        match h.id {
            EBML_VERSION => header.version = uint(c, h)?,
            EBML_READ_VERSION => header.read_version = uint(c, h)?,
            EBML_MAX_ID_LENGTH => header.max_id_length = uint(c, h)?,
            EBML_MAX_SIZE_LENGTH => header.max_size_length = uint(c, h)?,
            DOC_TYPE => doc_type = Some(string(c, h)?),
            DOC_TYPE_VERSION => header.doc_type_version = uint(c, h)?,
            DOC_TYPE_READ_VERSION => header.doc_type_read_version = uint(c, h)?,
            _ => return Ok(Walk::Skip),
        }
        Ok(Walk::Handled)
    })?;

    // A missing DocType defaults to "matroska".
    if let Some(doc_type) = doc_type {
        header.doc_type = doc_type;
    }

    if !header.is_matroska() && !header.is_webm() {
        return Err(MkvError::UnsupportedDocType(header.doc_type));
    }
    if header.read_version > 1 {
        return Err(MkvError::InvalidEbmlHeader(format!(
            "EBMLReadVersion {} not supported",
            header.read_version
        )));
    }
    if header.max_id_length > MAX_ID_LENGTH as u64 || header.max_size_length > MAX_VINT_LENGTH as u64
    {
        return Err(MkvError::InvalidEbmlHeader(format!(
            "EBMLMaxIDLength {} / EBMLMaxSizeLength {} out of range",
            header.max_id_length, header.max_size_length
        )));
    }
    if header.doc_type_read_version > SUPPORTED_READ_VERSION {
        warn!(
            doc_type = %header.doc_type,
            read_version = header.doc_type_read_version,
            "DocTypeReadVersion is newer than supported, continuing"
        );
    }

    debug!(
        doc_type = %header.doc_type,
        version = header.doc_type_version,
        "EBML header"
    );
    Ok(header)
}
