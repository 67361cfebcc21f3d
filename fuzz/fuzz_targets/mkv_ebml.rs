#![no_main]

//! Fuzz target for EBML parsing.
//!
//! Feeds arbitrary bytes to the VINT, element ID and element header readers,
//! and checks that encoding round-trips.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mkvdemux::cursor::ByteCursor;
use mkvdemux::ebml;
use mkvdemux::MemorySource;

#[derive(Arbitrary, Debug)]
struct EbmlInput {
    data: Vec<u8>,
    operation: EbmlOperation,
}

#[derive(Arbitrary, Debug)]
enum EbmlOperation {
    /// Parse a variable-length integer
    ReadVint,
    /// Parse a signed variable-length integer
    ReadSignedVint,
    /// Parse an element ID through the cursor
    ReadElementId,
    /// Parse a full element header (ID + size)
    ReadElementHeader,
    /// Round-trip encode/decode VINT
    VintRoundtrip { value: u64 },
    /// Scan for the Cluster signature from an offset
    ScanCluster { from: u16 },
}

fn cursor(data: &[u8]) -> ByteCursor<MemorySource<&[u8]>> {
    ByteCursor::new(MemorySource::new(data), 256)
}

fuzz_target!(|input: EbmlInput| {
    if input.data.len() > 64 * 1024 {
        return;
    }

    match input.operation {
        EbmlOperation::ReadVint => {
            let _ = ebml::parse_vint(&input.data, 0);
        }

        EbmlOperation::ReadSignedVint => {
            let _ = ebml::parse_signed_vint(&input.data, 0);
        }

        EbmlOperation::ReadElementId => {
            let _ = cursor(&input.data).read_id();
        }

        EbmlOperation::ReadElementHeader => {
            let mut c = cursor(&input.data);
            while let Ok(header) = c.read_element_header() {
                match header.end() {
                    Some(end) if end > c.tell() => c.seek(end),
                    _ => break,
                }
            }
        }

        EbmlOperation::VintRoundtrip { value } => {
            let value = value & 0x00FF_FFFF_FFFF_FFFF;

            if let Ok((encoded, len)) = ebml::encode_vint(value) {
                let (decoded, decoded_len) =
                    ebml::parse_vint(&encoded[..len], 0).expect("encoded VINT parses");
                assert_eq!(value, decoded, "VINT round-trip mismatch");
                assert_eq!(len, decoded_len, "VINT length mismatch");
            }
        }

        EbmlOperation::ScanCluster { from } => {
            let mut c = cursor(&input.data);
            if let Ok(Some(found)) = c.scan(from as u64, mkvdemux::elements::CLUSTER_SIGNATURE) {
                assert!(found >= from as u64);
                assert!(found + 4 <= input.data.len() as u64);
            }
        }
    }
});
