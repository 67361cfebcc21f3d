//! Cue index: a sorted table of (time, cluster position) pairs.
//!
//! The table comes from the `Cues` element when the file has one. Otherwise
//! [`reindex`] samples the segment for Cluster signatures and builds a
//! coarse synthetic table that seeks refine as they walk clusters.

use tracing::{debug, trace};

use crate::cursor::ByteCursor;
use crate::ebml::ElementHeader;
use crate::elements::*;
use crate::error::Result;
use crate::parse::uint;
use crate::source::ByteSource;
use crate::walker::{walk, walk_nested, Walk};

/// Number of leading cluster children searched for a Timecode when
/// validating a cluster candidate.
const PROBE_CHILDREN: usize = 8;

/// A seek point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cue {
    /// Time in segment ticks.
    pub time: u64,
    /// Cluster position relative to the segment data start.
    pub position: u64,
    /// Track the cue was written for.
    pub track: Option<u64>,
    /// Block position relative to the cluster data start.
    pub relative_position: Option<u64>,
    /// Duration of the referenced block in ticks.
    pub duration: Option<u64>,
    /// Block number within the cluster (1-based).
    pub block_number: Option<u64>,
}

impl Cue {
    /// A cue carrying only a time and a cluster position.
    pub fn at(time: u64, position: u64) -> Self {
        Self {
            time,
            position,
            track: None,
            relative_position: None,
            duration: None,
            block_number: None,
        }
    }
}

/// Sorted cue table.
#[derive(Debug, Clone, Default)]
pub struct CueIndex {
    cues: Vec<Cue>,
    synthetic: bool,
}

impl CueIndex {
    /// Build an index from cues in file order, fixing up ordering and
    /// removing exact duplicates.
    pub fn new(mut cues: Vec<Cue>) -> Self {
        let sorted = cues.windows(2).all(|w| w[0].time <= w[1].time);
        if !sorted {
            debug!("cue table out of order, sorting");
        }
        cues.sort_by_key(|cue| (cue.time, cue.position));
        cues.dedup();
        Self {
            cues,
            synthetic: false,
        }
    }

    fn synthetic(cues: Vec<Cue>) -> Self {
        Self {
            synthetic: true,
            ..Self::new(cues)
        }
    }

    /// Whether the index was rebuilt by scanning rather than read from Cues.
    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    /// Number of cues.
    pub fn len(&self) -> usize {
        self.cues.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// All cues, ascending by time.
    pub fn as_slice(&self) -> &[Cue] {
        &self.cues
    }

    /// Cue at `index`.
    pub fn get(&self, index: usize) -> Option<&Cue> {
        self.cues.get(index)
    }

    /// Index of the last cue with `time <= ticks`, or the first cue when all
    /// cues are later.
    pub fn lookup(&self, ticks: u64) -> Option<usize> {
        if self.cues.is_empty() {
            return None;
        }
        let after = self.cues.partition_point(|cue| cue.time <= ticks);
        Some(after.saturating_sub(1))
    }

    /// Insert a cue discovered while seeking; returns its index. A cue for
    /// an already indexed cluster is not duplicated.
    pub(crate) fn insert(&mut self, cue: Cue) -> usize {
        if let Some(existing) = self.cues.iter().position(|c| c.position == cue.position) {
            return existing;
        }
        let at = self
            .cues
            .partition_point(|c| (c.time, c.position) < (cue.time, cue.position));
        self.cues.insert(at, cue);
        at
    }
}

/// Parse the `Cues` element into file-order cues.
pub(crate) fn parse_cues<S: ByteSource>(
    c: &mut ByteCursor<S>,
    element: &ElementHeader,
) -> Result<Vec<Cue>> {
    let mut cues = Vec::new();

    walk(c, element.size, TOP_LEVEL_IDS, |c, h| {
        if h.id != CUE_POINT {
            return Ok(Walk::Skip);
        }
        let mut time = None;
        let mut positions = Vec::new();
        walk_nested(c, h.size, &[], 1, |c, h| {
            match h.id {
                CUE_TIME => time = Some(uint(c, h)?),
                CUE_TRACK_POSITIONS => {
                    let mut cue = Cue::at(0, u64::MAX);
                    walk_nested(c, h.size, &[], 2, |c, h| {
                        match h.id {
                            CUE_TRACK => cue.track = Some(uint(c, h)?),
                            CUE_CLUSTER_POSITION => cue.position = uint(c, h)?,
                            CUE_RELATIVE_POSITION => cue.relative_position = Some(uint(c, h)?),
                            CUE_DURATION => cue.duration = Some(uint(c, h)?),
                            CUE_BLOCK_NUMBER => cue.block_number = Some(uint(c, h)?),
                            _ => return Ok(Walk::Skip),
                        }
                        Ok(Walk::Handled)
                    })?;
                    if cue.position != u64::MAX {
                        positions.push(cue);
                    }
                }
                _ => return Ok(Walk::Skip),
            }
            Ok(Walk::Handled)
        })?;

        if let Some(time) = time {
            cues.extend(positions.into_iter().map(|cue| Cue { time, ..cue }));
        }
        Ok(Walk::Handled)
    })?;

    debug!(cues = cues.len(), "cues parsed");
    Ok(cues)
}

/// A cluster header that passed validation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ClusterProbe {
    pub header: ElementHeader,
    pub timecode: u64,
}

/// Check whether a well-formed Cluster starts at `pos`.
///
/// The size must be unknown or stay within `segment_end`, and a Timecode
/// must appear among the first children. Damaged data yields `Ok(None)`;
/// only I/O errors are returned.
pub(crate) fn probe_cluster<S: ByteSource>(
    c: &mut ByteCursor<S>,
    pos: u64,
    segment_end: u64,
) -> Result<Option<ClusterProbe>> {
    match probe_cluster_inner(c, pos, segment_end) {
        Ok(probe) => Ok(probe),
        Err(e) if e.is_corruption() => Ok(None),
        Err(e) => Err(e),
    }
}

fn probe_cluster_inner<S: ByteSource>(
    c: &mut ByteCursor<S>,
    pos: u64,
    segment_end: u64,
) -> Result<Option<ClusterProbe>> {
    c.seek(pos);
    let header = c.read_element_header()?;
    if header.id != CLUSTER {
        return Ok(None);
    }
    let body_end = match header.end() {
        Some(end) if end > segment_end => return Ok(None),
        Some(end) => end,
        None => segment_end,
    };

    for _ in 0..PROBE_CHILDREN {
        if c.tell() >= body_end {
            break;
        }
        let child = c.read_element_header()?;
        match (child.id, child.end()) {
            (TIMECODE, Some(end)) if end <= body_end => {
                let timecode = c.read_uint(end - child.data_offset())?;
                return Ok(Some(ClusterProbe { header, timecode }));
            }
            (SIMPLE_BLOCK | BLOCK_GROUP, _) => break,
            (_, Some(end)) if end <= body_end => c.seek(end),
            _ => break,
        }
    }

    Ok(None)
}

/// Rebuild a cue table by sampling the segment for clusters.
///
/// The range from the first cluster to the segment end is split into
/// `samples` strides; each stride contributes at most one validated cluster.
pub(crate) fn reindex<S: ByteSource>(
    c: &mut ByteCursor<S>,
    segment_start: u64,
    first_cluster: u64,
    segment_end: u64,
    samples: u32,
) -> Result<CueIndex> {
    let mut cues = Vec::new();

    if let Some(probe) = probe_cluster(c, first_cluster, segment_end)? {
        cues.push(Cue::at(probe.timecode, first_cluster - segment_start));
    }

    let span = segment_end.saturating_sub(first_cluster);
    let stride = (span / samples.max(1) as u64).max(1);

    'strides: for i in 1..samples as u64 {
        let stride_start = first_cluster + i * stride;
        if stride_start >= segment_end {
            break;
        }
        let stride_end = (stride_start + stride).min(segment_end);

        let mut from = stride_start;
        while from < stride_end {
            let Some(candidate) = c.scan(from, CLUSTER_SIGNATURE)? else {
                break 'strides;
            };
            if candidate >= stride_end {
                break;
            }
            if let Some(probe) = probe_cluster(c, candidate, segment_end)? {
                trace!(position = candidate, timecode = probe.timecode, "reindexed cluster");
                cues.push(Cue::at(probe.timecode, candidate - segment_start));
                break;
            }
            from = candidate + 1;
        }
    }

    let index = CueIndex::synthetic(cues);
    debug!(cues = index.len(), "reindexed segment");
    Ok(index)
}
