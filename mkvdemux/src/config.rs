//! Demuxer configuration.

use serde::Deserialize;

use crate::error::{MkvError, Result};

/// Maximum number of SeekHead hops followed when SeekHeads chain to each
/// other. Guards against pointer cycles in corrupt files.
pub const MAX_SEEK_HEAD_HOPS: usize = 10;

/// Maximum number of resync attempts after a mid-stream parse failure.
pub const MAX_RESYNC_ATTEMPTS: usize = 3;

/// Tunables for [`crate::MkvDemuxer`].
///
/// Every field has a sensible default, so a config file only needs to name
/// the values it changes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DemuxConfig {
    /// Size of the cursor's read page in bytes.
    pub page_size: usize,
    /// Upper bound on bytes queued ahead of the reader.
    pub max_readahead: u64,
    /// Cache size assumed when the source does not report one.
    pub default_cache_size: u64,
    /// Number of samples the reindexer aims for across the segment.
    pub reindex_samples: u32,
    /// Largest optional metadata element parsed while walking the segment.
    pub max_metadata_size: u64,
    /// Compressed bytes fed to inflate per step.
    pub inflate_chunk: usize,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            page_size: 64 * 1024,
            max_readahead: 8 * 1024 * 1024,
            default_cache_size: 16 * 1024 * 1024,
            reindex_samples: 10,
            max_metadata_size: 16 * 1024 * 1024,
            inflate_chunk: 4096,
        }
    }
}

impl DemuxConfig {
    /// Set the cursor page size.
    pub fn with_page_size(mut self, bytes: usize) -> Self {
        self.page_size = bytes;
        self
    }

    /// Set the readahead cap.
    pub fn with_max_readahead(mut self, bytes: u64) -> Self {
        self.max_readahead = bytes;
        self
    }

    /// Set the number of reindex samples.
    pub fn with_reindex_samples(mut self, samples: u32) -> Self {
        self.reindex_samples = samples;
        self
    }

    /// Set the size above which optional metadata is left to SeekHead pointers.
    pub fn with_max_metadata_size(mut self, bytes: u64) -> Self {
        self.max_metadata_size = bytes;
        self
    }

    /// Set the inflate chunk size.
    pub fn with_inflate_chunk(mut self, bytes: usize) -> Self {
        self.inflate_chunk = bytes;
        self
    }

    /// Check that no size is zero.
    pub fn validate(&self) -> Result<()> {
        let zero = [
            ("page_size", self.page_size as u64),
            ("max_readahead", self.max_readahead),
            ("default_cache_size", self.default_cache_size),
            ("reindex_samples", self.reindex_samples as u64),
            ("max_metadata_size", self.max_metadata_size),
            ("inflate_chunk", self.inflate_chunk as u64),
        ]
        .into_iter()
        .find(|&(_, value)| value == 0);

        match zero {
            Some((name, _)) => Err(MkvError::Config(format!("{name} must be non-zero"))),
            None => Ok(()),
        }
    }

    /// Readahead budget for a source reporting `cache_size`.
    pub fn readahead_budget(&self, cache_size: Option<u64>) -> u64 {
        let cache = cache_size.unwrap_or(self.default_cache_size);
        (cache / 2).clamp(1, self.max_readahead)
    }
}
