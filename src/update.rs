// Snapshot update driver.
//
// Given the sequence number of the caller's last decompressed OAB file and the
// blocks the server advertises, decide between "nothing to do", "apply this
// chain of diffs" and "download the full file", then carry the decision out
// in a cache directory. A failed patch chain silently degrades to the full
// download.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::io::{inflate_file, patch_file};
use crate::oab::{DecodeOptions, DecodeStats, DecodedRecord, OabDecoder};

// ---------------------------------------------------------------------------
// Descriptors and plans
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// Complete compressed OAB file.
    Full,
    /// Patch from `sequence - 1` to `sequence`.
    Diff,
}

/// One downloadable block as advertised by the server manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDescriptor {
    pub kind: BlockKind,
    pub sequence: u32,
    /// Download size in bytes.
    pub size: u64,
    pub filename: String,
}

impl BlockDescriptor {
    pub fn full(sequence: u32, size: u64, filename: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Full,
            sequence,
            size,
            filename: filename.into(),
        }
    }

    pub fn diff(sequence: u32, size: u64, filename: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Diff,
            sequence,
            size,
            filename: filename.into(),
        }
    }
}

/// A decompressed OAB file on disk and the sequence it corresponds to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSnapshot {
    pub path: PathBuf,
    pub sequence: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdatePlan {
    UpToDate,
    /// Apply `chain` in order; `full` is the fallback.
    ApplyDiffs {
        chain: Vec<BlockDescriptor>,
        full: BlockDescriptor,
    },
    DownloadFull(BlockDescriptor),
}

impl UpdatePlan {
    /// Sequence the plan ends at, `None` when already up to date.
    pub fn target_sequence(&self) -> Option<u32> {
        match self {
            Self::UpToDate => None,
            Self::ApplyDiffs { full, .. } | Self::DownloadFull(full) => Some(full.sequence),
        }
    }
}

/// Choose how to get from `current` to the newest advertised full file.
pub fn plan_update(current: Option<u32>, descriptors: &[BlockDescriptor]) -> Result<UpdatePlan> {
    let full = descriptors
        .iter()
        .filter(|d| d.kind == BlockKind::Full)
        .max_by_key(|d| d.sequence)
        .ok_or_else(|| Error::format("manifest lists no full block"))?;

    let Some(current) = current else {
        info!("no local snapshot, downloading full sequence {}", full.sequence);
        return Ok(UpdatePlan::DownloadFull(full.clone()));
    };
    if current >= full.sequence {
        debug!("local sequence {current} is current (server {})", full.sequence);
        return Ok(UpdatePlan::UpToDate);
    }

    let mut chain: Vec<BlockDescriptor> = descriptors
        .iter()
        .filter(|d| d.kind == BlockKind::Diff)
        .filter(|d| d.sequence > current && d.sequence <= full.sequence)
        .cloned()
        .collect();
    chain.sort_by_key(|d| d.sequence);
    chain.dedup_by_key(|d| d.sequence);

    let diff_total: u64 = chain.iter().map(|d| d.size).sum();
    if chain.is_empty() || diff_total >= full.size {
        info!(
            "{} diff(s) totalling {diff_total} bytes vs full {} bytes, downloading full",
            chain.len(),
            full.size
        );
        return Ok(UpdatePlan::DownloadFull(full.clone()));
    }

    let contiguous = chain
        .iter()
        .zip(current + 1..)
        .all(|(d, expected)| d.sequence == expected);
    if !contiguous || chain.last().map(|d| d.sequence) != Some(full.sequence) {
        info!(
            "diff chain from {current} to {} has a gap, downloading full",
            full.sequence
        );
        return Ok(UpdatePlan::DownloadFull(full.clone()));
    }

    info!(
        "applying {} diff(s) ({diff_total} bytes) from {current} to {}",
        chain.len(),
        full.sequence
    );
    Ok(UpdatePlan::ApplyDiffs {
        chain,
        full: full.clone(),
    })
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Source of block bytes; implemented by the network layer.
pub trait BlockFetcher {
    /// Store the compressed bytes of `block` at `dest`.
    fn fetch(&mut self, block: &BlockDescriptor, dest: &Path) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct UpdateOptions {
    /// Directory for downloads, intermediate and final snapshots.
    pub cache_dir: PathBuf,
    /// Snapshots are named `{file_prefix}-{sequence}.oab`.
    pub file_prefix: String,
    pub decode: DecodeOptions,
}

impl UpdateOptions {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            file_prefix: "oab".to_string(),
            decode: DecodeOptions::default(),
        }
    }
}

/// Outcome of [`UpdateDriver::sync`].
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub snapshot: LocalSnapshot,
    /// New watermark to persist.
    pub sequence: u32,
    /// `None` when the local snapshot was already current.
    pub stats: Option<DecodeStats>,
}

pub struct UpdateDriver<F> {
    fetcher: F,
    options: UpdateOptions,
}

impl<F: BlockFetcher> UpdateDriver<F> {
    pub fn new(fetcher: F, options: UpdateOptions) -> Self {
        Self { fetcher, options }
    }

    pub fn options(&self) -> &UpdateOptions {
        &self.options
    }

    pub fn into_fetcher(self) -> F {
        self.fetcher
    }

    fn snapshot_path(&self, sequence: u32) -> PathBuf {
        self.options
            .cache_dir
            .join(format!("{}-{sequence}.oab", self.options.file_prefix))
    }

    fn download_path(&self, block: &BlockDescriptor) -> Result<PathBuf> {
        let name = Path::new(&block.filename)
            .file_name()
            .ok_or_else(|| Error::format(format!("bad block filename {:?}", block.filename)))?;
        Ok(self.options.cache_dir.join(name))
    }

    /// Produce an up-to-date plaintext snapshot.
    ///
    /// `base` is never deleted. Downloaded blocks and intermediate snapshots
    /// are removed once consumed.
    pub fn materialize(
        &mut self,
        base: Option<&LocalSnapshot>,
        descriptors: &[BlockDescriptor],
        cancel: &CancelToken,
    ) -> Result<LocalSnapshot> {
        cancel.check()?;
        let plan = plan_update(base.map(|b| b.sequence), descriptors)?;
        match (plan, base) {
            (UpdatePlan::UpToDate, Some(base)) => Ok(base.clone()),
            (UpdatePlan::UpToDate, None) => Err(Error::format("up to date without a snapshot")),
            (UpdatePlan::DownloadFull(full), _) => self.download_full(&full, cancel),
            (UpdatePlan::ApplyDiffs { chain, full }, Some(base)) => {
                match self.apply_chain(base, &chain, cancel) {
                    Ok(snapshot) => Ok(snapshot),
                    Err(e) if e.is_cancelled() => Err(e),
                    Err(e) => {
                        warn!("patch chain failed ({e}), falling back to full download");
                        self.download_full(&full, cancel)
                    }
                }
            }
            (UpdatePlan::ApplyDiffs { full, .. }, None) => self.download_full(&full, cancel),
        }
    }

    /// Materialize, then run a decode pass over the result.
    ///
    /// The returned sequence is only handed out after the pass succeeds.
    pub fn sync<Fl, S>(
        &mut self,
        base: Option<&LocalSnapshot>,
        descriptors: &[BlockDescriptor],
        filter: Fl,
        sink: S,
        cancel: &CancelToken,
    ) -> Result<SyncReport>
    where
        Fl: FnMut(u64, &str) -> bool,
        S: FnMut(DecodedRecord) -> Result<()>,
    {
        let snapshot = self.materialize(base, descriptors, cancel)?;
        if base.is_some_and(|b| b.sequence == snapshot.sequence) {
            return Ok(SyncReport {
                sequence: snapshot.sequence,
                snapshot,
                stats: None,
            });
        }

        let stats = OabDecoder::open(&snapshot.path)?
            .with_options(self.options.decode)
            .decode(filter, sink, cancel)?;
        info!(
            "synced to sequence {}: {} record(s)",
            snapshot.sequence, stats.emitted
        );
        Ok(SyncReport {
            sequence: snapshot.sequence,
            snapshot,
            stats: Some(stats),
        })
    }

    fn download_full(
        &mut self,
        full: &BlockDescriptor,
        cancel: &CancelToken,
    ) -> Result<LocalSnapshot> {
        cancel.check()?;
        let compressed = self.download_path(full)?;
        self.fetcher.fetch(full, &compressed)?;
        cancel.check()?;

        let path = self.snapshot_path(full.sequence);
        let result = inflate_file(&compressed, &path);
        remove_quietly(&compressed);
        let stats = result?;
        debug!(
            "full sequence {} inflated to {} bytes",
            full.sequence, stats.output_size
        );
        Ok(LocalSnapshot {
            path,
            sequence: full.sequence,
        })
    }

    fn apply_chain(
        &mut self,
        base: &LocalSnapshot,
        chain: &[BlockDescriptor],
        cancel: &CancelToken,
    ) -> Result<LocalSnapshot> {
        let mut current = base.clone();
        for diff in chain {
            let step = self.apply_diff(&current, diff, cancel);
            // Intermediate snapshots are ours to delete, the base is not.
            if current.path != base.path {
                remove_quietly(&current.path);
            }
            current = step?;
        }
        Ok(current)
    }

    fn apply_diff(
        &mut self,
        current: &LocalSnapshot,
        diff: &BlockDescriptor,
        cancel: &CancelToken,
    ) -> Result<LocalSnapshot> {
        cancel.check()?;
        let patch = self.download_path(diff)?;
        self.fetcher.fetch(diff, &patch)?;
        cancel.check()?;

        let path = self.snapshot_path(diff.sequence);
        let result = patch_file(&current.path, &patch, &path);
        remove_quietly(&patch);
        if let Err(e) = result {
            remove_quietly(&path);
            return Err(e);
        }
        debug!("applied diff {} -> {}", current.sequence, diff.sequence);
        Ok(LocalSnapshot {
            path,
            sequence: diff.sequence,
        })
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        debug!("could not remove {}: {e}", path.display());
    }
}
