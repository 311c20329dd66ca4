//! Temporal correlation between photographs and spectroradiometer scans.
//!
//! A dataset is laid out on disk as:
//!
//! ```text
//! <root>/<YYYY-MM-DD>/HDR/<HH.MM.SS>.<ext>            one photograph per capture
//! <root>/<YYYY-MM-DD>/HDR/<HH.MM.SS>/<...>.<ext>      one photograph per exposure
//! <root>/<YYYY-MM-DD>/ASD/<HH.MM.SS>/<index>_<...>.txt one scan per sampling direction
//! ```
//!
//! The camera and the spectroradiometer keep their own clocks, so a scan
//! directory belongs to a photograph capture when their timestamps agree
//! within the configured capture epsilon.

use crate::{config::Configuration, error::ErrorKind};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tracing::debug;

/// Name of the photograph directory of a capture date.
pub const PHOTO_DIR: &str = "HDR";

/// Name of the scan directory of a capture date.
pub const SCAN_DIR: &str = "ASD";

/// Extension of converted scan files.
pub const SCAN_EXTENSION: &str = "txt";

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H.%M.%S";

#[derive(Clone, Debug, Error)]
pub enum CorrelateError {
    #[error("failed to list {path:?}: {source}")]
    Listing {
        path: PathBuf,
        source: Arc<io::Error>,
    },
    #[error("no scan directory within {epsilon}s of {capture}")]
    NoScanDirectory { capture: NaiveDateTime, epsilon: f64 },
    #[error("scan directory {path:?} holds {found} scans but the sampling pattern has {expected}")]
    ScanCountMismatch {
        path: PathBuf,
        found: usize,
        expected: usize,
    },
    #[error("scan directory {path:?} has no scan for sample {index}")]
    NoScanFile { path: PathBuf, index: usize },
    #[error("scan {path:?} does not belong to sample {index}")]
    ScanIndexMismatch { path: PathBuf, index: usize },
    #[error("no photograph at {path:?}")]
    NoPhoto { path: PathBuf },
    #[error("exposure {exposure} is not in the exposure list")]
    UnknownExposure { exposure: f64 },
    #[error("{path:?} has no photograph for exposure {exposure} at position {index}")]
    NoExposurePhoto {
        path: PathBuf,
        exposure: f64,
        index: usize,
    },
}

impl CorrelateError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::NotFound
    }
}

/// Something that happened at a known local instant.
pub trait Timed {
    fn time(&self) -> NaiveDateTime;
}

impl Timed for NaiveDateTime {
    fn time(&self) -> NaiveDateTime {
        *self
    }
}

/// Enumerates directory contents for the correlator.
///
/// Implementations return entries in a stable order. The correlator breaks
/// ties by taking the first match, so the order decides which entry wins.
pub trait DirectoryListing {
    /// Immediate subdirectories of `path`.
    fn directories(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Files in `path`, optionally restricted to a case-insensitive extension.
    fn files(&self, path: &Path, extension: Option<&str>) -> io::Result<Vec<PathBuf>>;
}

/// [`DirectoryListing`] over the local file system, sorted by name.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsListing;

impl FsListing {
    fn entries(
        path: &Path,
        keep: impl Fn(&std::fs::DirEntry) -> io::Result<bool>,
    ) -> io::Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            if keep(&entry)? {
                entries.push(entry.path());
            }
        }

        entries.sort();
        Ok(entries)
    }
}

impl DirectoryListing for FsListing {
    fn directories(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        Self::entries(path, |entry| Ok(entry.file_type()?.is_dir()))
    }

    fn files(&self, path: &Path, extension: Option<&str>) -> io::Result<Vec<PathBuf>> {
        Self::entries(path, |entry| {
            Ok(entry.file_type()?.is_file() && has_extension(&entry.path(), extension))
        })
    }
}

fn has_extension(path: &Path, extension: Option<&str>) -> bool {
    match extension {
        None => true,
        Some(extension) => path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension)),
    }
}

/// Paths within a dataset directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetLayout {
    root: PathBuf,
}

impl DatasetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn date_dir(&self, date: NaiveDate) -> PathBuf {
        self.root.join(date.format(DATE_FORMAT).to_string())
    }

    pub fn photo_dir(&self, date: NaiveDate) -> PathBuf {
        self.date_dir(date).join(PHOTO_DIR)
    }

    pub fn scan_root(&self, date: NaiveDate) -> PathBuf {
        self.date_dir(date).join(SCAN_DIR)
    }

    /// Expected path of the photograph taken at `capture`.
    pub fn photo_path(&self, capture: NaiveDateTime, extension: &str) -> PathBuf {
        self.photo_dir(capture.date())
            .join(format!("{}.{extension}", capture.format(TIME_FORMAT)))
    }

    /// Directory holding the exposure bracket taken at `capture`.
    pub fn exposure_dir(&self, capture: NaiveDateTime) -> PathBuf {
        self.photo_dir(capture.date())
            .join(capture.format(TIME_FORMAT).to_string())
    }
}

/// A photograph and the instant it was taken.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Photo {
    path: PathBuf,
    time: NaiveDateTime,
}

impl Photo {
    pub fn new(path: impl Into<PathBuf>, time: NaiveDateTime) -> Self {
        Self {
            path: path.into(),
            time,
        }
    }

    /// Create a `Photo` from a file named after its capture time on `date`.
    ///
    /// Returns `None` if the file stem is not a `HH.MM.SS` time.
    pub fn from_file_name(date: NaiveDate, path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let stem = path.file_stem()?.to_str()?;
        let time = NaiveTime::parse_from_str(stem, TIME_FORMAT).ok()?;
        Some(Self::new(path, date.and_time(time)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Timed for Photo {
    fn time(&self) -> NaiveDateTime {
        self.time
    }
}

/// The scan files of one capture, ordered by sampling pattern index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanSet {
    directory: PathBuf,
    files: Vec<PathBuf>,
}

impl ScanSet {
    fn new(directory: PathBuf, mut files: Vec<PathBuf>) -> Self {
        // Order numerically so that `10_x.txt` follows `9_x.txt`.
        files.sort_by_cached_key(|path| {
            let index = scan_index(path);
            (index.is_none(), index, path.clone())
        });
        Self { directory, files }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// The scan file of sampling pattern entry `index`.
    ///
    /// The file name must lead with `index` so that a gap in the scan set
    /// never silently yields the scan of a different direction.
    pub fn file(&self, index: usize) -> Result<&Path, CorrelateError> {
        let path = self
            .files
            .get(index)
            .ok_or_else(|| CorrelateError::NoScanFile {
                path: self.directory.clone(),
                index,
            })?;

        match scan_index(path) {
            Some(token) if token == index => Ok(path),
            _ => Err(CorrelateError::ScanIndexMismatch {
                path: path.clone(),
                index,
            }),
        }
    }
}

/// Sampling pattern index encoded in the leading token of a scan file name.
fn scan_index(path: &Path) -> Option<usize> {
    path.file_name()?
        .to_str()?
        .split('_')
        .next()?
        .trim()
        .parse()
        .ok()
}

/// Locates the data belonging to a capture within a dataset.
#[derive(Clone, Debug)]
pub struct Correlator<L = FsListing> {
    layout: DatasetLayout,
    epsilon: f64,
    pattern_len: usize,
    exposures: Vec<f64>,
    listing: L,
}

impl Correlator<FsListing> {
    pub fn new(root: impl Into<PathBuf>, config: &Configuration) -> Self {
        Self::with_listing(root, config, FsListing)
    }
}

impl<L: DirectoryListing> Correlator<L> {
    pub fn with_listing(root: impl Into<PathBuf>, config: &Configuration, listing: L) -> Self {
        Self {
            layout: DatasetLayout::new(root),
            epsilon: config.capture_epsilon(),
            pattern_len: config.sampling_pattern().len(),
            exposures: config.exposures().to_vec(),
            listing,
        }
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    /// Lists `path`, treating a missing directory as empty.
    fn list(
        &self,
        path: &Path,
        list: impl FnOnce(&L, &Path) -> io::Result<Vec<PathBuf>>,
    ) -> Result<Vec<PathBuf>, CorrelateError> {
        match list(&self.listing, path) {
            Ok(entries) => Ok(entries),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(CorrelateError::Listing {
                path: path.to_path_buf(),
                source: Arc::new(source),
            }),
        }
    }

    /// Dates with a directory in the dataset, in listing order.
    pub fn capture_dates(&self) -> Result<Vec<NaiveDate>, CorrelateError> {
        Ok(self
            .list(self.layout.root(), |listing, path| listing.directories(path))?
            .iter()
            .filter_map(|dir| dir.file_name()?.to_str())
            .filter_map(|name| NaiveDate::parse_from_str(name, DATE_FORMAT).ok())
            .collect())
    }

    /// Photographs of `date` with `extension` named after their capture time.
    pub fn photos(&self, date: NaiveDate, extension: &str) -> Result<Vec<Photo>, CorrelateError> {
        let files = self.list(&self.layout.photo_dir(date), |listing, path| {
            listing.files(path, Some(extension))
        })?;
        let found = files.len();
        let photos: Vec<Photo> = files
            .into_iter()
            .filter_map(|path| Photo::from_file_name(date, path))
            .collect();

        if photos.len() < found {
            debug!(
                %date,
                skipped = found - photos.len(),
                "ignored photographs without a time stamped name"
            );
        }
        Ok(photos)
    }

    /// The photograph with `extension` taken at `capture`.
    ///
    /// The extension matches regardless of case and the path is returned as
    /// listed.
    pub fn find_photo(
        &self,
        capture: NaiveDateTime,
        extension: &str,
    ) -> Result<PathBuf, CorrelateError> {
        let stem = capture.format(TIME_FORMAT).to_string();
        let files = self.list(&self.layout.photo_dir(capture.date()), |listing, dir| {
            listing.files(dir, Some(extension))
        })?;

        files
            .into_iter()
            .find(|file| file.file_stem().and_then(|s| s.to_str()) == Some(stem.as_str()))
            .ok_or_else(|| CorrelateError::NoPhoto {
                path: self.layout.photo_path(capture, extension),
            })
    }

    /// The photograph of `exposure` in the bracket taken at `capture`.
    ///
    /// Photographs of the bracket are taken in exposure list order, so the
    /// position of `exposure` in the list is its position in the bracket.
    pub fn find_exposure_photo(
        &self,
        capture: NaiveDateTime,
        exposure: f64,
        extension: &str,
    ) -> Result<PathBuf, CorrelateError> {
        let index = self
            .exposures
            .iter()
            .position(|e| *e == exposure)
            .ok_or(CorrelateError::UnknownExposure { exposure })?;

        let dir = self.layout.exposure_dir(capture);
        let mut photos = self.list(&dir, |listing, path| listing.files(path, Some(extension)))?;
        if index >= photos.len() {
            debug!(%capture, exposure, found = photos.len(), "exposure bracket is short");
            return Err(CorrelateError::NoExposurePhoto {
                path: dir,
                exposure,
                index,
            });
        }

        Ok(photos.swap_remove(index))
    }

    /// The scan directory recorded within the capture epsilon of `capture`.
    ///
    /// Scan directories of the capture date are visited in listing order and
    /// the first within the epsilon wins.
    pub fn find_scan_directory(&self, capture: NaiveDateTime) -> Result<PathBuf, CorrelateError> {
        let scan_root = self.layout.scan_root(capture.date());
        let directories = self.list(&scan_root, |listing, path| listing.directories(path))?;

        for dir in directories {
            let Some(time) = dir
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| NaiveTime::parse_from_str(name, TIME_FORMAT).ok())
            else {
                continue;
            };

            let delta = seconds(capture - capture.date().and_time(time));
            if delta.abs() <= self.epsilon {
                debug!(%capture, ?dir, delta, "correlated scan directory");
                return Ok(dir);
            }
        }

        debug!(%capture, epsilon = self.epsilon, "no scan directory within epsilon");
        Err(CorrelateError::NoScanDirectory {
            capture,
            epsilon: self.epsilon,
        })
    }

    /// The full set of scans recorded for `capture`.
    ///
    /// The set must hold exactly one scan per sampling pattern entry.
    pub fn find_scan_set(&self, capture: NaiveDateTime) -> Result<ScanSet, CorrelateError> {
        let directory = self.find_scan_directory(capture)?;
        let files = self.list(&directory, |listing, path| {
            listing.files(path, Some(SCAN_EXTENSION))
        })?;

        if files.len() != self.pattern_len {
            return Err(CorrelateError::ScanCountMismatch {
                path: directory,
                found: files.len(),
                expected: self.pattern_len,
            });
        }

        Ok(ScanSet::new(directory, files))
    }

    /// The scan of sampling pattern entry `index` recorded for `capture`.
    pub fn find_scan_file(
        &self,
        capture: NaiveDateTime,
        index: usize,
    ) -> Result<PathBuf, CorrelateError> {
        Ok(self.find_scan_set(capture)?.file(index)?.to_path_buf())
    }
}

fn seconds(delta: TimeDelta) -> f64 {
    delta.num_milliseconds() as f64 / 1000.
}

/// Reduce a time ordered sequence of photographs to one per capture session.
///
/// A new session opens with the first photograph taken at least
/// `interval_minutes` after the start of the current session. Each session
/// is represented by its last photograph.
pub fn find_photo_groups<T: Timed + Clone>(photos: &[T], interval_minutes: i64) -> Vec<T> {
    let (Some(first), Some(last)) = (photos.first(), photos.last()) else {
        return Vec::new();
    };

    let interval = TimeDelta::minutes(interval_minutes);
    let mut session_start = first.time();
    let mut groups = Vec::new();
    for pair in photos.windows(2) {
        let (previous, next) = (&pair[0], &pair[1]);
        if next.time() - session_start >= interval {
            groups.push(previous.clone());
            session_start = next.time();
        }
    }
    groups.push(last.clone());

    groups
}
