//! Discovery of source files under the `<root>/<YYYY>/<MM>/` tree.

use ohlcvault_types::{DiscoveryError, SourceFile, YearMonth};
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::naming;

/// Creates a directory and its parents, accepting one that already exists.
///
/// # Errors
///
/// Returns [`DiscoveryError::CreateDir`] if creation fails.
pub fn ensure_dir(path: &Path) -> Result<(), DiscoveryError> {
    fs::create_dir_all(path).map_err(|source| DiscoveryError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Walks a source tree and yields [`SourceFile`] descriptors.
///
/// Only names are inspected. Entries outside the naming convention are
/// skipped silently.
#[derive(Debug, Clone)]
pub struct SourceLocator {
    root: PathBuf,
    pairs: Option<HashSet<String>>,
}

impl SourceLocator {
    /// Creates a locator, creating `root` if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory cannot be created.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, DiscoveryError> {
        let root = root.into();
        ensure_dir(&root)?;
        Ok(Self { root, pairs: None })
    }

    /// Restricts discovery to the given pairs. An empty list means all pairs.
    #[must_use]
    pub fn with_pairs<I, S>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pairs: HashSet<String> = pairs.into_iter().map(Into::into).collect();
        self.pairs = (!pairs.is_empty()).then_some(pairs);
        self
    }

    /// Returns the source root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lists the `(year, month)` bucket directories in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the root or a year directory cannot be read.
    pub fn buckets(&self) -> Result<Vec<(YearMonth, PathBuf)>, DiscoveryError> {
        let mut buckets = Vec::new();
        for (year, year_dir) in numbered_dirs(&self.root, 4)? {
            let Ok(year) = i32::try_from(year) else {
                continue;
            };
            for (month, month_dir) in numbered_dirs(&year_dir, 2)? {
                if let Ok(ym) = YearMonth::new(year, month) {
                    buckets.push((ym, month_dir));
                }
            }
        }
        Ok(buckets)
    }

    /// Returns a lazy iterator over every source file in the tree.
    ///
    /// Buckets are visited in ascending `(year, month)` order and each bucket
    /// directory is listed only when the previous one is exhausted. Within a
    /// bucket, files are ordered by `(timestamp, pair, state)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket directories cannot be listed.
    pub fn iter(&self) -> Result<SourceIter<'_>, DiscoveryError> {
        let buckets = self.buckets()?.into_iter().map(|(_, dir)| dir).collect();
        Ok(SourceIter {
            locator: self,
            buckets,
            current: Vec::new().into_iter(),
        })
    }

    /// Lists the source files in one bucket directory, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn scan_bucket(&self, dir: &Path) -> Result<Vec<SourceFile>, DiscoveryError> {
        let mut files = Vec::new();
        for entry in read_dir(dir)? {
            let entry = entry.map_err(|source| DiscoveryError::ReadDir {
                path: dir.to_path_buf(),
                source,
            })?;
            if entry.file_type().is_ok_and(|t| t.is_file()) {
                self.push_match(&entry.path(), &mut files);
            }
        }
        files.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Ok(files)
    }

    /// Walks the whole tree recursively, ignoring the year/month layout.
    ///
    /// Matches are sorted globally by `(timestamp, pair, state)`. Used to
    /// migrate flat legacy trees.
    ///
    /// # Errors
    ///
    /// Returns an error if any directory cannot be read.
    pub fn scan_flat(&self) -> Result<Vec<SourceFile>, DiscoveryError> {
        self.scan_legacy().map(|scan| scan.files)
    }

    /// Like [`scan_flat`](Self::scan_flat), but also returns the `*.csv`
    /// files whose names fall outside the naming convention.
    ///
    /// # Errors
    ///
    /// Returns an error if any directory cannot be read.
    pub fn scan_legacy(&self) -> Result<FlatScan, DiscoveryError> {
        let mut scan = FlatScan::default();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            for entry in read_dir(&dir)? {
                let entry = entry.map_err(|source| DiscoveryError::ReadDir {
                    path: dir.clone(),
                    source,
                })?;
                let Ok(file_type) = entry.file_type() else {
                    continue;
                };
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file()
                    && !self.push_match(&path, &mut scan.files)
                    && has_csv_extension(&path)
                {
                    scan.unmatched.push(path);
                }
            }
        }

        scan.files.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        scan.unmatched.sort();
        debug!(
            root = %self.root.display(),
            files = scan.files.len(),
            unmatched = scan.unmatched.len(),
            "scanned flat tree"
        );
        Ok(scan)
    }

    /// Pushes `path` if it is an accepted source file. Returns false if the
    /// name does not follow the convention.
    fn push_match(&self, path: &Path, files: &mut Vec<SourceFile>) -> bool {
        match naming::classify(path) {
            Some(file) if self.accepts(file.pair()) => files.push(file),
            Some(_) => trace!(path = %path.display(), "pair filtered out"),
            None => {
                trace!(path = %path.display(), "ignoring unrelated entry");
                return false;
            }
        }
        true
    }

    fn accepts(&self, pair: &str) -> bool {
        self.pairs.as_ref().is_none_or(|pairs| pairs.contains(pair))
    }
}

/// Result of [`SourceLocator::scan_legacy`].
#[derive(Debug, Default)]
pub struct FlatScan {
    /// Source files, sorted by `(timestamp, pair, state)`.
    pub files: Vec<SourceFile>,
    /// CSV files that do not follow the naming convention, sorted by path.
    pub unmatched: Vec<PathBuf>,
}

fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(naming::SOURCE_EXTENSION))
}

/// Lazy iterator returned by [`SourceLocator::iter`].
#[derive(Debug)]
pub struct SourceIter<'a> {
    locator: &'a SourceLocator,
    buckets: VecDeque<PathBuf>,
    current: std::vec::IntoIter<SourceFile>,
}

impl Iterator for SourceIter<'_> {
    type Item = Result<SourceFile, DiscoveryError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(file) = self.current.next() {
                return Some(Ok(file));
            }
            let dir = self.buckets.pop_front()?;
            match self.locator.scan_bucket(&dir) {
                Ok(files) => {
                    debug!(dir = %dir.display(), files = files.len(), "scanned bucket");
                    self.current = files.into_iter();
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

fn read_dir(dir: &Path) -> Result<fs::ReadDir, DiscoveryError> {
    fs::read_dir(dir).map_err(|source| DiscoveryError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// Lists subdirectories whose names are exactly `width` digits, ascending.
fn numbered_dirs(dir: &Path, width: usize) -> Result<Vec<(u32, PathBuf)>, DiscoveryError> {
    let mut dirs = Vec::new();
    for entry in read_dir(dir)? {
        let entry = entry.map_err(|source| DiscoveryError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_ok_and(|t| t.is_dir()) {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.len() == width
            && name.bytes().all(|b| b.is_ascii_digit())
            && let Ok(number) = name.parse::<u32>()
        {
            dirs.push((number, entry.path()));
        }
    }
    dirs.sort_by_key(|(number, _)| *number);
    Ok(dirs)
}
