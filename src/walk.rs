use core::cmp::Ordering;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf, absolute};
use std::sync::Arc;

use filetime::FileTime;
use walkdir::WalkDir;

use crate::codec::Codecs;
use crate::config::{Config, OverwriteMode};
use crate::console::{Console, PROGRAM, diag, report};
use crate::pool::{Pool, WorkUnit};

/// Walks the input trees, decides per file whether to transcode, copy or
/// skip, and mirrors the decisions into the output tree.
pub(crate) struct Walker {
    config: Arc<Config>,
    console: Arc<Console>,
    codecs: Codecs,
    pool: Pool,
    /// Output directory for files of the directory currently being visited.
    output_dir: PathBuf,
    /// Output root of the current directory input.
    base_output_dir: PathBuf,
    /// The current directory input itself.
    base_dir: PathBuf,
    output_dir_created: bool,
    output_dir_error: bool,
    /// Output paths this run produced or chose to keep; everything else
    /// under the output root is extraneous.
    keep: HashSet<PathBuf>,
}

impl Walker {
    pub(crate) fn new(config: Arc<Config>, console: Arc<Console>, codecs: Codecs) -> Self {
        let pool = Pool::start(config.clone(), console.clone());

        Walker {
            config,
            console,
            codecs,
            pool,
            output_dir: PathBuf::new(),
            base_output_dir: PathBuf::new(),
            base_dir: PathBuf::new(),
            output_dir_created: false,
            output_dir_error: false,
            keep: HashSet::new(),
        }
    }

    /// Process every input in declaration order, then drain and stop the
    /// workers.
    pub(crate) fn walk(mut self, inputs: &[PathBuf], output_dir: &Path) {
        let output_dir = match absolute(output_dir) {
            Ok(path) => path,
            Err(e) => {
                diag!(self.console, "cannot resolve `{}': {e}", output_dir.display());
                self.pool.shutdown();
                return;
            }
        };

        for input in inputs {
            let path = match absolute(input) {
                Ok(path) => path,
                Err(e) => {
                    diag!(self.console, "cannot resolve `{}': {e}", input.display());
                    continue;
                }
            };

            if path.is_dir() {
                self.directory_input(input, &path, &output_dir);
            } else if path.is_file() {
                self.output_dir = output_dir.clone();

                if self.check_output_dir(&output_dir) {
                    self.visit_file(&path);
                }
            } else {
                diag!(
                    self.console,
                    "skipping `{}' (not a regular file or directory)",
                    path.display()
                );
            }
        }

        self.pool.shutdown();

        if self.config.dry_run {
            report!(
                self.console,
                "{PROGRAM}: finished running in dry-run mode, no actual changes made"
            );
        }
    }

    /// Process one directory input: pick its output root with `cp`-style
    /// semantics, traverse it, then delete the extraneous output paths when
    /// mirroring.
    fn directory_input(&mut self, input: &Path, path: &Path, output_dir: &Path) {
        // Like cp, a trailing separator on the input (or an output directory
        // that does not exist yet) maps the input's contents directly into
        // the output directory.
        self.output_dir = output_dir.to_path_buf();

        if !ends_with_separator(input) && output_dir.exists() {
            let name = path.file_name().unwrap_or_default().to_string_lossy();
            let name = self.config.renaming_filter.filter(&name).into_owned();
            self.output_dir.push(name);
        }

        if !self.check_output_dir(output_dir) {
            return;
        }

        self.base_output_dir = self.output_dir.clone();
        self.base_dir = path.to_path_buf();
        self.traverse();

        if self.config.delete {
            self.delete_extraneous();
        }

        self.keep.clear();
    }

    /// Sorted depth-first traversal of the current directory input.
    fn traverse(&mut self) {
        let mut it = WalkDir::new(&self.base_dir)
            .min_depth(1)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
            .into_iter();

        while let Some(entry) = it.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    diag!(self.console, "{e}");
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                if !self.enter_directory(entry.path()) {
                    it.skip_current_dir();
                }
            } else {
                self.visit_file(entry.path());
            }
        }
    }

    /// Directory-enter hook. Returns whether to descend.
    fn enter_directory(&mut self, path: &Path) -> bool {
        if !self.config.verbose && !self.config.quiet {
            report!(
                self.console,
                "Entering `{}'",
                path.file_name().unwrap_or_default().to_string_lossy()
            );
        }

        if !self.config.recursive {
            return false;
        }

        let Ok(rel) = path.strip_prefix(&self.base_dir) else {
            return false;
        };

        self.output_dir = self
            .base_output_dir
            .join(self.config.renaming_filter.filter_path(rel));
        self.output_dir_created = false;
        self.output_dir_error = false;
        true
    }

    fn visit_file(&mut self, path: &Path) {
        // A directory that failed to materialize swallows its files.
        if self.output_dir_error {
            return;
        }

        let ext = extension_lowercase(path);

        let decoder = if self.config.dont_transcode.contains(&ext) {
            None
        } else {
            self.codecs.decoder_for(&ext)
        };

        // Inputs already in the target format are passed through unless a
        // re-encode was requested.
        let decoder = decoder
            .filter(|decoder| self.config.reencode || !Arc::ptr_eq(decoder, &self.config.encoder))
            .cloned();

        let suffix = match &decoder {
            Some(_) => {
                let stem = path.file_stem().unwrap_or_default().to_string_lossy();
                let ext = self
                    .config
                    .forced_ext
                    .as_deref()
                    .unwrap_or(self.config.encoder_ext);
                format!("{stem}{ext}")
            }
            None => path.file_name().unwrap_or_default().to_string_lossy().into_owned(),
        };

        let suffix = self.config.renaming_filter.filter(&suffix).into_owned();
        let output_file = self.output_dir.join(suffix);

        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) => {
                diag!(self.console, "failed to stat `{}': {e}", path.display());
                return;
            }
        };

        if self.config.overwrite != OverwriteMode::Always
            && let Ok(existing) = fs::metadata(&output_file)
        {
            if self.config.overwrite == OverwriteMode::Never {
                self.keep_output(&output_file);

                if self.config.verbose {
                    report!(
                        self.console,
                        "{PROGRAM}: skipping `{}' (not overwriting)",
                        path.display()
                    );
                }

                return;
            }

            let input_mtime = FileTime::from_last_modification_time(&metadata);
            let output_mtime = FileTime::from_last_modification_time(&existing);

            if input_mtime <= output_mtime {
                self.keep_output(&output_file);

                if self.config.verbose {
                    report!(
                        self.console,
                        "{PROGRAM}: skipping `{}' (up-to-date)",
                        path.display()
                    );
                }

                return;
            }
        }

        let Some(decoder) = decoder else {
            if !self.config.copy_other {
                if self.config.verbose {
                    report!(self.console, "{PROGRAM}: skipping `{}'", path.display());
                }

                return;
            }

            if !self.create_output_dir() {
                return;
            }

            if !self.config.dry_run {
                if let Err(e) = fs::copy(path, &output_file) {
                    diag!(self.console, "failed to copy `{}': {e}", path.display());
                } else {
                    restore_timestamps(&self.console, &output_file, &metadata);
                }
            }

            if !self.config.quiet {
                if self.config.verbose {
                    report!(
                        self.console,
                        "`{}' -> `{}'",
                        path.display(),
                        output_file.display()
                    );
                } else {
                    report!(
                        self.console,
                        "Copied `{}'",
                        output_file.file_name().unwrap_or_default().to_string_lossy()
                    );
                }
            }

            self.keep_output(&output_file);
            return;
        };

        if !self.create_output_dir() {
            return;
        }

        self.keep_output(&output_file);

        self.pool.publish(
            &self.console,
            WorkUnit {
                decoder,
                input: path.to_path_buf(),
                output: output_file,
                metadata,
            },
        );
    }

    /// Reset the per-directory flags and make sure nothing non-directory is
    /// in the way of the current output directory.
    fn check_output_dir(&mut self, original: &Path) -> bool {
        self.output_dir_created = false;
        self.output_dir_error = false;

        match fs::metadata(&self.output_dir) {
            Ok(metadata) if metadata.is_dir() => {
                self.output_dir_created = true;
                true
            }
            Ok(..) => {
                diag!(
                    self.console,
                    "cannot overwrite non-directory `{}' with directory `{}'",
                    self.output_dir.display(),
                    original.display()
                );
                false
            }
            Err(..) => true,
        }
    }

    /// Create the current output directory on first use.
    fn create_output_dir(&mut self) -> bool {
        if self.output_dir_created || self.config.dry_run {
            return true;
        }

        // Something may have appeared at the path since the last check.
        let current = self.output_dir.clone();

        if !self.check_output_dir(&current) {
            return false;
        }

        if self.output_dir_created {
            return true;
        }

        match fs::create_dir_all(&self.output_dir) {
            Ok(()) => {
                self.output_dir_created = true;
                true
            }
            Err(e) => {
                diag!(
                    self.console,
                    "unable to create directory `{}': {e}",
                    self.output_dir.display()
                );
                self.output_dir_error = true;
                false
            }
        }
    }

    /// Mark an output path (and its parent directory) as produced by this
    /// run so the mirror pass leaves them alone.
    fn keep_output(&mut self, path: &Path) {
        if !self.config.delete {
            return;
        }

        self.keep.insert(path.to_path_buf());

        if let Some(parent) = path.parent() {
            self.keep.insert(parent.to_path_buf());
        }
    }

    /// Mirror pass: walk the output root and delete everything this run did
    /// not produce or keep, children before their directories.
    fn delete_extraneous(&mut self) {
        if self.config.dry_run && !self.base_output_dir.is_dir() {
            return;
        }

        let mut doomed = Vec::new();

        let walk = WalkDir::new(&self.base_output_dir)
            .min_depth(1)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()));

        for entry in walk {
            match entry {
                Ok(entry) => {
                    if !self.keep.contains(entry.path()) {
                        doomed.push(entry.path().to_path_buf());
                    }
                }
                Err(e) => diag!(self.console, "{e}"),
            }
        }

        doomed.sort_by(|a, b| compare_for_deletion(a, b));

        for path in doomed {
            if !self.config.dry_run {
                let is_dir = fs::symlink_metadata(&path).map(|m| m.is_dir()).unwrap_or(false);

                let removed = if is_dir {
                    fs::remove_dir(&path)
                } else {
                    fs::remove_file(&path)
                };

                if let Err(e) = removed {
                    diag!(self.console, "failed to delete `{}': {e}", path.display());
                    continue;
                }
            }

            if self.config.verbose {
                report!(self.console, "{PROGRAM}: deleted `{}'", path.display());
            } else {
                report!(
                    self.console,
                    "Deleted `{}'",
                    path.file_name().unwrap_or_default().to_string_lossy()
                );
            }
        }
    }
}

/// Give the output the input's access and modification times.
pub(crate) fn restore_timestamps(console: &Console, path: &Path, metadata: &fs::Metadata) {
    let atime = FileTime::from_last_access_time(metadata);
    let mtime = FileTime::from_last_modification_time(metadata);

    if filetime::set_file_times(path, atime, mtime).is_err() {
        diag!(
            console,
            "unable to change the timestamp metadata for `{}'",
            path.display()
        );
    }
}

/// Deletion-safe order: when one path is a prefix of the other the longer
/// one comes first, so directories are empty by the time they are removed.
fn compare_for_deletion(lhs: &Path, rhs: &Path) -> Ordering {
    let l = lhs.as_os_str().as_encoded_bytes();
    let r = rhs.as_os_str().as_encoded_bytes();

    if l.len() > r.len() && l.starts_with(r) {
        return Ordering::Less;
    }

    if r.len() > l.len() && r.starts_with(l) {
        return Ordering::Greater;
    }

    l.cmp(r)
}

fn ends_with_separator(path: &Path) -> bool {
    path.as_os_str().as_encoded_bytes().ends_with(b"/")
}

/// The lowercased, dotted extension of a path, or an empty string.
fn extension_lowercase(path: &Path) -> String {
    match path.extension() {
        Some(ext) => format!(".{}", ext.to_string_lossy().to_lowercase()),
        None => String::new(),
    }
}
