use core::error::Error;
use core::fmt;
use core::str::FromStr;

use std::collections::HashSet;
use std::sync::Arc;

use crate::codec::Codec;
use crate::rename::RenamingFilter;

#[derive(Debug)]
pub(crate) struct OverwriteModeErr;

impl fmt::Display for OverwriteModeErr {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized overwrite mode")
    }
}

impl Error for OverwriteModeErr {}

/// Policy for existing files on the output side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OverwriteMode {
    /// Overwrite when the input is newer than the output.
    Auto,
    Always,
    Never,
}

impl FromStr for OverwriteMode {
    type Err = OverwriteModeErr;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(OverwriteMode::Auto),
            "always" => Ok(OverwriteMode::Always),
            "never" => Ok(OverwriteMode::Never),
            _ => Err(OverwriteModeErr),
        }
    }
}

/// Configuration for one synchronization run, owned by the walker and shared
/// read-only with the workers.
pub(crate) struct Config {
    pub(crate) overwrite: OverwriteMode,
    pub(crate) recursive: bool,
    pub(crate) copy_other: bool,
    pub(crate) reencode: bool,
    pub(crate) delete: bool,
    pub(crate) dry_run: bool,
    pub(crate) verbose: bool,
    pub(crate) quiet: bool,
    pub(crate) num_workers: usize,
    pub(crate) encoder: Arc<Codec>,
    /// Canonical extension of the files the encoder produces.
    pub(crate) encoder_ext: &'static str,
    /// Extension forced onto transcoded outputs instead of the canonical one.
    pub(crate) forced_ext: Option<String>,
    /// Normalized extensions that are never transcoded.
    pub(crate) dont_transcode: HashSet<String>,
    pub(crate) renaming_filter: RenamingFilter,
}

#[cfg(test)]
mod tests {
    use super::OverwriteMode;

    #[test]
    fn overwrite_modes_parse() {
        assert_eq!("auto".parse::<OverwriteMode>().ok(), Some(OverwriteMode::Auto));
        assert_eq!("always".parse::<OverwriteMode>().ok(), Some(OverwriteMode::Always));
        assert_eq!("never".parse::<OverwriteMode>().ok(), Some(OverwriteMode::Never));
        assert!("sometimes".parse::<OverwriteMode>().is_err());
    }
}
