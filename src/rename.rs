use core::error::Error;
use core::fmt;
use core::str::FromStr;

use std::borrow::Cow;
use std::path::{Path, PathBuf};

const REPLACEMENT: char = '_';

#[derive(Debug)]
pub(crate) struct RenamingFilterErr;

impl fmt::Display for RenamingFilterErr {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized renaming filter")
    }
}

impl Error for RenamingFilterErr {}

/// Sanitizes single path components before they are used on the output side.
///
/// The filter only ever sees one component at a time, so it can neither
/// produce nor consume directory separators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RenamingFilter {
    /// Keep ASCII letters, digits and a small set of punctuation, replace
    /// everything else with an underscore.
    Conservative,
    /// Pass components through unchanged.
    None,
}

impl RenamingFilter {
    pub(crate) fn filter<'a>(&self, component: &'a str) -> Cow<'a, str> {
        match self {
            RenamingFilter::Conservative => conservative(component),
            RenamingFilter::None => Cow::Borrowed(component),
        }
    }

    /// Apply the filter to every component of a relative path.
    pub(crate) fn filter_path(&self, rel: &Path) -> PathBuf {
        let mut out = PathBuf::new();

        for component in rel.components() {
            let component = component.as_os_str().to_string_lossy();
            out.push(self.filter(&component).as_ref());
        }

        out
    }
}

impl FromStr for RenamingFilter {
    type Err = RenamingFilterErr;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "conservative" => Ok(RenamingFilter::Conservative),
            "none" => Ok(RenamingFilter::None),
            _ => Err(RenamingFilterErr),
        }
    }
}

fn conservative(component: &str) -> Cow<'_, str> {
    if !component.is_empty() && component.chars().all(allowed) {
        return Cow::Borrowed(component);
    }

    let mut out = String::with_capacity(component.len());

    for c in component.chars() {
        out.push(if allowed(c) { c } else { REPLACEMENT });
    }

    // A name consisting only of disallowed characters must still name
    // something.
    if out.is_empty() {
        out.push(REPLACEMENT);
    }

    Cow::Owned(out)
}

fn allowed(c: char) -> bool {
    if c.is_ascii_alphanumeric() {
        return true;
    }

    matches!(
        c,
        ' ' | '%' | '-' | '_' | '@' | '~' | '`' | '!' | '(' | ')' | '{' | '}' | '^' | '#' | '&'
            | '.'
    )
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::RenamingFilter;

    #[test]
    fn allowed_characters_pass_through() {
        let filter = RenamingFilter::Conservative;
        let name = "A track (remix) #2 - 100%.mp3";
        assert_eq!(filter.filter(name), name);
    }

    #[test]
    fn disallowed_characters_become_underscores() {
        let filter = RenamingFilter::Conservative;
        assert_eq!(filter.filter("Café"), "Caf_");
        assert_eq!(filter.filter("01 – Song*.flac"), "01 _ Song_.flac");
        assert_eq!(filter.filter("a/b"), "a_b");
    }

    #[test]
    fn empty_component_becomes_a_single_underscore() {
        assert_eq!(RenamingFilter::Conservative.filter(""), "_");
    }

    #[test]
    fn filtering_is_idempotent() {
        let filter = RenamingFilter::Conservative;

        for name in ["Café", "", "Song?.ogg", "plain.txt"] {
            let once = filter.filter(name).into_owned();
            assert_eq!(filter.filter(&once), once);
        }
    }

    #[test]
    fn paths_are_filtered_per_component() {
        let filter = RenamingFilter::Conservative;
        let rel = Path::new("Göteborg/b sides");
        assert_eq!(filter.filter_path(rel), Path::new("G_teborg/b sides"));
    }

    #[test]
    fn none_is_the_identity() {
        assert_eq!(RenamingFilter::None.filter("Café*"), "Café*");
    }

    #[test]
    fn names_parse() {
        assert_eq!(
            "conservative".parse::<RenamingFilter>().ok(),
            Some(RenamingFilter::Conservative)
        );
        assert_eq!("none".parse::<RenamingFilter>().ok(), Some(RenamingFilter::None));
        assert!("aggressive".parse::<RenamingFilter>().is_err());
    }
}
