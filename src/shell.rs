use std::borrow::Cow;
use std::ffi::OsStr;

/// Escape a string for display in a bash-like rendering of a command.
pub(crate) fn escape(s: &OsStr) -> Cow<'_, str> {
    let Some(s) = s.to_str() else {
        return Cow::Borrowed("<non-utf8>");
    };

    if !s.chars().any(needs_escape) {
        return Cow::Borrowed(s);
    }

    let mut o = String::with_capacity(s.len() + 4);

    for c in s.chars() {
        if needs_escape(c) {
            o.push('\\');
        }

        o.push(c);
    }

    Cow::Owned(o)
}

fn needs_escape(c: char) -> bool {
    matches!(
        c,
        ' ' | '"'
            | '\''
            | '\\'
            | '$'
            | '`'
            | '&'
            | '|'
            | ';'
            | '<'
            | '>'
            | '!'
            | '('
            | ')'
            | '['
            | ']'
            | '*'
            | '?'
    )
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;

    use super::escape;

    #[test]
    fn plain_strings_are_borrowed() {
        assert!(matches!(
            escape(OsStr::new("flac")),
            std::borrow::Cow::Borrowed("flac")
        ));
    }

    #[test]
    fn shell_metacharacters_are_escaped() {
        assert_eq!(escape(OsStr::new("My Song (live).flac")), "My\\ Song\\ \\(live\\).flac");
        assert_eq!(escape(OsStr::new("a|b")), "a\\|b");
    }
}
