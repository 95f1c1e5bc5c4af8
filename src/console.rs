use core::fmt;

use std::io::Write;
use std::sync::Mutex;

use termcolor::{ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Program name, used as the prefix of diagnostics.
pub(crate) const PROGRAM: &str = "syncvert";

macro_rules! __report {
    ($o:expr $(, $($tt:tt)*)?) => {
        { $( $o.report(format_args!($($tt)*)); )* }
    };
}

pub(crate) use __report as report;

macro_rules! __diag {
    ($o:expr $(, $($tt:tt)*)?) => {
        { $( $o.diag(format_args!($($tt)*)); )* }
    };
}

pub(crate) use __diag as diag;

struct Streams {
    out: StandardStream,
    err: StandardStream,
}

/// Terminal output shared between the walker and the transcoding workers.
///
/// Every line goes through a single mutex so reports from parallel workers
/// never interleave mid-line.
pub(crate) struct Console {
    streams: Mutex<Streams>,
    diag_color: ColorSpec,
}

impl Console {
    pub(crate) fn new() -> Self {
        let mut diag_color = ColorSpec::new();
        diag_color.set_fg(Some(termcolor::Color::Red)).set_bold(true);

        Console {
            streams: Mutex::new(Streams {
                out: StandardStream::stdout(ColorChoice::Auto),
                err: StandardStream::stderr(ColorChoice::Auto),
            }),
            diag_color,
        }
    }

    /// Print a progress line to stdout.
    pub(crate) fn report(&self, m: impl fmt::Display) {
        let Ok(mut streams) = self.streams.lock() else {
            return;
        };

        _ = writeln!(streams.out, "{m}");
        _ = streams.out.flush();
    }

    /// Print a diagnostic to stderr, prefixed with the program name.
    pub(crate) fn diag(&self, m: impl fmt::Display) {
        let Ok(mut streams) = self.streams.lock() else {
            return;
        };

        _ = streams.err.set_color(&self.diag_color);
        _ = write!(streams.err, "{PROGRAM}: ");
        _ = streams.err.reset();
        _ = writeln!(streams.err, "{m}");
        _ = streams.err.flush();
    }

    /// Write already-formatted diagnostics to stderr verbatim.
    pub(crate) fn relay(&self, text: &str) {
        let Ok(mut streams) = self.streams.lock() else {
            return;
        };

        _ = streams.err.write_all(text.as_bytes());
        _ = streams.err.flush();
    }
}
