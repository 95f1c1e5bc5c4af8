use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Parser;

use crate::codec::Codecs;
use crate::config::{Config, OverwriteMode};
use crate::console::Console;
use crate::rename::RenamingFilter;
use crate::walk::Walker;

/// Mirror a music tree into another directory, transcoding recognized audio
/// formats through external codec executables.
#[derive(Parser)]
pub struct Syncvert {
    /// Do not copy non-audio files into the output tree.
    #[arg(short = 'C', long = "dont-copy-others")]
    dont_copy_others: bool,
    /// Do not descend into subdirectories.
    #[arg(short = 'R', long = "dont-recurse")]
    dont_recurse: bool,
    /// Re-encode inputs that already are in the encoder's format instead of
    /// copying them.
    #[arg(short = 'r', long)]
    reencode: bool,
    /// Encoder to transcode with: alac, flac, lame (or mp3), vorbis, wav (or
    /// wave).
    #[arg(short = 'e', long, default_value = "lame", value_name = "NAME")]
    encoder: String,
    /// When to overwrite existing output files: auto, always or never. Auto
    /// overwrites outputs older than their input.
    #[arg(short = 'o', long, default_value = "auto", value_name = "MODE")]
    overwrite_mode: OverwriteMode,
    /// Number of parallel transcoding threads.
    #[arg(
        short = 't',
        long,
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..=200)
    )]
    threads: u32,
    /// Filter applied to every output path component: conservative or none.
    #[arg(short = 'N', long, default_value = "none", value_name = "FILTER")]
    renaming_filter: RenamingFilter,
    /// Extra option passed to the flac encoder (may repeat).
    #[arg(short = 'F', long = "flac-option", value_name = "OPT")]
    flac_options: Vec<String>,
    /// Extra option passed to the lame encoder (may repeat).
    #[arg(short = 'L', long = "lame-option", value_name = "OPT")]
    lame_options: Vec<String>,
    /// Extra option passed to the vorbis encoder (may repeat).
    #[arg(short = 'V', long = "vorbis-option", value_name = "OPT")]
    vorbis_options: Vec<String>,
    /// Never transcode files with this extension (may repeat).
    #[arg(short = 'T', long = "dont-transcode", value_name = "EXT")]
    dont_transcode: Vec<String>,
    /// Name transcoded outputs with this extension instead of the encoder's
    /// canonical one.
    #[arg(short = 'E', long, value_name = "EXT")]
    output_extension: Option<String>,
    /// Delete files in the output tree that have no counterpart in the
    /// input tree.
    #[arg(short = 'd', long)]
    delete: bool,
    /// Perform a trial run with no changes made.
    #[arg(short = 'n', long)]
    dry_run: bool,
    /// Print a full line for every file processed.
    #[arg(short = 'v', long, overrides_with = "quiet")]
    verbose: bool,
    /// Only print errors.
    #[arg(short = 'q', long, overrides_with = "verbose")]
    quiet: bool,
    /// Input files or directories, followed by the output directory.
    #[arg(required = true, value_name = "PATH")]
    paths: Vec<PathBuf>,
}

/// Entry for `syncvert`.
///
/// Validates the options, then hands the inputs to the walker. Per-file
/// failures are reported on stderr as they happen and do not surface here.
pub fn entry(opts: &Syncvert) -> Result<()> {
    let Some((output_dir, inputs)) = opts.paths.split_last() else {
        bail!("expected at least one input and an output directory");
    };

    if inputs.is_empty() {
        bail!("expected at least one input and an output directory");
    }

    if output_dir.exists() && !output_dir.is_dir() {
        bail!("target `{}' is not a directory", output_dir.display());
    }

    if inputs.len() > 1 && !output_dir.exists() {
        bail!("target `{}' is not a directory", output_dir.display());
    }

    for input in inputs {
        if !input.exists() {
            bail!("cannot stat `{}': No such file or directory", input.display());
        }
    }

    let codecs = Codecs::new(
        opts.flac_options.clone(),
        opts.lame_options.clone(),
        opts.vorbis_options.clone(),
    );

    let Some((encoder, encoder_ext)) = codecs.encoder(&opts.encoder) else {
        bail!("unrecognized encoder name");
    };

    let mut dont_transcode = HashSet::new();

    for ext in &opts.dont_transcode {
        if !ext.is_empty() {
            dont_transcode.insert(normalize_ext(ext));
        }
    }

    let config = Arc::new(Config {
        overwrite: opts.overwrite_mode,
        recursive: !opts.dont_recurse,
        copy_other: !opts.dont_copy_others,
        reencode: opts.reencode,
        delete: opts.delete,
        dry_run: opts.dry_run,
        verbose: opts.verbose,
        quiet: opts.quiet,
        num_workers: opts.threads as usize,
        encoder,
        encoder_ext,
        forced_ext: opts.output_extension.as_deref().map(dotted),
        dont_transcode,
        renaming_filter: opts.renaming_filter,
    });

    let console = Arc::new(Console::new());
    Walker::new(config, console, codecs).walk(inputs, output_dir);
    Ok(())
}

/// Lowercase an extension and make sure it carries its dot.
fn normalize_ext(ext: &str) -> String {
    dotted(&ext.to_lowercase())
}

fn dotted(ext: &str) -> String {
    if ext.starts_with('.') {
        ext.to_owned()
    } else {
        format!(".{ext}")
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use clap::Parser;

    use super::{Syncvert, entry, normalize_ext};

    fn parse(args: &[&str]) -> Result<Syncvert, clap::Error> {
        Syncvert::try_parse_from(core::iter::once("syncvert").chain(args.iter().copied()))
    }

    #[test]
    fn extensions_normalize() {
        assert_eq!(normalize_ext("FLAC"), ".flac");
        assert_eq!(normalize_ext(".Ogg"), ".ogg");
    }

    #[test]
    fn flags_parse() {
        let opts = parse(&["-C", "-R", "-r", "-t", "4", "-e", "vorbis", "in", "out"]).unwrap();
        assert!(opts.dont_copy_others);
        assert!(opts.dont_recurse);
        assert!(opts.reencode);
        assert_eq!(opts.threads, 4);
        assert_eq!(opts.encoder, "vorbis");
        assert_eq!(opts.paths.len(), 2);
    }

    #[test]
    fn the_last_of_quiet_and_verbose_wins() {
        let opts = parse(&["-q", "-v", "in", "out"]).unwrap();
        assert!(opts.verbose);
        assert!(!opts.quiet);

        let opts = parse(&["-v", "-q", "in", "out"]).unwrap();
        assert!(opts.quiet);
        assert!(!opts.verbose);
    }

    #[test]
    fn out_of_range_thread_counts_are_rejected() {
        assert!(parse(&["-t", "0", "in", "out"]).is_err());
        assert!(parse(&["-t", "201", "in", "out"]).is_err());
    }

    #[test]
    fn unknown_option_values_are_rejected() {
        assert!(parse(&["-o", "sometimes", "in", "out"]).is_err());
        assert!(parse(&["-N", "aggressive", "in", "out"]).is_err());
    }

    #[test]
    fn unknown_encoders_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        fs::create_dir_all(&input).unwrap();

        let opts = parse(&[
            "-e",
            "opus",
            input.to_str().unwrap(),
            dir.path().join("out").to_str().unwrap(),
        ])
        .unwrap();

        let e = entry(&opts).unwrap_err();
        assert!(e.to_string().contains("unrecognized encoder"), "{e}");
    }

    #[test]
    fn missing_inputs_are_fatal() {
        let dir = tempfile::tempdir().unwrap();

        let opts = parse(&[
            dir.path().join("no-such-dir").to_str().unwrap(),
            dir.path().join("out").to_str().unwrap(),
        ])
        .unwrap();

        let e = entry(&opts).unwrap_err();
        assert!(e.to_string().contains("cannot stat"), "{e}");
    }

    #[test]
    fn multiple_inputs_require_an_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();

        let opts = parse(&[
            a.to_str().unwrap(),
            b.to_str().unwrap(),
            dir.path().join("no-such-out").to_str().unwrap(),
        ])
        .unwrap();

        let e = entry(&opts).unwrap_err();
        assert!(e.to_string().contains("is not a directory"), "{e}");
    }
}
