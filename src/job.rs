use core::fmt;

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::console::PROGRAM;
use crate::pipeline::Pipeline;
use crate::pool::WorkUnit;

/// Marker for a job whose diagnostics were already written to the errors
/// file.
pub(crate) struct Failed;

/// Run one transcoding job to completion.
///
/// The decoder reads the input file and the encoder writes the output file,
/// through an intermediate WAV when the encoder cannot consume a stream. On
/// failure the partially written output (and the intermediate, if any) is
/// removed, and the diagnostics end up in `errors` for the caller to relay.
pub(crate) fn transcode(config: &Config, unit: &WorkUnit, errors: &Path) -> Result<(), Failed> {
    if config.dry_run {
        return Ok(());
    }

    let encoder = &config.encoder;
    let mode = unit.metadata.mode() & 0o7777;

    // Encoders that cannot read a stream get the decoded audio materialized
    // next to the output first.
    let mut intermediate = None;

    if !encoder.encodes_from_stdin() {
        let tmp = intermediate_wav(&unit.output);

        let sink = match open_output(&tmp, mode) {
            Ok(file) => file,
            Err(e) => return Err(open_failed(errors, &tmp, &e)),
        };

        let mut decode = Pipeline::new();

        match File::open(&unit.input) {
            Ok(file) => decode.read_from(file),
            Err(e) => {
                _ = fs::remove_file(&tmp);
                return Err(input_failed(errors, &unit.input, &e));
            }
        }

        if let Some(argv) = unit.decoder.decoder_args() {
            decode.push(argv);
        }

        decode.write_to(sink);

        if let Err(e) = decode.run() {
            _ = fs::remove_file(&tmp);
            return Err(pipeline_failed(errors, &unit.input, &decode, &e));
        }

        intermediate = Some(tmp);
    }

    let mut encode = Pipeline::new();

    if encoder.encodes_from_stdin() {
        match File::open(&unit.input) {
            Ok(file) => encode.read_from(file),
            Err(e) => return Err(input_failed(errors, &unit.input, &e)),
        }

        if let Some(argv) = unit.decoder.decoder_args() {
            encode.push(argv);
        }
    }

    let direct_output = (!encoder.encodes_to_stdout()).then_some(unit.output.as_path());
    encode.push(encoder.encoder_args(intermediate.as_deref(), direct_output));

    if encoder.encodes_to_stdout() {
        match open_output(&unit.output, mode) {
            Ok(file) => encode.write_to(file),
            Err(e) => {
                if let Some(tmp) = &intermediate {
                    _ = fs::remove_file(tmp);
                }

                return Err(open_failed(errors, &unit.output, &e));
            }
        }
    }

    let outcome = encode.run();

    if let Some(tmp) = &intermediate {
        _ = fs::remove_file(tmp);
    }

    if let Err(e) = outcome {
        _ = fs::remove_file(&unit.output);
        return Err(pipeline_failed(errors, &unit.input, &encode, &e));
    }

    // An encoder that opened the output itself did not inherit the input
    // mode from us.
    if !encoder.encodes_to_stdout() {
        _ = fs::set_permissions(&unit.output, fs::Permissions::from_mode(mode));
    }

    Ok(())
}

/// The temporary WAV a stream-less encoder consumes, next to the output.
fn intermediate_wav(output: &Path) -> PathBuf {
    let mut name = output.file_name().unwrap_or_default().to_os_string();
    name.push(".wav");
    output.with_file_name(name)
}

fn open_output(path: &Path, mode: u32) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)
}

fn record(errors: &Path, m: fmt::Arguments<'_>) -> Failed {
    if let Ok(mut file) = OpenOptions::new().append(true).create(true).open(errors) {
        _ = writeln!(file, "{m}");
    }

    Failed
}

fn open_failed(errors: &Path, path: &Path, e: &io::Error) -> Failed {
    record(
        errors,
        format_args!(
            "{PROGRAM}: unable to open `{}' for writing: {e}",
            path.display()
        ),
    )
}

fn input_failed(errors: &Path, input: &Path, e: &io::Error) -> Failed {
    record(
        errors,
        format_args!("{PROGRAM}: failed to transcode `{}': {e}", input.display()),
    )
}

fn pipeline_failed(errors: &Path, input: &Path, pipeline: &Pipeline, e: &anyhow::Error) -> Failed {
    record(
        errors,
        format_args!("{PROGRAM}: failed to transcode `{}': {e:#}", input.display()),
    );
    record(
        errors,
        format_args!("The transcoding pipeline was `{}'", pipeline.render()),
    )
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::intermediate_wav;

    #[test]
    fn the_intermediate_wav_sits_next_to_the_output() {
        assert_eq!(
            intermediate_wav(Path::new("/out/dir/song.m4a")),
            Path::new("/out/dir/song.m4a.wav")
        );
    }
}
