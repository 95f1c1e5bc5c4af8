use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, bounded};
use tempfile::Builder;

use crate::codec::Codec;
use crate::config::Config;
use crate::console::{Console, diag, report};
use crate::walk::restore_timestamps;
use crate::{job, tags};

/// One transcoding assignment, created by the walker and moved to a worker
/// through the handoff slot.
pub(crate) struct WorkUnit {
    pub(crate) decoder: Arc<Codec>,
    pub(crate) input: PathBuf,
    pub(crate) output: PathBuf,
    pub(crate) metadata: fs::Metadata,
}

/// A fixed set of transcoding workers fed through a single-slot handoff.
///
/// The capacity-one channel serializes publication, so decisions and
/// publications happen in walk order, while up to `num_workers` jobs run
/// concurrently because a worker takes its unit out of the slot before
/// processing it.
pub(crate) struct Pool {
    slot: Sender<WorkUnit>,
    workers: Vec<JoinHandle<()>>,
}

impl Pool {
    pub(crate) fn start(config: Arc<Config>, console: Arc<Console>) -> Pool {
        let (slot, take) = bounded::<WorkUnit>(1);
        let mut workers = Vec::with_capacity(config.num_workers);

        for _ in 0..config.num_workers {
            let take = take.clone();
            let config = config.clone();
            let console = console.clone();

            workers.push(thread::spawn(move || {
                while let Ok(unit) = take.recv() {
                    process(&config, &console, unit);
                }
            }));
        }

        Pool { slot, workers }
    }

    /// Publish a unit, blocking while the slot is occupied.
    pub(crate) fn publish(&self, console: &Console, unit: WorkUnit) {
        if self.slot.send(unit).is_err() {
            diag!(console, "the transcoding workers are gone");
        }
    }

    /// Wait for the slot to drain, signal shutdown and join the workers.
    pub(crate) fn shutdown(self) {
        drop(self.slot);

        for worker in self.workers {
            _ = worker.join();
        }
    }
}

fn process(config: &Config, console: &Console, unit: WorkUnit) {
    let errors = match Builder::new().prefix("syncvert.").tempfile() {
        Ok(file) => file,
        Err(e) => {
            diag!(console, "unable to create an errors file: {e}");
            return;
        }
    };

    let outcome =
        panic::catch_unwind(AssertUnwindSafe(|| job::transcode(config, &unit, errors.path())));

    match outcome {
        Ok(Ok(())) => {
            if !config.dry_run {
                if let Err(e) = tags::transfer(&unit.input, &unit.output) {
                    diag!(
                        console,
                        "unable to transfer tags to `{}': {e}",
                        unit.output.display()
                    );
                }

                restore_timestamps(console, &unit.output, &unit.metadata);
            }

            if config.quiet {
                return;
            }

            if config.verbose {
                report!(
                    console,
                    "`{}' -> `{}'",
                    unit.input.display(),
                    unit.output.display()
                );
            } else {
                let name = unit.output.file_name().unwrap_or_default().to_string_lossy();

                if Arc::ptr_eq(&unit.decoder, &config.encoder) {
                    report!(console, "Re-encoded `{name}'");
                } else {
                    report!(console, "Transcoded `{name}'");
                }
            }
        }
        Ok(Err(job::Failed)) => match fs::read_to_string(errors.path()) {
            Ok(text) => console.relay(&text),
            Err(e) => diag!(console, "unable to open the errors file: {e}"),
        },
        Err(_) => match errors.into_temp_path().keep() {
            Ok(path) => diag!(
                console,
                "the transcoding job for `{}' crashed (errors file at `{}')",
                unit.input.display(),
                path.display()
            ),
            Err(e) => diag!(
                console,
                "the transcoding job for `{}' crashed: {e}",
                unit.input.display()
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::fs;
    use std::sync::Arc;

    use crate::codec::Codecs;
    use crate::config::{Config, OverwriteMode};
    use crate::console::Console;
    use crate::rename::RenamingFilter;

    use super::{Pool, WorkUnit};

    fn dry_run_config(num_workers: usize) -> Arc<Config> {
        let codecs = Codecs::new(Vec::new(), Vec::new(), Vec::new());
        let (encoder, encoder_ext) = codecs.encoder("lame").unwrap();

        Arc::new(Config {
            overwrite: OverwriteMode::Auto,
            recursive: true,
            copy_other: true,
            reencode: false,
            delete: false,
            dry_run: true,
            verbose: false,
            quiet: true,
            num_workers,
            encoder,
            encoder_ext,
            forced_ext: None,
            dont_transcode: HashSet::new(),
            renaming_filter: RenamingFilter::None,
        })
    }

    #[test]
    fn an_idle_pool_shuts_down() {
        let config = dry_run_config(4);
        let console = Arc::new(Console::new());
        Pool::start(config, console).shutdown();
    }

    #[test]
    fn published_units_drain_before_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.flac");
        fs::write(&input, b"x").unwrap();

        let codecs = Codecs::new(Vec::new(), Vec::new(), Vec::new());
        let decoder = codecs.decoder_for(".flac").unwrap().clone();

        let config = dry_run_config(2);
        let console = Arc::new(Console::new());
        let pool = Pool::start(config, console.clone());

        for n in 0..8 {
            pool.publish(
                &console,
                WorkUnit {
                    decoder: decoder.clone(),
                    input: input.clone(),
                    output: dir.path().join(format!("out{n}.mp3")),
                    metadata: fs::metadata(&input).unwrap(),
                },
            );
        }

        pool.shutdown();
    }
}
