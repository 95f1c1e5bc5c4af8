use std::ffi::OsString;
use std::fs::File;
use std::io;
use std::process::{Child, Command, Stdio};

use anyhow::{Context, Result, bail};

use crate::shell;

/// A linear chain of child processes connected by stdio pipes.
///
/// The first stage reads from the attached input file (or inherits stdin),
/// every following stage reads the previous stage's stdout, and the last
/// stage writes to the attached output file (or inherits stdout).
pub(crate) struct Pipeline {
    stages: Vec<Command>,
    input: Option<File>,
    output: Option<File>,
}

impl Pipeline {
    pub(crate) fn new() -> Self {
        Pipeline {
            stages: Vec::new(),
            input: None,
            output: None,
        }
    }

    /// Feed the first stage from an opened file.
    pub(crate) fn read_from(&mut self, file: File) {
        self.input = Some(file);
    }

    /// Send the last stage's stdout to an opened file.
    pub(crate) fn write_to(&mut self, file: File) {
        self.output = Some(file);
    }

    /// Append a stage. An empty argv is a passthrough and adds nothing.
    pub(crate) fn push(&mut self, argv: Vec<OsString>) {
        let Some((program, rest)) = argv.split_first() else {
            return;
        };

        let mut command = Command::new(program);
        command.args(rest);
        self.stages.push(command);
    }

    /// Run the chain to completion.
    ///
    /// Succeeds iff every stage exits with status zero. A chain with no
    /// stages degenerates to copying the input file to the output file.
    pub(crate) fn run(&mut self) -> Result<()> {
        let mut input = self.input.take();
        let mut output = self.output.take();

        if self.stages.is_empty() {
            let Some(mut input) = input else {
                bail!("passthrough pipeline without an input");
            };

            let Some(mut output) = output else {
                bail!("passthrough pipeline without an output");
            };

            io::copy(&mut input, &mut output).context("copying audio")?;
            return Ok(());
        }

        let last = self.stages.len() - 1;
        let mut children: Vec<Child> = Vec::with_capacity(self.stages.len());
        let mut upstream = None;

        for (n, command) in self.stages.iter_mut().enumerate() {
            if n == 0 {
                if let Some(file) = input.take() {
                    command.stdin(Stdio::from(file));
                }
            } else {
                let Some(upstream) = upstream.take() else {
                    bail!("pipeline stage without an upstream pipe");
                };

                command.stdin(Stdio::from(upstream));
            }

            if n == last {
                if let Some(file) = output.take() {
                    command.stdout(Stdio::from(file));
                }
            } else {
                command.stdout(Stdio::piped());
            }

            let program = shell::escape(command.get_program()).into_owned();

            let mut child = match command.spawn() {
                Ok(child) => child,
                Err(e) => {
                    reap(&mut children);
                    return Err(e).with_context(|| format!("spawning `{program}`"));
                }
            };

            if n != last {
                upstream = child.stdout.take();
            }

            children.push(child);
        }

        let mut failure = None;

        for (n, child) in children.iter_mut().enumerate() {
            match child.wait() {
                Ok(status) if status.success() => {}
                Ok(status) => {
                    let program = shell::escape(self.stages[n].get_program());
                    failure.get_or_insert(format!("`{program}` exited with {status}"));
                }
                Err(e) => {
                    failure.get_or_insert(format!("waiting for a pipeline command: {e}"));
                }
            }
        }

        if let Some(failure) = failure {
            bail!("{failure}");
        }

        Ok(())
    }

    /// Render the chain in shell notation for diagnostics.
    pub(crate) fn render(&self) -> String {
        use core::fmt::Write;

        let mut o = String::new();

        for (n, command) in self.stages.iter().enumerate() {
            if n > 0 {
                o.push_str(" | ");
            }

            _ = write!(o, "{}", shell::escape(command.get_program()));

            for arg in command.get_args() {
                _ = write!(o, " {}", shell::escape(arg));
            }
        }

        o
    }
}

fn reap(children: &mut [Child]) {
    for child in children {
        _ = child.kill();
        _ = child.wait();
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;
    use std::fs::{self, File};
    use std::io::Write;

    use super::Pipeline;

    fn argv(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn chained_stages_feed_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("out");

        let mut pipeline = Pipeline::new();
        pipeline.push(argv(&["sh", "-c", "printf 'hello'"]));
        pipeline.push(argv(&["sh", "-c", "cat"]));
        pipeline.write_to(File::create(&out_path).unwrap());

        pipeline.run().unwrap();
        assert_eq!(fs::read_to_string(&out_path).unwrap(), "hello");
    }

    #[test]
    fn a_failing_stage_fails_the_pipeline() {
        let mut pipeline = Pipeline::new();
        pipeline.push(argv(&["sh", "-c", "exit 3"]));

        let e = pipeline.run().unwrap_err();
        assert!(e.to_string().contains("sh"), "{e}");
    }

    #[test]
    fn a_missing_program_fails_the_pipeline() {
        let mut pipeline = Pipeline::new();
        pipeline.push(argv(&["syncvert-no-such-program"]));
        assert!(pipeline.run().is_err());
    }

    #[test]
    fn an_empty_pipeline_copies_input_to_output() {
        let dir = tempfile::tempdir().unwrap();
        let in_path = dir.path().join("in");
        let out_path = dir.path().join("out");

        File::create(&in_path)
            .unwrap()
            .write_all(b"payload")
            .unwrap();

        let mut pipeline = Pipeline::new();
        pipeline.read_from(File::open(&in_path).unwrap());
        pipeline.write_to(File::create(&out_path).unwrap());

        pipeline.run().unwrap();
        assert_eq!(fs::read(&out_path).unwrap(), b"payload");
    }

    #[test]
    fn rendering_includes_every_stage() {
        let mut pipeline = Pipeline::new();
        pipeline.push(argv(&["flac", "-s", "-d", "-c", "-"]));
        pipeline.push(argv(&["lame", "-S", "-V2", "-", "-"]));

        assert_eq!(pipeline.render(), "flac -s -d -c - | lame -S -V2 - -");
    }
}
