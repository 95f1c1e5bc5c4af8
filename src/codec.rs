use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;

/// The closed set of codecs the tool knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    Flac,
    Lame,
    Vorbis,
    Alac,
    /// Passthrough, used for WAV on either side of a pipeline.
    Dummy,
}

/// Describes how one external codec attaches to a transcoding pipeline.
///
/// Adapters are finalized before the workers start and shared read-only
/// behind an [`Arc`]; two adapters are the same codec iff they are the same
/// allocation.
pub(crate) struct Codec {
    kind: Kind,
    extra: Vec<String>,
}

impl Codec {
    fn new(kind: Kind, extra: Vec<String>) -> Arc<Self> {
        Arc::new(Codec { kind, extra })
    }

    /// Whether the encoder stage can consume decoded audio on stdin.
    pub(crate) fn encodes_from_stdin(&self) -> bool {
        !matches!(self.kind, Kind::Alac)
    }

    /// Whether the encoder stage can emit the encoded file on stdout.
    pub(crate) fn encodes_to_stdout(&self) -> bool {
        !matches!(self.kind, Kind::Alac)
    }

    /// The argv of the decoding stage, reading the input on stdin and
    /// emitting WAV on stdout.
    ///
    /// `None` when the codec has no decoder; an empty argv when decoding is a
    /// passthrough and no stage needs to be spawned.
    pub(crate) fn decoder_args(&self) -> Option<Vec<OsString>> {
        match self.kind {
            Kind::Flac => Some(args(["flac", "-s", "-d", "-c", "-"])),
            Kind::Lame => Some(args(["lame", "-S", "--decode", "-", "-"])),
            Kind::Vorbis => Some(args(["oggdec", "-Q", "-o", "-", "-"])),
            Kind::Dummy => Some(Vec::new()),
            Kind::Alac => None,
        }
    }

    /// The argv of the encoding stage, with the user-supplied extra flags
    /// inserted in insertion order.
    ///
    /// `input` and `output` are only consulted by encoders that cannot use
    /// stdin and stdout and open their files themselves.
    pub(crate) fn encoder_args(
        &self,
        input: Option<&Path>,
        output: Option<&Path>,
    ) -> Vec<OsString> {
        match self.kind {
            Kind::Flac => {
                let mut argv = args(["flac", "-s", "-c"]);
                argv.extend(self.extra.iter().map(OsString::from));
                argv.push("-".into());
                argv
            }
            Kind::Lame => {
                let mut argv = args(["lame", "-S", "-V2"]);
                argv.extend(self.extra.iter().map(OsString::from));
                argv.push("-".into());
                argv.push("-".into());
                argv
            }
            Kind::Vorbis => {
                let mut argv = args(["oggenc", "-Q", "-r"]);
                argv.extend(self.extra.iter().map(OsString::from));
                argv.push("-".into());
                argv
            }
            Kind::Alac => {
                let mut argv = args(["afconvert", "-d", "alac"]);
                argv.extend(self.extra.iter().map(OsString::from));

                if let Some(input) = input {
                    argv.push(input.as_os_str().to_owned());
                }

                if let Some(output) = output {
                    argv.push(output.as_os_str().to_owned());
                }

                argv
            }
            Kind::Dummy => Vec::new(),
        }
    }
}

fn args<const N: usize>(argv: [&str; N]) -> Vec<OsString> {
    argv.into_iter().map(OsString::from).collect()
}

/// The codec registry, holding one shared adapter per codec.
pub(crate) struct Codecs {
    flac: Arc<Codec>,
    lame: Arc<Codec>,
    vorbis: Arc<Codec>,
    alac: Arc<Codec>,
    dummy: Arc<Codec>,
}

impl Codecs {
    pub(crate) fn new(flac: Vec<String>, lame: Vec<String>, vorbis: Vec<String>) -> Self {
        Codecs {
            flac: Codec::new(Kind::Flac, flac),
            lame: Codec::new(Kind::Lame, lame),
            vorbis: Codec::new(Kind::Vorbis, vorbis),
            alac: Codec::new(Kind::Alac, Vec::new()),
            dummy: Codec::new(Kind::Dummy, Vec::new()),
        }
    }

    /// Look up the decoder for a normalized (lowercased, dotted) extension.
    pub(crate) fn decoder_for(&self, ext: &str) -> Option<&Arc<Codec>> {
        match ext {
            ".flac" => Some(&self.flac),
            ".mp3" => Some(&self.lame),
            ".ogg" | ".oga" => Some(&self.vorbis),
            ".wav" => Some(&self.dummy),
            _ => None,
        }
    }

    /// Resolve an encoder name or alias to its adapter and the canonical
    /// extension of the files it produces.
    pub(crate) fn encoder(&self, name: &str) -> Option<(Arc<Codec>, &'static str)> {
        match name {
            "alac" => Some((self.alac.clone(), ".m4a")),
            "flac" => Some((self.flac.clone(), ".flac")),
            "lame" | "mp3" => Some((self.lame.clone(), ".mp3")),
            "vorbis" => Some((self.vorbis.clone(), ".ogg")),
            "dummy" | "wav" | "wave" => Some((self.dummy.clone(), ".wav")),
            _ => None,
        }
    }
}
