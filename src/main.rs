//! A tool to mirror and transcode a music tree.
//!
//! See [`syncvert`] documentation for more information.

use anyhow::Result;
use clap::Parser;

/// A tool to mirror and transcode a music tree.
#[derive(Parser)]
#[command(about, max_term_width = 80)]
pub struct Opts {
    #[command(flatten)]
    inner: syncvert::cli::Syncvert,
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    syncvert::cli::entry(&opts.inner)
}
