use std::path::Path;

use anyhow::Result;
use lofty::config::WriteOptions;
use lofty::file::TaggedFileExt;
use lofty::tag::{Accessor, Tag, TagExt};

/// Copy the common tags from a transcoded file's input to its output.
///
/// Only the fields every supported container can express are carried over:
/// title, artist, album, track number, year, genre and comment. When either
/// side cannot be read as a tagged audio file, or the input carries no tags,
/// nothing happens. Only an actual write failure surfaces as an error.
pub(crate) fn transfer(input: &Path, output: &Path) -> Result<()> {
    let Ok(source) = lofty::read_from_path(input) else {
        return Ok(());
    };

    let Some(source_tag) = source.primary_tag().or_else(|| source.first_tag()) else {
        return Ok(());
    };

    let Ok(target) = lofty::read_from_path(output) else {
        return Ok(());
    };

    let mut tag = match target.primary_tag() {
        Some(tag) => tag.clone(),
        None => Tag::new(target.primary_tag_type()),
    };

    if let Some(title) = source_tag.title() {
        tag.set_title(title.into_owned());
    }

    if let Some(artist) = source_tag.artist() {
        tag.set_artist(artist.into_owned());
    }

    if let Some(album) = source_tag.album() {
        tag.set_album(album.into_owned());
    }

    if let Some(genre) = source_tag.genre() {
        tag.set_genre(genre.into_owned());
    }

    if let Some(comment) = source_tag.comment() {
        tag.set_comment(comment.into_owned());
    }

    if let Some(track) = source_tag.track() {
        tag.set_track(track);
    }

    if let Some(year) = source_tag.year() {
        tag.set_year(year);
    }

    tag.save_to_path(output, WriteOptions::default())?;
    Ok(())
}
