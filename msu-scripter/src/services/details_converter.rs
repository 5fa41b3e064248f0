//! Re-keying MSU details documents for another MSU type

use msu_common::Result;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::models::{substitute_track_prefix, MsuDetails, MsuDetailsTrack, PackPaths};
use crate::msu_types::{TrackSchema, TrackSchemaRegistry};

/// Convert `details` written for `from` into `to` numbering and keys
///
/// Entries resolve by alias key, falling back to their track number. Entries
/// with no destination track are dropped. PCM paths are rewritten from
/// `<oldBase>-<old>` to `<newBase>-<new>`.
pub fn convert_msu_details(
    registry: &TrackSchemaRegistry,
    details: &MsuDetails,
    from: &TrackSchema,
    to: &TrackSchema,
    old_msu_path: &Path,
    new_msu_path: &Path,
) -> Result<MsuDetails> {
    let remap = registry.remap(from, to)?;
    let old_paths = PackPaths::from_msu_path(old_msu_path);
    let new_paths = PackPaths::from_msu_path(new_msu_path);

    let mut tracks = BTreeMap::new();
    for (key, entry) in &details.tracks {
        let Some(old_track) = from
            .track_by_alias(key)
            .or_else(|| entry.track_number.and_then(|n| from.track(n)))
        else {
            debug!(key = %key, "Details entry matches no source track, dropping");
            continue;
        };

        let Some(new_track) = to
            .track_by_alias(key)
            .or_else(|| remap.apply(old_track.number).and_then(|n| to.track(n)))
        else {
            debug!(key = %key, track = old_track.number, "No destination track, dropping");
            continue;
        };

        let rewrite = |song: &MsuDetailsTrack| MsuDetailsTrack {
            track_number: Some(new_track.number),
            path: song.path.as_ref().map(|p| {
                substitute_track_prefix(
                    p,
                    &old_paths.base,
                    old_track.number,
                    &new_paths.base,
                    new_track.number,
                )
                .unwrap_or_else(|| p.clone())
            }),
            alts: Vec::new(),
            ..song.clone()
        };

        let mut converted = rewrite(entry);
        converted.alts = entry.alts.iter().map(rewrite).collect();

        let new_key = new_track
            .primary_alias()
            .map(str::to_string)
            .unwrap_or_else(|| new_track.number.to_string());
        tracks.insert(new_key, converted);
    }

    Ok(MsuDetails {
        msu_type: Some(to.name().to_string()),
        tracks,
        ..details.clone()
    })
}
