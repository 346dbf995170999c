//! Output file discovery and selection
//!
//! The fetch engine names every output `<title>-<content_id>.<ext>`, so the
//! files belonging to one task are found by matching that suffix and then
//! narrowed to the containers a media kind is delivered as.

use std::path::{Path, PathBuf};

use crate::types::{DeliveryKind, MediaKind};

/// Container delivered for audio requests
pub const AUDIO_EXTENSION: &str = "mp3";

/// Preferred container for video requests
pub const PRIMARY_VIDEO_EXTENSION: &str = "mp4";

/// Video containers accepted when no mp4 was produced
pub const SECONDARY_VIDEO_EXTENSIONS: &[&str] = &["mkv", "webm", "mov"];

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    extension_of(path).is_some_and(|ext| allowed.contains(&ext.as_str()))
}

/// Pick the files relevant to `kind` from a candidate set
///
/// Candidates are sorted before filtering, so the result does not depend on
/// the order the filesystem listed them in.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use dropzone_dl::selector::select_outputs;
/// use dropzone_dl::types::MediaKind;
///
/// let files = vec![PathBuf::from("a-x.webm"), PathBuf::from("a-x.mp4")];
/// assert_eq!(select_outputs(&files, MediaKind::Video), vec![PathBuf::from("a-x.mp4")]);
/// ```
pub fn select_outputs(candidates: &[PathBuf], kind: MediaKind) -> Vec<PathBuf> {
    let mut sorted = candidates.to_vec();
    sorted.sort();
    sorted.dedup();

    match kind {
        MediaKind::Audio => sorted
            .into_iter()
            .filter(|p| has_extension(p, &[AUDIO_EXTENSION]))
            .collect(),
        MediaKind::Video => {
            let primary: Vec<PathBuf> = sorted
                .iter()
                .filter(|p| has_extension(p, &[PRIMARY_VIDEO_EXTENSION]))
                .cloned()
                .collect();
            if !primary.is_empty() {
                return primary;
            }
            sorted
                .into_iter()
                .filter(|p| has_extension(p, SECONDARY_VIDEO_EXTENSIONS))
                .collect()
        }
    }
}

/// List files in `dir` named `*-<content_id>.*`, sorted
///
/// A missing directory yields an empty list.
pub fn find_output_files(dir: &Path, content_id: &str) -> std::io::Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let marker = format!("-{content_id}.");
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if matches_content_id(name, &marker) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

// `*-<id>.*`: something before the marker, an extension after it
fn matches_content_id(name: &str, marker: &str) -> bool {
    name.match_indices(marker)
        .any(|(idx, _)| idx > 0 && idx + marker.len() < name.len())
}

/// Transport handling for a delivered file, by extension
pub fn delivery_kind_for(path: &Path) -> DeliveryKind {
    match extension_of(path).as_deref() {
        Some(AUDIO_EXTENSION) => DeliveryKind::Audio,
        Some(ext) if ext == PRIMARY_VIDEO_EXTENSION || SECONDARY_VIDEO_EXTENSIONS.contains(&ext) => {
            DeliveryKind::Video
        }
        _ => DeliveryKind::Generic,
    }
}
