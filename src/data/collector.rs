//! Locate feature files for each technique

use crate::core::{Result, SVMError};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Candidates around ascending pitch transitions (hammer-on side)
pub const ASCENDING_SUFFIX: &str = ".ascending.candidate.raw.feature";
/// Candidates around descending pitch transitions (pull-off side)
pub const DESCENDING_SUFFIX: &str = ".descending.candidate.raw.feature";
pub const RAW_SUFFIX: &str = ".raw.feature";

/// File suffix to scan for, given the requested techniques
///
/// Hammer-ons only appear on ascending candidates and pull-offs on
/// descending ones, so a list naming just one of the two narrows the search.
pub fn feature_suffix<S: AsRef<str>>(techniques: &[S]) -> &'static str {
    let has = |name: &str| techniques.iter().any(|t| t.as_ref() == name);
    match (has("hamm"), has("pull")) {
        (true, false) => ASCENDING_SUFFIX,
        (false, true) => DESCENDING_SUFFIX,
        _ => RAW_SUFFIX,
    }
}

/// Map every technique (sorted) to the sorted feature files whose base name
/// contains it
///
/// A file may belong to several techniques. Techniques without files are
/// kept with an empty list.
pub fn collect_technique_files<P: AsRef<Path>, S: AsRef<str>>(
    dir: P,
    techniques: &[S],
) -> Result<BTreeMap<String, Vec<PathBuf>>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(SVMError::MissingFile(dir.to_path_buf()));
    }

    let suffix = feature_suffix(techniques);
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.ends_with(suffix))
            .unwrap_or(false);
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    debug!("Found {} '*{}' files in {}", files.len(), suffix, dir.display());

    let mut collected = BTreeMap::new();
    for technique in techniques {
        let technique = technique.as_ref();
        let selected: Vec<PathBuf> = files
            .iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| name.contains(technique))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        if selected.is_empty() {
            warn!("No feature files found for technique '{technique}'");
        }
        collected.insert(technique.to_string(), selected);
    }

    Ok(collected)
}
