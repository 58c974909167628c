//! Prompt input collection for one directory: child summaries read from
//! child artifacts, filtered local file contents, and the raw entry census
//! used by the empty-content guard.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::artifact;
use crate::scan::{admits_child_dir, IgnoreChain};

/// How much of a file head is sniffed for NUL bytes before declaring it
/// binary.
const BINARY_SNIFF_BYTES: usize = 8192;

/// Appended to file content cut at the size cap.
pub const TRUNCATION_MARKER: &str = "\n[truncated]\n";

/// One file's contribution to the prompt.
#[derive(Debug, Clone)]
pub struct LocalFile {
    pub name: String,
    pub text: String,
    pub truncated: bool,
}

/// Everything the prompt needs from one directory.
#[derive(Debug, Default)]
pub struct DirContents {
    pub files: Vec<LocalFile>,
    pub child_summaries: String,
    /// Directory entries other than artifact files, counted before any
    /// filtering. Lets the caller distinguish a truly empty directory from
    /// one whose entries were all filtered out.
    pub raw_entries: usize,
}

impl DirContents {
    /// True when generation would have an empty prompt: no usable files and
    /// no child summary text.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.child_summaries.trim().is_empty()
    }
}

/// Collect prompt inputs for `dir`. Unreadable entries are skipped with a
/// warning; gathering never fails the directory.
pub fn gather(dir: &Path, chain: &IgnoreChain, max_file_bytes: usize) -> DirContents {
    let mut contents = DirContents::default();

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(dir = %dir.display(), error = %err, "[GATHER] Unreadable directory");
            return contents;
        }
    };

    let mut files: Vec<(String, PathBuf)> = Vec::new();
    let mut child_dirs: Vec<(String, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "[GATHER] Unreadable entry skipped");
                continue;
            }
        };
        let path = entry.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => {
                warn!(path = %path.display(), "[GATHER] Entry with non-UTF-8 name skipped");
                continue;
            }
        };
        if !artifact::is_artifact_name(&name) {
            contents.raw_entries += 1;
        }
        match entry.file_type() {
            Ok(file_type) if file_type.is_dir() => child_dirs.push((name, path)),
            Ok(file_type) if file_type.is_file() => files.push((name, path)),
            Ok(_) => {}
            Err(err) => {
                warn!(path = %path.display(), error = %err, "[GATHER] Entry type unreadable")
            }
        }
    }
    files.sort();
    child_dirs.sort();

    for (name, path) in child_dirs {
        if !admits_child_dir(&name, &path, chain) {
            continue;
        }
        if let Some(text) = artifact::read_text(&path) {
            // A heading with no body must not defeat the empty-content guard.
            if text.trim().is_empty() {
                continue;
            }
            contents
                .child_summaries
                .push_str(&format!("### {}\n\n{}\n\n", name, text.trim_end()));
        }
    }

    for (name, path) in files {
        // Hidden-name filtering also covers the artifact files themselves.
        if name.starts_with('.') {
            continue;
        }
        if chain.excludes(&path, false) {
            debug!(path = %path.display(), "[GATHER] File excluded by ignore rules");
            continue;
        }
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "[GATHER] Unreadable file skipped");
                continue;
            }
        };
        if looks_binary(&bytes) {
            debug!(path = %path.display(), "[GATHER] Binary file skipped");
            continue;
        }
        let truncated = bytes.len() > max_file_bytes;
        let cut = if truncated {
            &bytes[..max_file_bytes]
        } else {
            &bytes[..]
        };
        let mut text = String::from_utf8_lossy(cut).into_owned();
        if truncated {
            text.push_str(TRUNCATION_MARKER);
        }
        contents.files.push(LocalFile {
            name,
            text,
            truncated,
        });
    }

    debug!(
        dir = %dir.display(),
        files = contents.files.len(),
        raw_entries = contents.raw_entries,
        "[GATHER] Collected prompt inputs"
    );
    contents
}

/// A NUL byte in the head means binary.
fn looks_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(BINARY_SNIFF_BYTES).any(|byte| *byte == 0)
}
