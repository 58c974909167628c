//! Prompt assembly from a placeholder template, and cleanup of model
//! output before it is persisted.

use crate::gather::LocalFile;

pub const DIRECTORY_PLACEHOLDER: &str = "{{directory}}";
pub const CHILD_SUMMARIES_PLACEHOLDER: &str = "{{child_summaries}}";
pub const FILE_CONTENTS_PLACEHOLDER: &str = "{{file_contents}}";

/// Render the prompt for one directory.
///
/// `dir_rel` is the directory's path relative to the scan root (`.` for the
/// root itself); absolute paths never reach a prompt.
pub fn render(
    template: &str,
    dir_rel: &str,
    child_summaries: &str,
    files: &[LocalFile],
) -> String {
    let mut file_block = String::new();
    for file in files {
        file_block.push_str(&format!("--- {} ---\n{}\n", file.name, file.text.trim_end()));
    }

    let child_block = if child_summaries.trim().is_empty() {
        "(none)".to_string()
    } else {
        child_summaries.trim_end().to_string()
    };
    let file_part = if file_block.is_empty() {
        "(none)".to_string()
    } else {
        file_block
    };

    template
        .replace(DIRECTORY_PLACEHOLDER, dir_rel)
        .replace(CHILD_SUMMARIES_PLACEHOLDER, &child_block)
        .replace(FILE_CONTENTS_PLACEHOLDER, &file_part)
}

/// Strip one wrapping markdown code fence from model output, if present.
/// Models routinely wrap a whole reply in ```` ```markdown ```` fences even
/// when asked for bare markdown.
pub fn clean_response(text: &str) -> String {
    let trimmed = text.trim();
    let fenced = regex::Regex::new(r"(?s)\A```[A-Za-z0-9_-]*\r?\n(.*?)\r?\n?```\z").unwrap();
    match fenced.captures(trimmed) {
        Some(captures) => captures[1].to_string(),
        None => trimmed.to_string(),
    }
}
