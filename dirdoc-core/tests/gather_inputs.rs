use std::fs;
use std::path::Path;

use dirdoc_core::gather::{gather, DirContents, TRUNCATION_MARKER};
use dirdoc_core::scan::{scan, IgnoreChain, IGNORE_FILE};
use tempfile::tempdir;

fn root_chain(root: &Path) -> IgnoreChain {
    scan(root)
        .expect("scan should succeed")
        .chains
        .get(root)
        .cloned()
        .expect("root should have a chain")
}

#[test]
fn hidden_ignored_binary_and_oversized_files_are_filtered() {
    let temp = tempdir().expect("tempdir should be creatable");
    let root = temp.path();
    fs::write(root.join(IGNORE_FILE), "*.log\n!keep.log\n").expect("write ignore file");
    fs::write(root.join("app.log"), "log noise\n").expect("write app.log");
    fs::write(root.join("keep.log"), "kept log\n").expect("write keep.log");
    fs::write(root.join(".secret"), "hidden\n").expect("write .secret");
    fs::write(root.join("blob.bin"), b"\x00\x01\x02").expect("write blob.bin");
    fs::write(root.join("big.txt"), "0123456789abcdefThis part is cut\n").expect("write big.txt");
    fs::write(root.join("main.rs"), "fn main() {}\n").expect("write main.rs");

    let chain = root_chain(root);
    let contents = gather(root, &chain, 16);

    let names: Vec<&str> = contents.files.iter().map(|file| file.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["big.txt", "keep.log", "main.rs"],
        "only visible, negation-kept, textual files should survive, in name order"
    );

    let big = &contents.files[0];
    assert!(big.truncated, "a file over the cap should be marked truncated");
    assert_eq!(
        big.text,
        format!("0123456789abcdef{TRUNCATION_MARKER}"),
        "content should be cut at the byte cap with the marker appended"
    );
    let main = &contents.files[2];
    assert!(!main.truncated);
    assert_eq!(main.text, "fn main() {}\n");

    // Census counts every non-artifact entry before filtering.
    assert_eq!(contents.raw_entries, 7);
    assert!(!contents.is_empty());
}

#[test]
fn child_artifacts_feed_summaries_unless_the_child_is_excluded() {
    let temp = tempdir().expect("tempdir should be creatable");
    let root = temp.path();
    fs::create_dir_all(root.join("child")).expect("mkdir child");
    fs::create_dir_all(root.join("skipped")).expect("mkdir skipped");
    fs::create_dir_all(root.join("silent")).expect("mkdir silent");
    fs::write(root.join(IGNORE_FILE), "skipped/\n").expect("write ignore file");
    fs::write(root.join("child/.dirdoc.md"), "Child summary.\n").expect("write child artifact");
    fs::write(root.join("skipped/.dirdoc.md"), "Skipped summary.\n")
        .expect("write skipped artifact");

    let chain = root_chain(root);
    let contents = gather(root, &chain, 4096);

    assert!(
        contents.child_summaries.contains("### child"),
        "the visible child should contribute a heading, got {:?}",
        contents.child_summaries
    );
    assert!(
        contents.child_summaries.contains("Child summary."),
        "the visible child's text should be folded in"
    );
    assert!(
        !contents.child_summaries.contains("skipped"),
        "an ignore-excluded child must not leak into the summaries"
    );
    assert!(
        !contents.child_summaries.contains("silent"),
        "a child without an artifact contributes nothing"
    );
}

#[test]
fn blank_child_artifacts_contribute_no_heading() {
    let temp = tempdir().expect("tempdir should be creatable");
    let root = temp.path();
    fs::create_dir_all(root.join("hollow")).expect("mkdir hollow");
    fs::write(root.join("hollow/.dirdoc.md"), "  \n\n").expect("write blank artifact");

    let chain = root_chain(root);
    let contents = gather(root, &chain, 4096);

    assert_eq!(
        contents.child_summaries, "",
        "a whitespace-only child summary must not fold a heading into the parent"
    );
    assert!(contents.is_empty());
    assert_eq!(contents.raw_entries, 1, "the child directory itself is still counted");
}

#[test]
fn directory_only_patterns_do_not_drop_plain_files() {
    let temp = tempdir().expect("tempdir should be creatable");
    let root = temp.path();
    fs::write(root.join(IGNORE_FILE), "logs/\n").expect("write ignore file");
    fs::write(root.join("logs"), "a file that merely shares the name\n").expect("write logs file");

    let chain = root_chain(root);
    let contents = gather(root, &chain, 4096);

    let names: Vec<&str> = contents.files.iter().map(|file| file.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["logs"],
        "a trailing-slash pattern should govern directories only"
    );
}

#[test]
fn unreadable_directories_yield_empty_contents() {
    let temp = tempdir().expect("tempdir should be creatable");
    let missing = temp.path().join("never-created");

    let contents = gather(&missing, &IgnoreChain::new(), 4096);
    assert!(contents.is_empty(), "a vanished directory should gather nothing");
    assert_eq!(contents.raw_entries, 0);
}

#[test]
fn blank_child_summaries_count_as_empty() {
    let contents = DirContents {
        files: Vec::new(),
        child_summaries: "  \n\n".to_string(),
        raw_entries: 2,
    };
    assert!(
        contents.is_empty(),
        "whitespace-only summaries should not rescue a directory from the stub path"
    );
}
