//! Training file discovery.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extensions picked up when scanning a directory for MIDI files.
pub const DEFAULT_EXTENSIONS: &[&str] = &["mid", "midi"];

/// Resolve a list of files and directories into training files.
///
/// - A file is taken as-is, whatever its extension.
/// - A directory contributes its direct children whose extension matches
///   one of `extensions`, ignoring case. Subdirectories are not entered.
///   Each directory's files are sorted by path so the corpus order, and
///   therefore the vocabulary order, does not depend on the filesystem.
pub fn discover_training_files<P: AsRef<Path>, E: AsRef<str>>(
    inputs: &[P],
    extensions: &[E],
) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        let input = input.as_ref();
        if input.is_dir() {
            let mut found = list_files(input, extensions)?;
            found.sort();
            debug!(dir = %input.display(), files = found.len(), "scanned corpus directory");
            files.extend(found);
        } else if input.is_file() {
            files.push(input.to_path_buf());
        } else {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("training input not found: {}", input.display()),
            ));
        }
    }

    Ok(files)
}

fn list_files<E: AsRef<str>>(dir: &Path, extensions: &[E]) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_extension(&path, extensions) {
            files.push(path);
        }
    }
    Ok(files)
}

/// Case-insensitive extension check.
pub fn has_extension<E: AsRef<str>>(path: &Path, extensions: &[E]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            extensions
                .iter()
                .any(|wanted| wanted.as_ref().eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = PathBuf::from("target").join("test_discovery").join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn scans_directories_by_extension() {
        let dir = scratch_dir("scan");
        for name in ["b.mid", "a.MIDI", "notes.txt", "c.midi"] {
            fs::write(dir.join(name), b"").unwrap();
        }
        fs::create_dir_all(dir.join("nested.mid")).unwrap();

        let files = discover_training_files(&[&dir], DEFAULT_EXTENSIONS).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.MIDI", "b.mid", "c.midi"]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn explicit_files_bypass_the_filter() {
        let dir = scratch_dir("explicit");
        let corpus = dir.join("corpus.txt");
        fs::write(&corpus, b"C4 E4").unwrap();

        let files = discover_training_files(&[&corpus], DEFAULT_EXTENSIONS).unwrap();
        assert_eq!(files, vec![corpus]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_input_is_an_error() {
        let result = discover_training_files(&["target/definitely/not/here.mid"], DEFAULT_EXTENSIONS);
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotFound);
    }
}
