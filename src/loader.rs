use std::path::Path;

use walkdir::WalkDir;

use crate::models::Document;

/// Extensions the loader understands. Anything else is skipped with a log
/// line rather than failing the batch.
const SUPPORTED_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// Load every supported document under `dir`, sorted by path so ingestion
/// order (and therefore chunk corpus order) is deterministic.
pub fn load_directory(dir: &Path) -> Vec<Document> {
    let mut paths = Vec::new();

    for entry in WalkDir::new(dir)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(|e| e.ok())
    {
        if entry.file_type().is_file() {
            paths.push(entry.into_path());
        }
    }
    paths.sort();

    let mut documents = Vec::new();
    for path in paths {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            tracing::warn!("Skipping unsupported file: {}", path.display());
            continue;
        }

        match std::fs::read_to_string(&path) {
            Ok(text) => {
                let file_name = path
                    .file_name()
                    .map(|f| f.to_string_lossy().to_string())
                    .unwrap_or_default();
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| file_name.clone());

                documents.push(
                    Document::new(Some(stem), text)
                        .with_metadata("file_name", file_name)
                        .with_metadata("source", path.display().to_string()),
                );
            }
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}", path.display());
            }
        }
    }

    documents
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_string_lossy()
            .starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_loads_supported_files_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.md"), "second").unwrap();
        fs::write(dir.path().join("a.txt"), "first").unwrap();

        let docs = load_directory(dir.path());
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id.as_deref(), Some("a"));
        assert_eq!(docs[0].text, "first");
        assert_eq!(docs[1].id.as_deref(), Some("b"));
    }

    #[test]
    fn test_unsupported_extensions_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("data.bin"), [0u8, 159, 146]).unwrap();
        fs::write(dir.path().join("notes.txt"), "kept").unwrap();

        let docs = load_directory(dir.path());
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id.as_deref(), Some("notes"));
    }

    #[test]
    fn test_unreadable_file_does_not_fail_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        // Invalid UTF-8 in a .txt file: read_to_string fails, batch continues.
        fs::write(dir.path().join("bad.txt"), [0xff, 0xfe, 0xfd]).unwrap();
        fs::write(dir.path().join("good.txt"), "ok").unwrap();

        let docs = load_directory(dir.path());
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "ok");
    }

    #[test]
    fn test_hidden_directories_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".cache")).unwrap();
        fs::write(dir.path().join(".cache/state.txt"), "secret").unwrap();
        fs::write(dir.path().join("visible.txt"), "hello").unwrap();

        let docs = load_directory(dir.path());
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "hello");
    }

    #[test]
    fn test_metadata_carries_file_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("guide.md"), "content").unwrap();

        let docs = load_directory(dir.path());
        assert_eq!(
            docs[0].metadata.get("file_name").and_then(|v| v.as_str()),
            Some("guide.md")
        );
    }
}
