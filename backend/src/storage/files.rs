//! File helpers shared by the file adapters and the in-process backup path.

use anyhow::{Context, Result};
use shared::Record;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Create the parent directory of `path` if it has one and it is missing
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
    }
    Ok(())
}

/// Replace the contents of `path` by writing a temp file and renaming it over.
///
/// The temp file gets a unique name next to `path`, so concurrent rewrites
/// never share one; each rename swaps in a complete file and the last one wins.
/// `fill` receives a buffered writer for the temp file.
pub fn rewrite_atomically<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;

    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        fill(&mut writer)?;
        writer.flush()?;
    }

    temp.persist(path)
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

/// Byte-for-byte copy of `source` to `target`, creating parent directories
pub fn copy_file(source: &Path, target: &Path) -> Result<PathBuf> {
    ensure_parent_dir(target)?;
    fs::copy(source, target)
        .with_context(|| format!("copying {} to {}", source.display(), target.display()))?;
    Ok(target.to_path_buf())
}

/// Write `records` as one pretty-printed JSON array to `target`
pub fn write_json_snapshot(target: &Path, records: &[Record]) -> Result<PathBuf> {
    ensure_parent_dir(target)?;
    let file = File::create(target).with_context(|| format!("creating {}", target.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.flush()?;
    Ok(target.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_rewrite_atomically_replaces_content_and_cleans_temp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, "old").unwrap();

        rewrite_atomically(&path, |w| {
            w.write_all(b"new")?;
            Ok(())
        })
        .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["data.json"]);
    }

    #[test]
    fn test_failed_fill_leaves_target_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, "old").unwrap();

        let result = rewrite_atomically(&path, |w| {
            w.write_all(b"partial")?;
            anyhow::bail!("serialization failed")
        });

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "old");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_concurrent_rewrites_leave_one_complete_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        let payloads: Vec<String> = (0..4).map(|n| n.to_string().repeat(20_000)).collect();

        std::thread::scope(|scope| {
            for payload in &payloads {
                let path = &path;
                scope.spawn(move || {
                    for _ in 0..25 {
                        rewrite_atomically(path, |w| {
                            w.write_all(payload.as_bytes())?;
                            Ok(())
                        })
                        .unwrap();
                    }
                });
            }
        });

        let content = fs::read_to_string(&path).unwrap();
        assert!(payloads.contains(&content));
    }

    #[test]
    fn test_copy_file_creates_parents() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.db");
        fs::write(&source, [0u8, 1, 2, 255]).unwrap();
        let target = dir.path().join("nested/deeper/a.bak");

        let out = copy_file(&source, &target).unwrap();

        assert_eq!(out, target);
        assert_eq!(fs::read(&target).unwrap(), vec![0u8, 1, 2, 255]);
    }

    #[test]
    fn test_json_snapshot_is_pretty_array() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("backup/records.json");
        let record = json!({"id": "1", "tags": ["a"]}).as_object().unwrap().clone();

        write_json_snapshot(&target, &[record.clone()]).unwrap();

        let text = fs::read_to_string(&target).unwrap();
        assert!(text.starts_with("[\n  {"));
        let parsed: Vec<Record> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, vec![record]);
    }
}
