//! Filesystem helpers shared by the index, backup and rule writers.
//!
//! # Responsibilities
//! - Create directories on demand
//! - Write files atomically (temp file in the same directory + rename)
//! - Read, copy and delete files, treating "not found" as a normal outcome
//! - List the flat set of YAML files in a directory
//!
//! # Design Decisions
//! - `atomic_write` never degrades to a direct write; any failure propagates
//! - Temp files are hidden (`.name.<uuid>.tmp`) so YAML listings never see them

use std::io;
use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// File extensions recognised as rule files.
pub const YAML_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// Create `dir` and any missing parents.
pub async fn ensure_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir).await
}

/// Join `file_name` onto `base`, rejecting anything that would escape `base`.
pub fn scoped_path(base: &Path, file_name: &str) -> io::Result<PathBuf> {
    let candidate = Path::new(file_name);
    let mut components = candidate.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(base.join(candidate)),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("`{}` is not a plain file name", file_name),
        )),
    }
}

/// Write `content` to `path` so readers only ever see the old or the new file.
pub async fn atomic_write(path: &Path, content: &str) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    ensure_dir(parent).await?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "target has no file name"))?;
    let tmp_path = parent.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));

    let result = write_then_rename(&tmp_path, path, content).await;
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path).await;
    }
    result
}

async fn write_then_rename(tmp_path: &Path, path: &Path, content: &str) -> io::Result<()> {
    let mut file = fs::File::create(tmp_path).await?;
    file.write_all(content.as_bytes()).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(tmp_path, path).await
}

/// Read a UTF-8 file, returning `None` when it does not exist.
pub async fn read_if_exists(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Copy `from` to `to`. Returns `false` when the source does not exist.
pub async fn copy_if_exists(from: &Path, to: &Path) -> io::Result<bool> {
    if let Some(parent) = to.parent() {
        ensure_dir(parent).await?;
    }
    match fs::copy(from, to).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Delete a file. Returns `false` when it was already gone.
pub async fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Whether `path` names a visible `.yaml`/`.yml` file.
pub fn is_yaml_path(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(true);
    if hidden {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| YAML_EXTENSIONS.iter().any(|y| e.eq_ignore_ascii_case(y)))
        .unwrap_or(false)
}

/// List YAML files directly inside `dir`, sorted by file name. Not recursive.
pub async fn list_yaml_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !is_yaml_path(&path) {
            continue;
        }
        if entry.file_type().await?.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// File stem as an owned string (`app.yaml` → `app`).
pub fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_atomic_write_replaces_content_and_leaves_no_temp() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested").join("app.yaml");

        atomic_write(&target, "first").await.unwrap();
        atomic_write(&target, "second").await.unwrap();

        assert_eq!(fs::read_to_string(&target).await.unwrap(), "second");
        let mut entries = fs::read_dir(target.parent().unwrap()).await.unwrap();
        let mut names = Vec::new();
        while let Some(e) = entries.next_entry().await.unwrap() {
            names.push(e.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["app.yaml".to_string()]);
    }

    #[tokio::test]
    async fn test_atomic_write_fails_when_target_is_directory() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("app.yaml");
        fs::create_dir(&target).await.unwrap();

        assert!(atomic_write(&target, "content").await.is_err());
        assert!(fs::metadata(&target).await.unwrap().is_dir());
        assert_eq!(list_yaml_files(dir.path()).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_list_yaml_files_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        for name in ["b.yml", "a.yaml", "c.json", ".hidden.yaml", "D.YAML"] {
            fs::write(dir.path().join(name), "x").await.unwrap();
        }
        fs::create_dir(dir.path().join("sub.yaml")).await.unwrap();

        let files: Vec<String> = list_yaml_files(dir.path())
            .await
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(files, vec!["D.YAML", "a.yaml", "b.yml"]);
    }

    #[tokio::test]
    async fn test_missing_files_are_not_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.yaml");

        assert_eq!(read_if_exists(&missing).await.unwrap(), None);
        assert!(!remove_if_exists(&missing).await.unwrap());
        assert!(!copy_if_exists(&missing, &dir.path().join("copy.yaml")).await.unwrap());
    }

    #[test]
    fn test_scoped_path_rejects_traversal() {
        let base = Path::new("/srv/dynamic");
        assert_eq!(scoped_path(base, "app.yaml").unwrap(), base.join("app.yaml"));
        assert!(scoped_path(base, "../etc/passwd").is_err());
        assert!(scoped_path(base, "a/b.yaml").is_err());
        assert!(scoped_path(base, "/abs.yaml").is_err());
    }
}
