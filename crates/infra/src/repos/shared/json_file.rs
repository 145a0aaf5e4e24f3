use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Error, Debug)]
pub enum JsonFileError {
    #[error("Unable to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path} does not contain valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Unable to serialize the contents of {path}: {source}")]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Unable to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Reads and deserializes a JSON document. A missing file is `Ok(None)`.
pub async fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, JsonFileError> {
    let contents = match fs::read(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(JsonFileError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_slice(&contents)
        .map(Some)
        .map_err(|source| JsonFileError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

/// Replaces the document at `path` as a whole. The JSON is written to a
/// temporary sibling file which is then renamed over the target, so readers
/// only ever observe the old or the new document.
pub async fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), JsonFileError> {
    let write_err = |source| JsonFileError::Write {
        path: path.to_path_buf(),
        source,
    };

    let contents =
        serde_json::to_vec_pretty(value).map_err(|source| JsonFileError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)
        .await
        .map_err(write_err)?;
    file.write_all(&contents).await.map_err(write_err)?;
    // The rename must never expose a file whose contents are not on disk yet
    file.sync_all().await.map_err(write_err)?;
    drop(file);

    fs::rename(&tmp_path, path).await.map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let res = read_json_file::<HashMap<String, String>>(&dir.path().join("nope.json"))
            .await
            .unwrap();
        assert!(res.is_none());
    }

    #[tokio::test]
    async fn writes_replace_the_document_and_create_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("doc.json");

        let mut doc = HashMap::new();
        doc.insert("a".to_string(), "1".to_string());
        write_json_file(&path, &doc).await.unwrap();
        doc.insert("b".to_string(), "2".to_string());
        write_json_file(&path, &doc).await.unwrap();

        let read = read_json_file::<HashMap<String, String>>(&path)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read, doc);
        assert!(!dir.path().join("nested").join("doc.json.tmp").exists());
    }

    #[tokio::test]
    async fn leftover_temp_files_are_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        // Partial write from an earlier crash, longer than the new document
        std::fs::write(dir.path().join("doc.json.tmp"), "x".repeat(4096)).unwrap();

        let mut doc = HashMap::new();
        doc.insert("a".to_string(), "1".to_string());
        write_json_file(&path, &doc).await.unwrap();

        let read = read_json_file::<HashMap<String, String>>(&path)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read, doc);
        assert!(!dir.path().join("doc.json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, "{ not json").unwrap();
        let res = read_json_file::<HashMap<String, String>>(&path).await;
        assert!(matches!(res, Err(JsonFileError::Corrupt { .. })));
    }
}
