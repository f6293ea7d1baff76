//! Persists extracted page text to disk, sharded across `data_dirs` mount
//! points by URL hash (spec.md §4.6/§4.8).

use std::path::{Path, PathBuf};

use podcrawler_core::hash::{content_root_index, sha256_hex};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("no data_dirs configured")]
    NoRoots,
    #[error("io error writing content: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes `text` for `url` under one of `data_dirs`, chosen deterministically
/// by `content_root_index`. Returns the path written to, or `None` if `text`
/// is empty (nothing is written in that case, per spec.md §4.6 step 4).
///
/// The write is atomic: content lands in a sibling temp file first, then is
/// renamed into place, so a reader never observes a partially written file
/// and re-fetches of the same URL simply overwrite the prior content.
pub async fn save_content_to_file(
    url: &str,
    text: &str,
    data_dirs: &[String],
) -> Result<Option<String>, ContentError> {
    if text.is_empty() {
        return Ok(None);
    }
    if data_dirs.is_empty() {
        return Err(ContentError::NoRoots);
    }

    let root_idx = content_root_index(url, data_dirs.len());
    let root = &data_dirs[root_idx];
    let content_dir = Path::new(root).join("content");
    fs::create_dir_all(&content_dir).await?;

    let file_name = format!("{}.txt", sha256_hex(url));
    let final_path: PathBuf = content_dir.join(&file_name);
    let tmp_path: PathBuf = content_dir.join(format!("{file_name}.tmp-{}", std::process::id()));

    {
        let mut tmp = fs::File::create(&tmp_path).await?;
        tmp.write_all(text.as_bytes()).await?;
        tmp.flush().await?;
    }
    fs::rename(&tmp_path, &final_path).await?;

    let written = final_path.to_string_lossy().into_owned();
    debug!(url, path = %written, "content persisted");
    Ok(Some(written))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn writes_content_under_chosen_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().to_string_lossy().into_owned();
        let path = save_content_to_file("https://a.test/x", "hello world", &[root])
            .await
            .unwrap()
            .unwrap();
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents, "hello world");
        assert!(path.ends_with(".txt"));
    }

    #[tokio::test]
    async fn empty_text_is_not_persisted() {
        let dir = tempdir().unwrap();
        let root = dir.path().to_string_lossy().into_owned();
        let result = save_content_to_file("https://a.test/x", "", &[root])
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn refetch_overwrites_existing_file() {
        let dir = tempdir().unwrap();
        let root = dir.path().to_string_lossy().into_owned();
        let path1 = save_content_to_file("https://a.test/x", "first", &[root.clone()])
            .await
            .unwrap()
            .unwrap();
        let path2 = save_content_to_file("https://a.test/x", "second", &[root])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(path1, path2);
        let contents = tokio::fs::read_to_string(&path2).await.unwrap();
        assert_eq!(contents, "second");
    }

    #[tokio::test]
    async fn distributes_across_multiple_roots_deterministically() {
        let dirs: Vec<_> = (0..4).map(|_| tempdir().unwrap()).collect();
        let roots: Vec<String> = dirs
            .iter()
            .map(|d| d.path().to_string_lossy().into_owned())
            .collect();

        let path_a = save_content_to_file("https://a.test/1", "x", &roots)
            .await
            .unwrap()
            .unwrap();
        let path_a_again = save_content_to_file("https://a.test/1", "y", &roots)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(path_a, path_a_again);
    }

    #[tokio::test]
    async fn missing_roots_is_an_error() {
        let result = save_content_to_file("https://a.test/x", "hello", &[]).await;
        assert!(matches!(result, Err(ContentError::NoRoots)));
    }
}
