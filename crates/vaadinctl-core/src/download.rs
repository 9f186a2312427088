use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use log::{debug, info};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Download failed with HTTP {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("Refusing to write download to unsafe file name: {0:?}")]
    InvalidFileName(String),
}

impl DownloadError {
    fn io_with_path(context: &'static str, path: &Path, source: &std::io::Error) -> Self {
        Self::Io {
            context,
            source: std::io::Error::new(source.kind(), format!("{}: {source}", path.display())),
        }
    }
}

/// Last path segment of `url`, if it looks like a file name.
#[must_use]
pub fn file_name_from_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .next()
        .filter(|name| is_safe_file_name(name))
}

fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name.contains(['/', '\\'])
}

/// Stream `url` into `target_dir/file_name`, creating the directory first.
///
/// Data is written to a hidden `.part` file that is renamed into place once
/// the body has been fully received.
///
/// # Errors
/// Returns an error for unsafe file names, failed requests, non-success
/// statuses, or any filesystem failure.
pub async fn download_artifact(
    client: &reqwest::Client,
    url: &str,
    target_dir: &Path,
    file_name: &str,
) -> Result<PathBuf, DownloadError> {
    if !is_safe_file_name(file_name) {
        return Err(DownloadError::InvalidFileName(file_name.to_string()));
    }

    tokio::fs::create_dir_all(target_dir)
        .await
        .map_err(|error| {
            DownloadError::io_with_path("failed to create download directory", target_dir, &error)
        })?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| DownloadError::Http {
            context: "download request failed",
            source,
        })?;

    if !response.status().is_success() {
        return Err(DownloadError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }

    let dest = target_dir.join(file_name);
    let part = target_dir.join(format!(".{file_name}.part"));
    info!("Downloading {url} to {}", dest.display());

    let moved = match write_part(response, &part).await {
        Ok(downloaded) => tokio::fs::rename(&part, &dest)
            .await
            .map(|()| downloaded)
            .map_err(|error| {
                DownloadError::io_with_path("failed to move download into place", &dest, &error)
            }),
        Err(error) => Err(error),
    };

    match moved {
        Ok(downloaded) => {
            debug!("Download complete: {downloaded} bytes");
            Ok(dest)
        }
        Err(error) => {
            let _ = tokio::fs::remove_file(&part).await;
            Err(error)
        }
    }
}

async fn write_part(response: reqwest::Response, part: &Path) -> Result<u64, DownloadError> {
    let mut file = tokio::fs::File::create(part).await.map_err(|error| {
        DownloadError::io_with_path("failed to create download file", part, &error)
    })?;

    let mut downloaded: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| DownloadError::Http {
            context: "download stream error",
            source,
        })?;
        file.write_all(&chunk).await.map_err(|error| {
            DownloadError::io_with_path("failed to write download data", part, &error)
        })?;
        downloaded += chunk.len() as u64;
    }

    file.flush().await.map_err(|error| {
        DownloadError::io_with_path("failed to flush download file", part, &error)
    })?;
    Ok(downloaded)
}

#[cfg(test)]
mod tests {
    use mockito::Server;

    use super::{DownloadError, download_artifact, file_name_from_url};

    #[test]
    fn file_name_from_url_takes_last_segment() {
        assert_eq!(
            file_name_from_url("https://vaadin.com/download/release/7.1/7.1.0/vaadin-all-7.1.0.zip"),
            Some("vaadin-all-7.1.0.zip")
        );
        assert_eq!(
            file_name_from_url("https://dl.test/a/b.zip?token=1#frag"),
            Some("b.zip")
        );
        assert_eq!(file_name_from_url("https://dl.test/dir/"), None);
        assert_eq!(file_name_from_url("https://dl.test/.."), None);
    }

    #[tokio::test]
    async fn download_artifact_writes_body_to_target() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/vaadin-all-7.1.0.zip")
            .with_status(200)
            .with_body("zip-bytes")
            .create_async()
            .await;
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let target = temp.path().join("nested/downloads");

        let path = download_artifact(
            &reqwest::Client::new(),
            &format!("{}/vaadin-all-7.1.0.zip", server.url()),
            &target,
            "vaadin-all-7.1.0.zip",
        )
        .await
        .expect("download should succeed");

        mock.assert_async().await;
        assert_eq!(path, target.join("vaadin-all-7.1.0.zip"));
        assert_eq!(std::fs::read(&path).unwrap(), b"zip-bytes");
        assert!(!target.join(".vaadin-all-7.1.0.zip.part").exists());
    }

    #[tokio::test]
    async fn download_artifact_rejects_error_status() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing.zip")
            .with_status(404)
            .create_async()
            .await;
        let temp = tempfile::tempdir().expect("tempdir should be created");

        let result = download_artifact(
            &reqwest::Client::new(),
            &format!("{}/missing.zip", server.url()),
            temp.path(),
            "missing.zip",
        )
        .await;

        assert!(matches!(
            result,
            Err(DownloadError::Status { status, .. }) if status == reqwest::StatusCode::NOT_FOUND
        ));
        assert!(!temp.path().join("missing.zip").exists());
    }

    #[tokio::test]
    async fn failed_download_leaves_no_partial_file() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/vaadin-all-7.1.0.zip")
            .with_status(200)
            .with_body("zip-bytes")
            .create_async()
            .await;
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let occupied = temp.path().join("vaadin-all-7.1.0.zip");
        std::fs::create_dir(&occupied).expect("blocking directory should be created");
        std::fs::write(occupied.join("keep"), b"x").expect("blocking file should be written");

        let result = download_artifact(
            &reqwest::Client::new(),
            &format!("{}/vaadin-all-7.1.0.zip", server.url()),
            temp.path(),
            "vaadin-all-7.1.0.zip",
        )
        .await;

        assert!(matches!(result, Err(DownloadError::Io { .. })));
        assert!(!temp.path().join(".vaadin-all-7.1.0.zip.part").exists());
        assert!(occupied.join("keep").exists());
    }

    #[tokio::test]
    async fn download_artifact_rejects_unsafe_names() {
        let temp = tempfile::tempdir().expect("tempdir should be created");

        let result = download_artifact(
            &reqwest::Client::new(),
            "http://127.0.0.1:9/file.zip",
            temp.path(),
            "../escape.zip",
        )
        .await;

        assert!(matches!(result, Err(DownloadError::InvalidFileName(_))));
    }
}
