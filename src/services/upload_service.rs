//! src/services/upload_service.rs
//!
//! UploadService: stores listing images and verification documents on local
//! disk beneath `base_path/{kind}/{file}` and opens them again for serving.
//! Payloads are streamed to a temp file and renamed into place once complete.

use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MAX_FILE_NAME_LEN: usize = 255;
const MAX_EXTENSION_LEN: usize = 8;

/// Where an upload belongs; each kind has its own folder and public prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadKind {
    Image,
    Document,
}

impl UploadKind {
    pub fn folder(self) -> &'static str {
        match self {
            UploadKind::Image => "images",
            UploadKind::Document => "documents",
        }
    }

    /// Public URL for a stored file name.
    pub fn url_for(self, file_name: &str) -> String {
        format!("/{}/{}", self.folder(), file_name)
    }

    fn accepts(self, content_type: Option<&str>) -> bool {
        match self {
            UploadKind::Image => content_type.is_some_and(|ct| ct.starts_with("image/")),
            UploadKind::Document => true,
        }
    }
}

/// A file written by [`UploadService::store_stream`].
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub file_name: String,
    pub url: String,
    pub size_bytes: u64,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid file name")]
    InvalidFileName,
    #[error("unsupported content type `{0}`")]
    UnsupportedContentType(String),
    #[error("empty upload")]
    Empty,
    #[error("file `{0}` not found")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type UploadResult<T> = Result<T, UploadError>;

#[derive(Clone, Debug)]
pub struct UploadService {
    /// Base directory on disk where uploads are stored.
    pub base_path: PathBuf,
}

impl UploadService {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn kind_root(&self, kind: UploadKind) -> PathBuf {
        self.base_path.join(kind.folder())
    }

    /// Stream an upload to disk under a fresh unique name.
    ///
    /// The original name only contributes its extension. Partially written
    /// files are removed on any error.
    pub async fn store_stream<S>(
        &self,
        kind: UploadKind,
        original_name: Option<&str>,
        content_type: Option<&str>,
        stream: S,
    ) -> UploadResult<StoredFile>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        if !kind.accepts(content_type) {
            return Err(UploadError::UnsupportedContentType(
                content_type.unwrap_or("unknown").to_string(),
            ));
        }

        let root = self.kind_root(kind);
        fs::create_dir_all(&root).await?;

        let file_name = format!(
            "{}{}",
            Uuid::new_v4(),
            original_name.map(extension_of).unwrap_or_default()
        );
        let final_path = root.join(&file_name);
        let tmp_path = root.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: u64 = 0;
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(UploadError::Io(err));
                }
            };
            size_bytes += chunk.len() as u64;
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(UploadError::Io(err));
            }
        }

        if size_bytes == 0 {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(UploadError::Empty);
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(UploadError::Io(err));
        }
        if let Err(err) = fs::rename(&tmp_path, &final_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(UploadError::Io(err));
        }

        debug!(
            "stored {} ({} bytes) at {}",
            file_name,
            size_bytes,
            final_path.display()
        );

        Ok(StoredFile {
            url: kind.url_for(&file_name),
            file_name,
            size_bytes,
        })
    }

    /// Open a stored file for streaming back to a client.
    pub async fn open(&self, kind: UploadKind, file_name: &str) -> UploadResult<(File, u64)> {
        ensure_file_name_safe(file_name)?;
        let path = self.kind_root(kind).join(file_name);
        let file = File::open(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                UploadError::NotFound(file_name.to_string())
            } else {
                UploadError::Io(err)
            }
        })?;
        let len = file.metadata().await?.len();
        Ok((file, len))
    }

    /// Best-effort removal of files referenced by public URLs.
    ///
    /// Used after the rows pointing at them are gone; failures are logged only.
    pub async fn remove_urls<'a>(&self, urls: impl IntoIterator<Item = &'a str>) {
        for url in urls {
            let Some((kind, file_name)) = parse_url(url) else {
                debug!("skipping removal of foreign url {}", url);
                continue;
            };
            if ensure_file_name_safe(file_name).is_err() {
                continue;
            }
            let path = self.kind_root(kind).join(file_name);
            match fs::remove_file(&path).await {
                Ok(_) => debug!("removed upload {}", path.display()),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    debug!("upload {} already missing", path.display());
                }
                Err(err) => debug!("failed to remove upload {}: {}", path.display(), err),
            }
        }
    }

    /// Write/read/delete a probe file to prove the upload directory is usable.
    pub async fn probe(&self) -> Result<(), String> {
        let tmp_path = self.base_path.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&tmp_path, b"readyz")
            .await
            .map_err(|e| format!("could not write tmp file: {}", e))?;
        let read = fs::read(&tmp_path).await;
        let _ = fs::remove_file(&tmp_path).await;
        match read {
            Ok(bytes) if bytes == b"readyz" => Ok(()),
            Ok(_) => Err("file content mismatch".to_string()),
            Err(e) => Err(format!("could not read tmp file: {}", e)),
        }
    }
}

/// Reject names that could escape the upload folder.
fn ensure_file_name_safe(name: &str) -> UploadResult<()> {
    if name.is_empty() || name.len() > MAX_FILE_NAME_LEN {
        return Err(UploadError::InvalidFileName);
    }
    if name.starts_with('.') || name.contains('/') || name.contains("..") {
        return Err(UploadError::InvalidFileName);
    }
    if name
        .bytes()
        .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
    {
        return Err(UploadError::InvalidFileName);
    }
    Ok(())
}

/// `.jpg` from `photo.JPG`; empty when there is no usable extension.
fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

fn parse_url(url: &str) -> Option<(UploadKind, &str)> {
    if let Some(name) = url.strip_prefix("/images/") {
        Some((UploadKind::Image, name))
    } else {
        url.strip_prefix("/documents/")
            .map(|name| (UploadKind::Document, name))
    }
}
