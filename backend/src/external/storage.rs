//! File storage for payment slips
//!
//! Slips arrive base64 encoded in JSON bodies, are decoded and checked here,
//! then written below the configured upload directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use shared::SlipUpload;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::{AppError, AppResult};

/// Folder that holds payment evidence
pub const SLIP_FOLDER: &str = "payment-slips";

const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Binary storage collaborator. Returned paths are relative and stable.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Store `bytes` under `folder` and return the relative path
    async fn save(&self, folder: &str, file_name: &str, bytes: Vec<u8>) -> AppResult<String>;

    /// Remove a previously saved file; missing files are ignored
    async fn remove(&self, path: &str) -> AppResult<()>;
}

/// Lowercased extension of an accepted image file name
pub fn image_extension(file_name: &str) -> AppResult<String> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| ALLOWED_EXTENSIONS.contains(&e.as_str()));

    extension.ok_or_else(|| {
        AppError::validation(
            "slip_image.file_name",
            "Only jpg, jpeg, png and webp images are accepted",
            "รองรับเฉพาะไฟล์รูปภาพ jpg, jpeg, png และ webp",
        )
    })
}

/// Decode a base64 slip and enforce the size limit
pub fn decode_slip(slip: &SlipUpload, max_bytes: usize) -> AppResult<Vec<u8>> {
    image_extension(&slip.file_name)?;

    let bytes = BASE64.decode(slip.data.trim()).map_err(|_| {
        AppError::validation(
            "slip_image.data",
            "Slip image is not valid base64",
            "ไฟล์หลักฐานการชำระเงินไม่ถูกต้อง",
        )
    })?;

    if bytes.is_empty() {
        return Err(AppError::validation(
            "slip_image.data",
            "Slip image is empty",
            "ไม่มีหลักฐานการชำระเงิน",
        ));
    }
    if bytes.len() > max_bytes {
        return Err(AppError::validation(
            "slip_image.data",
            format!("Slip image exceeds {} bytes", max_bytes),
            "ไฟล์หลักฐานการชำระเงินมีขนาดใหญ่เกินไป",
        ));
    }

    Ok(bytes)
}

/// Stores files on the local filesystem
#[derive(Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.upload_dir)
    }

    fn resolve(&self, relative: &str) -> AppResult<PathBuf> {
        let relative = Path::new(relative);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(AppError::StorageError(format!(
                "refusing path outside upload root: {}",
                relative.display()
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn save(&self, folder: &str, file_name: &str, bytes: Vec<u8>) -> AppResult<String> {
        let extension = image_extension(file_name)?;
        let relative = format!("{}/{}.{}", folder, Uuid::new_v4(), extension);
        let target = self.resolve(&relative)?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::StorageError(e.to_string()))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| AppError::StorageError(e.to_string()))?;

        tracing::debug!(path = %relative, "Stored upload");
        Ok(relative)
    }

    async fn remove(&self, path: &str) -> AppResult<()> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::StorageError(e.to_string())),
        }
    }
}
