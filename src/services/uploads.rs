use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::UploadResponse,
    storage::StorageState,
};

/// Image formats accepted for upload, recognised by their leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageFormat {
    /// Identifies the format from the file's magic bytes. The client-supplied
    /// content type and filename are never trusted.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        match data {
            [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(Self::Png),
            [0xFF, 0xD8, 0xFF, ..] => Some(Self::Jpeg),
            [b'G', b'I', b'F', b'8', ..] => Some(Self::Gif),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(Self::Webp),
            _ => None,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Webp => "webp",
        }
    }
}

/// UploadService
///
/// Validates an uploaded image and hands it to the storage provider. The returned
/// URL is what clients put into a post's `imageUrl`.
#[derive(Clone)]
pub struct UploadService {
    storage: StorageState,
    max_bytes: usize,
}

/// Key prefix under which every upload of `user_id` is stored.
pub fn owner_prefix(user_id: Uuid) -> String {
    format!("images/{user_id}/")
}

impl UploadService {
    pub fn new(storage: StorageState, max_bytes: usize) -> Self {
        Self { storage, max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub async fn upload_image(&self, user_id: Uuid, data: Vec<u8>) -> ApiResult<UploadResponse> {
        if data.is_empty() {
            return Err(ApiError::Validation("uploaded file is empty".to_string()));
        }
        if data.len() > self.max_bytes {
            return Err(ApiError::Validation(format!(
                "uploaded file exceeds {} bytes",
                self.max_bytes
            )));
        }
        let format = ImageFormat::sniff(&data).ok_or_else(|| {
            ApiError::Validation("file must be a PNG, JPEG, GIF or WebP image".to_string())
        })?;

        let key = format!("{}{}.{}", owner_prefix(user_id), Uuid::new_v4(), format.extension());
        let size = data.len();
        let url = self
            .storage
            .put_object(&key, data, format.content_type())
            .await?;

        tracing::info!(%user_id, key, size, "image uploaded");
        Ok(UploadResponse { url })
    }
}
