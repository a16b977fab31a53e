//! Image blobs attached to wishlist items
//!
//! Uploads go to the `wishlist` bucket under
//! `wishlist-images/<user>-<millis>.<ext>`. Items reference the public URL;
//! deletion recovers the object path from that URL.

use bytes::Bytes;

use crate::error::{WishlistError, WishlistResult};
use crate::types::User;

/// Storage bucket for item images
pub const BUCKET: &str = "wishlist";

/// Folder inside the bucket
pub const IMAGE_FOLDER: &str = "wishlist-images";

/// Maximum image size: 5 MiB
pub const MAX_IMAGE_SIZE: usize = 5 * 1024 * 1024;

/// An image picked for upload
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    /// Original file name; only the extension is kept
    pub file_name: String,
    pub bytes: Bytes,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Reject payloads over [`MAX_IMAGE_SIZE`]
    pub fn validate(&self) -> WishlistResult<()> {
        if self.size() > MAX_IMAGE_SIZE {
            return Err(WishlistError::Validation(format!(
                "image is {} bytes, maximum is 5MB",
                self.size()
            )));
        }
        Ok(())
    }

    /// Extension after the last dot; the whole name if there is none
    pub fn extension(&self) -> &str {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .unwrap_or(&self.file_name)
    }

    /// Best-effort MIME type from the extension
    pub fn content_type(&self) -> &'static str {
        match self.extension().to_lowercase().as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "heic" => "image/heic",
            _ => "application/octet-stream",
        }
    }

    /// Object path for this upload: `wishlist-images/<user>-<millis>.<ext>`
    pub fn object_path(&self, owner: User, millis: i64) -> String {
        format!("{}/{}-{}.{}", IMAGE_FOLDER, owner, millis, self.extension())
    }
}

/// Recover the object path from a public URL by splitting at `/wishlist/`.
///
/// Returns `None` for URLs that don't point into the bucket.
pub fn object_path_from_url(url: &str) -> Option<&str> {
    let marker = format!("/{}/", BUCKET);
    url.split_once(marker.as_str())
        .map(|(_, path)| path)
        .filter(|path| !path.is_empty())
}
