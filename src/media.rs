use std::path::Path;

use anyhow::Context;
use tracing::info;
use uuid::Uuid;

use crate::error::AppResult;
use crate::forms::ValidImage;

/// Subdirectory of the media root that holds post images
pub const POST_IMAGE_DIR: &str = "posts";

/// Writes an uploaded image under `<media_root>/posts/` and returns its path
/// relative to the media root, which is what the `posts.image` column stores.
pub async fn save_post_image(media_root: &Path, image: &ValidImage) -> AppResult<String> {
    let dir = media_root.join(POST_IMAGE_DIR);
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("failed to create media directory {}", dir.display()))?;

    let file_name = format!("{}.{}", Uuid::new_v4(), image.format.extension());
    let path = dir.join(&file_name);
    tokio::fs::write(&path, &image.bytes)
        .await
        .with_context(|| format!("failed to write image {}", path.display()))?;

    info!("Stored post image {} ({} bytes)", path.display(), image.bytes.len());
    Ok(format!("{}/{}", POST_IMAGE_DIR, file_name))
}
