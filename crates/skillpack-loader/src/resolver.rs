//! Content resolution for lazy sub-document handles

use async_trait::async_trait;
use skillpack_types::ContentHandle;

/// Turns a stored content handle into text
///
/// Implementations backed by remote storage are awaited inside the loader's
/// reservation, so a cancelled fetch releases its budget.
#[async_trait]
pub trait ContentResolver: Send + Sync {
    /// Resolve the content a handle points to
    async fn resolve(&self, handle: &ContentHandle) -> std::io::Result<String>;
}

/// Resolves inline content directly and file content with `tokio::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct FsResolver;

#[async_trait]
impl ContentResolver for FsResolver {
    async fn resolve(&self, handle: &ContentHandle) -> std::io::Result<String> {
        match handle {
            ContentHandle::Inline(text) => Ok(text.clone()),
            ContentHandle::File(path) => tokio::fs::read_to_string(path).await,
        }
    }
}
