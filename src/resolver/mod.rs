mod ytdlp;

pub use ytdlp::CommandResolver;

use crate::error::ResolveError;
use async_trait::async_trait;

/// Turns an opaque source descriptor into a directly playable URL.
///
/// Resolved URLs are short-lived, so callers resolve again on every reconnect
/// instead of caching.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    async fn resolve(&self, source: &str) -> Result<String, ResolveError>;
}
