use async_trait::async_trait;
use reqwest::{Request, Response};

/// Seam for HTTP transport so decorators like [`super::UrlParam`] can wrap it.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
