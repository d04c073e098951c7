//! Authentication middleware for injecting Bearer tokens.

use std::sync::Arc;

use async_trait::async_trait;
use http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};
use tokio::sync::RwLock;

/// Middleware that injects the session's Bearer token into requests.
///
/// Requests that already carry an `Authorization` header (for example a
/// token being verified) are left untouched.
pub struct AuthMiddleware {
    token: Arc<RwLock<Option<String>>>,
}

impl AuthMiddleware {
    /// Create a new authentication middleware.
    #[must_use]
    pub fn new(token: Arc<RwLock<Option<String>>>) -> Self {
        Self { token }
    }
}

#[async_trait]
impl Middleware for AuthMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        if !req.headers().contains_key(http::header::AUTHORIZATION) {
            if let Some(token) = self.token.read().await.as_ref() {
                if let Ok(value) = format!("Bearer {token}").parse() {
                    req.headers_mut().insert(http::header::AUTHORIZATION, value);
                }
            }
        }

        next.run(req, extensions).await
    }
}
