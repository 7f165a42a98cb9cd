// Authentication provider seam used by the dispatcher

use crate::Result;
use crate::http::Request;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// The user an authentication provider resolved for a request.
pub trait User: Send + Sync + Debug {
    fn name(&self) -> &str;
    fn is_authenticated(&self) -> bool;
}

/// A plain named user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleUser {
    pub name: String,
    pub authenticated: bool,
}

impl SimpleUser {
    pub fn authenticated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            authenticated: true,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            name: String::new(),
            authenticated: false,
        }
    }
}

impl User for SimpleUser {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}

/// Resolves the logged-in user for a request.
#[async_trait]
pub trait AuthenticationProvider: Send + Sync {
    async fn logged_in_user(&self, request: &Request) -> Result<Option<Arc<dyn User>>>;
}

/// Provider used when none is configured: nobody is ever logged in.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnonymousAuthenticationProvider;

#[async_trait]
impl AuthenticationProvider for AnonymousAuthenticationProvider {
    async fn logged_in_user(&self, _request: &Request) -> Result<Option<Arc<dyn User>>> {
        Ok(None)
    }
}

/// Provider built from a synchronous closure.
pub struct FnAuthenticationProvider<F>
where
    F: Fn(&Request) -> Option<Arc<dyn User>> + Send + Sync,
{
    resolve: F,
}

impl<F> FnAuthenticationProvider<F>
where
    F: Fn(&Request) -> Option<Arc<dyn User>> + Send + Sync,
{
    pub fn new(resolve: F) -> Self {
        Self { resolve }
    }
}

#[async_trait]
impl<F> AuthenticationProvider for FnAuthenticationProvider<F>
where
    F: Fn(&Request) -> Option<Arc<dyn User>> + Send + Sync,
{
    async fn logged_in_user(&self, request: &Request) -> Result<Option<Arc<dyn User>>> {
        Ok((self.resolve)(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_anonymous_provider() {
        let provider = AnonymousAuthenticationProvider;
        let user = provider.logged_in_user(&Request::get("/")).await.unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn test_fn_provider_reads_header() {
        let provider = FnAuthenticationProvider::new(|request: &Request| {
            request
                .header("x-user")
                .map(|name| Arc::new(SimpleUser::authenticated(name)) as Arc<dyn User>)
        });

        let request = Request::get("/").with_header("X-User", "ada");
        let user = provider.logged_in_user(&request).await.unwrap().unwrap();
        assert_eq!(user.name(), "ada");
        assert!(user.is_authenticated());

        assert!(provider.logged_in_user(&Request::get("/")).await.unwrap().is_none());
    }

    #[test]
    fn test_simple_user_flags() {
        assert!(SimpleUser::authenticated("a").is_authenticated());
        assert!(!SimpleUser::anonymous().is_authenticated());
    }
}
