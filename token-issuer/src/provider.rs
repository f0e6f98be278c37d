//! Extension points the issuer delegates to: authenticating credentials and adding claims.

use std::sync::Arc;

use async_trait::async_trait;

use crate::claims::{Claim, Identity};
use crate::request::TokenRequest;

/// Verifies the credentials carried by a token request.
///
/// Return `Ok(None)` for credentials that do not authenticate. `Err` is reserved for
/// infrastructure faults (store unreachable, corrupt record) and surfaces as a 500.
#[async_trait]
pub trait ClaimsProvider: Send + Sync {
    async fn authenticate(&self, request: &TokenRequest) -> anyhow::Result<Option<Identity>>;
}

/// Contributes extra claims for an authenticated identity.
///
/// Claims are appended after the identity's own; an augmenter cannot reject the request.
#[async_trait]
pub trait ClaimsAugmenter: Send + Sync {
    async fn augment(
        &self,
        request: &TokenRequest,
        identity: &Identity,
    ) -> anyhow::Result<Vec<Claim>>;
}

#[async_trait]
impl<T: ClaimsProvider + ?Sized> ClaimsProvider for Arc<T> {
    async fn authenticate(&self, request: &TokenRequest) -> anyhow::Result<Option<Identity>> {
        (**self).authenticate(request).await
    }
}

#[async_trait]
impl<T: ClaimsAugmenter + ?Sized> ClaimsAugmenter for Arc<T> {
    async fn augment(
        &self,
        request: &TokenRequest,
        identity: &Identity,
    ) -> anyhow::Result<Vec<Claim>> {
        (**self).augment(request, identity).await
    }
}
