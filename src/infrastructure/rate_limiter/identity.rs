//! Caller identity resolution for rate limiting

use sha2::{Digest, Sha256};

use super::types::IdentityKey;
use crate::domain::UserId;

/// Number of hex characters of the address digest kept in the key
const ADDRESS_HASH_LEN: usize = 16;

/// Caller facts extracted from an inbound request by the transport layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMetadata {
    /// Authenticated user, if any
    pub user_id: Option<UserId>,
    /// Raw `X-Forwarded-For` header value
    pub forwarded_for: Option<String>,
    /// Raw `X-Real-IP` header value
    pub real_ip: Option<String>,
    /// Socket peer address
    pub peer_addr: Option<String>,
}

impl RequestMetadata {
    pub fn authenticated(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    pub fn from_peer(peer_addr: impl Into<String>) -> Self {
        Self {
            peer_addr: Some(peer_addr.into()),
            ..Self::default()
        }
    }
}

/// Maps request metadata to a stable [`IdentityKey`]
pub struct RequestIdentityResolver;

impl RequestIdentityResolver {
    /// `user:<id>` for authenticated callers, `ip:<digest prefix>` otherwise
    pub fn resolve(metadata: &RequestMetadata) -> IdentityKey {
        if let Some(user_id) = metadata.user_id {
            return IdentityKey::for_user(user_id);
        }

        IdentityKey::for_address(Self::client_address(metadata))
    }

    /// First non-empty of: first forwarded entry, real ip, peer address
    fn client_address(metadata: &RequestMetadata) -> &str {
        let forwarded = metadata
            .forwarded_for
            .as_deref()
            .and_then(|header| header.split(',').next())
            .map(str::trim);
        let real_ip = metadata.real_ip.as_deref().map(str::trim);
        let peer = metadata.peer_addr.as_deref().map(str::trim);

        [forwarded, real_ip, peer]
            .into_iter()
            .flatten()
            .find(|address| !address.is_empty())
            .unwrap_or("unknown")
    }
}

impl IdentityKey {
    pub fn for_user(user_id: UserId) -> Self {
        IdentityKey::from_raw(format!("user:{}", user_id))
    }

    /// Hashes the address so raw addresses never reach counter keys
    pub fn for_address(address: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(address.as_bytes());
        let hash = hex::encode(hasher.finalize());
        IdentityKey::from_raw(format!("ip:{}", &hash[..ADDRESS_HASH_LEN]))
    }
}
