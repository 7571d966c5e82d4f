//! Remote profile trait lookup.
//!
//! An optional collaborator that seeds the decision context with visitor
//! traits from a profile API. Lookups are keyed by a user id (preferred) or
//! an anonymous id, carried on the inbound request. The endpoint is
//! basic-auth protected; when credentials are not configured the lookup
//! returns an empty mapping without error.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;

/// Inbound header carrying the store user id.
pub const USER_ID_HEADER: &str = "demos_user_id";
/// Inbound header carrying the analytics anonymous id.
pub const ANONYMOUS_ID_HEADER: &str = "ajs_anonymous_id";

/// Flat visitor trait mapping.
pub type Traits = HashMap<String, Value>;

/// Collaborator that resolves visitor traits for a request.
#[async_trait]
pub trait TraitProvider: Send + Sync {
    /// Fetch traits for the given identifiers. The user id is preferred;
    /// the anonymous id is a fallback. No identifier means no traits.
    async fn traits_for(&self, user_id: Option<&str>, anonymous_id: Option<&str>)
        -> Result<Traits>;
}

/// Trait provider that always returns an empty mapping.
pub struct NoTraits;

#[async_trait]
impl TraitProvider for NoTraits {
    async fn traits_for(&self, _: Option<&str>, _: Option<&str>) -> Result<Traits> {
        Ok(Traits::new())
    }
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    #[serde(default)]
    traits: Traits,
}

/// HTTP client for a Segment-style profile API.
pub struct ProfileClient {
    client: reqwest::Client,
    space_id: Option<String>,
    api_key: Option<String>,
}

impl ProfileClient {
    pub fn new(client: reqwest::Client, space_id: Option<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            space_id,
            api_key,
        }
    }

    /// Fetch traits for one profile id slug (`user_id:...` or
    /// `anonymous_id:...`).
    async fn traits_by_slug(&self, space_id: &str, api_key: &str, slug: &str) -> Result<Traits> {
        let url = format!(
            "https://profiles.segment.com/v1/spaces/{}/collections/users/profiles/{}/traits",
            space_id, slug
        );
        let auth = BASE64.encode(format!("{}:", api_key));

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Basic {}", auth))
            .send()
            .await?;

        let profile: ProfileResponse = response.json().await?;
        Ok(profile.traits)
    }
}

#[async_trait]
impl TraitProvider for ProfileClient {
    async fn traits_for(
        &self,
        user_id: Option<&str>,
        anonymous_id: Option<&str>,
    ) -> Result<Traits> {
        let (Some(space_id), Some(api_key)) = (self.space_id.as_deref(), self.api_key.as_deref())
        else {
            tracing::info!("profile credentials not configured; skipping trait lookup");
            return Ok(Traits::new());
        };

        if let Some(user_id) = user_id {
            let traits = self
                .traits_by_slug(space_id, api_key, &format!("user_id:{}", user_id))
                .await?;
            if !traits.is_empty() {
                return Ok(traits);
            }
        }

        if let Some(anonymous_id) = anonymous_id {
            return self
                .traits_by_slug(space_id, api_key, &format!("anonymous_id:{}", anonymous_id))
                .await;
        }

        Ok(Traits::new())
    }
}
