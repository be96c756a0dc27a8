//! DRM negotiation pipeline
//!
//! Turns a generic [`DrmDescriptor`] into the artifact the active backend
//! understands: either a pipe-delimited token string appended to the content
//! URL, or an out-of-band JSON initiator message sent on the backend's DRM
//! channel. The choice follows the backend's declared capability, never the
//! content. Serialization is deterministic (stable sorted key order) so the
//! same descriptor always yields byte-identical output, which makes retries
//! idempotent and the pipeline testable.

use crate::backend::DrmCapability;
use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

/// Device type identifier sent when the descriptor does not override it
pub const DEFAULT_DEVICE_TYPE_ID: u32 = 60;

/// DRM system requested by the content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DrmKind {
    None,
    Widevine,
    PlayReady,
}

impl Default for DrmKind {
    fn default() -> Self {
        DrmKind::None
    }
}

impl std::fmt::Display for DrmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrmKind::None => write!(f, "NONE"),
            DrmKind::Widevine => write!(f, "WIDEVINE"),
            DrmKind::PlayReady => write!(f, "PLAYREADY"),
        }
    }
}

/// Generic DRM descriptor; immutable once negotiation for a session starts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrmDescriptor {
    pub kind: DrmKind,
    /// License server URL
    pub server_url: Option<Url>,
    /// Opaque custom data, carried base64-encoded
    pub custom_data: Option<String>,
    /// Overrides the engine-wide ESN for this content
    pub device_id: Option<String>,
    pub user_data: Option<String>,
    pub portal: Option<String>,
    pub client_ip: Option<String>,
    pub stream_id: Option<String>,
    pub heartbeat_url: Option<Url>,
    pub heartbeat_period_s: Option<u32>,
}

impl DrmDescriptor {
    pub fn widevine(server_url: Url) -> Self {
        Self {
            kind: DrmKind::Widevine,
            server_url: Some(server_url),
            ..Default::default()
        }
    }

    pub fn playready(server_url: Url) -> Self {
        Self {
            kind: DrmKind::PlayReady,
            server_url: Some(server_url),
            ..Default::default()
        }
    }
}

/// Backend-specific negotiation output
#[derive(Debug, Clone, PartialEq)]
pub enum DrmArtifact {
    /// `KEY=value` pairs joined with `|`, appended to the content URL
    UrlToken(String),
    /// JSON initiator message for the backend's DRM channel
    Initiator(serde_json::Value),
}

/// Collect descriptor fields over the defaults, skipping anything unset.
///
/// BTreeMap keeps the key order stable independent of insertion order.
fn negotiation_fields(descriptor: &DrmDescriptor, esn: &str) -> BTreeMap<&'static str, String> {
    let mut fields = BTreeMap::new();
    fields.insert(
        "DEVICE_ID",
        descriptor.device_id.clone().unwrap_or_else(|| esn.to_string()),
    );
    fields.insert("DEVICE_TYPE_ID", DEFAULT_DEVICE_TYPE_ID.to_string());

    if let Some(url) = &descriptor.server_url {
        fields.insert("DRM_URL", url.to_string());
    }
    if let Some(user_data) = &descriptor.user_data {
        fields.insert("USER_DATA", user_data.clone());
    }
    if let Some(portal) = &descriptor.portal {
        fields.insert("PORTAL", portal.clone());
    }
    if let Some(client_ip) = &descriptor.client_ip {
        fields.insert("CLIENT_IP", client_ip.clone());
    }
    if let Some(stream_id) = &descriptor.stream_id {
        fields.insert("STREAM_ID", stream_id.clone());
    }
    if let Some(custom_data) = &descriptor.custom_data {
        fields.insert("CUSTOM_DATA", BASE64.encode(custom_data));
    }
    if let Some(url) = &descriptor.heartbeat_url {
        fields.insert("HEARTBEAT_URL", url.to_string());
    }
    if let Some(period) = descriptor.heartbeat_period_s {
        fields.insert("HEARTBEAT_PERIOD", period.to_string());
    }
    fields
}

fn url_token(fields: &BTreeMap<&'static str, String>) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("|")
}

fn initiator_message(fields: &BTreeMap<&'static str, String>) -> serde_json::Value {
    // serde_json's default map is ordered, so output stays byte-identical
    let map: serde_json::Map<String, serde_json::Value> = fields
        .iter()
        .map(|(key, value)| (key.to_string(), serde_json::Value::String(value.clone())))
        .collect();
    serde_json::Value::Object(map)
}

/// Negotiate a backend-specific DRM artifact for the given descriptor.
///
/// Returns `Ok(None)` for unprotected content. A protected descriptor
/// against a backend with no DRM support is a [`Error::Drm`]; the engine
/// must not advance to playing on that path.
pub fn negotiate(
    descriptor: &DrmDescriptor,
    capability: DrmCapability,
    esn: &str,
) -> Result<Option<DrmArtifact>> {
    if descriptor.kind == DrmKind::None {
        return Ok(None);
    }

    let mut fields = negotiation_fields(descriptor, esn);
    let artifact = match capability {
        DrmCapability::None => {
            return Err(Error::drm(format!(
                "content requires {} but backend declares no DRM capability",
                descriptor.kind
            )));
        }
        DrmCapability::Widevine => {
            fields.insert("DRM_TYPE", DrmCapability::Widevine.to_string());
            DrmArtifact::UrlToken(url_token(&fields))
        }
        DrmCapability::PlayReady => {
            fields.insert("DRM_TYPE", DrmCapability::PlayReady.to_string());
            DrmArtifact::Initiator(initiator_message(&fields))
        }
    };

    debug!(kind = %descriptor.kind, %capability, "DRM artifact negotiated");
    Ok(Some(artifact))
}
