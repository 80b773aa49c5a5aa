//! Push events and configuration snapshots.
//!
//! The server pushes three named events over the live channel: `state`
//! (global configuration), `device` (configuration resolved for this
//! device, or not-found) and `pair` (pairing status). The same snapshot
//! shapes are returned by the polling endpoints.

use std::hash::{DefaultHasher, Hash, Hasher};

use serde::Deserialize;

use crate::error::PayloadError;
use crate::id::{DeviceId, VersionToken};
use crate::pairing::PairStatus;
use crate::schedule::Schedule;
use crate::settings::Settings;

/// A schedule/settings pair plus the token identifying its content.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSnapshot {
    pub schedule: Schedule,
    pub settings: Settings,
    pub version: VersionToken,
}

impl ConfigSnapshot {
    /// Decode a `{schedule, settings, version?}` document.
    ///
    /// Without a version meta the token is a fingerprint of the raw body.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Json`] when the body does not have the
    /// expected shape.
    pub fn decode(data: &str) -> Result<Self, PayloadError> {
        let raw: RawState = serde_json::from_str(data)?;
        let version = raw
            .version()
            .unwrap_or_else(|| fingerprint([data.as_bytes()]));
        Ok(Self {
            schedule: raw.schedule,
            settings: raw.settings,
            version,
        })
    }
}

/// Configuration resolved for this device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSnapshot {
    pub device_id: DeviceId,
    pub config: ConfigSnapshot,
}

/// Outcome of a device resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceResolution {
    Found(DeviceSnapshot),
    /// The server no longer knows the device.
    NotFound,
}

/// A decoded push event.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    State(ConfigSnapshot),
    Device(DeviceResolution),
    Pair(PairStatus),
}

impl PushEvent {
    /// Decode a named event.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::UnknownEvent`] for unknown names and
    /// [`PayloadError::Json`] for malformed bodies.
    pub fn decode(name: &str, data: &str) -> Result<Self, PayloadError> {
        match name {
            "state" => ConfigSnapshot::decode(data).map(Self::State),
            "device" => decode_device(data).map(Self::Device),
            "pair" => Ok(Self::Pair(serde_json::from_str(data)?)),
            other => Err(PayloadError::UnknownEvent(other.to_string())),
        }
    }

    /// Version token carried by the event, used to drop duplicates.
    ///
    /// Pair events have none; they are always delivered.
    #[must_use]
    pub fn version(&self) -> Option<&VersionToken> {
        match self {
            Self::State(snapshot) => Some(&snapshot.version),
            Self::Device(DeviceResolution::Found(found)) => Some(&found.config.version),
            Self::Device(DeviceResolution::NotFound) | Self::Pair(_) => None,
        }
    }
}

/// Decode a `device` document: `{found, deviceId, schedule, settings, version?}`.
///
/// # Errors
///
/// Returns [`PayloadError::Json`] for malformed bodies, including a missing
/// `found` flag, and [`PayloadError::MissingField`] when a found device
/// carries no `deviceId`.
pub fn decode_device(data: &str) -> Result<DeviceResolution, PayloadError> {
    let head: DeviceHead = serde_json::from_str(data)?;
    if !head.found {
        return Ok(DeviceResolution::NotFound);
    }
    let device_id = head
        .device_id
        .ok_or(PayloadError::MissingField("deviceId"))?;
    Ok(DeviceResolution::Found(DeviceSnapshot {
        device_id,
        config: ConfigSnapshot::decode(data)?,
    }))
}

/// Deterministic token over a sequence of byte slices.
///
/// Used when the server sends no version meta: validator tokens (ETags) if
/// available, otherwise the payload bodies.
pub fn fingerprint<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> VersionToken {
    let mut hasher = DefaultHasher::new();
    for part in parts {
        part.hash(&mut hasher);
    }
    VersionToken::new(format!("fp-{:016x}", hasher.finish()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawState {
    #[serde(default)]
    schedule: Schedule,
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    version: Option<serde_json::Value>,
    #[serde(default)]
    meta: Option<RawMeta>,
}

#[derive(Deserialize)]
struct RawMeta {
    #[serde(default)]
    version: Option<serde_json::Value>,
}

impl RawState {
    fn version(&self) -> Option<VersionToken> {
        let value = self
            .version
            .as_ref()
            .or_else(|| self.meta.as_ref().and_then(|m| m.version.as_ref()))?;
        match value {
            serde_json::Value::String(s) if !s.is_empty() => Some(VersionToken::new(s.as_str())),
            serde_json::Value::Number(n) => Some(VersionToken::new(n.to_string())),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceHead {
    found: bool,
    #[serde(default)]
    device_id: Option<DeviceId>,
}
