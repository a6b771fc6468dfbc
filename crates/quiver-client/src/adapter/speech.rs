use serde::{Deserialize, Serialize};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeechMessage {
    /// Text content to synthesise.
    #[serde(default)]
    pub content: String,
    /// Optional synthesis instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeechParams {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub voice: String,
    /// Speech rate modifier; 1.0 is normal speed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Speech {
    /// Raw PCM bytes, base64 on the wire.
    #[serde(with = "base64_bytes")]
    pub audio: Vec<u8>,
}

pub(crate) mod base64_bytes {
    use super::{Engine, STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}
