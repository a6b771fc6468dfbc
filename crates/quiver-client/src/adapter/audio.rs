use serde::{Deserialize, Serialize};

use super::speech::base64_bytes;

/// A parsed WAV file: format metadata plus the raw PCM payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Audio {
    pub metadata: AudioMetadata,
    pub data: AudioData,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AudioMetadata {
    /// 1 for PCM; other values indicate compression.
    pub format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioData {
    /// Raw PCM bytes, base64 on the wire.
    #[serde(rename = "data", with = "base64_bytes")]
    pub buf: Vec<u8>,
    pub bytes_per_frame: usize,
    pub size: u32,
}
