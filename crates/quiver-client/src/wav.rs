//! Minimal WAV reader: walks the RIFF chunk list, extracts the format
//! header and the PCM payload. Only uncompressed PCM is supported.

use anyhow::{anyhow, bail, Result};

use crate::adapter::{Audio, AudioData, AudioMetadata};

/// Parses a WAV file from a byte slice.
pub fn parse_wav(buf: &[u8]) -> Result<Audio> {
    if buf.len() < 44 {
        bail!("invalid WAV: file too short");
    }

    if &buf[0..4] != b"RIFF" {
        bail!("invalid WAV: missing RIFF header");
    }
    if &buf[8..12] != b"WAVE" {
        bail!("invalid WAV: missing WAVE format");
    }

    let metadata = wav_metadata(buf)?;
    let data = wav_data(buf, metadata)?;

    Ok(Audio { metadata, data })
}

/// Finds a chunk by id, returning its offset and payload size.
fn wav_chunk(data: &[u8], chunk_id: &[u8; 4]) -> Result<(usize, usize)> {
    // Skip the RIFF header and the WAVE id.
    let mut offset = 12;

    loop {
        if offset + 8 > data.len() {
            return Err(anyhow!(
                "invalid WAV: missing {:?} chunk",
                String::from_utf8_lossy(chunk_id)
            ));
        }

        let id = &data[offset..offset + 4];
        let size = u32::from_le_bytes(data[offset + 4..offset + 8].try_into().expect("4 bytes"));

        if id == chunk_id {
            return Ok((offset, size as usize));
        }

        offset += 8 + size as usize;
    }
}

fn wav_metadata(data: &[u8]) -> Result<AudioMetadata> {
    let (offset, size) = wav_chunk(data, b"fmt ")?;

    if size < 16 || offset + 8 + size > data.len() {
        bail!("invalid WAV: format chunk too small");
    }

    let u16_at = |i: usize| u16::from_le_bytes(data[i..i + 2].try_into().expect("2 bytes"));
    let u32_at = |i: usize| u32::from_le_bytes(data[i..i + 4].try_into().expect("4 bytes"));

    let metadata = AudioMetadata {
        format: u16_at(offset + 8),
        channels: u16_at(offset + 10),
        sample_rate: u32_at(offset + 12),
        byte_rate: u32_at(offset + 16),
        block_align: u16_at(offset + 20),
        bits_per_sample: u16_at(offset + 22),
    };

    if metadata.format != 1 {
        bail!(
            "unsupported WAV format: {}, only PCM (1) supported",
            metadata.format
        );
    }

    Ok(metadata)
}

fn wav_data(data: &[u8], metadata: AudioMetadata) -> Result<AudioData> {
    let (offset, size) = wav_chunk(data, b"data")?;

    if offset + 8 + size > data.len() {
        bail!("invalid WAV: data chunk exceeds file size");
    }

    let bytes_per_frame = usize::from(metadata.channels) * usize::from(metadata.bits_per_sample) / 8;
    if bytes_per_frame == 0 {
        bail!("invalid WAV: zero bytes per frame");
    }

    Ok(AudioData {
        buf: data[offset + 8..offset + 8 + size].to_vec(),
        bytes_per_frame,
        size: size as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a minimal valid WAV file around the given PCM payload.
    fn wav_bytes(pcm: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();

        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&(36 + pcm.len() as u32).to_le_bytes());
        buf.extend_from_slice(b"WAVE");

        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
        buf.extend_from_slice(&2u16.to_le_bytes()); // stereo
        buf.extend_from_slice(&44_100u32.to_le_bytes());
        buf.extend_from_slice(&176_400u32.to_le_bytes());
        buf.extend_from_slice(&4u16.to_le_bytes());
        buf.extend_from_slice(&16u16.to_le_bytes());

        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&(pcm.len() as u32).to_le_bytes());
        buf.extend_from_slice(pcm);

        buf
    }

    #[test]
    fn parses_pcm_wav() {
        let pcm = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let audio = parse_wav(&wav_bytes(&pcm)).unwrap();

        assert_eq!(audio.metadata.format, 1);
        assert_eq!(audio.metadata.channels, 2);
        assert_eq!(audio.metadata.sample_rate, 44_100);
        assert_eq!(audio.metadata.bits_per_sample, 16);
        assert_eq!(audio.data.bytes_per_frame, 4);
        assert_eq!(audio.data.size, 8);
        assert_eq!(audio.data.buf, pcm);
    }

    #[test]
    fn rejects_short_files() {
        assert!(parse_wav(b"RIFF").is_err());
    }

    #[test]
    fn rejects_missing_riff_header() {
        let mut bytes = wav_bytes(&[0; 4]);
        bytes[0..4].copy_from_slice(b"JUNK");
        assert!(parse_wav(&bytes).is_err());
    }

    #[test]
    fn rejects_compressed_formats() {
        let mut bytes = wav_bytes(&[0; 4]);
        // Patch the format code inside the fmt chunk.
        bytes[20..22].copy_from_slice(&3u16.to_le_bytes());
        assert!(parse_wav(&bytes).is_err());
    }

    #[test]
    fn skips_unknown_chunks_before_data() {
        let pcm = [9u8, 9, 9, 9];
        let mut buf = Vec::new();

        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(b"WAVE");

        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&8_000u32.to_le_bytes());
        buf.extend_from_slice(&16_000u32.to_le_bytes());
        buf.extend_from_slice(&2u16.to_le_bytes());
        buf.extend_from_slice(&16u16.to_le_bytes());

        // An unknown chunk sits between fmt and data.
        buf.extend_from_slice(b"LIST");
        buf.extend_from_slice(&4u32.to_le_bytes());
        buf.extend_from_slice(&[0xAA; 4]);

        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&(pcm.len() as u32).to_le_bytes());
        buf.extend_from_slice(&pcm);

        let audio = parse_wav(&buf).unwrap();
        assert_eq!(audio.data.buf, pcm);
    }
}
