//! Self-describing binary stream for the vectors index.
//!
//! Layout: a four-byte magic and a format version, the chunk size, then one
//! framed packet per chunk. Each packet carries a tag byte, the payload
//! length and a CRC32 of the payload, so foreign or damaged data is rejected
//! instead of being misread. The chunk sequence is terminated by end of
//! stream.

use std::io::{self, Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;
use thiserror::Error;

use crate::chunk::{Chunk, ChunkRecord};
use crate::{Vector, Vectors};

const MAGIC: &[u8; 4] = b"QVEC";
const VERSION: u16 = 1;
const CHUNK_TAG: u8 = 0xC4;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("not a vectors stream")]
    BadMagic,
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u16),
    #[error("corrupt stream: {0}")]
    Corrupt(&'static str),
    #[error("no chunks found in the encoded data")]
    Empty,
}

/// Writes the index to `w`. Callers repack first when the stream must not
/// contain tombstones; the codec itself encodes whatever it is given.
pub fn marshal<W: Write>(w: &mut W, vectors: &Vectors) -> Result<(), CodecError> {
    w.write_all(MAGIC)?;
    w.write_u16::<LittleEndian>(VERSION)?;
    w.write_u32::<LittleEndian>(vectors.chunk_size() as u32)?;

    for chunk in vectors.chunks() {
        let payload = encode_chunk(chunk)?;
        write_packet(w, &payload)?;
    }

    Ok(())
}

/// Reads an index from `r`, consuming chunks until end of stream. The last
/// decoded chunk becomes the current chunk. A stream with a valid header but
/// no chunks is an error.
pub fn unmarshal<R: Read>(r: &mut R) -> Result<Vectors, CodecError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(CodecError::BadMagic);
    }

    let version = r.read_u16::<LittleEndian>()?;
    if version != VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    let chunk_size = r.read_u32::<LittleEndian>()? as usize;
    if chunk_size == 0 {
        return Err(CodecError::Corrupt("zero chunk size"));
    }

    let mut chunks = Vec::new();
    while let Some(payload) = read_packet(r)? {
        chunks.push(decode_chunk(&payload, chunk_size)?);
    }

    if chunks.is_empty() {
        return Err(CodecError::Empty);
    }

    Ok(Vectors::from_parts(chunk_size, chunks))
}

fn write_packet<W: Write>(w: &mut W, payload: &[u8]) -> Result<(), CodecError> {
    let mut hasher = Hasher::new();
    hasher.update(payload);
    let crc = hasher.finalize();

    w.write_u8(CHUNK_TAG)?;
    w.write_u32::<LittleEndian>(payload.len() as u32)?;
    w.write_u32::<LittleEndian>(crc)?;
    w.write_all(payload)?;

    Ok(())
}

fn read_packet<R: Read>(r: &mut R) -> Result<Option<Vec<u8>>, CodecError> {
    let tag = match r.read_u8() {
        Ok(tag) => tag,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if tag != CHUNK_TAG {
        return Err(CodecError::Corrupt("unexpected packet tag"));
    }

    let len = r.read_u32::<LittleEndian>()?;
    let stored_crc = r.read_u32::<LittleEndian>()?;

    let mut payload = vec![0u8; len as usize];
    r.read_exact(&mut payload)?;

    let mut hasher = Hasher::new();
    hasher.update(&payload);
    if hasher.finalize() != stored_crc {
        return Err(CodecError::Corrupt("checksum mismatch"));
    }

    Ok(Some(payload))
}

fn encode_chunk(chunk: &Chunk) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();

    buf.write_i64::<LittleEndian>(chunk.base_id)?;
    buf.write_u32::<LittleEndian>(chunk.records.len() as u32)?;

    for record in &chunk.records {
        buf.write_i64::<LittleEndian>(record.id)?;
        match &record.vector {
            Some(vector) => {
                buf.write_u8(1)?;
                buf.write_u32::<LittleEndian>(vector.len() as u32)?;
                for &v in vector {
                    buf.write_f32::<LittleEndian>(v)?;
                }
            }
            None => buf.write_u8(0)?,
        }
        buf.write_f64::<LittleEndian>(record.norm)?;
    }

    Ok(buf)
}

fn decode_chunk(payload: &[u8], chunk_size: usize) -> Result<Chunk, CodecError> {
    let mut cursor = Cursor::new(payload);

    let base_id = cursor.read_i64::<LittleEndian>()?;
    let count = cursor.read_u32::<LittleEndian>()? as usize;
    if count > chunk_size {
        return Err(CodecError::Corrupt("chunk record count exceeds chunk size"));
    }

    let mut records = Vec::with_capacity(chunk_size);
    for _ in 0..count {
        let id = cursor.read_i64::<LittleEndian>()?;

        let vector = match cursor.read_u8()? {
            0 => None,
            1 => {
                let len = cursor.read_u32::<LittleEndian>()? as usize;
                let mut vector: Vector = Vec::with_capacity(len);
                for _ in 0..len {
                    vector.push(cursor.read_f32::<LittleEndian>()?);
                }
                Some(vector)
            }
            _ => return Err(CodecError::Corrupt("invalid vector presence flag")),
        };

        let norm = cursor.read_f64::<LittleEndian>()?;

        records.push(ChunkRecord { id, vector, norm });
    }

    Ok(Chunk {
        base_id,
        capacity: chunk_size,
        records,
    })
}
