//! Self-describing binary stream for a database: a magic/version preamble,
//! the header fields, the payload map as a checksummed packet of
//! JSON-encoded values, then the vectors stream. The index is repacked
//! before encoding so persisted data never contains tombstones.

use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use quiver_vectors::{codec as vectors_codec, VectorId};

use crate::{Database, DbHeader, DbInner};

const MAGIC: &[u8; 4] = b"QVDB";
const VERSION: u16 = 1;
const MAP_TAG: u8 = 0xD1;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("not a database stream")]
    BadMagic,
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u16),
    #[error("corrupt stream: {0}")]
    Corrupt(&'static str),
    #[error("payload codec error: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("vectors stream error: {0}")]
    Vectors(#[from] vectors_codec::CodecError),
}

/// Writes the database to `w`. The index is repacked first, under the write
/// lock, so the stream is a consistent snapshot with no tombstones.
pub fn marshal<W: Write, V: Serialize>(w: &mut W, db: &Database<V>) -> Result<(), CodecError> {
    let mut inner = db.inner.write();
    inner.repack_vectors();

    w.write_all(MAGIC)?;
    w.write_u16::<LittleEndian>(VERSION)?;

    write_header(w, &inner.header)?;

    let payload = encode_data(&inner.data)?;
    write_packet(w, &payload)?;

    vectors_codec::marshal(w, &inner.vectors)?;

    Ok(())
}

/// Reads a database from `r`.
pub fn unmarshal<R: Read, V: DeserializeOwned>(r: &mut R) -> Result<Database<V>, CodecError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(CodecError::BadMagic);
    }

    let version = r.read_u16::<LittleEndian>()?;
    if version != VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    let header = read_header(r)?;

    let payload = read_packet(r)?;
    let data = decode_data(&payload)?;

    let vectors = vectors_codec::unmarshal(r)?;

    Ok(Database::from_inner(DbInner {
        header,
        vectors,
        data,
    }))
}

fn write_header<W: Write>(w: &mut W, header: &DbHeader) -> Result<(), CodecError> {
    w.write_u32::<LittleEndian>(header.vector_length as u32)?;
    w.write_u32::<LittleEndian>(header.repack_percent)?;
    w.write_u64::<LittleEndian>(header.items_count as u64)?;
    w.write_u64::<LittleEndian>(header.deletes_count as u64)?;
    Ok(())
}

fn read_header<R: Read>(r: &mut R) -> Result<DbHeader, CodecError> {
    let vector_length = r.read_u32::<LittleEndian>()? as usize;
    let repack_percent = r.read_u32::<LittleEndian>()?;
    let items_count = r.read_u64::<LittleEndian>()? as usize;
    let deletes_count = r.read_u64::<LittleEndian>()? as usize;

    if vector_length == 0 {
        return Err(CodecError::Corrupt("zero vector length"));
    }

    Ok(DbHeader {
        vector_length,
        repack_percent,
        items_count,
        deletes_count,
    })
}

fn encode_data<V: Serialize>(data: &HashMap<VectorId, V>) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();

    buf.write_u32::<LittleEndian>(data.len() as u32)?;
    for (&id, value) in data {
        let bytes = serde_json::to_vec(value)?;
        buf.write_i64::<LittleEndian>(id)?;
        buf.write_u32::<LittleEndian>(bytes.len() as u32)?;
        buf.write_all(&bytes)?;
    }

    Ok(buf)
}

fn decode_data<V: DeserializeOwned>(payload: &[u8]) -> Result<HashMap<VectorId, V>, CodecError> {
    let mut cursor = Cursor::new(payload);

    let count = cursor.read_u32::<LittleEndian>()? as usize;
    let mut data = HashMap::with_capacity(count);

    for _ in 0..count {
        let id = cursor.read_i64::<LittleEndian>()?;
        let len = cursor.read_u32::<LittleEndian>()? as usize;

        let mut bytes = vec![0u8; len];
        cursor.read_exact(&mut bytes)?;

        data.insert(id, serde_json::from_slice(&bytes)?);
    }

    Ok(data)
}

fn write_packet<W: Write>(w: &mut W, payload: &[u8]) -> Result<(), CodecError> {
    let mut hasher = Hasher::new();
    hasher.update(payload);
    let crc = hasher.finalize();

    w.write_u8(MAP_TAG)?;
    w.write_u32::<LittleEndian>(payload.len() as u32)?;
    w.write_u32::<LittleEndian>(crc)?;
    w.write_all(payload)?;

    Ok(())
}

fn read_packet<R: Read>(r: &mut R) -> Result<Vec<u8>, CodecError> {
    let tag = r.read_u8()?;
    if tag != MAP_TAG {
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

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use crate::{DatabaseOptions, Record};
    use quiver_vectors::Vector;

    fn record(vector: Vector, data: &str) -> Record<String> {
        Record {
            id: 0,
            vector,
            data: data.to_string(),
        }
    }

    // repack_percent 100 keeps the background trigger out of the picture so
    // counter asserts are deterministic.
    fn options() -> DatabaseOptions {
        DatabaseOptions {
            repack_percent: 100,
        }
    }

    #[test]
    fn round_trip_preserves_everything() {
        let db = Arc::new(Database::<String>::new(3, options()));

        let added = db.add_batch(vec![
            record(vec![1.0, 0.0, 0.0], "x"),
            record(vec![0.0, 1.0, 0.0], "y"),
            record(vec![0.0, 0.0, 1.0], "z"),
        ]);
        db.delete(added[1].id);

        let before: Vec<_> = db
            .get(vec![vec![1.0, 0.0, 0.0]], 1)
            .into_iter()
            .map(|r| (r.id, r.data))
            .collect();

        let mut buf = Vec::new();
        marshal(&mut buf, &db).unwrap();

        // Marshal repacks first, so the counters are already folded.
        assert_eq!(db.items_count(), 2);
        assert_eq!(db.deletes_count(), 0);

        let decoded: Database<String> = unmarshal(&mut buf.as_slice()).unwrap();

        assert_eq!(decoded.vector_length(), 3);
        assert_eq!(decoded.repack_percent(), 100);
        assert_eq!(decoded.items_count(), 2);
        assert_eq!(decoded.deletes_count(), 0);

        let after: Vec<_> = decoded
            .get(vec![vec![1.0, 0.0, 0.0]], 1)
            .into_iter()
            .map(|r| (r.id, r.data))
            .collect();
        assert_eq!(before, after);

        let all = decoded.get(vec![vec![1.0, 1.0, 1.0]], 10);
        let payloads: HashSet<String> = all.into_iter().map(|r| r.data).collect();
        assert_eq!(
            payloads,
            HashSet::from(["x".to_string(), "z".to_string()])
        );
    }

    #[test]
    fn decoded_database_accepts_writes() {
        let db = Database::<String>::new(2, options());
        db.add(record(vec![1.0, 0.0], "a"));

        let mut buf = Vec::new();
        marshal(&mut buf, &db).unwrap();

        let decoded: Arc<Database<String>> = Arc::new(unmarshal(&mut buf.as_slice()).unwrap());

        let added = decoded.add(record(vec![0.0, 1.0], "b"));
        assert_eq!(decoded.items_count(), 2);

        decoded.delete(added.id);
        assert_eq!(decoded.deletes_count(), 1);
    }

    #[test]
    fn rejects_foreign_data() {
        let err = unmarshal::<_, String>(&mut &b"definitely not a database"[..]).unwrap_err();
        assert!(matches!(err, CodecError::BadMagic));
    }

    #[test]
    fn rejects_vectors_stream_as_database() {
        let mut v = quiver_vectors::Vectors::new(2);
        v.add(vec![1.0, 0.0]);

        let mut buf = Vec::new();
        quiver_vectors::codec::marshal(&mut buf, &v).unwrap();

        let err = unmarshal::<_, String>(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, CodecError::BadMagic));
    }
}
