use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use validator::Validate;

use quiver_db::{codec, Database, DatabaseOptions, Record};
use quiver_rpc::{HandlerError, HandlerResult, RpcContext};
use quiver_vectors::{similarity, Vector, VectorId};

use crate::state::ServiceState;

use super::{database_already_exists, database_error, vectors_length_mismatch};

/*** Create database ***/

#[derive(Debug, Deserialize, Validate)]
struct CreateDatabaseRequest {
    #[validate(length(min = 1))]
    database_id: String,
    #[validate(range(min = 1))]
    vector_length: usize,
}

#[derive(Debug, Serialize, Validate)]
struct CreateDatabaseResponse {}

pub async fn create_database(state: ServiceState, ctx: RpcContext) -> HandlerResult {
    let req: CreateDatabaseRequest = ctx.request()?;

    let database = Database::new(
        req.vector_length,
        DatabaseOptions {
            repack_percent: state.app.config.repack_percent,
        },
    );

    match state.app.databases.entry(req.database_id) {
        Entry::Occupied(_) => return Err(database_already_exists()),
        Entry::Vacant(entry) => {
            entry.insert(Arc::new(database));
        }
    }

    ctx.response(CreateDatabaseResponse {})
}

/*** Delete database ***/

#[derive(Debug, Deserialize, Validate)]
struct DeleteDatabaseRequest {
    #[validate(length(min = 1))]
    database_id: String,
}

#[derive(Debug, Serialize, Validate)]
struct DeleteDatabaseResponse {}

pub async fn delete_database(state: ServiceState, ctx: RpcContext) -> HandlerResult {
    let req: DeleteDatabaseRequest = ctx.request()?;

    state.app.databases.remove(&req.database_id);

    ctx.response(DeleteDatabaseResponse {})
}

/*** Read database ***/

#[derive(Debug, Deserialize, Validate)]
struct ReadDatabaseRequest {
    #[validate(length(min = 1))]
    database_id: String,
    #[validate(length(min = 1))]
    file_path: String,
}

#[derive(Debug, Serialize, Validate)]
struct ReadDatabaseResponse {}

pub async fn read_database(state: ServiceState, ctx: RpcContext) -> HandlerResult {
    let req: ReadDatabaseRequest = ctx.request()?;

    let path = PathBuf::from(&req.file_path);
    let database = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let file = File::open(&path)?;
        let mut decoder = GzDecoder::new(BufReader::new(file));
        Ok(codec::unmarshal::<_, serde_json::Value>(&mut decoder)?)
    })
    .await
    .map_err(|e| HandlerError::Internal(e.into()))?
    .map_err(database_error)?;

    // Replaces any in-memory database registered under the same id.
    state
        .app
        .databases
        .insert(req.database_id, Arc::new(database));

    ctx.response(ReadDatabaseResponse {})
}

/*** Write database ***/

#[derive(Debug, Deserialize, Validate)]
struct WriteDatabaseRequest {
    #[validate(length(min = 1))]
    database_id: String,
    #[validate(length(min = 1))]
    file_path: String,
}

#[derive(Debug, Serialize, Validate)]
struct WriteDatabaseResponse {}

pub async fn write_database(state: ServiceState, ctx: RpcContext) -> HandlerResult {
    let req: WriteDatabaseRequest = ctx.request()?;

    let database = state.database(&req.database_id)?;

    let path = PathBuf::from(&req.file_path);
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let file = File::create(&path)?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        codec::marshal(&mut encoder, &database)?;
        encoder.finish()?.flush()?;
        Ok(())
    })
    .await
    .map_err(|e| HandlerError::Internal(e.into()))?
    .map_err(database_error)?;

    ctx.response(WriteDatabaseResponse {})
}

/*** Add vector ***/

#[derive(Debug, Serialize, Deserialize, Validate)]
struct VectorRecord {
    #[validate(length(min = 1))]
    vector: Vector,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize, Validate)]
struct AddVectorRequest {
    #[validate(length(min = 1))]
    database_id: String,
    #[validate(nested)]
    record: VectorRecord,
}

#[derive(Debug, Serialize, Validate)]
struct AddVectorResponse {
    id: VectorId,
}

pub async fn add_vector(state: ServiceState, ctx: RpcContext) -> HandlerResult {
    let req: AddVectorRequest = ctx.request()?;

    let database = state.database(&req.database_id)?;

    let record = database.add(Record {
        id: 0,
        vector: req.record.vector,
        data: req.record.data,
    });

    ctx.response(AddVectorResponse { id: record.id })
}

/*** Delete vector ***/

#[derive(Debug, Deserialize, Validate)]
struct DeleteVectorRequest {
    #[validate(length(min = 1))]
    database_id: String,
    record_id: VectorId,
}

#[derive(Debug, Serialize, Validate)]
struct DeleteVectorResponse {}

pub async fn delete_vector(state: ServiceState, ctx: RpcContext) -> HandlerResult {
    let req: DeleteVectorRequest = ctx.request()?;

    let database = state.database(&req.database_id)?;

    database.delete(req.record_id);

    ctx.response(DeleteVectorResponse {})
}

/*** Add vectors batch ***/

#[derive(Debug, Deserialize, Validate)]
struct AddVectorsBatchRequest {
    #[validate(length(min = 1))]
    database_id: String,
    #[validate(length(min = 1))]
    #[validate(nested)]
    records: Vec<VectorRecord>,
}

#[derive(Debug, Serialize, Validate)]
struct AddVectorsBatchResponse {
    records: Vec<AddVectorsBatchRecord>,
}

#[derive(Debug, Serialize)]
struct AddVectorsBatchRecord {
    id: VectorId,
}

pub async fn add_vectors_batch(state: ServiceState, ctx: RpcContext) -> HandlerResult {
    let req: AddVectorsBatchRequest = ctx.request()?;

    let database = state.database(&req.database_id)?;

    let records = req
        .records
        .into_iter()
        .map(|r| Record {
            id: 0,
            vector: r.vector,
            data: r.data,
        })
        .collect();

    let added = database.add_batch(records);

    ctx.response(AddVectorsBatchResponse {
        records: added
            .into_iter()
            .map(|r| AddVectorsBatchRecord { id: r.id })
            .collect(),
    })
}

/*** Delete vectors batch ***/

#[derive(Debug, Deserialize, Validate)]
struct DeleteVectorsBatchRequest {
    #[validate(length(min = 1))]
    database_id: String,
    #[validate(length(min = 1))]
    record_ids: Vec<VectorId>,
}

#[derive(Debug, Serialize, Validate)]
struct DeleteVectorsBatchResponse {}

pub async fn delete_vectors_batch(state: ServiceState, ctx: RpcContext) -> HandlerResult {
    let req: DeleteVectorsBatchRequest = ctx.request()?;

    let database = state.database(&req.database_id)?;

    database.delete_batch(&req.record_ids);

    ctx.response(DeleteVectorsBatchResponse {})
}

/*** Search vectors ***/

#[derive(Debug, Deserialize, Validate)]
struct SearchVectorsRequest {
    #[validate(length(min = 1))]
    database_id: String,
    #[validate(length(min = 1))]
    vectors: Vec<Vector>,
    #[validate(range(min = 1))]
    k: usize,
}

#[derive(Debug, Serialize, Validate)]
struct SearchVectorsResponse {
    records: Vec<SearchVectorRecord>,
}

#[derive(Debug, Serialize)]
struct SearchVectorRecord {
    id: VectorId,
    data: serde_json::Value,
}

pub async fn search_vectors(state: ServiceState, ctx: RpcContext) -> HandlerResult {
    let req: SearchVectorsRequest = ctx.request()?;

    let database = state.database(&req.database_id)?;

    let records = database.get(req.vectors, req.k);

    ctx.response(SearchVectorsResponse {
        records: records
            .into_iter()
            .map(|r| SearchVectorRecord {
                id: r.id,
                data: r.data,
            })
            .collect(),
    })
}

/*** Get similarity ***/

#[derive(Debug, Deserialize, Validate)]
struct GetSimilarityRequest {
    #[validate(length(min = 1))]
    vector1: Vector,
    #[validate(length(min = 1))]
    vector2: Vector,
}

#[derive(Debug, Serialize, Validate)]
struct GetSimilarityResponse {
    similarity: f32,
}

pub async fn get_similarity(_state: ServiceState, ctx: RpcContext) -> HandlerResult {
    let req: GetSimilarityRequest = ctx.request()?;

    if req.vector1.len() != req.vector2.len() {
        return Err(vectors_length_mismatch());
    }

    ctx.response(GetSimilarityResponse {
        similarity: similarity(&req.vector1, &req.vector2),
    })
}
