use quiver_rpc::Handler;

use crate::handlers::{agent, client, thread, vectors};
use crate::state::ServiceState;

/// Builds the method table served over JSON-RPC.
pub fn handler() -> Handler<ServiceState> {
    let mut handler = Handler::new();

    handler.register("createDatabase", vectors::create_database);
    handler.register("deleteDatabase", vectors::delete_database);
    handler.register("readDatabase", vectors::read_database);
    handler.register("writeDatabase", vectors::write_database);

    handler.register("addVector", vectors::add_vector);
    handler.register("deleteVector", vectors::delete_vector);
    handler.register("addVectorsBatch", vectors::add_vectors_batch);
    handler.register("deleteVectorsBatch", vectors::delete_vectors_batch);
    handler.register("searchVectors", vectors::search_vectors);

    handler.register("getSimilarity", vectors::get_similarity);

    handler.register("setClient", client::set_client);
    handler.register("getCompletion", client::get_completion);
    handler.register("getEmbeddings", client::get_embeddings);
    handler.register("getSpeech", client::get_speech);
    handler.register("getStatistics", client::get_statistics);

    handler.register("getThreadCompletion", thread::get_thread_completion);
    handler.register("getThreadSummary", thread::get_thread_summary);
    handler.register("getThreadResponse", thread::get_thread_response);

    handler.register("getAgentResponse", agent::get_agent_response);

    handler
}
