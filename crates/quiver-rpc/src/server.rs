use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use quiver_buffers::SlicePool;

use crate::handler::Handler;

#[derive(Debug, Clone, Copy)]
pub struct ServerOptions {
    /// Nominal size of pooled request buffers.
    pub request_size: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            request_size: 4 * 1024,
        }
    }
}

/// Newline-framed JSON-RPC server: one sequential reader, a task per
/// request, one serialised writer. Requests are read into pooled buffers
/// that return to the pool when their task completes.
pub struct Server<S> {
    handler: Arc<Handler<S>>,
    buffer_pool: Arc<SlicePool<u8>>,
}

impl<S> Server<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(handler: Handler<S>) -> Self {
        Self::with_options(handler, ServerOptions::default())
    }

    pub fn with_options(handler: Handler<S>, options: ServerOptions) -> Self {
        Self {
            handler: Arc::new(handler),
            buffer_pool: Arc::new(SlicePool::new(options.request_size)),
        }
    }

    /// Reads requests from `input` until end of stream (returns `Ok`) or a
    /// read error (returned), dispatching each into its own task. Responses
    /// never interleave on `output` but may complete out of request order.
    /// All in-flight tasks are awaited before returning.
    pub async fn run<R, W>(&self, state: S, input: R, output: W) -> io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let output = Arc::new(Mutex::new(output));
        let mut reader = BufReader::new(input);
        let mut tasks: JoinSet<()> = JoinSet::new();

        let result = loop {
            let mut data = self.buffer_pool.get(0);

            match read_request(&mut reader, &mut data).await {
                Ok(true) => {}
                Ok(false) => {
                    self.buffer_pool.put(data);
                    break Ok(());
                }
                Err(e) => {
                    self.buffer_pool.put(data);
                    break Err(e);
                }
            }

            let handler = Arc::clone(&self.handler);
            let pool = Arc::clone(&self.buffer_pool);
            let output = Arc::clone(&output);
            let state = state.clone();

            tasks.spawn(async move {
                if let Some(response) = handler.handle(state, &data).await {
                    let mut out = output.lock().await;
                    if let Err(e) = write_response(&mut *out, &response).await {
                        tracing::warn!("failed to write response: {e}");
                    }
                }
                pool.put(data);
            });
        };

        while tasks.join_next().await.is_some() {}

        result
    }
}

/// Reads one newline-terminated request into `data`, coalescing however
/// many reads the line takes. Returns `Ok(false)` on a clean end of stream.
/// A final line without a newline is still delivered.
async fn read_request<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    data: &mut Vec<u8>,
) -> io::Result<bool> {
    let n = reader.read_until(b'\n', data).await?;
    if n == 0 {
        return Ok(false);
    }

    if data.last() == Some(&b'\n') {
        data.pop();
    }
    if data.last() == Some(&b'\r') {
        data.pop();
    }

    Ok(true)
}

async fn write_response<W: AsyncWrite + Unpin>(out: &mut W, response: &[u8]) -> io::Result<()> {
    out.write_all(response).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}
