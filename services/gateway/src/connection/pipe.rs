//! Full-duplex byte tunnel between two streams.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::PipeConnection;

/// Size of the intermediate buffer used by each direction.
pub const PIPE_BUFFER_SIZE: usize = 64 * 1024;

/// Bytes moved in each direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipeStats {
    /// Bytes read from `a` and written to `b`.
    pub a_to_b: u64,
    /// Bytes read from `b` and written to `a`.
    pub b_to_a: u64,
}

/// Copy bytes `a -> b` and `b -> a` concurrently until both directions end.
///
/// A direction ends on the first failed read or write, or on end-of-stream.
/// On end-of-stream the writer is shut down so the other peer sees it too.
/// Neither direction cancels the other.
pub async fn pipe<A, B>(a: &mut A, b: &mut B) -> PipeStats
where
    A: PipeConnection + ?Sized,
    B: PipeConnection + ?Sized,
{
    let (mut a_read, mut a_write) = tokio::io::split(a);
    let (mut b_read, mut b_write) = tokio::io::split(b);

    let (a_to_b, b_to_a) = tokio::join!(
        copy_direction(&mut a_read, &mut b_write, "a->b"),
        copy_direction(&mut b_read, &mut a_write, "b->a"),
    );

    PipeStats { a_to_b, b_to_a }
}

async fn copy_direction<R, W>(reader: &mut R, writer: &mut W, direction: &'static str) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut total = 0u64;
    let mut buf = vec![0u8; PIPE_BUFFER_SIZE];

    let result: io::Result<()> = async {
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n]).await?;
            writer.flush().await?;
            total += n as u64;
        }
        writer.shutdown().await
    }
    .await;

    match result {
        Ok(()) => debug!(direction, bytes = total, "Pipe direction reached end of stream"),
        Err(e) => debug!(direction, bytes = total, error = %e, "Pipe direction ended"),
    }

    total
}
