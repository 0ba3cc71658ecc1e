use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::effects::handle::TransferHandle;
use crate::error::{CosError, Result};

const CHUNK_SIZE: usize = 8192;

/// Copy `reader` into `writer` in fixed-size chunks, reporting each chunk to
/// `handle` and stopping with [`CosError::Canceled`] once it is canceled.
///
/// Returns the number of bytes copied. The writer is flushed on success only.
pub async fn copy_with_handle<R, W>(reader: &mut R, writer: &mut W, handle: &TransferHandle) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut chunk = [0u8; CHUNK_SIZE];
    let mut copied = 0u64;

    loop {
        if !handle.should_continue() {
            return Err(CosError::Canceled);
        }
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&chunk[..n]).await?;
        copied += n as u64;
        handle.update_progress(n as u64);
    }

    writer.flush().await?;
    Ok(copied)
}
