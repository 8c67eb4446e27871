//! Bounded-wait GPU readback.
//!
//! Every pick is a blocking round trip: submit, wait for the submission to
//! complete, then map the staging buffer. The wait is bounded so a hung
//! device turns into [`RenderError::Timeout`] instead of a frozen caller.

use std::sync::mpsc;
use std::time::Duration;

use crate::error::{RenderError, RenderResult};

/// Rounds a row size up to the texture copy alignment (256 bytes).
pub fn align_bytes_per_row(unpadded: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Blocks until `submission` has finished executing or `timeout` elapses.
pub fn wait_for_submission(
    device: &wgpu::Device,
    submission: wgpu::SubmissionIndex,
    timeout: Duration,
) -> RenderResult<()> {
    match device.poll(wgpu::PollType::Wait {
        submission_index: Some(submission),
        timeout: Some(timeout),
    }) {
        Ok(_) => Ok(()),
        Err(wgpu::PollError::Timeout) => {
            log::warn!("GPU did not finish within {timeout:?}");
            Err(RenderError::Timeout(timeout))
        }
        Err(err) => Err(RenderError::PollFailed(err.to_string())),
    }
}

/// Maps `buffer` after the copy in `submission` completes and returns a copy
/// of its first `size` bytes. The buffer is unmapped again before returning.
///
/// On a timeout the pending map is cancelled, so the same buffer can be the
/// destination of the next copy.
pub fn map_read(
    device: &wgpu::Device,
    buffer: &wgpu::Buffer,
    size: wgpu::BufferAddress,
    submission: wgpu::SubmissionIndex,
    timeout: Duration,
) -> RenderResult<Vec<u8>> {
    let slice = buffer.slice(..size);
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });

    let mapped = match await_map(device, &rx, submission, timeout) {
        Ok(mapped) => mapped,
        Err(err) => {
            // Still pending; unmapping aborts the request
            buffer.unmap();
            return Err(err);
        }
    };
    // A failed map leaves the buffer unmapped already
    mapped.map_err(|err| RenderError::BufferMapFailed(err.to_string()))?;

    let data = slice.get_mapped_range().to_vec();
    buffer.unmap();
    Ok(data)
}

/// Waits for the map callback. `Err` means it has not fired yet.
fn await_map(
    device: &wgpu::Device,
    rx: &mpsc::Receiver<Result<(), wgpu::BufferAsyncError>>,
    submission: wgpu::SubmissionIndex,
    timeout: Duration,
) -> RenderResult<Result<(), wgpu::BufferAsyncError>> {
    wait_for_submission(device, submission, timeout)?;

    // The callback normally fires inside the wait; one more poll drains it otherwise
    if let Ok(result) = rx.try_recv() {
        return Ok(result);
    }
    let _ = device.poll(wgpu::PollType::Poll);
    rx.recv_timeout(timeout).map_err(|_| {
        log::warn!("buffer map did not complete within {timeout:?}");
        RenderError::Timeout(timeout)
    })
}
