//! Byte streaming between the local filesystem and provider handles.
//!
//! Copy-in stages a picked document into a local path; copy-out streams a
//! local source into a provider-held destination. Both run off the
//! completion path on a background thread and close their streams
//! deterministically whatever the outcome.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::provider::{DocumentResolver, DocumentUri};

/// Buffer size for stream copies (8KB).
const COPY_BUFFER_SIZE: usize = 8 * 1024;

/// Errors that can occur during a transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The source handle could not be opened for reading.
    #[error("failed to open source handle {uri}: {source}")]
    SourceUnavailable {
        /// The unreadable handle.
        uri: DocumentUri,
        /// Provider failure.
        source: io::Error,
    },

    /// The destination handle could not be opened for writing.
    #[error("failed to open destination handle {uri}: {source}")]
    DestinationUnavailable {
        /// The unwritable handle.
        uri: DocumentUri,
        /// Provider failure.
        source: io::Error,
    },

    /// IO error on the local side of the transfer.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Copies the document behind `source` into the local `destination` path.
///
/// Any pre-existing file at `destination` is removed first. Returns the
/// number of bytes copied.
pub fn copy_in(
    resolver: &dyn DocumentResolver,
    source: &DocumentUri,
    destination: &Path,
) -> Result<u64, TransferError> {
    let mut reader =
        resolver
            .open_readable(source)
            .map_err(|e| TransferError::SourceUnavailable {
                uri: source.clone(),
                source: e,
            })?;

    if destination.exists() {
        fs::remove_file(destination)?;
    }
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut file = File::create(destination)?;
    let bytes = stream_copy(&mut reader, &mut file)?;
    file.flush()?;

    debug!(
        uri = %source,
        path = %destination.display(),
        bytes,
        "copied document into local path"
    );
    Ok(bytes)
}

/// Streams the local `source` file into the document behind `destination`.
///
/// Fails if the destination stream cannot be obtained. Truncation of
/// pre-existing longer content at the destination is the provider's
/// responsibility. Returns the number of bytes copied.
pub fn copy_out(
    resolver: &dyn DocumentResolver,
    source: &Path,
    destination: &DocumentUri,
) -> Result<u64, TransferError> {
    let mut reader = File::open(source)?;
    let mut writer =
        resolver
            .open_writable(destination)
            .map_err(|e| TransferError::DestinationUnavailable {
                uri: destination.clone(),
                source: e,
            })?;

    let bytes = stream_copy(&mut reader, &mut writer)?;
    writer.flush()?;

    debug!(
        path = %source.display(),
        uri = %destination,
        bytes,
        "streamed local file to destination handle"
    );
    Ok(bytes)
}

/// Streams all bytes from `reader` to `writer`.
fn stream_copy<R, W>(reader: &mut R, writer: &mut W) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buffer = [0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        writer.write_all(&buffer[..bytes_read])?;
        total += bytes_read as u64;
    }
    Ok(total)
}
