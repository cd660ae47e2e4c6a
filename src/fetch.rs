//! Download a remote source file before importing it

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// GET `url` and write the body to `dest`, returning the number of bytes
/// written.
///
/// The request advertises gzip and a gzipped response is decompressed
/// before writing. Any non-success status is an error and `dest` is left
/// untouched. There is no retry.
pub fn download_file(url: &str, dest: impl AsRef<Path>) -> Result<u64, FetchError> {
    let dest = dest.as_ref();
    let client = reqwest::blocking::Client::builder()
        .gzip(true)
        .timeout(TIMEOUT)
        .build()?;

    debug!(url, "fetching");
    let response = client.get(url).send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.bytes()?;
    std::fs::write(dest, &body).map_err(|source| FetchError::Io {
        path: dest.to_path_buf(),
        source,
    })?;

    info!(url, dest = %dest.display(), bytes = body.len(), "downloaded");
    Ok(body.len() as u64)
}
