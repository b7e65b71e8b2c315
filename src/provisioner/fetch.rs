use std::path::{Path, PathBuf};

use anyhow::Error;
use futures::StreamExt;
use mockall::automock;
use tracing::{debug, info, trace};

/// Download transport seam. The provisioner only asks for "put the bytes at
/// this URL into this file"; retries and timeouts stay inside the transport.
#[automock]
#[async_trait::async_trait]
pub trait Fetcher: Sync + Send {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), Error>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn partial_path(dest: &Path) -> PathBuf {
        PathBuf::from(format!("{}.download", dest.display()))
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), Error> {
        info!("downloading {} to {}", url, dest.display());

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "failed to download {}: {}",
                url,
                response.status(),
            ));
        }

        let content_length = response.content_length();
        let step = (content_length.unwrap_or(10_000_000) / 20).max(1);

        if let Some(content_length) = content_length {
            debug!("content length: {}", content_length);
        } else {
            debug!("no content length");
        }
        trace!("progress step: {}", step);

        // Stream into a partial file, rename on success. An aborted transfer
        // must never satisfy the presence check of a later run.
        let partial = Self::partial_path(dest);
        let mut file = tokio::fs::File::create(&partial).await?;
        let mut byte_stream = response.bytes_stream();

        let mut read: usize = 0;

        while let Some(item) = byte_stream.next().await {
            let item = item?;

            if (read as u64 / step) != ((read + item.len()) as u64 / step) {
                info!(
                    "read {} MB of {} MB",
                    read / 1_000_000,
                    content_length.map_or("unknown".to_string(), |x| (x / 1_000_000).to_string())
                );
            }

            read += item.len();

            tokio::io::copy(&mut item.as_ref(), &mut file).await?;
        }

        tokio::fs::rename(&partial, dest).await?;

        info!("downloaded {} to {}", url, dest.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            HttpFetcher::partial_path(Path::new("/data/isos/alpine-3.23.iso")),
            PathBuf::from("/data/isos/alpine-3.23.iso.download")
        );
    }
}
