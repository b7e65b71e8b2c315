pub mod fetch;
pub mod mount;

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info, trace};

use crate::resolver::ResolvedImage;
use fetch::Fetcher;
use mount::Mounter;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("error while preparing directory {path:?}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error while downloading image '{name}': {source}")]
    Download {
        name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("error while mounting image '{name}': {source}")]
    Mount {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Downloaded,
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountOutcome {
    Mounted,
    AlreadyMounted,
    Disabled,
}

#[derive(Debug)]
pub struct ImageReport {
    pub name: String,
    pub fetch: FetchOutcome,
    pub mount: MountOutcome,
}

/// Per-run outcome summary. In the default fail-fast mode `failures` is
/// always empty, the first error aborts the run instead.
#[derive(Debug, Default)]
pub struct ProvisionReport {
    pub images: Vec<ImageReport>,
    pub failures: Vec<ProvisionError>,
}

impl ProvisionReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

pub struct Provisioner {
    fetcher: Box<dyn Fetcher>,
    mounter: Box<dyn Mounter>,
    continue_on_error: bool,
}

impl Provisioner {
    pub fn new(
        fetcher: Box<dyn Fetcher>,
        mounter: Box<dyn Mounter>,
        continue_on_error: bool,
    ) -> Self {
        Self {
            fetcher,
            mounter,
            continue_on_error,
        }
    }

    /// Bring the filesystem in line with the resolved image list, one image
    /// at a time in list order.
    ///
    /// Every step probes before mutating: a present file is not re-fetched,
    /// an active mount is not re-mounted. Re-running with identical input
    /// performs no fetches and no mounts.
    pub async fn provision(
        &self,
        images: &[ResolvedImage],
    ) -> Result<ProvisionReport, ProvisionError> {
        let mut report = ProvisionReport::default();

        for image in images {
            match self.provision_image(image).await {
                Ok(image_report) => report.images.push(image_report),
                Err(e) if self.continue_on_error => {
                    error!("continuing past failure: {}", e);
                    report.failures.push(e);
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "provisioned {} images, {} failures",
            report.images.len(),
            report.failures.len()
        );
        Ok(report)
    }

    async fn provision_image(&self, image: &ResolvedImage) -> Result<ImageReport, ProvisionError> {
        debug!("provisioning image {}", image.name);

        if let Some(dir) = image.storage_path.parent() {
            ensure_dir(dir).await?;
        }

        let fetch = self.ensure_file(image).await?;
        let mount = self.ensure_mount(image).await?;

        Ok(ImageReport {
            name: image.name.clone(),
            fetch,
            mount,
        })
    }

    async fn ensure_file(&self, image: &ResolvedImage) -> Result<FetchOutcome, ProvisionError> {
        // Presence is the only idempotence signal, no checksum comparison.
        let present = tokio::fs::try_exists(&image.storage_path)
            .await
            .map_err(|e| ProvisionError::Storage {
                path: image.storage_path.clone(),
                source: e,
            })?;

        if present {
            debug!(
                "{} already present at {}, skipping download",
                image.name,
                image.storage_path.display()
            );
            return Ok(FetchOutcome::AlreadyPresent);
        }

        self.fetcher
            .fetch(&image.url, &image.storage_path)
            .await
            .map_err(|e| ProvisionError::Download {
                name: image.name.clone(),
                source: e,
            })?;

        tokio::fs::set_permissions(
            &image.storage_path,
            std::fs::Permissions::from_mode(0o644),
        )
        .await
        .map_err(|e| ProvisionError::Storage {
            path: image.storage_path.clone(),
            source: e,
        })?;

        Ok(FetchOutcome::Downloaded)
    }

    async fn ensure_mount(&self, image: &ResolvedImage) -> Result<MountOutcome, ProvisionError> {
        let Some(mount_path) = &image.mount_path else {
            trace!("mounting disabled, skipping {}", image.name);
            return Ok(MountOutcome::Disabled);
        };

        // Mount state first: an active mount target is read-only, so the
        // directory is only created and chmodded when nothing is mounted yet.
        let mounted = self
            .mounter
            .is_mounted(mount_path)
            .await
            .map_err(|e| ProvisionError::Mount {
                name: image.name.clone(),
                source: e,
            })?;

        if mounted {
            debug!(
                "{} already mounted at {}, skipping",
                image.name,
                mount_path.display()
            );
            return Ok(MountOutcome::AlreadyMounted);
        }

        ensure_dir(mount_path).await?;

        self.mounter
            .mount_readonly(&image.storage_path, mount_path)
            .await
            .map_err(|e| ProvisionError::Mount {
                name: image.name.clone(),
                source: e,
            })?;

        Ok(MountOutcome::Mounted)
    }
}

/// Create-if-missing with mode 0755. The mode is enforced on every run, never
/// world-writable.
async fn ensure_dir(path: &Path) -> Result<(), ProvisionError> {
    let storage_err = |e: std::io::Error| ProvisionError::Storage {
        path: path.to_path_buf(),
        source: e,
    };

    tokio::fs::create_dir_all(path).await.map_err(storage_err)?;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .map_err(storage_err)?;
    Ok(())
}
