use std::path::Path;

use anyhow::Error;
use mockall::automock;
use tokio::process::Command;
use tracing::{debug, info, trace};

/// Loop-mount seam. Mount state is queried before mutating so re-runs are
/// no-ops for anything already mounted.
#[automock]
#[async_trait::async_trait]
pub trait Mounter: Sync + Send {
    async fn is_mounted(&self, target: &Path) -> Result<bool, Error>;
    async fn mount_readonly(&self, source: &Path, target: &Path) -> Result<(), Error>;
}

/// Mounts ISO files read-only through the loop device, via the system
/// `findmnt` and `mount` binaries.
pub struct LoopMounter;

#[async_trait::async_trait]
impl Mounter for LoopMounter {
    async fn is_mounted(&self, target: &Path) -> Result<bool, Error> {
        trace!("checking mount state of {}", target.display());

        let output = Command::new("findmnt")
            .arg("-n")
            .arg(target.as_os_str())
            .output()
            .await
            .map_err(|e| anyhow::anyhow!("error when running findmnt: {}", e))?;

        let mounted = output.status.success();
        debug!("{} mounted: {}", target.display(), mounted);
        Ok(mounted)
    }

    async fn mount_readonly(&self, source: &Path, target: &Path) -> Result<(), Error> {
        info!(
            "mounting {} read-only at {}",
            source.display(),
            target.display()
        );

        let output = Command::new("mount")
            .args(["-o", "loop,ro", "-t", "iso9660"])
            .arg(source.as_os_str())
            .arg(target.as_os_str())
            .output()
            .await
            .map_err(|e| anyhow::anyhow!("error when running mount: {}", e))?;

        if !output.status.success() {
            return Err(anyhow::anyhow!(
                "mount of {} at {} failed: {}",
                source.display(),
                target.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        Ok(())
    }
}
