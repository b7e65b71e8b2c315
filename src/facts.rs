use std::io::{self, Write};
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use crate::resolver::ResolvedImage;

#[derive(Error, Debug)]
pub enum FactsError {
    #[error("cannot serialize facts")]
    Serialize(#[from] serde_json::Error),
    #[error("cannot write facts")]
    Write(#[from] io::Error),
}

/// Hand the resolved image list to downstream consumers (the PXE service
/// installer and the boot-menu renderer) as a JSON array.
///
/// The array order and the per-entry shape (`name`, `url`, `storage_path`,
/// optional `mount_path`) are the binding contract; nothing is transformed
/// here.
pub fn publish(images: &[ResolvedImage], path: Option<&Path>) -> Result<(), FactsError> {
    let mut document = serde_json::to_vec_pretty(images)?;
    document.push(b'\n');

    match path {
        Some(path) => {
            debug!("writing facts for {} images to {}", images.len(), path.display());
            std::fs::write(path, &document)?;
            info!("facts written to {}", path.display());
        }
        None => {
            io::stdout().write_all(&document)?;
        }
    }

    Ok(())
}
