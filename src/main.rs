pub mod catalog;
pub mod config;
pub mod facts;
pub mod provisioner;
pub mod resolver;

use anyhow::bail;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::{
    catalog::Catalog,
    config::IsoManagerConfig,
    provisioner::{fetch::HttpFetcher, mount::LoopMounter, Provisioner},
    resolver::StorageLayout,
};
use tracing::{debug, error, info, trace};

#[derive(Parser)]
#[clap(
    version = "0.1",
    about = "Downloads ISO images and loop-mounts them for a PXE boot pipeline"
)]
pub struct IsoManagerOpts {
    /// Config file path
    #[clap(short, long, default_value = "/etc/iso-manager/config.yaml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout is reserved for the published facts.
    tracing_subscriber::fmt::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("starting up ...");

    let options = IsoManagerOpts::parse();

    debug!("loading config file at {}", options.config);
    let config = IsoManagerConfig::load(options.config.as_str())?;
    trace!(
        "config file loaded successfully with content: {:#?}",
        config
    );

    let catalog = Catalog::builtin();
    let layout = StorageLayout::new(
        config.storage.root.clone(),
        config.storage.mount_root.clone(),
        config.storage.mount_enabled,
    );

    info!(
        "resolving {} enabled keys and {} custom images",
        config.images.enabled.len(),
        config.images.custom.len()
    );
    let images = resolver::resolve(
        &config.images.enabled,
        &catalog,
        &config.images.custom,
        &layout,
    )?;

    let provisioner = Provisioner::new(
        Box::new(HttpFetcher::new()),
        Box::new(LoopMounter),
        config.provision.continue_on_error,
    );
    let report = provisioner.provision(&images).await?;

    for image in &report.images {
        debug!(
            "{}: fetch {:?}, mount {:?}",
            image.name, image.fetch, image.mount
        );
    }

    if report.has_failures() {
        for failure in &report.failures {
            error!("{}", failure);
        }
        bail!(
            "{} of {} images failed to provision",
            report.failures.len(),
            images.len()
        );
    }

    facts::publish(&images, config.facts_path.as_deref())?;

    info!("provisioned {} images", images.len());
    Ok(())
}
