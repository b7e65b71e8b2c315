use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{self, BufReader},
    path::PathBuf,
};
use thiserror::Error;

use crate::resolver::CustomImage;

#[derive(Error, Debug)]
pub enum IsoManagerConfigError {
    #[error("cannot load config file")]
    Load(#[from] io::Error),
    #[error("cannot parse config file")]
    Parse(#[from] serde_yaml::Error),
    #[error("unsupported config kind")]
    KindNotSupported,
    #[error("unsupported config api version")]
    VersionNotSupported,
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct IsoManagerConfig {
    /// The api version of the iso-manager config file
    pub api_version: String,
    /// The kind of the iso-manager config file
    pub kind: String,
    /// Storage and mount layout
    #[serde(default)]
    pub storage: StorageConfig,
    /// Enabled catalog keys and custom image entries
    #[serde(default)]
    pub images: ImagesConfig,
    /// Provisioning behavior
    #[serde(default)]
    pub provision: ProvisionConfig,
    /// Where to write the resolved image facts; stdout when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facts_path: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Directory the ISO files are downloaded into
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    /// Directory the ISO files are loop-mounted under
    #[serde(default = "default_mount_root")]
    pub mount_root: PathBuf,
    /// Whether to loop-mount each image read-only
    #[serde(default)]
    pub mount_enabled: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            root: default_storage_root(),
            mount_root: default_mount_root(),
            mount_enabled: false,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ImagesConfig {
    /// Catalog keys to provision
    #[serde(default)]
    pub enabled: Vec<String>,
    /// User-supplied image entries, merged with the catalog subset
    #[serde(default)]
    pub custom: Vec<CustomImage>,
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionConfig {
    /// Keep going past per-image failures and report them at the end,
    /// instead of the default fail-fast
    #[serde(default)]
    pub continue_on_error: bool,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("/var/lib/isos")
}

fn default_mount_root() -> PathBuf {
    PathBuf::from("/var/lib/iso_mounts")
}

impl IsoManagerConfig {
    /// Load an IsoManagerConfig from a file.
    ///
    /// Arguments:
    ///
    /// * `path`: The path to the config file.
    ///
    /// Returns:
    ///
    /// A Result<IsoManagerConfig>
    pub fn load(path: &str) -> Result<Self> {
        let file = File::open(path).map_err(IsoManagerConfigError::Load)?;
        let reader = BufReader::new(file);
        let config: IsoManagerConfig =
            serde_yaml::from_reader(reader).map_err(IsoManagerConfigError::Parse)?;

        if config.kind != "Config" {
            return Err(IsoManagerConfigError::KindNotSupported.into());
        }

        if config.api_version != "iso-manager.io/v1alpha1" {
            return Err(IsoManagerConfigError::VersionNotSupported.into());
        }

        Ok(config)
    }
}
