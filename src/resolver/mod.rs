use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};
use url::Url;

use crate::catalog::Catalog;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("unknown catalog key '{0}'")]
    UnknownCatalogKey(String),
    #[error("duplicate custom image name '{0}'")]
    DuplicateCustomImage(String),
    #[error("invalid custom image '{name}': {reason}")]
    InvalidCustomImage { name: String, reason: String },
}

/// User-supplied image entry. `kernel_path`/`initrd_path` are passed through
/// to the published facts for the boot-menu renderer, this crate never reads
/// them.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CustomImage {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initrd_path: Option<String>,
}

/// Final, deduplicated, path-annotated entry scheduled for provisioning.
///
/// The serialized shape (`name`, `url`, `storage_path`, optional
/// `mount_path`) is the contract the PXE installer and menu renderer consume.
#[derive(Serialize, PartialEq, Debug, Clone)]
pub struct ResolvedImage {
    pub name: String,
    pub url: String,
    pub storage_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernel_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initrd_path: Option<String>,
}

/// Where images land on disk. Passed explicitly into `resolve` so path
/// derivation has no ambient configuration lookup.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    storage_root: PathBuf,
    mount_root: PathBuf,
    mount_enabled: bool,
}

impl StorageLayout {
    pub fn new(storage_root: PathBuf, mount_root: PathBuf, mount_enabled: bool) -> Self {
        Self {
            storage_root,
            mount_root,
            mount_enabled,
        }
    }

    pub fn storage_path(&self, name: &str) -> PathBuf {
        self.storage_root.join(format!("{name}.iso"))
    }

    pub fn mount_path(&self, name: &str) -> Option<PathBuf> {
        self.mount_enabled
            .then(|| self.mount_root.join(format!("{name}/")))
    }
}

/// Shape-check the custom image list before any lookup or I/O happens.
///
/// A malformed entry fails the whole run. The custom list is shared
/// configuration consumed by several roles, so a bad entry is treated as
/// operator error rather than silently skipped.
pub fn validate(custom: &[CustomImage]) -> Result<(), ResolveError> {
    for (index, image) in custom.iter().enumerate() {
        if image.name.is_empty() {
            return Err(ResolveError::InvalidCustomImage {
                name: format!("custom[{index}]"),
                reason: format!("name must not be empty (url {})", image.url),
            });
        }

        let url = Url::parse(&image.url).map_err(|e| ResolveError::InvalidCustomImage {
            name: image.name.clone(),
            reason: format!("url '{}' does not parse: {}", image.url, e),
        })?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ResolveError::InvalidCustomImage {
                    name: image.name.clone(),
                    reason: format!("url scheme '{other}' is not http or https"),
                })
            }
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(ResolveError::InvalidCustomImage {
                name: image.name.clone(),
                reason: format!("url '{}' has no host", image.url),
            });
        }
    }

    Ok(())
}

/// Merge the enabled catalog subset with the custom image list into one
/// ordered, deduplicated set of images to provision.
///
/// Ordering is deterministic: catalog entries keep enable-list order, custom
/// entries are appended in supplied order. A custom entry sharing a name with
/// a catalog entry overrides it in place, keeping the catalog slot so the
/// downstream boot menu stays stable. Two custom entries with the same name
/// are an error, not a silent pick.
pub fn resolve(
    enabled_keys: &[String],
    catalog: &Catalog,
    custom: &[CustomImage],
    layout: &StorageLayout,
) -> Result<Vec<ResolvedImage>, ResolveError> {
    trace!(
        "resolving {} enabled keys, {} custom images",
        enabled_keys.len(),
        custom.len()
    );

    validate(custom)?;

    let mut custom_names = HashSet::new();
    for image in custom {
        if !custom_names.insert(image.name.as_str()) {
            return Err(ResolveError::DuplicateCustomImage(image.name.clone()));
        }
    }

    let mut images: Vec<ResolvedImage> = Vec::with_capacity(enabled_keys.len() + custom.len());

    for key in enabled_keys {
        let url = catalog.lookup(key).ok_or_else(|| {
            debug!("valid catalog keys: {:?}", catalog.keys());
            ResolveError::UnknownCatalogKey(key.clone())
        })?;

        if images.iter().any(|image| &image.name == key) {
            debug!("catalog key {} enabled twice, keeping first occurrence", key);
            continue;
        }

        images.push(ResolvedImage {
            name: key.clone(),
            url: url.to_string(),
            storage_path: layout.storage_path(key),
            mount_path: layout.mount_path(key),
            kernel_path: None,
            initrd_path: None,
        });
    }

    for image in custom {
        let resolved = ResolvedImage {
            name: image.name.clone(),
            url: image.url.clone(),
            storage_path: layout.storage_path(&image.name),
            mount_path: layout.mount_path(&image.name),
            kernel_path: image.kernel_path.clone(),
            initrd_path: image.initrd_path.clone(),
        };

        if let Some(slot) = images.iter_mut().find(|i| i.name == image.name) {
            debug!("custom image {} overrides catalog entry", image.name);
            *slot = resolved;
        } else {
            images.push(resolved);
        }
    }

    debug!("resolved {} images", images.len());
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn test_catalog() -> Catalog {
        Catalog::from_entries([
            (
                "ubuntu-24.04".to_string(),
                "https://example.org/ubuntu-24.04.iso".to_string(),
            ),
            (
                "alpine-3.23".to_string(),
                "https://example.org/alpine-3.23.iso".to_string(),
            ),
        ])
    }

    fn layout(mount_enabled: bool) -> StorageLayout {
        StorageLayout::new(
            PathBuf::from("/data/isos"),
            PathBuf::from("/data/mnt"),
            mount_enabled,
        )
    }

    fn custom(name: &str, url: &str) -> CustomImage {
        CustomImage {
            name: name.to_string(),
            url: url.to_string(),
            kernel_path: None,
            initrd_path: None,
        }
    }

    #[test]
    fn empty_inputs_resolve_to_empty_list() {
        let images = resolve(&[], &test_catalog(), &[], &layout(false)).unwrap();
        assert!(images.is_empty());
    }

    #[test]
    fn path_derivation() {
        let images = resolve(
            &["alpine-3.23".to_string()],
            &test_catalog(),
            &[],
            &layout(true),
        )
        .unwrap();

        assert_eq!(images.len(), 1);
        assert_eq!(images[0].name, "alpine-3.23");
        assert_eq!(
            images[0].storage_path.to_str(),
            Some("/data/isos/alpine-3.23.iso")
        );
        assert_eq!(
            images[0].mount_path.as_deref().and_then(Path::to_str),
            Some("/data/mnt/alpine-3.23/")
        );
    }

    #[test]
    fn mount_path_absent_when_mounting_disabled() {
        let images = resolve(
            &["alpine-3.23".to_string()],
            &test_catalog(),
            &[],
            &layout(false),
        )
        .unwrap();
        assert_eq!(images[0].mount_path, None);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = resolve(
            &["not-a-real-key".to_string()],
            &test_catalog(),
            &[],
            &layout(false),
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::UnknownCatalogKey(key) if key == "not-a-real-key"));
    }

    #[test]
    fn custom_overrides_catalog_entry_in_place() {
        let images = resolve(
            &["ubuntu-24.04".to_string(), "alpine-3.23".to_string()],
            &test_catalog(),
            &[custom("ubuntu-24.04", "https://mirror.example.org/custom.iso")],
            &layout(false),
        )
        .unwrap();

        assert_eq!(images.len(), 2);
        // Override keeps the catalog slot, not appended at the end.
        assert_eq!(images[0].name, "ubuntu-24.04");
        assert_eq!(images[0].url, "https://mirror.example.org/custom.iso");
        assert_eq!(images[1].name, "alpine-3.23");
    }

    #[test]
    fn custom_entries_append_in_supplied_order() {
        let images = resolve(
            &["alpine-3.23".to_string()],
            &test_catalog(),
            &[
                custom("zeta", "https://example.org/zeta.iso"),
                custom("acme", "https://example.org/acme.iso"),
            ],
            &layout(false),
        )
        .unwrap();

        let names: Vec<&str> = images.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["alpine-3.23", "zeta", "acme"]);
    }

    #[test]
    fn duplicate_custom_names_are_rejected() {
        let err = resolve(
            &[],
            &test_catalog(),
            &[
                custom("foo", "https://example.org/a.iso"),
                custom("foo", "https://example.org/b.iso"),
            ],
            &layout(false),
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::DuplicateCustomImage(name) if name == "foo"));
    }

    #[test]
    fn resolve_is_deterministic() {
        let keys = ["ubuntu-24.04".to_string(), "alpine-3.23".to_string()];
        let custom = [custom("extra", "https://example.org/extra.iso")];
        let first = resolve(&keys, &test_catalog(), &custom, &layout(true)).unwrap();
        let second = resolve(&keys, &test_catalog(), &custom, &layout(true)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn repeated_enable_key_keeps_first_occurrence() {
        let images = resolve(
            &["alpine-3.23".to_string(), "alpine-3.23".to_string()],
            &test_catalog(),
            &[],
            &layout(false),
        )
        .unwrap();
        assert_eq!(images.len(), 1);
    }

    #[test]
    fn empty_custom_name_is_rejected() {
        let err = validate(&[
            custom("ok", "https://example.org/ok.iso"),
            custom("", "https://example.org/a.iso"),
        ])
        .unwrap_err();
        // The entry is identified by its list position, not by the url.
        assert!(matches!(
            &err,
            ResolveError::InvalidCustomImage { name, .. } if name.as_str() == "custom[1]"
        ));
        assert!(err.to_string().contains("name must not be empty"));
    }

    #[test]
    fn non_http_scheme_is_rejected() {
        let err = validate(&[custom("foo", "ftp://example.org/a.iso")]).unwrap_err();
        assert!(
            matches!(err, ResolveError::InvalidCustomImage { name, .. } if name == "foo")
        );
    }

    #[test]
    fn url_without_host_is_rejected() {
        let err = validate(&[custom("foo", "https:///a.iso")]).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidCustomImage { .. }));
    }

    #[test]
    fn unparseable_url_is_rejected() {
        let err = validate(&[custom("foo", "not a url")]).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidCustomImage { .. }));
    }
}
