use std::collections::HashMap;

/// Built-in distribution catalog: image key to download URL.
///
/// Pure data. Adding a distribution is a new row here, nothing else in the
/// crate changes.
const BUILTIN: &[(&str, &str)] = &[
    (
        "alpine-3.23",
        "https://dl-cdn.alpinelinux.org/alpine/v3.23/releases/x86_64/alpine-standard-3.23.0-x86_64.iso",
    ),
    (
        "ubuntu-18.04",
        "https://releases.ubuntu.com/18.04/ubuntu-18.04.6-live-server-amd64.iso",
    ),
    (
        "ubuntu-20.04",
        "https://releases.ubuntu.com/20.04/ubuntu-20.04.6-live-server-amd64.iso",
    ),
    (
        "ubuntu-22.04",
        "https://releases.ubuntu.com/22.04/ubuntu-22.04.5-live-server-amd64.iso",
    ),
    (
        "ubuntu-24.04",
        "https://releases.ubuntu.com/24.04/ubuntu-24.04.2-live-server-amd64.iso",
    ),
    (
        "rocky-8.4",
        "https://dl.rockylinux.org/vault/rocky/8.4/isos/x86_64/Rocky-8.4-x86_64-dvd1.iso",
    ),
    (
        "rocky-8.4-minimal",
        "https://dl.rockylinux.org/vault/rocky/8.4/isos/x86_64/Rocky-8.4-x86_64-minimal.iso",
    ),
    (
        "rocky-8.10",
        "https://dl.rockylinux.org/pub/rocky/8.10/isos/x86_64/Rocky-8.10-x86_64-dvd1.iso",
    ),
    (
        "rocky-8.10-minimal",
        "https://dl.rockylinux.org/pub/rocky/8.10/isos/x86_64/Rocky-8.10-x86_64-minimal.iso",
    ),
    (
        "rocky-9.4",
        "https://dl.rockylinux.org/vault/rocky/9.4/isos/x86_64/Rocky-9.4-x86_64-dvd.iso",
    ),
    (
        "rocky-9.4-minimal",
        "https://dl.rockylinux.org/vault/rocky/9.4/isos/x86_64/Rocky-9.4-x86_64-minimal.iso",
    ),
    (
        "rocky-9.6",
        "https://dl.rockylinux.org/pub/rocky/9.6/isos/x86_64/Rocky-9.6-x86_64-dvd.iso",
    ),
    (
        "rocky-9.6-minimal",
        "https://dl.rockylinux.org/pub/rocky/9.6/isos/x86_64/Rocky-9.6-x86_64-minimal.iso",
    ),
    (
        "rocky-10.0",
        "https://dl.rockylinux.org/pub/rocky/10.0/isos/x86_64/Rocky-10.0-x86_64-dvd1.iso",
    ),
    (
        "rocky-10.0-minimal",
        "https://dl.rockylinux.org/pub/rocky/10.0/isos/x86_64/Rocky-10.0-x86_64-minimal.iso",
    ),
    (
        "rocky-10.1",
        "https://dl.rockylinux.org/pub/rocky/10.1/isos/x86_64/Rocky-10.1-x86_64-dvd1.iso",
    ),
    (
        "rocky-10.1-minimal",
        "https://dl.rockylinux.org/pub/rocky/10.1/isos/x86_64/Rocky-10.1-x86_64-minimal.iso",
    ),
    (
        "tinycore-17.0",
        "http://tinycorelinux.net/17.x/x86/release/TinyCore-17.0.iso",
    ),
];

/// Read-only catalog of known image keys. Loaded once per run, never touches
/// the network.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: HashMap<String, String>,
}

impl Catalog {
    pub fn builtin() -> Self {
        Self::from_entries(
            BUILTIN
                .iter()
                .map(|(key, url)| (key.to_string(), url.to_string())),
        )
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Known keys in sorted order, for diagnostics on a failed lookup.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_contains_documented_keys() {
        let catalog = Catalog::builtin();
        for key in [
            "alpine-3.23",
            "ubuntu-18.04",
            "ubuntu-24.04",
            "rocky-8.4",
            "rocky-8.4-minimal",
            "rocky-10.1",
            "rocky-10.1-minimal",
            "tinycore-17.0",
        ] {
            assert!(catalog.lookup(key).is_some(), "missing catalog key {key}");
        }
    }

    #[test]
    fn lookup_miss_returns_none() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.lookup("not-a-real-key"), None);
    }

    #[test]
    fn keys_are_sorted_and_cover_the_table() {
        let catalog = Catalog::builtin();
        let keys = catalog.keys();
        assert_eq!(keys.len(), BUILTIN.len());
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted);
        assert!(keys.contains(&"alpine-3.23"));
    }

    #[test]
    fn urls_are_http_or_https() {
        let catalog = Catalog::builtin();
        for (key, url) in BUILTIN {
            assert!(
                url.starts_with("http://") || url.starts_with("https://"),
                "catalog key {key} has unexpected url {url}"
            );
            assert_eq!(catalog.lookup(key), Some(*url));
        }
    }
}
