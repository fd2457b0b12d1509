//! Discovery of installed source control providers.
//!
//! Providers are discovered once per process, on first use, from the system
//! provider registry (`HKLM\SOFTWARE\SourceCodeControlProvider` on Windows)
//! plus an optional YAML provider manifest named by
//! [`PROVIDER_MANIFEST_ENV`]. Discovery problems are logged and produce an
//! empty list, never an error.

use crate::models::{Provider, ProviderManifest};
use camino::Utf8Path;
use indexmap::IndexMap;
use std::sync::OnceLock;

/// Environment variable naming an extra provider manifest file.
pub const PROVIDER_MANIFEST_ENV: &str = "DECODA_SCC_PROVIDERS";

static PROVIDERS: OnceLock<ProviderRegistry> = OnceLock::new();

/// An immutable, ordered list of providers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderRegistry {
    providers: Vec<Provider>,
}

impl ProviderRegistry {
    /// The process-wide registry, discovered on first call.
    pub fn global() -> &'static ProviderRegistry {
        PROVIDERS.get_or_init(|| {
            let registry = Self::discover();
            tracing::info!(
                "Discovered {} source control provider(s)",
                registry.len()
            );
            registry
        })
    }

    /// Scan the system and the provider manifest.
    pub fn discover() -> Self {
        let mut registry = Self::from_providers(system::installed_providers());

        if let Ok(manifest_path) = std::env::var(PROVIDER_MANIFEST_ENV) {
            registry = registry.merged(&load_manifest(Utf8Path::new(&manifest_path)));
        }

        registry
    }

    pub fn from_providers(providers: Vec<Provider>) -> Self {
        Self { providers }
    }

    /// Build a registry from a name -> binary path map.
    pub fn from_map(entries: &IndexMap<String, String>) -> Self {
        Self::from_providers(
            entries
                .iter()
                .map(|(name, path)| Provider::new(name.clone(), path.as_str()))
                .collect(),
        )
    }

    /// A copy of this registry with `extra` appended. Names already present
    /// keep their existing entry.
    pub fn merged(&self, extra: &IndexMap<String, String>) -> Self {
        let mut providers = self.providers.clone();
        for (name, path) in extra {
            if providers.iter().any(|p| p.name.eq_ignore_ascii_case(name)) {
                tracing::debug!("Ignoring duplicate provider entry {}", name);
                continue;
            }
            providers.push(Provider::new(name.clone(), path.as_str()));
        }
        Self { providers }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Provider> {
        self.providers.get(index)
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.get(index).map(|provider| provider.name.as_str())
    }

    /// Case-insensitive lookup by provider name.
    pub fn find(&self, name: &str) -> Option<&Provider> {
        self.providers
            .iter()
            .find(|provider| provider.name.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Provider> {
        self.providers.iter()
    }
}

/// Number of providers installed on this machine.
pub fn num_providers() -> usize {
    ProviderRegistry::global().len()
}

/// Name of the provider at `index`, or `None` when out of range.
pub fn provider_name(index: usize) -> Option<&'static str> {
    ProviderRegistry::global().name(index)
}

/// Read a provider manifest, returning an empty map on any problem.
pub fn load_manifest(path: &Utf8Path) -> IndexMap<String, String> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::warn!("Failed to read provider manifest {}: {}", path, err);
            return IndexMap::new();
        }
    };

    match serde_yaml_ng::from_str::<ProviderManifest>(&contents) {
        Ok(manifest) => manifest.providers,
        Err(err) => {
            tracing::warn!("Failed to parse provider manifest {}: {}", path, err);
            IndexMap::new()
        }
    }
}

#[cfg(windows)]
mod system {
    use crate::models::Provider;
    use std::ptr;
    use windows_sys::Win32::Foundation::ERROR_SUCCESS;
    use windows_sys::Win32::System::Registry::{
        HKEY, HKEY_LOCAL_MACHINE, KEY_READ, RRF_RT_REG_SZ, RegCloseKey, RegEnumValueW,
        RegGetValueW, RegOpenKeyExW,
    };

    const INSTALLED_PROVIDERS_KEY: &str =
        "SOFTWARE\\SourceCodeControlProvider\\InstalledSCCProviders";
    const SERVER_PATH_VALUE: &str = "SCCServerPath";

    fn wide(text: &str) -> Vec<u16> {
        text.encode_utf16().chain(std::iter::once(0)).collect()
    }

    fn from_wide(buf: &[u16]) -> String {
        let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
        String::from_utf16_lossy(&buf[..end])
    }

    fn read_string(root: HKEY, subkey: &str, value: &str) -> Option<String> {
        let subkey = wide(subkey);
        let value = wide(value);
        let mut size: u32 = 0;
        let status = unsafe {
            RegGetValueW(
                root,
                subkey.as_ptr(),
                value.as_ptr(),
                RRF_RT_REG_SZ,
                ptr::null_mut(),
                ptr::null_mut(),
                &mut size,
            )
        };
        if status != ERROR_SUCCESS || size == 0 {
            return None;
        }

        let mut buf = vec![0u16; (size as usize).div_ceil(2)];
        let status = unsafe {
            RegGetValueW(
                root,
                subkey.as_ptr(),
                value.as_ptr(),
                RRF_RT_REG_SZ,
                ptr::null_mut(),
                buf.as_mut_ptr().cast(),
                &mut size,
            )
        };
        (status == ERROR_SUCCESS).then(|| from_wide(&buf))
    }

    pub fn installed_providers() -> Vec<Provider> {
        let key_path = wide(INSTALLED_PROVIDERS_KEY);
        let mut key: HKEY = ptr::null_mut();
        let status =
            unsafe { RegOpenKeyExW(HKEY_LOCAL_MACHINE, key_path.as_ptr(), 0, KEY_READ, &mut key) };
        if status != ERROR_SUCCESS {
            tracing::info!("No source control provider registry key found");
            return Vec::new();
        }

        let mut providers = Vec::new();
        let mut index = 0u32;
        loop {
            let mut name = [0u16; 256];
            let mut name_len = name.len() as u32;
            let mut data = [0u16; 512];
            let mut data_len = (data.len() * 2) as u32;
            let status = unsafe {
                RegEnumValueW(
                    key,
                    index,
                    name.as_mut_ptr(),
                    &mut name_len,
                    ptr::null(),
                    ptr::null_mut(),
                    data.as_mut_ptr().cast(),
                    &mut data_len,
                )
            };
            if status != ERROR_SUCCESS {
                break;
            }
            index += 1;

            let provider_name = from_wide(&name);
            let provider_key = from_wide(&data);
            match read_string(HKEY_LOCAL_MACHINE, &provider_key, SERVER_PATH_VALUE) {
                Some(path) => providers.push(Provider::new(provider_name, path)),
                None => tracing::warn!(
                    "Provider {} has no {} under {}",
                    provider_name,
                    SERVER_PATH_VALUE,
                    provider_key
                ),
            }
        }

        unsafe {
            RegCloseKey(key);
        }
        providers
    }
}

#[cfg(not(windows))]
mod system {
    use crate::models::Provider;

    /// Only Windows has a system provider registry.
    pub fn installed_providers() -> Vec<Provider> {
        Vec::new()
    }
}
