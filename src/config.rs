use std::fmt;
use std::path::PathBuf;
#[cfg(test)]
use std::sync::Mutex;

use toml::{Table, Value};

use crate::error::{AppError, Result};
use crate::remote::{normalize_url, Credentials, RemoteTarget};

/// Keys understood by the configuration store.
pub mod keys {
    pub const WEBDAV_URL: &str = "webdav_url";
    pub const USERNAME: &str = "username";
    pub const PASSWORD: &str = "password";
    pub const DARK_MODE: &str = "dark_mode";
    pub const EINK_MODE: &str = "eink_mode";

    pub const ALL: [&str; 5] = [WEBDAV_URL, USERNAME, PASSWORD, DARK_MODE, EINK_MODE];
}

/// Key-value configuration provider. Lookups of absent keys simply leave
/// them out of the returned table.
pub trait ConfigStore: Send + Sync {
    fn get(&self, keys: &[&str]) -> Result<Table>;
    fn set(&self, values: Table) -> Result<()>;
}

/// TOML file on disk, read and rewritten on every access.
pub struct TomlConfigStore {
    path: PathBuf,
}

impl TomlConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("thinknote")
            .join("config.toml")
    }

    fn read_table(&self) -> Result<Table> {
        if !self.path.exists() {
            return Ok(Table::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        let table: Table = toml::from_str(&content)?;
        Ok(table)
    }
}

impl ConfigStore for TomlConfigStore {
    fn get(&self, keys: &[&str]) -> Result<Table> {
        let mut table = self.read_table()?;
        table.retain(|key, _| keys.contains(&key));
        Ok(table)
    }

    fn set(&self, values: Table) -> Result<()> {
        let mut table = self.read_table()?;
        table.extend(values);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(&table).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

/// In-process store, used when nothing should touch the filesystem.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryConfigStore {
    values: Mutex<Table>,
}

#[cfg(test)]
impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(values: Table) -> Self {
        Self {
            values: Mutex::new(values),
        }
    }
}

#[cfg(test)]
impl ConfigStore for MemoryConfigStore {
    fn get(&self, keys: &[&str]) -> Result<Table> {
        let values = self
            .values
            .lock()
            .map_err(|_| AppError::Config("config store lock poisoned".to_string()))?;
        Ok(values
            .iter()
            .filter(|(key, _)| keys.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    fn set(&self, values: Table) -> Result<()> {
        let mut current = self
            .values
            .lock()
            .map_err(|_| AppError::Config("config store lock poisoned".to_string()))?;
        current.extend(values);
        Ok(())
    }
}

/// Typed view over the stored keys.
#[derive(Clone, PartialEq)]
pub struct Settings {
    pub webdav_url: Option<String>,
    pub username: String,
    pub password: String,
    pub dark_mode: bool,
    pub eink_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            webdav_url: None,
            username: String::new(),
            password: String::new(),
            dark_mode: true,
            eink_mode: false,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("webdav_url", &self.webdav_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("dark_mode", &self.dark_mode)
            .field("eink_mode", &self.eink_mode)
            .finish()
    }
}

impl Settings {
    pub fn load(store: &dyn ConfigStore) -> Result<Self> {
        let table = store.get(&keys::ALL)?;
        let defaults = Settings::default();

        let string_value = |key: &str| -> Option<String> {
            table
                .get(key)
                .and_then(Value::as_str)
                .map(|s| s.to_string())
        };
        let bool_value = |key: &str, default: bool| -> bool {
            table.get(key).and_then(Value::as_bool).unwrap_or(default)
        };

        Ok(Self {
            webdav_url: string_value(keys::WEBDAV_URL).filter(|url| !url.trim().is_empty()),
            username: string_value(keys::USERNAME).unwrap_or_default(),
            password: string_value(keys::PASSWORD).unwrap_or_default(),
            dark_mode: bool_value(keys::DARK_MODE, defaults.dark_mode),
            eink_mode: bool_value(keys::EINK_MODE, defaults.eink_mode),
        })
    }

    /// Where to sync, or `MissingConfig` when no WebDAV URL is set.
    pub fn remote_target(&self) -> Result<RemoteTarget> {
        let base_url = self.webdav_url.as_deref().ok_or(AppError::MissingConfig)?;
        RemoteTarget::new(
            base_url,
            Credentials::new(self.username.clone(), self.password.clone()),
        )
    }
}

/// Persist every option at once. The URL is cleaned before it is stored.
pub fn save_options(store: &dyn ConfigStore, settings: &Settings) -> Result<()> {
    let mut table = Table::new();
    table.insert(
        keys::WEBDAV_URL.to_string(),
        Value::String(
            settings
                .webdav_url
                .as_deref()
                .map(normalize_url)
                .unwrap_or_default(),
        ),
    );
    table.insert(
        keys::USERNAME.to_string(),
        Value::String(settings.username.clone()),
    );
    table.insert(
        keys::PASSWORD.to_string(),
        Value::String(settings.password.clone()),
    );
    table.insert(keys::DARK_MODE.to_string(), Value::Boolean(settings.dark_mode));
    table.insert(keys::EINK_MODE.to_string(), Value::Boolean(settings.eink_mode));
    store.set(table)?;
    tracing::info!("Saved options");
    Ok(())
}

/// Persist a single presentation toggle immediately.
pub fn set_toggle(store: &dyn ConfigStore, key: &str, enabled: bool) -> Result<()> {
    if key != keys::DARK_MODE && key != keys::EINK_MODE {
        return Err(AppError::Config(format!("{} is not a toggle", key)));
    }
    let mut table = Table::new();
    table.insert(key.to_string(), Value::Boolean(enabled));
    store.set(table)
}
