use std::{env, fmt, fs, net::SocketAddr, path::PathBuf, str::FromStr};

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStoreBackend {
    #[default]
    Local,
    Github,
    Memory,
}

impl FromStr for DocumentStoreBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" | "file" => Ok(Self::Local),
            "github" | "remote" => Ok(Self::Github),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow!("unknown document store backend: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStoreBackend {
    #[default]
    Filesystem,
    Memory,
}

impl FromStr for ImageStoreBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "filesystem" | "fs" => Ok(Self::Filesystem),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow!("unknown image store backend: {other}")),
        }
    }
}

/// Settings for the GitHub contents API backend.
#[derive(Clone, Serialize, Deserialize)]
pub struct GithubStoreConfig {
    /// `owner/name` of the repository holding the menu document.
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
    #[serde(default = "default_github_branch")]
    pub branch: String,
    #[serde(default = "default_github_path")]
    pub path: String,
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
}

impl Default for GithubStoreConfig {
    fn default() -> Self {
        Self {
            repository: None,
            token: None,
            branch: default_github_branch(),
            path: default_github_path(),
            api_url: default_github_api_url(),
        }
    }
}

impl fmt::Debug for GithubStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubStoreConfig")
            .field("repository", &self.repository)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("branch", &self.branch)
            .field("path", &self.path)
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,
    #[serde(default)]
    pub document_store_backend: DocumentStoreBackend,
    #[serde(default = "default_menu_file_path")]
    pub menu_file_path: PathBuf,
    #[serde(default)]
    pub image_store_backend: ImageStoreBackend,
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,
    #[serde(default)]
    pub github: GithubStoreConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            document_store_backend: DocumentStoreBackend::default(),
            menu_file_path: default_menu_file_path(),
            image_store_backend: ImageStoreBackend::default(),
            image_dir: default_image_dir(),
            github: GithubStoreConfig::default(),
        }
    }
}

impl AppConfig {
    const CONFIG_ENV: &'static str = "CARTE_CONFIG_FILE";
    const BIND_ADDRESS_ENV: &'static str = "CARTE_BIND_ADDRESS";
    const DOCUMENT_STORE_ENV: &'static str = "CARTE_DOCUMENT_STORE";
    const MENU_FILE_ENV: &'static str = "CARTE_MENU_FILE";
    const IMAGE_STORE_ENV: &'static str = "CARTE_IMAGE_STORE";
    const IMAGE_DIR_ENV: &'static str = "CARTE_IMAGE_DIR";
    const GITHUB_REPO_ENV: &'static str = "GITHUB_REPO";
    const GITHUB_TOKEN_ENV: &'static str = "GITHUB_TOKEN";
    const GITHUB_BRANCH_ENV: &'static str = "GITHUB_BRANCH";
    const GITHUB_PATH_ENV: &'static str = "CARTE_GITHUB_PATH";
    const GITHUB_API_URL_ENV: &'static str = "CARTE_GITHUB_API_URL";

    /// Load configuration from defaults layered with optional config files and
    /// environment variables.
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    pub fn load_with(config_path: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::resolve_config_path(config_path)? {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            config = Self::from_toml(&contents)
                .with_context(|| format!("invalid config file: {}", path.display()))?;
        }

        config.apply_env_overrides(|key| env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Overlays values read through `lookup`. Empty values are ignored.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(addr) = get(Self::BIND_ADDRESS_ENV) {
            self.bind_address = addr
                .parse()
                .with_context(|| format!("invalid {name}", name = Self::BIND_ADDRESS_ENV))?;
        }

        if let Some(backend) = get(Self::DOCUMENT_STORE_ENV) {
            self.document_store_backend = backend
                .parse()
                .with_context(|| format!("invalid {name}", name = Self::DOCUMENT_STORE_ENV))?;
        }

        if let Some(path) = get(Self::MENU_FILE_ENV) {
            self.menu_file_path = PathBuf::from(path);
        }

        if let Some(backend) = get(Self::IMAGE_STORE_ENV) {
            self.image_store_backend = backend
                .parse()
                .with_context(|| format!("invalid {name}", name = Self::IMAGE_STORE_ENV))?;
        }

        if let Some(dir) = get(Self::IMAGE_DIR_ENV) {
            self.image_dir = PathBuf::from(dir);
        }

        if let Some(repository) = get(Self::GITHUB_REPO_ENV) {
            self.github.repository = Some(repository.trim().to_owned());
        }

        if let Some(token) = get(Self::GITHUB_TOKEN_ENV) {
            self.github.token = Some(token.trim().to_owned());
        }

        if let Some(branch) = get(Self::GITHUB_BRANCH_ENV) {
            self.github.branch = branch.trim().to_owned();
        }

        if let Some(path) = get(Self::GITHUB_PATH_ENV) {
            self.github.path = path.trim().to_owned();
        }

        if let Some(url) = get(Self::GITHUB_API_URL_ENV) {
            self.github.api_url = url.trim().to_owned();
        }

        Ok(())
    }

    /// Rejects configurations that cannot serve a single request, such as the
    /// GitHub backend without credentials.
    pub fn validate(&self) -> Result<()> {
        if self.document_store_backend == DocumentStoreBackend::Github {
            let has_token = self
                .github
                .token
                .as_deref()
                .is_some_and(|token| !token.trim().is_empty());
            if !has_token {
                bail!(
                    "{name} must be set when the github document store is selected",
                    name = Self::GITHUB_TOKEN_ENV
                );
            }

            let repository = self.github.repository.as_deref().unwrap_or_default();
            if repository.split('/').filter(|part| !part.is_empty()).count() != 2 {
                bail!(
                    "{name} must be set to owner/name when the github document store is selected",
                    name = Self::GITHUB_REPO_ENV
                );
            }

            if self.github.path.trim().is_empty() {
                bail!("github document path must not be empty");
            }
        }

        Ok(())
    }

    fn resolve_config_path(explicit: Option<PathBuf>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            return Self::validate_path(path);
        }

        if let Ok(path) = env::var(Self::CONFIG_ENV) {
            return Self::validate_path(PathBuf::from(path));
        }

        let mut candidates = vec![PathBuf::from("carte.toml")];
        if let Some(dir) = Self::default_config_dir() {
            candidates.push(dir.join("config.toml"));
        }

        for candidate in candidates {
            if candidate.exists() {
                return Ok(Some(candidate));
            }
        }

        Ok(None)
    }

    fn validate_path(path: PathBuf) -> Result<Option<PathBuf>> {
        if path.exists() {
            Ok(Some(path))
        } else {
            Err(anyhow!(
                "configuration file does not exist: {}",
                path.display()
            ))
        }
    }

    fn default_config_dir() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".carte"))
    }
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

fn default_menu_file_path() -> PathBuf {
    PathBuf::from("./data/menus.json")
}

fn default_image_dir() -> PathBuf {
    PathBuf::from("./images")
}

fn default_github_branch() -> String {
    "main".to_owned()
}

fn default_github_path() -> String {
    "menus.json".to_owned()
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_owned()
}

fn home_dir() -> Option<PathBuf> {
    if let Some(path) = env::var_os("HOME") {
        return Some(PathBuf::from(path));
    }

    if let Some(path) = env::var_os("USERPROFILE") {
        return Some(PathBuf::from(path));
    }

    None
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_use_local_backends() {
        let config = AppConfig::default();
        assert_eq!(config.document_store_backend, DocumentStoreBackend::Local);
        assert_eq!(config.image_store_backend, ImageStoreBackend::Filesystem);
        assert_eq!(config.github.branch, "main");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_select_github_backend() {
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(lookup(&[
                ("CARTE_DOCUMENT_STORE", "github"),
                ("GITHUB_REPO", "acme/menus"),
                ("GITHUB_TOKEN", "secret"),
                ("GITHUB_BRANCH", "data"),
                ("CARTE_BIND_ADDRESS", "0.0.0.0:9000"),
            ]))
            .expect("apply overrides");

        assert_eq!(config.document_store_backend, DocumentStoreBackend::Github);
        assert_eq!(config.github.repository.as_deref(), Some("acme/menus"));
        assert_eq!(config.github.branch, "data");
        assert_eq!(config.bind_address.port(), 9000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn github_backend_without_token_is_rejected() {
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(lookup(&[
                ("CARTE_DOCUMENT_STORE", "github"),
                ("GITHUB_REPO", "acme/menus"),
                ("GITHUB_TOKEN", "   "),
            ]))
            .unwrap();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("GITHUB_TOKEN"));
    }

    #[test]
    fn invalid_backend_name_fails() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env_overrides(lookup(&[("CARTE_DOCUMENT_STORE", "s3")]))
            .unwrap_err();
        assert!(format!("{err:#}").contains("unknown document store backend"));
    }

    #[test]
    fn parses_toml_with_partial_sections() {
        let config = AppConfig::from_toml(
            r#"
                bind_address = "127.0.0.1:8100"
                document_store_backend = "memory"
                image_dir = "/srv/images"

                [github]
                repository = "acme/menus"
            "#,
        )
        .expect("parse toml");

        assert_eq!(config.document_store_backend, DocumentStoreBackend::Memory);
        assert_eq!(config.image_dir, PathBuf::from("/srv/images"));
        assert_eq!(config.github.path, "menus.json");
        assert_eq!(config.menu_file_path, PathBuf::from("./data/menus.json"));
    }

    #[test]
    fn debug_output_redacts_token() {
        let mut config = GithubStoreConfig::default();
        config.token = Some("ghp_secret".into());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("ghp_secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
