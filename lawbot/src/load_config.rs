/// `load_config` module: Loads a static YAML config file and injects secrets from the environment.
///
/// This module is the only place where user-supplied YAML is parsed and mapped onto the
/// strongly-typed settings of `lawbot-core`.
///
/// # Responsibilities
/// - Parse the YAML file into [`CliConfig`] (`login`, `wiki`, `pipeline`, `sync` sections)
/// - Inject the bot password from `LAWBOT_LGPASSWORD` when set (it overrides the file)
/// - Validate what serde cannot: a host must be known, the pipeline must have stages,
///   a login section must end up with a password
///
/// # Errors
/// All errors use `anyhow::Error` with context, and are surfaced at the CLI boundary.
use anyhow::{bail, Context, Result};
use lawbot_core::config::{BatchSettings, PipelineSpec, WikiSettings};
use lawbot_core::contract::Credentials;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

pub const PASSWORD_ENV: &str = "LAWBOT_LGPASSWORD";

#[derive(Debug, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub login: Option<LoginSection>,
    pub wiki: WikiSection,
    pub pipeline: PipelineSpec,
    #[serde(default)]
    pub sync: SyncSection,
}

#[derive(Deserialize)]
pub struct LoginSection {
    #[serde(default)]
    pub host: Option<String>,
    pub lgname: String,
    #[serde(default)]
    pub lgpassword: Option<String>,
}

impl std::fmt::Debug for LoginSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginSection")
            .field("host", &self.host)
            .field("lgname", &self.lgname)
            .field("lgpassword", &self.lgpassword.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct WikiSection {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(flatten)]
    pub settings: WikiSettings,
}

#[derive(Debug, Deserialize)]
pub struct SyncSection {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            grace_period_secs: default_grace_period_secs(),
        }
    }
}

fn default_concurrency() -> usize {
    BatchSettings::default().concurrency
}

fn default_grace_period_secs() -> u64 {
    BatchSettings::default().grace_period.as_secs()
}

impl CliConfig {
    /// Wiki host: `wiki.host`, else `login.host`.
    pub fn host(&self) -> Result<&str> {
        self.wiki
            .host
            .as_deref()
            .or_else(|| self.login.as_ref().and_then(|l| l.host.as_deref()))
            .filter(|h| !h.trim().is_empty())
            .context("no wiki host configured (set login.host or wiki.host)")
    }

    /// `None` when there is no `login` section.
    pub fn credentials(&self) -> Option<Credentials> {
        self.login.as_ref().map(|login| Credentials {
            username: login.lgname.clone(),
            password: login.lgpassword.clone().unwrap_or_default(),
        })
    }

    pub fn batch_settings(&self) -> BatchSettings {
        BatchSettings {
            concurrency: self.sync.concurrency.max(1),
            grace_period: Duration::from_secs(self.sync.grace_period_secs),
        }
    }
}

/// Loads a static YAML config file and injects the password from the environment.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let mut config: CliConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if let Some(login) = config.login.as_mut() {
        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            info!("{PASSWORD_ENV} found in env");
            login.lgpassword = Some(password);
        }
        if login.lgpassword.as_deref().map_or(true, str::is_empty) {
            error!(lgname = %login.lgname, "No password for the configured login");
            bail!("login.lgpassword is not set and {PASSWORD_ENV} is not in the environment");
        }
    }

    if config.pipeline.stages.is_empty() {
        error!(config_path = ?path_ref, "Pipeline has no stages");
        bail!("pipeline.stages must list at least one stage");
    }

    config.host()?;
    config.pipeline.trace_loaded();
    info!(
        category = %config.wiki.settings.category,
        source_suffix = %config.wiki.settings.source_suffix,
        stages = config.pipeline.stages.len(),
        authenticated = config.login.is_some(),
        "Config loaded and merged successfully"
    );
    Ok(config)
}
