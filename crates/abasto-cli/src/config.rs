// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use abasto_app::{
    DEFAULT_DEBOUNCE, DEFAULT_EXPORT_OFFSET, DEFAULT_IMPORT_COOLDOWN, ForecastSettings, LoginForm,
    PageSize,
};
use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::UtcOffset;
use time::macros::format_description;

pub const APP_NAME: &str = "abasto";
const CONFIG_VERSION: i64 = 1;
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_TIMEOUT: &str = "30s";
const CONFIG_PATH_ENV: &str = "ABASTO_CONFIG_PATH";
const PASSWORD_ENV: &str = "ABASTO_PASSWORD";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub export: Export,
    #[serde(default)]
    pub import: Import,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            backend: Backend::default(),
            ui: Ui::default(),
            export: Export::default(),
            import: Import::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Backend {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Default for Backend {
    fn default() -> Self {
        Self {
            base_url: Some(DEFAULT_BASE_URL.to_owned()),
            timeout: Some(DEFAULT_TIMEOUT.to_owned()),
            user: None,
            password: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ui {
    pub page_size: Option<u32>,
    pub debounce: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Export {
    pub dir: Option<String>,
    pub utc_offset: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Import {
    pub cooldown: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;

        let app_dir = config_root.join(APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and put values under [backend], [ui], [export] and [import]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(base_url) = &self.backend.base_url
            && base_url.trim().is_empty()
        {
            bail!("backend.base_url in {} must not be empty", path.display());
        }

        let timeout = self
            .timeout()
            .with_context(|| format!("backend.timeout in {}", path.display()))?;
        if timeout <= Duration::ZERO {
            bail!(
                "backend.timeout in {} must be positive, got {:?}",
                path.display(),
                self.backend.timeout.as_deref().unwrap_or_default()
            );
        }

        if let Some(size) = self.ui.page_size
            && PageSize::new(size).is_none()
        {
            bail!(
                "ui.page_size in {} must be one of {:?}, got {}",
                path.display(),
                PageSize::ALLOWED,
                size
            );
        }

        self.debounce()
            .with_context(|| format!("ui.debounce in {}", path.display()))?;
        self.import_cooldown()
            .with_context(|| format!("import.cooldown in {}", path.display()))?;
        self.export_offset()
            .with_context(|| format!("export.utc_offset in {}", path.display()))?;

        if let Some(dir) = &self.export.dir
            && dir.trim().is_empty()
        {
            bail!("export.dir in {} must not be empty", path.display());
        }

        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.backend
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(self.backend.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    /// Credentials for the login POST. `ABASTO_PASSWORD` wins over the file.
    pub fn login(&self) -> Option<LoginForm> {
        let user = self.backend.user.as_deref()?.trim();
        if user.is_empty() {
            return None;
        }
        let password = env::var(PASSWORD_ENV)
            .ok()
            .or_else(|| self.backend.password.clone())
            .unwrap_or_default();
        Some(LoginForm {
            user: user.to_owned(),
            password,
        })
    }

    pub fn page_size(&self) -> PageSize {
        self.ui
            .page_size
            .and_then(PageSize::new)
            .unwrap_or(PageSize::DEFAULT)
    }

    pub fn debounce(&self) -> Result<Duration> {
        match &self.ui.debounce {
            Some(raw) => parse_duration(raw),
            None => Ok(DEFAULT_DEBOUNCE),
        }
    }

    pub fn import_cooldown(&self) -> Result<Duration> {
        match &self.import.cooldown {
            Some(raw) => parse_duration(raw),
            None => Ok(DEFAULT_IMPORT_COOLDOWN),
        }
    }

    pub fn export_offset(&self) -> Result<UtcOffset> {
        match &self.export.utc_offset {
            Some(raw) => parse_offset(raw),
            None => Ok(DEFAULT_EXPORT_OFFSET),
        }
    }

    pub fn export_dir(&self) -> Result<PathBuf> {
        match &self.export.dir {
            Some(dir) => Ok(PathBuf::from(dir)),
            None => env::current_dir().context("resolve current directory for exports"),
        }
    }

    pub fn forecast_settings(&self) -> Result<ForecastSettings> {
        Ok(ForecastSettings {
            page_size: self.page_size(),
            debounce: self.debounce()?,
            export_offset: self.export_offset()?,
        })
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# abasto config\n# Place this file at: {}\n\nversion = 1\n\n[backend]\nbase_url = \"{}\"\ntimeout = \"{}\"\n# user = \"analista\"\n# password = \"...\" (or set {})\n\n[ui]\npage_size = {}\ndebounce = \"400ms\"\n\n[export]\n# Optional. Default is the current directory.\n# dir = \"/absolute/path/to/exports\"\nutc_offset = \"-05:00\"\n\n[import]\ncooldown = \"30s\"\n",
            path.display(),
            DEFAULT_BASE_URL,
            DEFAULT_TIMEOUT,
            PASSWORD_ENV,
            PageSize::DEFAULT.get(),
        )
    }
}

pub fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 400ms or 30s)")
}

fn parse_offset(raw: &str) -> Result<UtcOffset> {
    UtcOffset::parse(
        raw.trim(),
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .with_context(|| format!("invalid UTC offset {raw:?}; write it as -05:00 or +01:00"))
}

#[cfg(test)]
mod tests {
    use super::{Config, parse_duration, parse_offset};
    use abasto_app::PageSize;
    use anyhow::Result;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;
    use time::macros::offset;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.base_url(), "http://127.0.0.1:5000");
        assert_eq!(config.timeout()?, Duration::from_secs(30));
        assert_eq!(config.page_size(), PageSize::DEFAULT);
        assert_eq!(config.debounce()?, Duration::from_millis(400));
        assert_eq!(config.import_cooldown()?, Duration::from_secs(30));
        assert_eq!(config.export_offset()?, offset!(-5));
        assert!(config.login().is_none());
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[backend]\nbase_url=\"http://x\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[backend]"));
        Ok(())
    }

    #[test]
    fn v1_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[backend]\nbase_url = \"http://tablero:8080/\"\ntimeout = \"5s\"\n[ui]\npage_size = 100\ndebounce = \"250ms\"\n[export]\ndir = \"/srv/exports\"\nutc_offset = \"+01:00\"\n[import]\ncooldown = \"1m\"\n",
        )?;

        let config = Config::load(&path)?;
        assert_eq!(config.base_url(), "http://tablero:8080");
        assert_eq!(config.timeout()?, Duration::from_secs(5));
        assert_eq!(config.page_size().get(), 100);
        assert_eq!(config.export_dir()?, PathBuf::from("/srv/exports"));
        assert_eq!(config.import_cooldown()?, Duration::from_secs(60));

        let settings = config.forecast_settings()?;
        assert_eq!(settings.debounce, Duration::from_millis(250));
        assert_eq!(settings.export_offset, offset!(+1));
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 2\n")?;
        let error = Config::load(&path).expect_err("v2 config should fail");
        assert!(error.to_string().contains("unsupported config version 2"));
        Ok(())
    }

    #[test]
    fn invalid_values_name_the_offending_key() -> Result<()> {
        let cases = [
            ("[ui]\npage_size = 30\n", "ui.page_size"),
            ("[ui]\ndebounce = \"soon\"\n", "ui.debounce"),
            ("[backend]\ntimeout = \"0s\"\n", "backend.timeout"),
            ("[backend]\nbase_url = \" \"\n", "backend.base_url"),
            ("[import]\ncooldown = \"10h\"\n", "import.cooldown"),
            ("[export]\nutc_offset = \"bogota\"\n", "export.utc_offset"),
        ];
        for (body, key) in cases {
            let (_temp, path) = write_config(&format!("version = 1\n{body}"))?;
            let error = Config::load(&path).expect_err("invalid value should fail");
            assert!(
                format!("{error:#}").contains(key),
                "{key} missing from {error:#}"
            );
        }
        Ok(())
    }

    #[test]
    fn password_env_overrides_file() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) = write_config(
            "version = 1\n[backend]\nuser = \"analista\"\npassword = \"from-file\"\n",
        )?;
        let config = Config::load(&path)?;

        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var("ABASTO_PASSWORD");
        }
        let login = config.login().expect("user configured");
        assert_eq!(login.user, "analista");
        assert_eq!(login.password, "from-file");

        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("ABASTO_PASSWORD", "from-env");
        }
        let login = config.login().expect("user configured");
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("ABASTO_PASSWORD");
        }
        assert_eq!(login.password, "from-env");
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("ABASTO_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("ABASTO_CONFIG_PATH");
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn example_config_round_trips() -> Result<()> {
        let (_temp, path) = write_config("")?;
        std::fs::write(&path, Config::example_config(&path))?;
        let config = Config::load(&path)?;
        assert_eq!(config.page_size(), PageSize::DEFAULT);
        assert_eq!(config.export_offset()?, offset!(-5));
        Ok(())
    }

    #[test]
    fn parse_duration_accepts_supported_units() -> Result<()> {
        assert_eq!(parse_duration("400ms")?, Duration::from_millis(400));
        assert_eq!(parse_duration("30s")?, Duration::from_secs(30));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        assert!(parse_duration("30").is_err());
        assert!(parse_duration("-1s").is_err());
        Ok(())
    }

    #[test]
    fn parse_offset_requires_sign() {
        assert_eq!(parse_offset("-05:00").ok(), Some(offset!(-5)));
        assert!(parse_offset("05:00").is_err());
    }
}
