use anyhow::{Result, anyhow};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub http: Http,
    pub log: Log,
    pub token: Token,
    pub session: Session,
    pub credentials: Credentials,
    #[serde(default)]
    pub cors: Cors,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    // TLS is enabled when both are set
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Deserialize)]
pub struct Token {
    pub issuer: String,
    pub audience: String,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    pub signing_key: String,
    pub refresh_signing_key: String,
}

fn default_algorithm() -> String {
    "HS256".to_string()
}

// keys stay out of logs
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("algorithm", &self.algorithm)
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("signing_key", &"<redacted>")
            .field("refresh_signing_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct Session {
    pub backend: String, // "memory", "redis" or "mysql"
    pub redis_dsn: Option<String>,
    pub mysql_dsn: Option<String>,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    // 0 disables the sweep
    #[serde(default)]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_sweep_batch")]
    pub sweep_batch: usize,
}

fn default_key_prefix() -> String {
    "authgate".to_string()
}

fn default_sweep_batch() -> usize {
    500
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub backend: String, // "memory" or "mysql"
    pub mysql_dsn: Option<String>,
    // false: only the first account may register
    #[serde(default)]
    pub open_registration: bool,
    #[serde(default)]
    pub seed: Vec<SeedCredential>,
}

#[derive(Debug, Deserialize)]
pub struct SeedCredential {
    pub identifier: String,
    pub password_hash: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Cors {
    // empty echoes any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

const ENV_PREFIX: &str = "AUTHGATE";

/// Loads the TOML file at `path` (or the build-profile default), then applies
/// `AUTHGATE__SECTION__KEY` environment overrides.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        )
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;
    settings.validate()?;

    Ok(settings)
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.session.sweep_interval_secs > 0 && self.session.sweep_batch == 0 {
            return Err(anyhow!(
                "session.sweep_batch must be positive when session.sweep_interval_secs is set"
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    const SAMPLE: &str = r#"
[http]
address = "127.0.0.1:8090"

[log]
filter = "debug"

[token]
issuer = "authgate"
audience = "authgate-clients"
access_ttl_secs = 900
refresh_ttl_secs = 2592000
signing_key = "access-secret"
refresh_signing_key = "refresh-secret"

[session]
backend = "memory"

[credentials]
backend = "memory"
"#;

    fn from_str(text: &str) -> Result<Settings> {
        Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()
            .map_err(|e| anyhow!(e))?
            .try_deserialize()
            .map_err(|e| anyhow!(e))
    }

    #[test]
    fn defaults_fill_optional_sections() {
        let settings = from_str(SAMPLE).unwrap();
        assert_eq!(settings.token.algorithm, "HS256");
        assert_eq!(settings.session.key_prefix, "authgate");
        assert_eq!(settings.session.sweep_interval_secs, 0);
        assert!(settings.cors.allowed_origins.is_empty());
        assert!(settings.credentials.seed.is_empty());
        assert!(!settings.credentials.open_registration);
        assert!(settings.http.cert_path.is_none());
        assert!(settings.session.redis_dsn.is_none());
    }

    #[test]
    fn debug_output_redacts_keys() {
        let settings = from_str(SAMPLE).unwrap();
        let printed = format!("{:?}", settings);
        assert!(!printed.contains("access-secret"));
        assert!(!printed.contains("refresh-secret"));
        assert!(printed.contains("<redacted>"));
    }

    fn with_session_lines(lines: &str) -> Settings {
        let text = SAMPLE.replace("[session]\n", &format!("[session]\n{}\n", lines));
        from_str(&text).unwrap()
    }

    #[test]
    fn empty_sweep_batch_is_rejected_only_when_sweeping() {
        let idle = with_session_lines("sweep_batch = 0");
        assert_eq!(idle.session.sweep_batch, 0);
        assert!(idle.validate().is_ok());

        let sweeping = with_session_lines("sweep_interval_secs = 60\nsweep_batch = 0");
        assert!(sweeping.validate().is_err());

        let sane = with_session_lines("sweep_interval_secs = 60\nsweep_batch = 100");
        assert!(sane.validate().is_ok());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(parse_settings(Some("does/not/exist.toml")).is_err());
    }
}
