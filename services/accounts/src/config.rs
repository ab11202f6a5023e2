//! Accounts service configuration.
//!
//! Values come from `MASSOK_*` environment variables; a YAML file named by
//! `MASSOK_CONFIG` overrides any field it sets.
use anyhow::{Context, Result};
use massok_authz::{DEFAULT_ISSUER, DEFAULT_MAX_PARENT_HOPS};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_BIND: &str = "0.0.0.0:8443";
pub const DEFAULT_METRICS_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_RESOLVE_TIMEOUT_MS: u64 = 2_000;

#[derive(Debug, Clone)]
pub struct AccountsConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub auth: AuthConfig,
    pub admin: Option<AdminSeed>,
}

/// Token and resolver settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub issuer: String,
    pub max_parent_hops: usize,
    /// Per-lookup bound while walking a resource chain; `None` disables it.
    pub resolve_timeout: Option<Duration>,
    /// Hex Ed25519 seeds; a fresh key is generated when absent.
    pub access_key_seed: Option<String>,
    pub refresh_key_seed: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            max_parent_hops: DEFAULT_MAX_PARENT_HOPS,
            resolve_timeout: Some(Duration::from_millis(DEFAULT_RESOLVE_TIMEOUT_MS)),
            access_key_seed: None,
            refresh_key_seed: None,
        }
    }
}

/// Global admin created at startup when no user has the email yet.
#[derive(Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSeed")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default, Deserialize)]
struct AccountsConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    token_issuer: Option<String>,
    max_parent_hops: Option<usize>,
    resolve_timeout_ms: Option<u64>,
    access_key_seed: Option<String>,
    refresh_key_seed: Option<String>,
    admin_email: Option<String>,
    admin_password: Option<String>,
}

impl AccountsConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("MASSOK_BIND")
            .unwrap_or_else(|_| DEFAULT_BIND.to_string())
            .parse()
            .with_context(|| "parse MASSOK_BIND")?;
        let metrics_bind = std::env::var("MASSOK_METRICS_BIND")
            .unwrap_or_else(|_| DEFAULT_METRICS_BIND.to_string())
            .parse()
            .with_context(|| "parse MASSOK_METRICS_BIND")?;

        let mut auth = AuthConfig::default();
        if let Ok(value) = std::env::var("MASSOK_TOKEN_ISSUER") {
            auth.issuer = value;
        }
        if let Ok(value) = std::env::var("MASSOK_MAX_PARENT_HOPS") {
            auth.max_parent_hops = value
                .parse()
                .with_context(|| "parse MASSOK_MAX_PARENT_HOPS")?;
        }
        if let Ok(value) = std::env::var("MASSOK_RESOLVE_TIMEOUT_MS") {
            let millis: u64 = value
                .parse()
                .with_context(|| "parse MASSOK_RESOLVE_TIMEOUT_MS")?;
            auth.resolve_timeout = timeout_from_millis(millis);
        }
        auth.access_key_seed = std::env::var("MASSOK_ACCESS_KEY_SEED").ok();
        auth.refresh_key_seed = std::env::var("MASSOK_REFRESH_KEY_SEED").ok();

        let admin = match (
            std::env::var("MASSOK_ADMIN_EMAIL"),
            std::env::var("MASSOK_ADMIN_PASSWORD"),
        ) {
            (Ok(email), Ok(password)) => Some(AdminSeed { email, password }),
            _ => None,
        };

        Ok(Self {
            bind_addr,
            metrics_bind,
            auth,
            admin,
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("MASSOK_CONFIG") {
            let contents =
                fs::read_to_string(&path).with_context(|| format!("read MASSOK_CONFIG: {path}"))?;
            config.apply_yaml(&contents)?;
        }
        Ok(config)
    }

    fn apply_yaml(&mut self, contents: &str) -> Result<()> {
        let override_cfg: AccountsConfigOverride =
            serde_yaml::from_str(contents).with_context(|| "parse accounts config yaml")?;
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(value) = override_cfg.token_issuer {
            self.auth.issuer = value;
        }
        if let Some(value) = override_cfg.max_parent_hops {
            self.auth.max_parent_hops = value;
        }
        if let Some(value) = override_cfg.resolve_timeout_ms {
            self.auth.resolve_timeout = timeout_from_millis(value);
        }
        if override_cfg.access_key_seed.is_some() {
            self.auth.access_key_seed = override_cfg.access_key_seed;
        }
        if override_cfg.refresh_key_seed.is_some() {
            self.auth.refresh_key_seed = override_cfg.refresh_key_seed;
        }
        match (override_cfg.admin_email, override_cfg.admin_password) {
            (Some(email), Some(password)) => self.admin = Some(AdminSeed { email, password }),
            (None, None) => {}
            _ => anyhow::bail!("admin_email and admin_password must be set together"),
        }
        Ok(())
    }
}

// Zero disables the per-lookup bound.
fn timeout_from_millis(millis: u64) -> Option<Duration> {
    (millis > 0).then(|| Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    struct EnvGuard {
        key: &'static str,
        prev: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let prev = std::env::var(key).ok();
            unsafe {
                std::env::set_var(key, value);
            }
            Self { key, prev }
        }

        fn unset(key: &'static str) -> Self {
            let prev = std::env::var(key).ok();
            unsafe {
                std::env::remove_var(key);
            }
            Self { key, prev }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.prev {
                Some(value) => unsafe {
                    std::env::set_var(self.key, value);
                },
                None => unsafe {
                    std::env::remove_var(self.key);
                },
            }
        }
    }

    fn clear_env() -> Vec<EnvGuard> {
        [
            "MASSOK_BIND",
            "MASSOK_METRICS_BIND",
            "MASSOK_TOKEN_ISSUER",
            "MASSOK_MAX_PARENT_HOPS",
            "MASSOK_RESOLVE_TIMEOUT_MS",
            "MASSOK_ACCESS_KEY_SEED",
            "MASSOK_REFRESH_KEY_SEED",
            "MASSOK_ADMIN_EMAIL",
            "MASSOK_ADMIN_PASSWORD",
            "MASSOK_CONFIG",
        ]
        .into_iter()
        .map(EnvGuard::unset)
        .collect()
    }

    #[test]
    #[serial]
    fn defaults_without_env() {
        let _env = clear_env();
        let config = AccountsConfig::from_env().expect("config");
        assert_eq!(config.bind_addr, DEFAULT_BIND.parse().expect("addr"));
        assert_eq!(config.metrics_bind, DEFAULT_METRICS_BIND.parse().expect("addr"));
        assert_eq!(config.auth.issuer, DEFAULT_ISSUER);
        assert_eq!(config.auth.max_parent_hops, DEFAULT_MAX_PARENT_HOPS);
        assert_eq!(
            config.auth.resolve_timeout,
            Some(Duration::from_millis(DEFAULT_RESOLVE_TIMEOUT_MS))
        );
        assert!(config.admin.is_none());
    }

    #[test]
    #[serial]
    fn env_overrides_defaults() {
        let _env = clear_env();
        let _g1 = EnvGuard::set("MASSOK_BIND", "127.0.0.1:9000");
        let _g2 = EnvGuard::set("MASSOK_TOKEN_ISSUER", "issuer.test");
        let _g3 = EnvGuard::set("MASSOK_MAX_PARENT_HOPS", "4");
        let _g4 = EnvGuard::set("MASSOK_RESOLVE_TIMEOUT_MS", "0");
        let _g5 = EnvGuard::set("MASSOK_ADMIN_EMAIL", "root@example.com");
        let _g6 = EnvGuard::set("MASSOK_ADMIN_PASSWORD", "pw");

        let config = AccountsConfig::from_env().expect("config");
        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().expect("addr"));
        assert_eq!(config.auth.issuer, "issuer.test");
        assert_eq!(config.auth.max_parent_hops, 4);
        assert_eq!(config.auth.resolve_timeout, None);
        assert_eq!(
            config.admin.as_ref().map(|admin| admin.email.as_str()),
            Some("root@example.com")
        );
    }

    #[test]
    #[serial]
    fn invalid_env_value_is_an_error() {
        let _env = clear_env();
        let _g = EnvGuard::set("MASSOK_MAX_PARENT_HOPS", "many");
        let err = AccountsConfig::from_env().expect_err("invalid");
        assert!(err.to_string().contains("MASSOK_MAX_PARENT_HOPS"));
    }

    #[test]
    #[serial]
    fn yaml_overrides_env() {
        let _env = clear_env();
        let mut config = AccountsConfig::from_env().expect("config");
        config
            .apply_yaml(concat!(
                "bind_addr: 127.0.0.1:7000\n",
                "max_parent_hops: 2\n",
                "resolve_timeout_ms: 50\n",
                "access_key_seed: \"00\"\n",
            ))
            .expect("yaml");
        assert_eq!(config.bind_addr, "127.0.0.1:7000".parse().expect("addr"));
        assert_eq!(config.auth.max_parent_hops, 2);
        assert_eq!(config.auth.resolve_timeout, Some(Duration::from_millis(50)));
        assert_eq!(config.auth.access_key_seed.as_deref(), Some("00"));
    }

    #[test]
    #[serial]
    fn yaml_admin_requires_both_fields() {
        let _env = clear_env();
        let mut config = AccountsConfig::from_env().expect("config");
        let err = config
            .apply_yaml("admin_email: root@example.com\n")
            .expect_err("partial admin");
        assert!(err.to_string().contains("admin_password"));
    }

    #[test]
    #[serial]
    fn from_env_or_yaml_reads_file() {
        let _env = clear_env();
        let path =
            std::env::temp_dir().join(format!("massok-accounts-{}.yaml", std::process::id()));
        fs::write(&path, "token_issuer: from-yaml\n").expect("write yaml");
        let _g = EnvGuard::set("MASSOK_CONFIG", path.to_str().expect("utf8 path"));

        let config = AccountsConfig::from_env_or_yaml().expect("config");
        assert_eq!(config.auth.issuer, "from-yaml");
        let _ = fs::remove_file(path);
    }

    #[test]
    fn admin_seed_debug_hides_password() {
        let seed = AdminSeed {
            email: "root@example.com".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{seed:?}").contains("hunter2"));
    }
}
