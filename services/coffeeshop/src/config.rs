use anyhow::{Context, Result, bail};
use coffee_authz::{AuthSettings, KeySetCacheSettings, MAX_LEEWAY_SECONDS, parse_rsa_algorithm};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_BIND: &str = "0.0.0.0:5000";
pub const DEFAULT_METRICS_BIND: &str = "0.0.0.0:9100";
pub const DEFAULT_AUTH_DOMAIN: &str = "coffee-dev.eu.auth0.com";
pub const DEFAULT_API_AUDIENCE: &str = "coffee_api";

// Service configuration sourced from environment variables, optionally
// overridden by the YAML file named in COFFEE_CONFIG.
#[derive(Debug, Clone)]
pub struct CoffeeShopConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub auth: AuthSettings,
    pub key_cache: KeySetCacheSettings,
    pub seed_sample_drink: bool,
}

/// Every setting as an optional value; env and YAML each produce one and the
/// YAML one wins field by field.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CoffeeShopConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    auth_domain: Option<String>,
    api_audience: Option<String>,
    auth_issuer: Option<String>,
    jwks_url: Option<String>,
    algorithms: Option<Vec<String>>,
    jwks_ttl_secs: Option<u64>,
    jwks_min_refresh_secs: Option<u64>,
    jwks_fetch_timeout_ms: Option<u64>,
    clock_skew_secs: Option<u64>,
    seed_sample_drink: Option<bool>,
}

impl CoffeeShopConfigOverride {
    fn from_env() -> Result<Self> {
        Ok(Self {
            bind_addr: env("COFFEE_BIND"),
            metrics_bind: env("COFFEE_METRICS_BIND"),
            auth_domain: env("COFFEE_AUTH_DOMAIN"),
            api_audience: env("COFFEE_API_AUDIENCE"),
            auth_issuer: env("COFFEE_AUTH_ISSUER"),
            jwks_url: env("COFFEE_JWKS_URL"),
            algorithms: env("COFFEE_AUTH_ALGORITHMS").map(|value| {
                value
                    .split(',')
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .collect()
            }),
            jwks_ttl_secs: env_parse("COFFEE_JWKS_TTL_SECS")?,
            jwks_min_refresh_secs: env_parse("COFFEE_JWKS_MIN_REFRESH_SECS")?,
            jwks_fetch_timeout_ms: env_parse("COFFEE_JWKS_FETCH_TIMEOUT_MS")?,
            clock_skew_secs: env_parse("COFFEE_CLOCK_SKEW_SECS")?,
            seed_sample_drink: env_parse("COFFEE_SEED_SAMPLE_DRINK")?,
        })
    }

    fn merge(self, other: Self) -> Self {
        Self {
            bind_addr: other.bind_addr.or(self.bind_addr),
            metrics_bind: other.metrics_bind.or(self.metrics_bind),
            auth_domain: other.auth_domain.or(self.auth_domain),
            api_audience: other.api_audience.or(self.api_audience),
            auth_issuer: other.auth_issuer.or(self.auth_issuer),
            jwks_url: other.jwks_url.or(self.jwks_url),
            algorithms: other.algorithms.or(self.algorithms),
            jwks_ttl_secs: other.jwks_ttl_secs.or(self.jwks_ttl_secs),
            jwks_min_refresh_secs: other.jwks_min_refresh_secs.or(self.jwks_min_refresh_secs),
            jwks_fetch_timeout_ms: other.jwks_fetch_timeout_ms.or(self.jwks_fetch_timeout_ms),
            clock_skew_secs: other.clock_skew_secs.or(self.clock_skew_secs),
            seed_sample_drink: other.seed_sample_drink.or(self.seed_sample_drink),
        }
    }

    fn resolve(self) -> Result<CoffeeShopConfig> {
        let bind_addr = self
            .bind_addr
            .as_deref()
            .unwrap_or(DEFAULT_BIND)
            .parse()
            .with_context(|| "parse bind_addr")?;
        let metrics_bind = self
            .metrics_bind
            .as_deref()
            .unwrap_or(DEFAULT_METRICS_BIND)
            .parse()
            .with_context(|| "parse metrics_bind")?;

        let domain = self
            .auth_domain
            .unwrap_or_else(|| DEFAULT_AUTH_DOMAIN.to_string());
        let names = self.algorithms.unwrap_or_else(|| vec!["RS256".to_string()]);
        if names.is_empty() {
            bail!("at least one signing algorithm must be allowed");
        }
        let mut algorithms = Vec::with_capacity(names.len());
        for name in &names {
            let Some(alg) = parse_rsa_algorithm(name) else {
                bail!("unsupported signing algorithm {name}; only RS* and PS* are allowed");
            };
            algorithms.push(alg);
        }

        let leeway_seconds = self.clock_skew_secs.unwrap_or(0);
        if leeway_seconds > MAX_LEEWAY_SECONDS {
            bail!("clock_skew_secs {leeway_seconds} exceeds the {MAX_LEEWAY_SECONDS}s maximum");
        }
        let audience = self
            .api_audience
            .unwrap_or_else(|| DEFAULT_API_AUDIENCE.to_string());
        let mut auth = AuthSettings::for_domain(&domain, audience);
        if let Some(issuer) = self.auth_issuer {
            auth.issuer = issuer;
        }
        auth.algorithms = algorithms;
        auth.leeway_seconds = leeway_seconds;

        let mut key_cache = KeySetCacheSettings::for_domain(&domain);
        if let Some(jwks_url) = self.jwks_url {
            key_cache.jwks_url = jwks_url;
        }
        // Zero disables expiry; the set is then only refetched on a kid miss.
        if let Some(ttl_secs) = self.jwks_ttl_secs {
            key_cache.ttl = (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs));
        }
        if let Some(secs) = self.jwks_min_refresh_secs {
            key_cache.min_refresh_interval = Duration::from_secs(secs);
        }
        if let Some(millis) = self.jwks_fetch_timeout_ms {
            key_cache.fetch_timeout = Duration::from_millis(millis);
        }

        Ok(CoffeeShopConfig {
            bind_addr,
            metrics_bind,
            auth,
            key_cache,
            seed_sample_drink: self.seed_sample_drink.unwrap_or(true),
        })
    }
}

impl CoffeeShopConfig {
    pub fn from_env() -> Result<Self> {
        CoffeeShopConfigOverride::from_env()?.resolve()
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut merged = CoffeeShopConfigOverride::from_env()?;
        if let Ok(path) = std::env::var("COFFEE_CONFIG") {
            let contents =
                fs::read_to_string(&path).with_context(|| format!("read COFFEE_CONFIG: {path}"))?;
            let override_cfg: CoffeeShopConfigOverride =
                serde_yaml::from_str(&contents).with_context(|| "parse coffeeshop config yaml")?;
            merged = merged.merge(override_cfg);
        }
        merged.resolve()
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env(key)
        .map(|value| value.trim().parse::<T>())
        .transpose()
        .with_context(|| format!("parse {key}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::Algorithm;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "COFFEE_BIND",
        "COFFEE_METRICS_BIND",
        "COFFEE_AUTH_DOMAIN",
        "COFFEE_API_AUDIENCE",
        "COFFEE_AUTH_ISSUER",
        "COFFEE_JWKS_URL",
        "COFFEE_AUTH_ALGORITHMS",
        "COFFEE_JWKS_TTL_SECS",
        "COFFEE_JWKS_MIN_REFRESH_SECS",
        "COFFEE_JWKS_FETCH_TIMEOUT_MS",
        "COFFEE_CLOCK_SKEW_SECS",
        "COFFEE_SEED_SAMPLE_DRINK",
        "COFFEE_CONFIG",
    ];

    struct EnvGuard {
        saved: Vec<(&'static str, Option<String>)>,
    }

    impl EnvGuard {
        fn clean() -> Self {
            let saved = KEYS
                .iter()
                .map(|key| (*key, std::env::var(key).ok()))
                .collect();
            for key in KEYS {
                unsafe {
                    std::env::remove_var(key);
                }
            }
            Self { saved }
        }

        fn set(&self, key: &'static str, value: &str) {
            unsafe {
                std::env::set_var(key, value);
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, prev) in &self.saved {
                match prev {
                    Some(value) => unsafe {
                        std::env::set_var(key, value);
                    },
                    None => unsafe {
                        std::env::remove_var(key);
                    },
                }
            }
        }
    }

    #[test]
    #[serial]
    fn defaults_target_the_dev_tenant() {
        let _guard = EnvGuard::clean();
        let config = CoffeeShopConfig::from_env().expect("config");
        assert_eq!(config.bind_addr, DEFAULT_BIND.parse().expect("addr"));
        assert_eq!(config.auth.issuer, "https://coffee-dev.eu.auth0.com/");
        assert_eq!(config.auth.audience, "coffee_api");
        assert_eq!(config.auth.algorithms, vec![Algorithm::RS256]);
        assert_eq!(config.auth.leeway_seconds, 0);
        assert_eq!(
            config.key_cache.jwks_url,
            "https://coffee-dev.eu.auth0.com/.well-known/jwks.json"
        );
        assert_eq!(config.key_cache.ttl, Some(Duration::from_secs(3600)));
        assert_eq!(config.key_cache.min_refresh_interval, Duration::ZERO);
        assert!(config.seed_sample_drink);
    }

    #[test]
    #[serial]
    fn domain_drives_issuer_and_jwks_url_unless_overridden() {
        let guard = EnvGuard::clean();
        guard.set("COFFEE_AUTH_DOMAIN", "tenant.example.com");
        guard.set("COFFEE_JWKS_URL", "http://127.0.0.1:9999/jwks.json");
        guard.set("COFFEE_JWKS_TTL_SECS", "0");
        guard.set("COFFEE_AUTH_ALGORITHMS", "RS256, PS256");
        let config = CoffeeShopConfig::from_env().expect("config");
        assert_eq!(config.auth.issuer, "https://tenant.example.com/");
        assert_eq!(config.key_cache.jwks_url, "http://127.0.0.1:9999/jwks.json");
        assert_eq!(config.key_cache.ttl, None);
        assert_eq!(
            config.auth.algorithms,
            vec![Algorithm::RS256, Algorithm::PS256]
        );
    }

    #[test]
    #[serial]
    fn rejects_non_rsa_algorithms_and_bad_numbers() {
        let guard = EnvGuard::clean();
        guard.set("COFFEE_AUTH_ALGORITHMS", "HS256");
        let err = CoffeeShopConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("HS256"));

        guard.set("COFFEE_AUTH_ALGORITHMS", "RS256");
        guard.set("COFFEE_CLOCK_SKEW_SECS", "soon");
        let err = CoffeeShopConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("COFFEE_CLOCK_SKEW_SECS"));
    }

    #[test]
    #[serial]
    fn clock_skew_above_maximum_is_rejected() {
        let guard = EnvGuard::clean();
        guard.set("COFFEE_CLOCK_SKEW_SECS", "300");
        let config = CoffeeShopConfig::from_env().expect("config at the maximum");
        assert_eq!(config.auth.leeway_seconds, 300);

        guard.set("COFFEE_CLOCK_SKEW_SECS", "18446744073709551615");
        let err = CoffeeShopConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("clock_skew_secs"));
    }

    #[test]
    #[serial]
    fn key_cache_defaults_come_from_domain_settings() {
        let guard = EnvGuard::clean();
        guard.set("COFFEE_AUTH_DOMAIN", "tenant.example.com");
        guard.set("COFFEE_JWKS_MIN_REFRESH_SECS", "30");
        let config = CoffeeShopConfig::from_env().expect("config");
        let domain_defaults = KeySetCacheSettings::for_domain("tenant.example.com");
        assert_eq!(config.key_cache.jwks_url, domain_defaults.jwks_url);
        assert_eq!(config.key_cache.ttl, domain_defaults.ttl);
        assert_eq!(config.key_cache.fetch_timeout, domain_defaults.fetch_timeout);
        assert_eq!(config.key_cache.min_refresh_interval, Duration::from_secs(30));
    }

    #[test]
    #[serial]
    fn yaml_overrides_env() {
        let guard = EnvGuard::clean();
        guard.set("COFFEE_API_AUDIENCE", "from_env");
        guard.set("COFFEE_CLOCK_SKEW_SECS", "5");
        let path = std::env::temp_dir().join(format!(
            "coffeeshop-config-{}.yaml",
            std::process::id()
        ));
        fs::write(
            &path,
            "bind_addr: \"127.0.0.1:7000\"\napi_audience: from_yaml\nseed_sample_drink: false\n",
        )
        .expect("write yaml");
        guard.set("COFFEE_CONFIG", path.to_str().expect("path"));

        let config = CoffeeShopConfig::from_env_or_yaml().expect("config");
        assert_eq!(config.bind_addr, "127.0.0.1:7000".parse().expect("addr"));
        assert_eq!(config.auth.audience, "from_yaml");
        assert_eq!(config.auth.leeway_seconds, 5);
        assert!(!config.seed_sample_drink);
        let _ = fs::remove_file(path);
    }

    #[test]
    #[serial]
    fn unknown_yaml_keys_are_rejected() {
        let guard = EnvGuard::clean();
        let path = std::env::temp_dir().join(format!(
            "coffeeshop-config-bad-{}.yaml",
            std::process::id()
        ));
        fs::write(&path, "bind: \"127.0.0.1:7000\"\n").expect("write yaml");
        guard.set("COFFEE_CONFIG", path.to_str().expect("path"));
        assert!(CoffeeShopConfig::from_env_or_yaml().is_err());
        let _ = fs::remove_file(path);
    }
}
