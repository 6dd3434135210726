use crate::sync::LeadDefaults;

#[derive(Clone)]
pub struct Config {
    pub verify_token: String,
    pub erp_url: String,
    pub erp_api_key: String,
    pub erp_api_secret: String,
    pub port: u16,
    pub dry_run: bool,
    pub lead_defaults: LeadDefaults,
}

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(name) => write!(f, "{} must be set (environment or .env file)", name),
            ConfigError::Invalid(name, value) => write!(f, "{} has an invalid value: {}", name, value),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid("PORT", raw))?,
            None => 3000,
        };

        let dry_run = lookup("DRY_RUN")
            .and_then(|v| v.trim().parse::<bool>().ok())
            .unwrap_or(false);

        let defaults = LeadDefaults::default();
        let lead_defaults = LeadDefaults {
            source: lookup("LEAD_SOURCE")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.source),
            status: lookup("LEAD_STATUS")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.status),
        };

        Ok(Self {
            verify_token: required("VERIFY_TOKEN")?,
            erp_url: required("ERP_URL")?.trim_end_matches('/').to_string(),
            erp_api_key: required("ERP_API_KEY")?,
            erp_api_secret: required("ERP_API_SECRET")?,
            port,
            dry_run,
            lead_defaults,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn base() -> HashMap<String, String> {
        vars(&[
            ("VERIFY_TOKEN", "verify-me"),
            ("ERP_URL", "https://crm.example.com/"),
            ("ERP_API_KEY", "key"),
            ("ERP_API_SECRET", "secret"),
        ])
    }

    #[test]
    fn reads_required_values_and_defaults() {
        let env = base();
        let config = Config::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert_eq!(config.verify_token, "verify-me");
        assert_eq!(config.erp_url, "https://crm.example.com");
        assert_eq!(config.port, 3000);
        assert!(!config.dry_run);
        assert_eq!(config.lead_defaults.source, "WhatsApp");
        assert_eq!(config.lead_defaults.status, "Open");
    }

    #[test]
    fn empty_required_value_is_rejected() {
        let mut env = base();
        env.insert("ERP_API_SECRET".to_string(), "  ".to_string());
        let err = Config::from_lookup(|k| env.get(k).cloned()).err();
        assert_eq!(err, Some(ConfigError::Missing("ERP_API_SECRET")));
    }

    #[test]
    fn overrides_are_applied() {
        let mut env = base();
        env.extend(vars(&[
            ("PORT", "8080"),
            ("DRY_RUN", "true"),
            ("LEAD_SOURCE", "Chat"),
            ("LEAD_STATUS", "Lead"),
        ]));
        let config = Config::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.dry_run);
        assert_eq!(config.lead_defaults.source, "Chat");
        assert_eq!(config.lead_defaults.status, "Lead");
    }

    #[test]
    fn bad_port_is_rejected() {
        let mut env = base();
        env.insert("PORT".to_string(), "http".to_string());
        let err = Config::from_lookup(|k| env.get(k).cloned()).err();
        assert_eq!(err, Some(ConfigError::Invalid("PORT", "http".to_string())));
    }
}
