use std::sync::Arc;

use tokengate_core::{Admission, HmacAuthority, KeyedAdmission, TokenAuthority};

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub tokens: Arc<dyn TokenAuthority>,
    /// Per-client-IP rate limiter consulted before every route.
    pub admission: Arc<dyn Admission>,
}

impl AppState {
    /// Builds the token authority and admission registry from `config`.
    pub fn from_config(config: ServerConfig) -> anyhow::Result<Self> {
        let tokens = HmacAuthority::new(
            config.auth.secret_key.as_bytes(),
            config.auth.issuer.clone(),
        )?;
        let admission = KeyedAdmission::new(config.rate_limit.requests_per_second)?;

        Ok(Self {
            config: Arc::new(config),
            tokens: Arc::new(tokens),
            admission: Arc::new(admission),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_builds_working_authority() {
        let mut config = ServerConfig::default();
        config.auth.secret_key = "secret".to_string();
        config.auth.issuer = "userName".to_string();

        let state = AppState::from_config(config).unwrap();
        let token = state.tokens.issue("1").unwrap();
        assert_eq!(state.tokens.verify(&token).unwrap().iss, "userName");
    }

    #[test]
    fn from_config_rejects_empty_secret() {
        let mut config = ServerConfig::default();
        config.auth.issuer = "userName".to_string();
        assert!(AppState::from_config(config).is_err());
    }

    #[test]
    fn from_config_applies_rate_limit() {
        let mut config = ServerConfig::default();
        config.auth.secret_key = "secret".to_string();
        config.auth.issuer = "userName".to_string();
        config.rate_limit.requests_per_second = 1.0;

        let state = AppState::from_config(config).unwrap();
        assert!(state.admission.admit("127.0.0.1"));
        assert!(!state.admission.admit("127.0.0.1"));
    }
}
