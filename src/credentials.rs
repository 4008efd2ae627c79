use std::fmt;

use anyhow::{bail, Context, Result};
use secrecy::{ExposeSecret, SecretString};

use crate::rates::ProviderName;

/// A single provider credential. The app id is query-string authentication
/// material, so it is held behind [`SecretString`] and never printed.
#[derive(Clone)]
pub struct Credential {
    app_id: SecretString,
}

impl Credential {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: SecretString::from(app_id.into()),
        }
    }

    pub fn app_id(&self) -> &str {
        self.app_id.expose_secret()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("app_id", &"[redacted]")
            .finish()
    }
}

/// Name of the environment variable holding the app ids for a provider,
/// e.g. `OPENEXCHANGERATES_APP_IDS`.
pub fn env_var_name(provider: ProviderName) -> String {
    format!("{}_APP_IDS", provider.to_string().to_uppercase())
}

/// Reads the colon-separated app-id list for a provider from the
/// environment, one credential per app id, in the order configured.
pub fn from_env(provider: ProviderName) -> Result<Vec<Credential>> {
    let variable = env_var_name(provider);
    let raw = std::env::var(&variable)
        .with_context(|| format!("Environment variable {variable} is not set"))?;

    let credentials: Vec<Credential> = raw
        .split(':')
        .filter(|app_id| !app_id.is_empty())
        .map(Credential::new)
        .collect();

    if credentials.is_empty() {
        bail!("Environment variable {variable} holds no app ids");
    }
    Ok(credentials)
}
