//! Environment configuration.
//!
//! Six values wire the app to its external collaborators: the hosted auth
//! backend, the billing provider, and the public site. Only the webhook
//! signing key feeds logic in this binary; the rest is carried for the
//! frontend and the checkout redirect.

use std::env;

use thiserror::Error;

pub const AUTH_URL: &str = "ROCTHINC_AUTH_URL";
pub const AUTH_KEY: &str = "ROCTHINC_AUTH_KEY";
pub const BILLING_TOKEN: &str = "ROCTHINC_BILLING_TOKEN";
pub const BILLING_PLAN_ID: &str = "ROCTHINC_BILLING_PLAN_ID";
pub const WEBHOOK_SECRET: &str = "ROCTHINC_WEBHOOK_SECRET";
pub const SITE_URL: &str = "ROCTHINC_SITE_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment value {0}")]
    Missing(&'static str),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub auth_url: String,
    pub auth_key: String,
    pub billing_token: String,
    pub billing_plan_id: String,
    pub webhook_secret: String,
    pub site_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            auth_url: require(AUTH_URL)?,
            auth_key: require(AUTH_KEY)?,
            billing_token: require(BILLING_TOKEN)?,
            billing_plan_id: require(BILLING_PLAN_ID)?,
            webhook_secret: require(WEBHOOK_SECRET)?,
            site_url: require(SITE_URL)?,
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}
