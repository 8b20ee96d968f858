use std::time::Duration;

use url::Url;

use crate::permissions::PermissionCatalog;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8081/";
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const DEFAULT_REDIRECT_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_LISTING_ROUTE: &str = "v/people";
pub const DEFAULT_LANDING_ROUTE: &str = "v/products";

/// Explicit configuration handed to every console component.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Base URL every API path is joined onto; always ends with `/`
    pub base_url: Url,
    /// Page size of the entity typeahead and the people table
    pub page_size: u32,
    /// Delay before navigating away after a create or a password change
    pub redirect_delay: Duration,
    /// Route shown after a person is created
    pub listing_route: String,
    /// Route shown after login
    pub landing_route: String,
    /// Per-request timeout of the HTTP client
    pub request_timeout: Duration,
    pub permission_catalog: PermissionCatalog,
}

impl ConsoleConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            page_size: DEFAULT_PAGE_SIZE,
            redirect_delay: DEFAULT_REDIRECT_DELAY,
            listing_route: DEFAULT_LISTING_ROUTE.to_string(),
            landing_route: DEFAULT_LANDING_ROUTE.to_string(),
            request_timeout: Duration::from_secs(30),
            permission_catalog: PermissionCatalog::default(),
        }
    }

    pub fn with_base_url(base_url: &str) -> anyhow::Result<Self> {
        Ok(Self::new(normalize_base_url(base_url)?))
    }

    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let page_size = env_parse("PEOPLE_CONSOLE_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            return Err(anyhow::anyhow!(
                "PEOPLE_CONSOLE_PAGE_SIZE must be at least 1"
            ));
        }

        Ok(Self {
            base_url: normalize_base_url(&env_str("PEOPLE_CONSOLE_BASE_URL", DEFAULT_BASE_URL))?,
            page_size,
            redirect_delay: Duration::from_millis(env_parse(
                "PEOPLE_CONSOLE_REDIRECT_DELAY_MS",
                1000,
            )?),
            listing_route: env_str("PEOPLE_CONSOLE_LISTING_ROUTE", DEFAULT_LISTING_ROUTE),
            landing_route: env_str("PEOPLE_CONSOLE_LANDING_ROUTE", DEFAULT_LANDING_ROUTE),
            request_timeout: Duration::from_secs(env_parse(
                "PEOPLE_CONSOLE_REQUEST_TIMEOUT_SECS",
                30,
            )?),
            permission_catalog: PermissionCatalog::default(),
        })
    }

    /// Absolute location of a console route, relative to the base URL.
    pub fn route_url(&self, route: &str) -> String {
        self.base_url
            .join(route.trim_start_matches('/'))
            .map(|url| url.to_string())
            .unwrap_or_else(|_| format!("{}{}", self.base_url, route.trim_start_matches('/')))
    }
}

/// Parse a base URL and make sure relative joins stay under its path.
pub fn normalize_base_url(raw: &str) -> anyhow::Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(anyhow::anyhow!("base url must not be empty"));
    }
    let mut url =
        Url::parse(trimmed).map_err(|e| anyhow::anyhow!("Invalid base url '{trimmed}': {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(anyhow::anyhow!(
            "Invalid base url '{trimmed}'. Expected an http:// or https:// url"
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Failed to parse env var {key}={val}: {e}")),
        Err(_) => Ok(default),
    }
}
