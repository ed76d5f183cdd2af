use anyhow::Context;
use oauth2::{ClientId, ClientSecret, RedirectUrl};
use std::{env, time::Duration};

use crate::access::guard::RedirectPolicy;

const DEFAULT_IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_IDENTITY_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/token";
const DEFAULT_MAIL_URL: &str = "https://api.emailjs.com/api/v1.0/email/send";

#[derive(Clone)]
pub struct Config {
    pub bind_addr: String,
    pub rust_log: String,
    pub api_url: String,
    pub identity: IdentityConfig,
    pub google: Option<GoogleConfig>,
    pub upload: Option<UploadConfig>,
    pub mail: Option<MailConfig>,
    pub guard_redirect: RedirectPolicy,
    pub role_wait: Duration,
    pub cache_ttl: Duration,
    pub templates_dir: String,
    pub static_dir: String,
    pub secure_cookies: bool,
}

#[derive(Clone)]
pub struct IdentityConfig {
    pub url: String,
    pub token_url: String,
    pub api_key: String,
}

#[derive(Clone)]
pub struct GoogleConfig {
    pub client_id: ClientId,
    pub client_secret: ClientSecret,
    pub redirect_url: RedirectUrl,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub url: String,
    pub preset: String,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub url: String,
    pub service_id: String,
    pub template_id: String,
    pub confirmation_template_id: String,
    pub user_id: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // A missing .env is fine, the variables may come from the environment.
        dotenvy::dotenv().ok();

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "debug".into());
        let api_url = env::var("API_URL").context("API_URL is not set")?;

        let identity = IdentityConfig {
            url: env::var("IDENTITY_URL").unwrap_or_else(|_| DEFAULT_IDENTITY_URL.into()),
            token_url: env::var("IDENTITY_TOKEN_URL")
                .unwrap_or_else(|_| DEFAULT_IDENTITY_TOKEN_URL.into()),
            api_key: env::var("IDENTITY_API_KEY").context("IDENTITY_API_KEY is not set")?,
        };

        let google = match env::var("GOOGLE_CLIENT_ID") {
            Ok(client_id) => Some(GoogleConfig {
                client_id: ClientId::new(client_id),
                client_secret: env::var("GOOGLE_CLIENT_SECRET")
                    .map(ClientSecret::new)
                    .context("GOOGLE_CLIENT_SECRET should be provided with GOOGLE_CLIENT_ID")?,
                redirect_url: env::var("GOOGLE_REDIRECT_URI")
                    .context("GOOGLE_REDIRECT_URI should be provided with GOOGLE_CLIENT_ID")
                    .and_then(|url| RedirectUrl::new(url).context("GOOGLE_REDIRECT_URI is invalid"))?,
            }),
            Err(_) => None,
        };

        let upload = match env::var("UPLOAD_URL") {
            Ok(url) => Some(UploadConfig {
                url,
                preset: env::var("UPLOAD_PRESET")
                    .context("UPLOAD_PRESET should be provided with UPLOAD_URL")?,
            }),
            Err(_) => None,
        };

        let mail = match env::var("MAIL_SERVICE_ID") {
            Ok(service_id) => Some(MailConfig {
                url: env::var("MAIL_URL").unwrap_or_else(|_| DEFAULT_MAIL_URL.into()),
                service_id,
                template_id: env::var("MAIL_TEMPLATE_ID").context("MAIL_TEMPLATE_ID is not set")?,
                confirmation_template_id: env::var("MAIL_CONFIRMATION_TEMPLATE_ID")
                    .context("MAIL_CONFIRMATION_TEMPLATE_ID is not set")?,
                user_id: env::var("MAIL_USER_ID").context("MAIL_USER_ID is not set")?,
            }),
            Err(_) => None,
        };

        let guard_redirect = env::var("GUARD_REDIRECT")
            .ok()
            .map(|value| value.parse::<RedirectPolicy>())
            .transpose()
            .map_err(anyhow::Error::msg)?
            .unwrap_or_default();

        let role_wait = Duration::from_millis(parse_or("ROLE_WAIT_MS", 3000)?);
        let cache_ttl = Duration::from_secs(parse_or("CACHE_TTL_SECS", 60)?);

        Ok(Self {
            bind_addr,
            rust_log,
            api_url,
            identity,
            google,
            upload,
            mail,
            guard_redirect,
            role_wait,
            cache_ttl,
            templates_dir: env::var("TEMPLATES_DIR").unwrap_or_else(|_| "templates".into()),
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "static".into()),
            secure_cookies: env::var("SECURE_COOKIES")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        })
    }
}

fn parse_or(key: &str, default: u64) -> anyhow::Result<u64> {
    match env::var(key) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{key} must be a whole number, got {value:?}")),
        Err(_) => Ok(default),
    }
}
