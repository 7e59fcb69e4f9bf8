use std::env;

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone)]
pub struct MailgunConfig {
    pub domain: String,
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    /// Base used to build account activation links.
    pub public_base_url: String,
    pub max_upload_bytes: usize,
    pub cloudinary: Option<CloudinaryConfig>,
    pub mailgun: Option<MailgunConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET is not set"))?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_or("APP_PORT", 3000);
        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{host}:{port}"))
            .trim_end_matches('/')
            .to_string();

        let cloudinary = match (
            env::var("CLOUDINARY_CLOUD_NAME"),
            env::var("CLOUDINARY_API_KEY"),
            env::var("CLOUDINARY_API_SECRET"),
        ) {
            (Ok(cloud_name), Ok(api_key), Ok(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
            }),
            _ => None,
        };

        let mailgun = match (env::var("MAILGUN_DOMAIN"), env::var("MAILGUN_API_KEY")) {
            (Ok(domain), Ok(api_key)) => {
                let from = env::var("MAIL_FROM")
                    .unwrap_or_else(|_| format!("Costume Store <no-reply@{domain}>"));
                Some(MailgunConfig {
                    domain,
                    api_key,
                    from,
                })
            }
            _ => None,
        };

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            access_token_ttl_minutes: parse_or("ACCESS_TOKEN_TTL_MINUTES", 60),
            refresh_token_ttl_days: parse_or("REFRESH_TOKEN_TTL_DAYS", 1),
            public_base_url,
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", 16 * 1024 * 1024),
            cloudinary,
            mailgun,
        })
    }

    pub fn activation_link(&self, token: &str) -> String {
        format!("{}/api/auth/activate/{}", self.public_base_url, token)
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
