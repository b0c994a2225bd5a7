use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub upload_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let jwt_expiration = env::var("JWT_EXPIRATION")?
            .trim_end_matches('h')
            .parse::<u64>()
            .unwrap_or(24);
        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            jwt_expiration_secs: jwt_expiration * 3600,
            server_host: env::var("SERVER_HOST")?,
            server_port: env::var("SERVER_PORT")?.parse().unwrap_or(3000),
            api_base_uri: env::var("API_BASE_URI").unwrap_or_else(|_| "/api".into()),
            upload_dir: env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| "public/uploads".into())
                .into(),
        })
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }
}
