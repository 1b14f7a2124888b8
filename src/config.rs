use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Vendor API origin, e.g. `https://open.larksuite.com`.
    pub lark_base_url: String,
    /// App identity for the vendor token exchange. Checked lazily at token
    /// time so the health endpoint works on a misconfigured box.
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    Ok(Config {
        port: std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .unwrap_or(8000),
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/approval_sync".into()),
        lark_base_url: std::env::var("LARK_BASE_URL")
            .unwrap_or_else(|_| "https://open.larksuite.com".into()),
        app_id: std::env::var("LARK_APP_ID").ok().filter(|s| !s.is_empty()),
        app_secret: std::env::var("LARK_APP_SECRET").ok().filter(|s| !s.is_empty()),
    })
}
