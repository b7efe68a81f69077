use std::env;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub server_host: String,
    pub server_port: u16,
    /// Merchant code registered with eSewa; sent as the signed `product_code`.
    pub esewa_merchant_code: String,
    /// HMAC secret shared between this service and the gateway.
    pub esewa_secret_key: String,
    pub esewa_form_submit_url: String,
    /// Public base URL of this service, used to build gateway callback URLs.
    pub server_base_url: String,
    /// Base URL of the user-facing app, used to build post-payment redirects.
    pub app_base_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            database_url: env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET")
                .expect("JWT_SECRET must be set"),
            jwt_expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .expect("JWT_EXPIRATION_HOURS must be a number"),
            server_host: env::var("SERVER_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("SERVER_PORT must be a number"),
            esewa_merchant_code: env::var("ESEWA_MERCHANT_CODE")
                .expect("ESEWA_MERCHANT_CODE must be set"),
            esewa_secret_key: env::var("ESEWA_SECRET_KEY")
                .expect("ESEWA_SECRET_KEY must be set"),
            esewa_form_submit_url: env::var("ESEWA_FORM_SUBMIT_URL")
                .expect("ESEWA_FORM_SUBMIT_URL must be set"),
            server_base_url: env::var("SERVER_BASE_URL")
                .expect("SERVER_BASE_URL must be set"),
            app_base_url: env::var("APP_BASE_URL")
                .expect("APP_BASE_URL must be set"),
        }
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
