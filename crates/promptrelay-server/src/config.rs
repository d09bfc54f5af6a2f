use std::env;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub chat_path: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let host = env::var("PROMPTRELAY_SERVER_HOST").unwrap_or_else(|_| default_host());
        let port = env::var("PROMPTRELAY_SERVER_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or_else(default_port);
        let chat_path = env::var("PROMPTRELAY_CHAT_PATH").unwrap_or_else(|_| default_chat_path());

        Self {
            host,
            port,
            chat_path,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_chat_path() -> String {
    "/api/chat".to_string()
}
