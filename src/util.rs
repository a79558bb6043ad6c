use std::net::SocketAddr;

const SENTINEL_CONFIG: &str = "SENTINEL_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "./sentinel.json";

/// Configuration file path from the environment, or the default
pub fn get_config_path() -> String {
    std::env::var(SENTINEL_CONFIG).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

const SENTINEL_BIND_ADDR: &str = "SENTINEL_BIND_ADDR";

/// Bind address override; unparsable values are ignored
pub fn get_bind_addr() -> Option<SocketAddr> {
    let addr_from_env = std::env::var(SENTINEL_BIND_ADDR);
    addr_from_env.ok().and_then(|res| res.parse().ok())
}

const SENTINEL_API_TOKEN: &str = "SENTINEL_API_TOKEN";

pub fn get_api_token() -> Option<String> {
    let token_from_env = std::env::var(SENTINEL_API_TOKEN);
    token_from_env.ok().filter(|token| !token.is_empty())
}
