use std::env;
use std::net::{IpAddr, Ipv4Addr};

pub struct Config {
    pub server: ServerConfig,
    pub jobs: JobServiceConfig,
}

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

pub struct JobServiceConfig {
    /// Base URL of the external interview-job CRUD service. When unset the
    /// password gate runs against an empty in-memory store.
    pub service_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "5000".to_string())
                    .parse()
                    .expect("Invalid SERVER_PORT"),
            },
            jobs: JobServiceConfig {
                service_url: env::var("JOB_SERVICE_URL").ok().filter(|s| !s.is_empty()),
            },
        }
    }

    pub fn bind_address(&self) -> ([u8; 4], u16) {
        let ip_addr = self.parse_host_to_ipv4();
        (ip_addr.octets(), self.server.port)
    }

    fn parse_host_to_ipv4(&self) -> Ipv4Addr {
        // Try to parse as IP address first
        if let Ok(addr) = self.server.host.parse::<IpAddr>() {
            match addr {
                IpAddr::V4(ipv4) => return ipv4,
                IpAddr::V6(_) => {
                    tracing::warn!(
                        host = %self.server.host,
                        "IPv6 address provided but only IPv4 supported, using 0.0.0.0"
                    );
                    return Ipv4Addr::new(0, 0, 0, 0);
                }
            }
        }

        // Handle common hostnames
        match self.server.host.as_str() {
            "localhost" => Ipv4Addr::new(127, 0, 0, 1),
            "" | "0.0.0.0" => Ipv4Addr::new(0, 0, 0, 0),
            _ => {
                tracing::warn!(
                    host = %self.server.host,
                    "Unable to parse host as IPv4, using 0.0.0.0"
                );
                Ipv4Addr::new(0, 0, 0, 0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_host(host: &str, port: u16) -> Config {
        Config {
            server: ServerConfig {
                host: host.to_string(),
                port,
            },
            jobs: JobServiceConfig { service_url: None },
        }
    }

    #[test]
    fn test_parse_localhost() {
        let config = config_with_host("localhost", 5000);
        assert_eq!(config.bind_address(), ([127, 0, 0, 1], 5000));
    }

    #[test]
    fn test_parse_ipv4_address() {
        let config = config_with_host("192.168.1.1", 3000);
        assert_eq!(config.bind_address(), ([192, 168, 1, 1], 3000));
    }

    #[test]
    fn test_parse_all_interfaces() {
        let config = config_with_host("0.0.0.0", 5000);
        assert_eq!(config.bind_address(), ([0, 0, 0, 0], 5000));
    }

    #[test]
    fn test_parse_empty_host() {
        let config = config_with_host("", 5000);
        assert_eq!(config.bind_address(), ([0, 0, 0, 0], 5000));
    }

    #[test]
    fn test_parse_invalid_hostname_defaults_to_all() {
        let config = config_with_host("invalid-hostname", 9000);
        assert_eq!(config.bind_address(), ([0, 0, 0, 0], 9000));
    }
}
