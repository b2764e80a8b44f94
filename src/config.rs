//! Command-line and environment configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::{Parser, ValueEnum};

/// Log output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Janitor - reconciles instance ConfigMaps, auth Secrets and readiness
#[derive(Parser, Clone)]
#[command(name = "janitor", version, about, long_about = None)]
pub struct Config {
    /// Port of the gRPC listener
    #[arg(long, env = "JANITOR_PORT")]
    pub port: u16,

    /// GitLab private token used for every repository read
    #[arg(long = "token", env = "GITLAB_TOKEN", hide_env_values = true)]
    pub gitlab_token: String,

    /// GitLab API base URL, e.g. https://gitlab.example.com/api/v4
    #[arg(long = "url", env = "GITLAB_URL")]
    pub gitlab_url: String,

    /// Timeout of a single GitLab request in seconds
    #[arg(long, env = "GITLAB_TIMEOUT_SECS", default_value_t = 30)]
    pub gitlab_timeout_secs: u64,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Config {
    /// Address the gRPC server binds to (all interfaces)
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    /// GitLab request timeout
    pub fn gitlab_timeout(&self) -> Duration {
        Duration::from_secs(self.gitlab_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: [&str; 7] = [
        "janitor",
        "--port",
        "9000",
        "--token",
        "glpat-test",
        "--url",
        "https://gitlab.example.com/api/v4",
    ];

    #[test]
    fn flags_parse_with_defaults() {
        let config = Config::try_parse_from(BASE).unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.gitlab_token, "glpat-test");
        assert_eq!(config.gitlab_url, "https://gitlab.example.com/api/v4");
        assert_eq!(config.gitlab_timeout(), Duration::from_secs(30));
        assert_eq!(config.listen_addr(), "0.0.0.0:9000".parse().unwrap());
    }

    #[test]
    fn log_format_and_timeout_are_configurable() {
        let mut args = BASE.to_vec();
        args.extend(["--log-format", "json", "--gitlab-timeout-secs", "5"]);

        let config = Config::try_parse_from(args).unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.gitlab_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn invalid_port_is_rejected() {
        let mut args = BASE.to_vec();
        args[2] = "70000";
        assert!(Config::try_parse_from(args).is_err());
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        let mut args = BASE.to_vec();
        args.extend(["--log-format", "xml"]);
        assert!(Config::try_parse_from(args).is_err());
    }
}
