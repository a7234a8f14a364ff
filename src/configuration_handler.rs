use crate::configuration::{ConfigError, Configuration, DEVELOPMENT};
use clap::{ArgAction, Parser};
use std::{convert::Infallible, fs, path::PathBuf};

#[derive(Debug, Clone, Parser)]
#[command(name = "leadg_api", version, about = "Lead G API server")]
pub struct ConfigurationHandler {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8001)]
    pub port: u16,

    /// `development` serves from the mock store, anything else from the database
    #[arg(long, env = "ENVIRONMENT", default_value = DEVELOPMENT)]
    pub environment: String,

    /// Exposes the route listing under /docs
    #[arg(
        long,
        env = "DEBUG",
        default_value = "true",
        value_parser = parse_flag,
        action = ArgAction::Set
    )]
    pub debug: bool,

    /// Comma-separated list of allowed origins
    #[arg(
        long,
        env = "CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:3000"
    )]
    pub cors_origins: Vec<String>,

    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// File holding the database connection string, used when no URL is given
    #[arg(long, env = "STORE_CREDENTIALS_PATH")]
    pub credentials_path: Option<PathBuf>,

    /// Namespace of every document written by this instance
    #[arg(long, env = "STORE_PROJECT_ID", default_value = "default")]
    pub project_id: String,
}

/// Unrecognised values switch the flag off instead of aborting startup.
fn parse_flag(value: &str) -> Result<bool, Infallible> {
    Ok(matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "y" | "on"
    ))
}

impl ConfigurationHandler {
    pub fn parse_arguments() -> Self {
        Self::parse()
    }
}

impl Configuration for ConfigurationHandler {
    fn port(&self) -> u16 {
        self.port
    }

    fn environment(&self) -> String {
        self.environment.clone()
    }

    fn debug(&self) -> bool {
        self.debug
    }

    fn cors_origins(&self) -> Vec<String> {
        self.cors_origins
            .iter()
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect()
    }

    fn project_id(&self) -> String {
        self.project_id.clone()
    }

    fn database_url(&self) -> Result<Option<String>, ConfigError> {
        if let Some(database_url) = &self.database_url {
            return Ok(Some(database_url.clone()));
        }
        let Some(path) = &self.credentials_path else {
            return Ok(None);
        };

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadCredentials {
            path: path.clone(),
            source,
        })?;
        contents
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(|line| Some(line.to_string()))
            .ok_or_else(|| ConfigError::EmptyCredentials(path.clone()))
    }
}
