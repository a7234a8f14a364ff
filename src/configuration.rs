use std::path::PathBuf;
use thiserror::Error;

pub const DEVELOPMENT: &str = "development";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read credentials file {path}: {source}")]
    ReadCredentials {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("credentials file {0} does not contain a connection string")]
    EmptyCredentials(PathBuf),
}

pub trait Configuration: Clone + Send + Sync + 'static {
    fn port(&self) -> u16;
    fn environment(&self) -> String;
    fn debug(&self) -> bool;
    fn cors_origins(&self) -> Vec<String>;
    fn project_id(&self) -> String;
    /// Connection string of the document database, if one is configured.
    fn database_url(&self) -> Result<Option<String>, ConfigError>;

    fn uses_mock_store(&self) -> bool {
        self.environment() == DEVELOPMENT
    }
}
