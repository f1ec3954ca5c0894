use crate::{Result, TestInfraError};
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::ImageExt;
use testcontainers::{ContainerAsync, GenericImage};
use typed_builder::TypedBuilder;

const POSTGRES_IMAGE: &str = "postgres";
const POSTGRES_PORT: u16 = 5432;

#[derive(Debug, Clone, TypedBuilder)]
pub struct PostgresConfig {
    #[builder(default = "16-alpine".to_string(), setter(into))]
    tag: String,
    #[builder(default = "snip".to_string(), setter(into))]
    database: String,
    #[builder(default = "snip".to_string(), setter(into))]
    username: String,
    #[builder(default = "snip".to_string(), setter(into))]
    password: String,
}

/// Test fixture for a disposable PostgreSQL server.
///
/// The container is stopped when the fixture is dropped.
pub struct PostgresServer {
    container: ContainerAsync<GenericImage>,
    config: PostgresConfig,
}

impl PostgresServer {
    /// Starts a PostgreSQL container and waits until it accepts connections.
    pub async fn new(config: PostgresConfig) -> Result<Self> {
        // the entrypoint restarts the server after init; callers retry connects
        let container = GenericImage::new(POSTGRES_IMAGE, &config.tag)
            .with_exposed_port(POSTGRES_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stderr(
                "database system is ready to accept connections",
            ))
            .with_env_var("POSTGRES_DB", config.database.as_str())
            .with_env_var("POSTGRES_USER", config.username.as_str())
            .with_env_var("POSTGRES_PASSWORD", config.password.as_str())
            .start()
            .await
            .map_err(|source| TestInfraError::Start {
                image: POSTGRES_IMAGE,
                source,
            })?;

        Ok(Self { container, config })
    }

    pub async fn host(&self) -> Result<String> {
        self.container
            .get_host()
            .await
            .map(|host| host.to_string())
            .map_err(TestInfraError::Address)
    }

    pub async fn port(&self) -> Result<u16> {
        self.container
            .get_host_port_ipv4(POSTGRES_PORT)
            .await
            .map_err(TestInfraError::Address)
    }

    /// Returns a `postgres://` DSN for the container's database.
    pub async fn database_url(&self) -> Result<String> {
        let host = self.host().await?;
        let port = self.port().await?;
        Ok(format!(
            "postgres://{}:{}@{}:{}/{}",
            self.config.username, self.config.password, host, port, self.config.database
        ))
    }
}
