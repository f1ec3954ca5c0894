use testcontainers::TestcontainersError;
use thiserror::Error;

/// Failures from the disposable database fixtures.
#[derive(Debug, Error)]
pub enum TestInfraError {
    /// No container runtime, or the image never reported ready.
    #[error("failed to start {image} container: {source}")]
    Start {
        image: &'static str,
        #[source]
        source: TestcontainersError,
    },
    /// The container runs but its mapped host or port is unknown.
    #[error("failed to resolve container address: {0}")]
    Address(#[source] TestcontainersError),
}

pub type Result<T, E = TestInfraError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_failure_names_the_image() {
        let err = TestInfraError::Start {
            image: "postgres",
            source: TestcontainersError::other("docker socket not found"),
        };

        let message = err.to_string();
        assert!(message.starts_with("failed to start postgres container"), "{message}");
        assert!(message.contains("docker socket not found"), "{message}");
    }
}
