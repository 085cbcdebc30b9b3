pub mod cancel;
pub mod config;
pub mod decide;
pub mod inbox;
pub mod migrate;
pub mod new_credit;
pub mod new_mail;
pub mod seed;
pub mod show;
pub mod submit;

use std::future::Future;

use parapheur_core::config::{AppConfig, LoadOptions};
use parapheur_core::Request;
use parapheur_db::{connect_with_settings, DbPool, RequestRepository, ServiceError,
    SqlRequestRepository};
use serde::Serialize;

/// Every subcommand resolves to a JSON status payload on stdout plus a
/// process exit code, so scripts can branch without parsing prose.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome<'a> {
    command: &'a str,
    status: &'a str,
    error_class: Option<&'a str>,
    message: &'a str,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self { exit_code: 0, output: render(command, "ok", None, &message.into()) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self { exit_code, output: render(command, "error", Some(error_class), &message.into()) }
    }
}

fn render(command: &str, status: &str, error_class: Option<&str>, message: &str) -> String {
    let payload = CommandOutcome { command, status, error_class, message };
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) type CommandError = (&'static str, String, u8);

/// Shared command scaffolding: load config, spin up a current-thread
/// runtime, open the pool, run the body and close the pool again.
pub(crate) fn with_pool<F, Fut>(command: &str, body: F) -> CommandResult
where
    F: FnOnce(DbPool, AppConfig) -> Fut,
    Fut: Future<Output = Result<String, CommandError>>,
{
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                command,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        let output = body(pool.clone(), config.clone()).await;
        pool.close().await;
        output
    });

    match result {
        Ok(message) => CommandResult::success(command, message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure(command, error_class, message, exit_code)
        }
    }
}

pub(crate) fn classify_service_error(error: ServiceError) -> CommandError {
    match error {
        ServiceError::Workflow(error) => ("workflow_rule", error.to_string(), 7),
        ServiceError::Repository(error) => ("storage", error.to_string(), 5),
        ServiceError::Database(error) => ("storage", error.to_string(), 5),
        ServiceError::Sequence(error) => ("sequence", error.to_string(), 5),
        ServiceError::RequestNotFound(_) | ServiceError::ApprovalNotFound(_) => {
            ("not_found", error.to_string(), 6)
        }
        ServiceError::NothingPending(_) => ("nothing_pending", error.to_string(), 6),
    }
}

/// Requests are addressed by their public reference on the command line.
pub(crate) async fn resolve_reference(
    pool: &DbPool,
    reference: &str,
) -> Result<Request, CommandError> {
    let requests = SqlRequestRepository::new(pool.clone());
    requests
        .find_by_reference(reference)
        .await
        .map_err(|error| ("storage", error.to_string(), 5u8))?
        .ok_or_else(|| ("not_found", format!("no request with reference `{reference}`"), 6u8))
}

#[cfg(test)]
mod tests {
    use parapheur_db::ServiceError;

    use super::classify_service_error;

    #[test]
    fn connection_failures_map_to_the_storage_class() {
        let (class, _, exit_code) =
            classify_service_error(ServiceError::Database(sqlx::Error::PoolClosed));
        assert_eq!(class, "storage");
        assert_eq!(exit_code, 5);
    }

    #[test]
    fn missing_requests_map_to_not_found() {
        let (class, message, exit_code) =
            classify_service_error(ServiceError::RequestNotFound("CRD/2026/0009".to_string()));
        assert_eq!(class, "not_found");
        assert!(message.contains("CRD/2026/0009"));
        assert_eq!(exit_code, 6);
    }
}
