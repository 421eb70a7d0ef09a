//! Transports that submit planned queries to a backend.
//!
//! Every backend exposes SQL over HTTP on its control socket; most also ship a
//! SQL wrapper command. Both are driven as external commands (`curl` for the
//! socket) through a [`CommandRunner`], and both outputs are kept: the socket
//! answer and the wrapper answer can disagree when a member is degraded.

use crate::collaborators::CommandRunner;
use crate::models::{
    BackendId, CollectionChannel, CollectionResult, CollectionStatus, CommandLine, PlannedQuery,
};
use crate::registry::BackendConfig;
use crate::{CollectError, Result};
use serde::Serialize;

/// Database name LXD expects in socket payloads.
pub const LOCAL_DATABASE: &str = "local";

const JSON_CONTENT_TYPE: &str = "Content-Type: application/json";

#[derive(Debug, Serialize)]
struct SqlRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<&'static str>,
}

/// A command ready to run, plus where its output is filed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: CommandLine,
    pub suggested_filename: String,
    pub channel: CollectionChannel,
}

/// JSON body POSTed to the control socket.
///
/// # Errors
/// Returns a serialization error if the payload cannot be encoded.
pub fn socket_payload(backend: &BackendConfig, query: &str) -> Result<String> {
    let request = SqlRequest {
        query,
        database: backend
            .capabilities
            .socket_requires_database
            .then_some(LOCAL_DATABASE),
    };
    serde_json::to_string(&request)
        .map_err(|e| CollectError::serialization(format!("{} socket payload", backend.id), e))
}

/// The `curl --unix-socket` invocation for one query.
///
/// # Errors
/// Returns a serialization error if the payload cannot be encoded.
pub fn socket_invocation(backend: &BackendConfig, planned: &PlannedQuery) -> Result<Invocation> {
    let payload = socket_payload(backend, &planned.query)?;
    let command = CommandLine::new("curl")
        .arg("-s")
        .arg("--unix-socket")
        .arg(backend.socket_path.to_string_lossy())
        .args(["-X", "POST"])
        .arg(backend.socket_endpoint.as_str())
        .args(["-H", JSON_CONTENT_TYPE])
        .arg("-d")
        .arg(payload);

    Ok(Invocation {
        command,
        suggested_filename: format!("{}_dqlite_{}", backend.id, planned.label),
        channel: CollectionChannel::Socket,
    })
}

/// The SQL wrapper invocation for one query, if the backend ships a wrapper.
///
/// The query text is passed as a single trailing argument.
pub fn cli_invocation(backend: &BackendConfig, planned: &PlannedQuery) -> Option<Invocation> {
    let sql_cmd = backend.sql_cmd.as_deref()?;
    let command = CommandLine::from_prefix(sql_cmd)?.arg(planned.query.as_str());

    Some(Invocation {
        command,
        suggested_filename: format!("{}_{}", sql_cmd, planned.label),
        channel: CollectionChannel::CliWrapper,
    })
}

/// Runs one invocation and turns whatever happened into a result.
///
/// Runner errors become a failed status; they never propagate.
pub async fn execute(
    runner: &dyn CommandRunner,
    backend: BackendId,
    invocation: Invocation,
) -> CollectionResult {
    let Invocation {
        command,
        suggested_filename,
        channel,
    } = invocation;

    tracing::debug!(%backend, command = %command, "Running command");

    let (output, status) = match runner.run(&command).await {
        Ok(output) if output.success() => (output.stdout, CollectionStatus::Succeeded),
        Ok(output) => {
            tracing::warn!(
                %backend,
                file = %suggested_filename,
                exit_code = ?output.exit_code,
                "Command exited unsuccessfully"
            );
            (
                output.stdout,
                CollectionStatus::NonZeroExit {
                    exit_code: output.exit_code,
                },
            )
        }
        Err(CollectError::CommandTimeout { timeout_secs, .. }) => {
            tracing::warn!(%backend, file = %suggested_filename, timeout_secs, "Command timed out");
            (String::new(), CollectionStatus::TimedOut { timeout_secs })
        }
        Err(e) => {
            tracing::warn!(%backend, file = %suggested_filename, error = %e, "Command failed");
            (
                String::new(),
                CollectionStatus::Failed {
                    reason: e.to_string(),
                },
            )
        }
    };

    CollectionResult::from_command(backend, &command, channel, suggested_filename, output, status)
}

/// Submits one planned query through the socket and, when enabled, the SQL
/// wrapper.
///
/// The wrapper runs even when the socket call failed.
///
/// # Errors
/// Returns a serialization error if the socket payload cannot be encoded.
pub async fn execute_query(
    runner: &dyn CommandRunner,
    backend: &BackendConfig,
    planned: &PlannedQuery,
    use_cli_transport: bool,
) -> Result<Vec<CollectionResult>> {
    let mut results = Vec::with_capacity(2);

    let socket = socket_invocation(backend, planned)?;
    results.push(execute(runner, backend.id, socket).await);

    if use_cli_transport
        && let Some(cli) = cli_invocation(backend, planned)
    {
        results.push(execute(runner, backend.id, cli).await);
    }

    Ok(results)
}
