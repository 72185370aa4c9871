//! Generator adapter that delegates to an external helper process.
//!
//! The helper speaks newline-delimited JSON: one request on stdin, one
//! response on stdout, one process per call. Requests are tagged by `action`:
//!
//! ```text
//! {"action":"init","home_page_html":"…","ondemand_js":"…"}
//!   -> {"success":true,"attributes":{"key":"…","key_bytes":[…],…}}
//! {"action":"generate","home_page_html":"…","ondemand_js":"…","method":"GET","path":"/…"}
//!   -> {"success":true,"transaction_id":"…"}
//! ```
//!
//! Failures are reported as `{"success":false,"error":…}` where `error` is a
//! string or an object with a `message` field.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::generator::{AttributeValue, GeneratorFactory, TransactionGenerator};
use crate::types::{Document, TidError, TidResult};

/// Default time a helper gets to answer one request.
pub const DEFAULT_HELPER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum HelperRequest<'a> {
    Init {
        home_page_html: &'a str,
        ondemand_js: &'a str,
    },
    Generate {
        home_page_html: &'a str,
        ondemand_js: &'a str,
        method: &'a str,
        path: &'a str,
    },
}

#[derive(Debug, Deserialize)]
struct HelperResponse {
    success: bool,
    #[serde(default)]
    attributes: Option<Map<String, Value>>,
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    error: Option<Value>,
}

fn format_helper_error(error: Option<Value>) -> String {
    match error {
        Some(Value::String(s)) => s,
        Some(Value::Object(obj)) => match obj.get("message") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => serde_json::to_string(&obj).unwrap_or_else(|_| "Unknown error".to_string()),
        },
        Some(v) => v.to_string(),
        None => "Unknown error".to_string(),
    }
}

/// Program and arguments used to launch the helper.
#[derive(Debug, Clone)]
struct HelperCommand {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl HelperCommand {
    async fn call(&self, request: &HelperRequest<'_>) -> Result<HelperResponse, String> {
        let request_json = serde_json::to_string(request).map_err(|e| e.to_string())?;
        tracing::debug!(
            "Calling generator helper '{}' ({} byte request)",
            self.program,
            request_json.len()
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("failed to spawn '{}': {e}", self.program))?;

        // Requests exceed the pipe buffer, so the write runs alongside output
        // collection and both share one deadline.
        let stdin = child.stdin.take();
        let write_request = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(request_json.as_bytes()).await?;
                stdin.write_all(b"\n").await?;
            }
            Ok::<_, std::io::Error>(())
        };
        let exchange = async move { tokio::join!(write_request, child.wait_with_output()) };

        let (written, output) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| format!("helper timed out after {:?}", self.timeout))?;
        let output = output.map_err(|e| format!("failed to collect helper output: {e}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("helper exited with {}: {}", output.status, stderr.trim()));
        }
        if let Err(e) = written {
            tracing::debug!("Helper closed stdin before reading the full request: {e}");
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .map(str::trim)
            .find(|l| l.starts_with('{'))
            .ok_or_else(|| "no JSON response from helper".to_string())?;

        let response: HelperResponse =
            serde_json::from_str(line).map_err(|e| format!("malformed helper response: {e}"))?;

        if !response.success {
            return Err(format_helper_error(response.error));
        }
        Ok(response)
    }
}

/// Builds [`ExternalGenerator`]s by running a helper command.
#[derive(Debug, Clone)]
pub struct ExternalGeneratorFactory {
    command: HelperCommand,
}

impl ExternalGeneratorFactory {
    /// Helper launched as `program args...`.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: HelperCommand {
                program: program.into(),
                args,
                timeout: DEFAULT_HELPER_TIMEOUT,
            },
        }
    }

    /// Parse a whitespace-separated command line such as `python3 tid_helper.py`.
    pub fn from_command_line(command_line: &str) -> TidResult<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| TidError::Config("generator command is empty".to_string()))?;
        Ok(Self::new(program, parts.collect()))
    }

    /// Per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.command.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.command.program
    }

    pub fn args(&self) -> &[String] {
        &self.command.args
    }
}

#[async_trait(?Send)]
impl GeneratorFactory for ExternalGeneratorFactory {
    type Generator = ExternalGenerator;

    async fn build(&self, document: Document, ondemand_js: String) -> TidResult<ExternalGenerator> {
        let request = HelperRequest::Init {
            home_page_html: document.source(),
            ondemand_js: &ondemand_js,
        };
        let response = self
            .command
            .call(&request)
            .await
            .map_err(TidError::GeneratorConstruction)?;

        let attributes = response
            .attributes
            .unwrap_or_default()
            .into_iter()
            .map(|(name, value)| (name, AttributeValue::from(value)))
            .collect::<Vec<_>>();

        tracing::info!("Generator helper reported {} attributes", attributes.len());

        Ok(ExternalGenerator {
            command: self.command.clone(),
            document,
            ondemand_js,
            attributes,
        })
    }
}

/// Generator state held on this side of the helper boundary.
#[derive(Debug)]
pub struct ExternalGenerator {
    command: HelperCommand,
    document: Document,
    ondemand_js: String,
    attributes: Vec<(String, AttributeValue)>,
}

#[async_trait(?Send)]
impl TransactionGenerator for ExternalGenerator {
    async fn compute_transaction_id(&self, method: &str, path: &str) -> TidResult<String> {
        let request = HelperRequest::Generate {
            home_page_html: self.document.source(),
            ondemand_js: &self.ondemand_js,
            method,
            path,
        };
        let response = self
            .command
            .call(&request)
            .await
            .map_err(TidError::TransactionId)?;

        match response.transaction_id {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(TidError::TransactionId(
                "helper returned an empty transaction id".to_string(),
            )),
        }
    }

    fn attributes(&self) -> Vec<(String, AttributeValue)> {
        let mut attrs = Vec::with_capacity(self.attributes.len() + 1);
        attrs.push((
            "home_page_response".to_string(),
            AttributeValue::opaque("scraper::Html"),
        ));
        attrs.extend(self.attributes.iter().cloned());
        attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let req = HelperRequest::Generate {
            home_page_html: "<html>\n</html>",
            ondemand_js: "x",
            method: "GET",
            path: "/i/api",
        };
        let line = serde_json::to_string(&req).unwrap();
        assert!(line.starts_with(r#"{"action":"generate""#));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_format_helper_error() {
        assert_eq!(format_helper_error(Some(json!("boom"))), "boom");
        assert_eq!(format_helper_error(Some(json!({"message": "bad key"}))), "bad key");
        assert_eq!(format_helper_error(Some(json!({"code": 3}))), r#"{"code":3}"#);
        assert_eq!(format_helper_error(None), "Unknown error");
    }

    #[test]
    fn test_from_command_line() {
        let f = ExternalGeneratorFactory::from_command_line("python3  tid_helper.py --quiet").unwrap();
        assert_eq!(f.program(), "python3");
        assert_eq!(f.args(), ["tid_helper.py".to_string(), "--quiet".to_string()]);
        assert!(ExternalGeneratorFactory::from_command_line("   ").is_err());
    }
}
