//! Container runtime collaborator
//!
//! Read-only projection of a stack's containers, obtained from the compose
//! CLI. Listing never acquires operation locks.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::errors::ConsoleError;
use crate::models::stack::{Stack, StackContainer};
use crate::storage::settings::ComposeSettings;

/// Container runtime collaborator interface
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// List the containers currently belonging to the stack
    async fn list_containers(&self, stack: &Stack) -> Result<Vec<StackContainer>, ConsoleError>;
}

/// Compose-CLI-backed runtime
pub struct ComposeRuntime {
    command: Vec<String>,
}

impl ComposeRuntime {
    /// Create a runtime using the configured compose argv prefix
    pub fn new(settings: &ComposeSettings) -> Self {
        let mut command = settings.command.clone();
        if command.is_empty() {
            command.push("docker".to_string());
            command.push("compose".to_string());
        }
        Self { command }
    }
}

#[async_trait]
impl ContainerRuntime for ComposeRuntime {
    async fn list_containers(&self, stack: &Stack) -> Result<Vec<StackContainer>, ConsoleError> {
        let mut argv = self.command.clone();
        argv.extend(["ps", "-a", "--format", "json"].map(String::from));

        debug!("Listing containers for stack {}: {}", stack.id, argv.join(" "));

        let output = Command::new(&argv[0])
            .args(&argv[1..])
            .current_dir(&stack.path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ConsoleError::RuntimeError(format!("compose ps failed: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConsoleError::RuntimeError(format!(
                "compose ps exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_compose_ps(&stdout))
    }
}

/// Parse `compose ps --format json` output.
///
/// Newer compose releases emit one JSON object per line; older ones emit a
/// single array. Unparseable records are skipped.
pub fn parse_compose_ps(output: &str) -> Vec<StackContainer> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let values: Vec<serde_json::Value> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).unwrap_or_default()
    } else {
        trimmed
            .lines()
            .filter_map(|line| serde_json::from_str(line.trim()).ok())
            .collect()
    };

    values.iter().filter_map(container_from_value).collect()
}

fn container_from_value(value: &serde_json::Value) -> Option<StackContainer> {
    let field = |keys: &[&str]| -> Option<String> {
        keys.iter()
            .find_map(|k| value.get(k).and_then(|v| v.as_str()))
            .map(str::to_string)
    };

    Some(StackContainer {
        service: field(&["Service", "service"])?,
        container_name: field(&["Name", "name"]).unwrap_or_default(),
        image: field(&["Image", "image"]).unwrap_or_default(),
        status: field(&["State", "state"]).unwrap_or_default(),
        ports: parse_ports(value),
    })
}

fn parse_ports(value: &serde_json::Value) -> Vec<String> {
    if let Some(publishers) = value.get("Publishers").and_then(|p| p.as_array()) {
        return publishers
            .iter()
            .filter_map(|p| {
                let target = p.get("TargetPort").and_then(|v| v.as_u64())?;
                let published = p.get("PublishedPort").and_then(|v| v.as_u64()).unwrap_or(0);
                let protocol = p
                    .get("Protocol")
                    .and_then(|v| v.as_str())
                    .unwrap_or("tcp");
                if published > 0 {
                    Some(format!("{}:{}/{}", published, target, protocol))
                } else {
                    Some(format!("{}/{}", target, protocol))
                }
            })
            .collect();
    }

    value
        .get("Ports")
        .and_then(|p| p.as_str())
        .map(|s| {
            s.split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_line_delimited_output() {
        let output = r#"{"Service":"web","Name":"media-web-1","Image":"nginx:latest","State":"running","Publishers":[{"TargetPort":80,"PublishedPort":8080,"Protocol":"tcp"}]}
{"Service":"db","Name":"media-db-1","Image":"postgres:16","State":"exited"}"#;

        let containers = parse_compose_ps(output);
        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].service, "web");
        assert!(containers[0].is_running());
        assert_eq!(containers[0].ports, vec!["8080:80/tcp"]);
        assert!(!containers[1].is_running());
    }

    #[test]
    fn parses_array_output() {
        let output = r#"[{"Service":"web","Name":"w","Image":"nginx","State":"running"}]"#;
        let containers = parse_compose_ps(output);
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].service, "web");
    }

    #[test]
    fn empty_output_is_no_containers() {
        assert!(parse_compose_ps("").is_empty());
        assert!(parse_compose_ps("\n").is_empty());
    }

    #[test]
    fn garbage_records_are_skipped() {
        let output = "not json\n{\"Service\":\"web\",\"State\":\"running\"}";
        let containers = parse_compose_ps(output);
        assert_eq!(containers.len(), 1);
    }
}
