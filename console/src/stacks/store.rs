//! Stack definition store
//!
//! Stack definitions are persisted by the console's configuration layer as
//! one directory per stack under the stacks root, each holding a
//! `stack.json` with the definition text blobs. This subsystem reads
//! definitions and materializes the compose files to disk before a deploy;
//! it never authors them.

use serde::{Deserialize, Serialize};

use crate::errors::ConsoleError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::models::stack::Stack;

/// Persisted stack definition blob
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StackDefinition {
    /// Display name
    name: String,

    /// Compose declaration text
    compose_content: String,

    /// Environment file text
    #[serde(default)]
    env_content: String,
}

/// Filesystem-backed stack definition store
#[derive(Debug, Clone)]
pub struct StackStore {
    root: Dir,
}

impl StackStore {
    /// Create a store rooted at the stacks directory
    pub fn new(root: Dir) -> Self {
        Self { root }
    }

    /// Whether a stack id is safe to use as a directory name
    pub fn valid_id(id: &str) -> bool {
        !id.is_empty()
            && id.len() <= 64
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    /// Load every stack definition under the root
    pub async fn load_all(&self) -> Result<Vec<Stack>, ConsoleError> {
        if !self.root.exists().await {
            return Ok(Vec::new());
        }

        let mut stacks = Vec::new();
        for dir in self.root.list_dirs().await? {
            let id = match dir.file_name().and_then(|n| n.to_str()) {
                Some(name) if Self::valid_id(name) => name.to_string(),
                _ => continue,
            };
            match self.load_one(&id, dir.clone()).await {
                Ok(stack) => stacks.push(stack),
                Err(e) => {
                    tracing::warn!("Skipping unreadable stack {}: {}", id, e);
                }
            }
        }
        Ok(stacks)
    }

    /// Load a single stack definition by id
    pub async fn get(&self, id: &str) -> Result<Stack, ConsoleError> {
        if !Self::valid_id(id) {
            return Err(ConsoleError::InvalidRequest(format!(
                "Invalid stack id: {}",
                id
            )));
        }

        let dir = self.root.path().join(id);
        let definition_file = File::new(dir.join("stack.json"));
        if !definition_file.exists().await {
            return Err(ConsoleError::NotFound(format!("Unknown stack: {}", id)));
        }

        self.load_one(id, dir).await
    }

    async fn load_one(&self, id: &str, dir: std::path::PathBuf) -> Result<Stack, ConsoleError> {
        let definition: StackDefinition = File::new(dir.join("stack.json")).read_json().await?;

        Ok(Stack {
            id: id.to_string(),
            name: definition.name,
            compose_content: definition.compose_content,
            env_content: definition.env_content,
            path: dir,
        })
    }

    /// Write the compose and env files into the stack directory so the
    /// compose tool picks them up. Called inside a locked deploy session.
    pub async fn materialize(&self, stack: &Stack) -> Result<(), ConsoleError> {
        let compose_file = File::new(stack.path.join("compose.yaml"));
        compose_file
            .write_atomic(stack.compose_content.as_bytes())
            .await?;

        let env_file = File::new(stack.path.join(".env"));
        if stack.env_content.is_empty() {
            env_file.delete().await?;
        } else {
            env_file.write_atomic(stack.env_content.as_bytes()).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_validation_rejects_path_tricks() {
        assert!(StackStore::valid_id("media"));
        assert!(StackStore::valid_id("media_2"));
        assert!(StackStore::valid_id("media-prod"));
        assert!(!StackStore::valid_id(""));
        assert!(!StackStore::valid_id("../etc"));
        assert!(!StackStore::valid_id("a/b"));
        assert!(!StackStore::valid_id("a b"));
    }
}
