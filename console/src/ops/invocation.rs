//! External command construction
//!
//! Maps a validated operation onto the package-manager or compose argv.

use std::path::PathBuf;

use crate::models::operation::OperationKind;
use crate::storage::settings::{ComposeSettings, PackageSettings};

/// A fully-resolved external command
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Program to execute
    pub program: String,

    /// Arguments
    pub args: Vec<String>,

    /// Working directory, if any
    pub current_dir: Option<PathBuf>,

    /// Extra environment variables
    pub env: Vec<(String, String)>,
}

impl Invocation {
    /// One-line rendering for logs and audit detail
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Build the package-manager invocation for a package operation kind
pub fn package_invocation(
    settings: &PackageSettings,
    kind: OperationKind,
    targets: &[String],
) -> Invocation {
    let mut args = Vec::new();

    if settings.assume_yes && kind != OperationKind::Refresh {
        args.push("-y".to_string());
    }

    match kind {
        OperationKind::Refresh => args.push("update".to_string()),
        OperationKind::Update => args.push("upgrade".to_string()),
        OperationKind::Install => {
            args.push("install".to_string());
            args.extend(targets.iter().cloned());
        }
        OperationKind::Remove => {
            args.push("remove".to_string());
            args.extend(targets.iter().cloned());
        }
        // Stack kinds never reach this builder
        _ => {}
    }

    Invocation {
        program: settings.manager.clone(),
        args,
        current_dir: None,
        env: vec![(
            "DEBIAN_FRONTEND".to_string(),
            "noninteractive".to_string(),
        )],
    }
}

/// Build the compose invocation for a stack operation kind
pub fn compose_invocation(
    settings: &ComposeSettings,
    kind: OperationKind,
    stack_path: &std::path::Path,
) -> Invocation {
    let mut argv = settings.command.clone();
    if argv.is_empty() {
        argv.push("docker".to_string());
        argv.push("compose".to_string());
    }

    match kind {
        OperationKind::StackDeploy => {
            argv.extend(["up", "-d", "--remove-orphans"].map(String::from));
        }
        OperationKind::StackStart => {
            argv.extend(["up", "-d"].map(String::from));
        }
        OperationKind::StackStop => {
            argv.push("stop".to_string());
        }
        OperationKind::StackRestart => {
            argv.push("restart".to_string());
        }
        // Package kinds never reach this builder
        _ => {}
    }

    let program = argv.remove(0);

    Invocation {
        program,
        args: argv,
        current_dir: Some(stack_path.to_path_buf()),
        env: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_includes_targets_and_assume_yes() {
        let invocation = package_invocation(
            &PackageSettings::default(),
            OperationKind::Install,
            &["nginx".to_string(), "curl".to_string()],
        );
        assert_eq!(invocation.program, "apt-get");
        assert_eq!(invocation.args, vec!["-y", "install", "nginx", "curl"]);
        assert!(invocation
            .env
            .iter()
            .any(|(k, v)| k == "DEBIAN_FRONTEND" && v == "noninteractive"));
    }

    #[test]
    fn refresh_never_gets_assume_yes() {
        let invocation =
            package_invocation(&PackageSettings::default(), OperationKind::Refresh, &[]);
        assert_eq!(invocation.args, vec!["update"]);
    }

    #[test]
    fn deploy_runs_compose_up_in_stack_dir() {
        let invocation = compose_invocation(
            &ComposeSettings::default(),
            OperationKind::StackDeploy,
            std::path::Path::new("/etc/bosun/stacks/media"),
        );
        assert_eq!(invocation.program, "docker");
        assert_eq!(invocation.args, vec!["compose", "up", "-d", "--remove-orphans"]);
        assert_eq!(
            invocation.current_dir.as_deref(),
            Some(std::path::Path::new("/etc/bosun/stacks/media"))
        );
    }

    #[test]
    fn stop_uses_compose_stop() {
        let invocation = compose_invocation(
            &ComposeSettings::default(),
            OperationKind::StackStop,
            std::path::Path::new("/tmp/s"),
        );
        assert_eq!(invocation.args, vec!["compose", "stop"]);
    }
}
