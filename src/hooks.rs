//! Hook execution around engine entry points.
//!
//! Hooks are shell command strings from the config, run through `sh -c` so
//! pipes and redirection work.  A non-zero exit aborts the surrounding
//! operation.

use crate::config::Hooks;
use crate::engine::EngineError;
use tokio::process::Command;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    PreApply,
    PostApply,
    PreRollback,
    PostRollback,
}

impl HookPoint {
    pub fn name(&self) -> &'static str {
        match self {
            HookPoint::PreApply => "pre_apply",
            HookPoint::PostApply => "post_apply",
            HookPoint::PreRollback => "pre_rollback",
            HookPoint::PostRollback => "post_rollback",
        }
    }
}

/// Run the hook configured for `point`, if any.  No-op when unconfigured.
pub async fn run(hooks: &Hooks, point: HookPoint) -> Result<(), EngineError> {
    let command = match point {
        HookPoint::PreApply => hooks.pre_apply.as_deref(),
        HookPoint::PostApply => hooks.post_apply.as_deref(),
        HookPoint::PreRollback => hooks.pre_rollback.as_deref(),
        HookPoint::PostRollback => hooks.post_rollback.as_deref(),
    };
    let Some(command) = command else {
        return Ok(());
    };

    info!("running {} hook: {}", point.name(), command);
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .output()
        .await
        .map_err(|e| EngineError::HookFailed {
            name: point.name().to_string(),
            detail: e.to_string(),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        info!("hook output: {}", stdout.trim());
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(EngineError::HookFailed {
            name: point.name().to_string(),
            detail: stderr.trim().to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Hooks;

    fn hooks_with_pre_apply(cmd: &str) -> Hooks {
        Hooks {
            pre_apply: Some(cmd.to_string()),
            ..Hooks::default()
        }
    }

    #[tokio::test]
    async fn unconfigured_hook_is_noop() {
        run(&Hooks::default(), HookPoint::PreApply).await.unwrap();
    }

    #[tokio::test]
    async fn successful_hook_passes() {
        let hooks = hooks_with_pre_apply("true");
        run(&hooks, HookPoint::PreApply).await.unwrap();
    }

    #[tokio::test]
    async fn failing_hook_errors_with_name() {
        let hooks = hooks_with_pre_apply("echo boom >&2; exit 3");
        let err = run(&hooks, HookPoint::PreApply).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("pre_apply"));
        assert!(msg.contains("boom"));
    }

    #[tokio::test]
    async fn shell_features_are_available() {
        let hooks = hooks_with_pre_apply("echo one | grep one");
        run(&hooks, HookPoint::PreApply).await.unwrap();
    }
}
