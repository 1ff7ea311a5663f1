use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::process::Command;

use crate::dispatch::ActionResult;

/// Runs user scripts from the config `scripts/` directory (or an absolute
/// path). The captured text is always appended as the final argument.
pub struct ScriptRunner {
    scripts_dir: PathBuf,
}

impl ScriptRunner {
    pub fn new(scripts_dir: PathBuf) -> Self {
        Self { scripts_dir }
    }

    pub async fn run(
        &self,
        script_path: &str,
        arguments: &[String],
        source_text: &str,
    ) -> Result<ActionResult> {
        let path = self.resolve(script_path);
        if !path.exists() {
            bail!(
                "script not found: {} (looked in {})",
                script_path,
                self.scripts_dir.display()
            );
        }

        let mut args: Vec<String> = arguments.to_vec();
        args.push(source_text.to_string());

        info!("running script {}", path.display());

        let is_python = path.extension().and_then(|ext| ext.to_str()) == Some("py");
        let output = if is_python {
            let interpreter = if cfg!(windows) { "python" } else { "python3" };
            Command::new(interpreter)
                .env("PYTHONIOENCODING", "utf-8")
                .arg(&path)
                .args(&args)
                .output()
                .await
                .with_context(|| format!("failed to launch {interpreter}"))?
        } else {
            Command::new(&path)
                .args(&args)
                .output()
                .await
                .with_context(|| format!("failed to launch {}", path.display()))?
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("script exited with {}: {}", output.status, stderr.trim());
        }

        Ok(ActionResult {
            text: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            kind: "script".to_string(),
        })
    }

    fn resolve(&self, script_path: &str) -> PathBuf {
        let path = PathBuf::from(script_path);
        if path.is_absolute() {
            return path;
        }
        let under_scripts = self.scripts_dir.join(script_path);
        if under_scripts.exists() {
            under_scripts
        } else {
            path
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_script_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = ScriptRunner::new(dir.path().to_path_buf());
        let err = runner
            .run("does-not-exist.sh", &[], "text")
            .await
            .expect_err("missing script should fail");
        assert!(err.to_string().contains("script not found"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn script_receives_source_text_as_last_argument() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("echo-last.sh");
        std::fs::write(&script, "#!/bin/sh\nfor arg in \"$@\"; do last=\"$arg\"; done\nprintf '%s' \"$last\"\n")
            .expect("write script");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
            .expect("chmod script");

        let runner = ScriptRunner::new(dir.path().to_path_buf());
        let result = runner
            .run("echo-last.sh", &["first".into()], "captured words")
            .await
            .expect("script should run");
        assert_eq!(result.text, "captured words");
        assert_eq!(result.kind, "script");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_script_surfaces_stderr() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("fail.sh");
        std::fs::write(&script, "#!/bin/sh\necho 'boom' >&2\nexit 3\n").expect("write script");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
            .expect("chmod script");

        let runner = ScriptRunner::new(dir.path().to_path_buf());
        let err = runner
            .run("fail.sh", &[], "text")
            .await
            .expect_err("script should fail");
        assert!(err.to_string().contains("boom"));
    }
}
