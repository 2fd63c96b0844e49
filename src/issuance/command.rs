//! External-program issuer
//!
//! Runs a configured command (typically certbot with a DNS plugin) and
//! picks the issued files up from its live directory.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use super::{output_dir_name, IssuanceProvider, IssuedFiles};
use crate::config::IssuerConfig;
use crate::errors::{KnoxError, Result};

const NAME_PLACEHOLDER: &str = "{name}";

#[derive(Debug, Clone)]
pub struct CommandIssuer {
    program: String,
    args: Vec<String>,
    live_dir: PathBuf,
}

impl CommandIssuer {
    pub fn new(program: impl Into<String>, args: Vec<String>, live_dir: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), args, live_dir: live_dir.into() }
    }

    pub fn from_config(config: &IssuerConfig) -> Result<Self> {
        let program = config
            .program
            .clone()
            .filter(|program| !program.trim().is_empty())
            .ok_or_else(|| KnoxError::config("issuer.program is required for the command issuer"))?;
        Ok(Self::new(program, config.args.clone(), config.live_dir.clone()))
    }

    fn render_args(&self, common_name: &str) -> Vec<String> {
        self.args.iter().map(|arg| arg.replace(NAME_PLACEHOLDER, common_name)).collect()
    }
}

#[async_trait]
impl IssuanceProvider for CommandIssuer {
    #[instrument(skip(self), fields(program = %self.program))]
    async fn issue(&self, common_name: &str) -> Result<IssuedFiles> {
        let args = self.render_args(common_name);
        debug!(args = ?args, "Running issuance command");

        let output = Command::new(&self.program).args(&args).output().await.map_err(|e| {
            KnoxError::generation_failed(common_name, format!("failed to run '{}': {}", self.program, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(KnoxError::generation_failed(
                common_name,
                format!("'{}' exited with {}: {}", self.program, output.status, stderr.trim()),
            ));
        }

        let files = IssuedFiles::in_dir(self.live_dir.join(output_dir_name(common_name)));
        for file in [&files.public, &files.chain, &files.private_key] {
            if tokio::fs::metadata(file).await.is_err() {
                return Err(KnoxError::generation_failed(
                    common_name,
                    format!("expected output {} was not produced", file.display()),
                ));
            }
        }

        info!(common_name = %common_name, dir = %self.live_dir.display(), "Issued certificate");
        Ok(files)
    }

    fn provider_name(&self) -> &'static str {
        "command"
    }
}
