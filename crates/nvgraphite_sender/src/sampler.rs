//! Amostragem via ferramenta de diagnóstico (`nvidia-smi -q -x`).
//!
//! Executa o comando uma vez por ciclo, sem timeout, e faz o parsing do
//! XML de stdout.

use nvgraphite_core::config::CollectorConfig;
use nvgraphite_core::report::{ReportError, ReportNode, parse_report};
use std::process::Command;
use tracing::debug;

/// Erros de amostragem.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("Falha ao executar '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("'{command}' terminou com {status}: {stderr}")]
    ExitStatus {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Relatório inválido: {0}")]
    Report(#[from] ReportError),
}

/// Fonte de relatórios de GPU.
pub trait ReportSource {
    fn sample(&mut self) -> Result<ReportNode, SampleError>;
}

/// Executa um comando externo e lê o relatório de stdout.
pub struct CommandSampler {
    command: String,
    args: Vec<String>,
}

impl CommandSampler {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    pub fn from_config(config: &CollectorConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone())
    }

    /// Linha de comando completa, para logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn run(&self) -> Result<String, SampleError> {
        let output = Command::new(&self.command)
            .args(&self.args)
            .output()
            .map_err(|source| SampleError::Spawn {
                command: self.command_line(),
                source,
            })?;

        if !output.status.success() {
            return Err(SampleError::ExitStatus {
                command: self.command_line(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        debug!("{}: {} bytes em stdout", self.command, output.stdout.len());
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl ReportSource for CommandSampler {
    fn sample(&mut self) -> Result<ReportNode, SampleError> {
        let xml = self.run()?;
        Ok(parse_report(&xml)?)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str) -> CommandSampler {
        CommandSampler::new("sh", vec!["-c".into(), script.into()])
    }

    #[test]
    fn samples_report_from_stdout() {
        let mut sampler = shell(
            "echo '<nvidia_smi_log><gpu><temperature><gpu_temp>45 C</gpu_temp></temperature></gpu></nvidia_smi_log>'",
        );
        let report = sampler.sample().unwrap();
        assert_eq!(report.tag, "nvidia_smi_log");
        assert!(report.find_child("gpu").is_some());
    }

    #[test]
    fn missing_binary_is_spawn_error() {
        let mut sampler = CommandSampler::new("nvgraphite-no-such-tool", vec!["-q".into()]);
        match sampler.sample() {
            Err(SampleError::Spawn { command, .. }) => {
                assert_eq!(command, "nvgraphite-no-such-tool -q")
            }
            other => panic!("esperado Spawn, obtido {other:?}"),
        }
    }

    #[test]
    fn non_zero_exit_is_reported() {
        let mut sampler = shell("echo 'NVIDIA-SMI has failed' >&2; exit 9");
        match sampler.sample() {
            Err(SampleError::ExitStatus { stderr, .. }) => {
                assert_eq!(stderr, "NVIDIA-SMI has failed")
            }
            other => panic!("esperado ExitStatus, obtido {other:?}"),
        }
    }

    #[test]
    fn malformed_xml_is_report_error() {
        let mut sampler = shell("echo '<a><b></a>'");
        assert!(matches!(sampler.sample(), Err(SampleError::Report(_))));
    }

    #[test]
    fn command_line_from_default_config() {
        let sampler = CommandSampler::from_config(&CollectorConfig::default());
        assert_eq!(sampler.command_line(), "nvidia-smi -q -x");
    }
}
