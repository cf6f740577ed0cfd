//! Configuração unificada via TOML.
//!
//! Três seções: `[metrics]` (nome → caminho separado por pontos),
//! `[graphite]` (destino e intervalo) e `[collector]` (comando de amostragem
//! e políticas do loop). Campos ausentes usam o valor padrão.

use crate::protocol::DEFAULT_PORT;
use crate::types::MetricPath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Caminho padrão do arquivo de configuração.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/nvidia2graphite.conf";

/// Erros ao carregar a configuração.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Erro ao ler {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Erro ao parsear {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// O que fazer quando um caminho configurado não existe na GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPathPolicy {
    /// Ignora só a métrica
    #[default]
    SkipMetric,
    /// Não envia nada para essa GPU no ciclo
    SkipDevice,
    /// Encerra o processo
    Abort,
}

/// Como o intervalo entre ciclos é medido.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    /// Dorme o intervalo inteiro após cada ciclo (período = intervalo + amostragem)
    #[default]
    AfterSample,
    /// Dorme só o restante do intervalo medido a partir do início do ciclo
    FixedRate,
}

/// Destino Graphite.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphiteConfig {
    pub host: String,
    /// Porta do receptor plaintext
    pub port: u16,
    /// Prefixo de todas as métricas
    pub prefix: String,
    /// Intervalo entre amostragens em segundos
    pub interval: f64,
    /// Nó opcional entre prefixo e grupo (ex: hostname); vazio = omitido
    pub system_name: String,
    /// Timeout de conexão em segundos
    pub connect_timeout_secs: f64,
}

impl Default for GraphiteConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: DEFAULT_PORT,
            prefix: "nvidia".into(),
            interval: 10.0,
            system_name: String::new(),
            connect_timeout_secs: 2.0,
        }
    }
}

/// Ferramenta de diagnóstico e políticas do loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub command: String,
    pub args: Vec<String>,
    /// Tag dos nós de GPU no relatório
    pub device_tag: String,
    pub on_missing_path: MissingPathPolicy,
    pub cadence: Cadence,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            command: "nvidia-smi".into(),
            args: vec!["-q".into(), "-x".into()],
            device_tag: "gpu".into(),
            on_missing_path: MissingPathPolicy::default(),
            cadence: Cadence::default(),
        }
    }
}

/// Configuração raiz.
///
/// Aceita `[Metrics]`/`[Graphite]` (nomes do arquivo INI original) além das
/// formas minúsculas. Seção desconhecida é erro de parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Nome → caminho no relatório (ex: `gpu_temp = "temperature.gpu_temp"`)
    #[serde(alias = "Metrics")]
    pub metrics: BTreeMap<String, String>,
    #[serde(alias = "Graphite")]
    pub graphite: GraphiteConfig,
    #[serde(alias = "Collector")]
    pub collector: CollectorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let metrics = [
            ("gpu_util", "utilization.gpu_util"),
            ("mem_util", "utilization.memory_util"),
            ("mem_used", "fb_memory_usage.used"),
            ("mem_total", "fb_memory_usage.total"),
            ("gpu_temp", "temperature.gpu_temp"),
            ("power_draw", "power_readings.power_draw"),
            ("fan_speed", "fan_speed"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();

        Self {
            metrics,
            graphite: GraphiteConfig::default(),
            collector: CollectorConfig::default(),
        }
    }
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str::<AppConfig>(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Configuração carregada de {}", path.display());
        Ok(config)
    }

    /// Caminhos de métrica distintos, na ordem das chaves.
    pub fn metric_paths(&self) -> Vec<MetricPath> {
        let mut paths: Vec<MetricPath> = Vec::with_capacity(self.metrics.len());
        for raw in self.metrics.values() {
            let path = MetricPath::new(raw.trim());
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths
    }

    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.graphite.interval).unwrap_or_default()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.graphite.connect_timeout_secs).unwrap_or_default()
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.metrics.is_empty() {
            errors.push("Nenhuma métrica configurada em [metrics]".into());
        }
        for (name, raw) in &self.metrics {
            if MetricPath::new(raw.trim()).has_empty_segment() {
                errors.push(format!("Caminho inválido para '{name}': '{raw}'"));
            }
        }
        if self.graphite.host.trim().is_empty() {
            errors.push("Host do Graphite não pode ser vazio".into());
        }
        if self.graphite.port == 0 {
            errors.push("Porta do Graphite não pode ser 0".into());
        }
        if !(self.graphite.interval.is_finite() && self.graphite.interval > 0.0) {
            errors.push(format!(
                "Intervalo inválido: {} (deve ser > 0)",
                self.graphite.interval
            ));
        }
        if !(self.graphite.connect_timeout_secs.is_finite()
            && self.graphite.connect_timeout_secs > 0.0)
        {
            errors.push(format!(
                "Timeout de conexão inválido: {} (deve ser > 0)",
                self.graphite.connect_timeout_secs
            ));
        }
        if self.collector.command.trim().is_empty() {
            errors.push("Comando do coletor não pode ser vazio".into());
        }
        if self.collector.device_tag.trim().is_empty() {
            errors.push("Tag de dispositivo não pode ser vazia".into());
        }

        errors
    }
}
