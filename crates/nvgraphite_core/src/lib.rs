//! # nvgraphite Core
//!
//! Crate compartilhada com a árvore do relatório do `nvidia-smi`, a extração
//! de métricas por caminho, a configuração TOML e o protocolo plaintext do
//! Graphite.
//!
//! ## Módulos
//! - [`types`] – Caminhos de métrica, conjuntos de amostras, rótulos de grupo
//! - [`report`] – Árvore do relatório XML e parsing via quick-xml
//! - [`extract`] – Navegação por caminho e extração do token numérico
//! - [`config`] – Configuração unificada via TOML
//! - [`protocol`] – Linhas `caminho valor timestamp` do Graphite

pub mod types;
pub mod report;
pub mod extract;
pub mod config;
pub mod protocol;

// Re-exports convenientes
pub use types::{DeviceSample, MetricPath, SampleSet};
pub use report::{ReportNode, parse_report};
pub use extract::{ExtractError, extract_device};
pub use config::{AppConfig, CollectorConfig, GraphiteConfig};
pub use protocol::{encode_batch, unix_timestamp};
