//! Protocolo plaintext do Graphite (carbon).
//!
//! Uma linha por métrica:
//!
//! ```text
//! <prefix>[.<system_name>].<grupo>.<métrica> <valor> <timestamp>\n
//! ```
//!
//! - Componentes vazios do caminho são omitidos
//! - Espaços, `/`, `\`, `(` e `)` no nome da métrica viram `_`
//! - Um único timestamp (segundos Unix) por lote

use crate::types::SampleSet;
use std::time::{SystemTime, UNIX_EPOCH};

/// Porta padrão do receptor plaintext do carbon.
pub const DEFAULT_PORT: u16 = 2003;

/// Erros do protocolo.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Valor vazio para a métrica '{0}'")]
    EmptyValue(String),

    #[error("Valor inválido para a métrica '{metric}': {value:?}")]
    InvalidValue { metric: String, value: String },
}

/// Substitui caracteres que quebram o caminho Graphite.
pub fn clean_metric_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | '(' | ')' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

/// Junta componentes com `.`, ignorando vazios e pontos nas bordas.
pub fn join_path(components: &[&str]) -> String {
    components
        .iter()
        .map(|c| c.trim().trim_matches('.'))
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// Timestamp Unix em segundos.
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Codifica um lote em linhas plaintext sob o caminho `base`.
///
/// Retorna string vazia para lote vazio.
pub fn encode_batch(
    base: &str,
    samples: &SampleSet,
    timestamp: u64,
) -> Result<String, ProtocolError> {
    let mut message = String::new();

    for (metric, value) in samples.iter() {
        let value = value.trim();
        if value.is_empty() {
            return Err(ProtocolError::EmptyValue(metric.to_owned()));
        }
        if value.chars().any(char::is_whitespace) {
            return Err(ProtocolError::InvalidValue {
                metric: metric.to_owned(),
                value: value.to_owned(),
            });
        }

        let path = join_path(&[base, &clean_metric_name(metric)]);
        message.push_str(&format!("{path} {value} {timestamp}\n"));
    }

    Ok(message)
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MetricPath;

    fn sample_set() -> SampleSet {
        let mut set = SampleSet::new();
        set.insert(&MetricPath::new("temperature.gpu_temp"), "45");
        set.insert(&MetricPath::new("power_readings.power_draw"), "12.50");
        set
    }

    #[test]
    fn encodes_one_line_per_metric() {
        let base = join_path(&["nvidia", "", "gpu1"]);
        let message = encode_batch(&base, &sample_set(), 1_700_000_000).unwrap();
        assert_eq!(
            message,
            "nvidia.gpu1.power_readings.power_draw 12.50 1700000000\n\
             nvidia.gpu1.temperature.gpu_temp 45 1700000000\n"
        );
    }

    #[test]
    fn join_skips_empty_components() {
        assert_eq!(join_path(&["nvidia.", "node01", "gpu2"]), "nvidia.node01.gpu2");
        assert_eq!(join_path(&["", "", "gpu1"]), "gpu1");
        assert_eq!(join_path(&[]), "");
    }

    #[test]
    fn cleans_metric_names() {
        assert_eq!(clean_metric_name("clocks (MHz)/sm"), "clocks__MHz__sm");
        assert_eq!(clean_metric_name("fan_speed"), "fan_speed");
    }

    #[test]
    fn empty_batch_is_empty_message() {
        assert_eq!(encode_batch("nvidia.gpu1", &SampleSet::new(), 1).unwrap(), "");
    }

    #[test]
    fn rejects_values_with_whitespace() {
        let mut set = SampleSet::new();
        set.insert(&MetricPath::new("x"), "1 2");
        assert!(matches!(
            encode_batch("p", &set, 1),
            Err(ProtocolError::InvalidValue { .. })
        ));

        let mut set = SampleSet::new();
        set.insert(&MetricPath::new("x"), " ");
        assert_eq!(
            encode_batch("p", &set, 1),
            Err(ProtocolError::EmptyValue("x".into()))
        );
    }
}
