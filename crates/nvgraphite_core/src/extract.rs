//! Extração de métricas de um nó de GPU.
//!
//! Cada caminho configurado é navegado filho a filho (tag exata, primeiro
//! match) até uma folha; do texto da folha sai o primeiro token numérico.
//! Folha sem número → métrica omitida sem aviso.

use crate::config::MissingPathPolicy;
use crate::report::ReportNode;
use crate::types::{MetricPath, SampleSet};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Dígitos, opcionalmente seguidos de ponto decimal e mais dígitos.
static NUMERIC_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("regex estática válida"));

/// Erros de extração.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("Caminho '{path}' não encontrado (segmento '{segment}' ausente)")]
    PathNotFound { path: String, segment: String },
}

/// Primeiro token numérico do texto (`"45 C"` → `"45"`).
pub fn numeric_token(text: &str) -> Option<&str> {
    NUMERIC_TOKEN.find(text).map(|m| m.as_str())
}

/// Navega `path` a partir de `device`.
pub fn resolve_path<'a>(
    device: &'a ReportNode,
    path: &MetricPath,
) -> Result<&'a ReportNode, ExtractError> {
    let mut current = device;
    for segment in path.segments() {
        current = current
            .find_child(segment)
            .ok_or_else(|| ExtractError::PathNotFound {
                path: path.to_string(),
                segment: segment.to_owned(),
            })?;
    }
    Ok(current)
}

/// Nós filhos de `report` cuja tag é `device_tag`, numerados a partir de 1
/// na ordem do documento.
pub fn devices<'a>(
    report: &'a ReportNode,
    device_tag: &'a str,
) -> impl Iterator<Item = (u32, &'a ReportNode)> + 'a {
    report
        .children
        .iter()
        .filter(move |c| c.tag == device_tag)
        .zip(1u32..)
        .map(|(node, index)| (index, node))
}

/// Monta o [`SampleSet`] de uma GPU tentando todos os caminhos.
///
/// - `Ok(Some(set))` – amostras extraídas (possivelmente vazio)
/// - `Ok(None)` – GPU descartada pela política `SkipDevice`
/// - `Err(_)` – caminho ausente com política `Abort`
pub fn extract_device(
    device: &ReportNode,
    metrics: &[MetricPath],
    policy: MissingPathPolicy,
) -> Result<Option<SampleSet>, ExtractError> {
    let mut samples = SampleSet::new();

    for path in metrics {
        let leaf = match resolve_path(device, path) {
            Ok(leaf) => leaf,
            Err(e) => match policy {
                MissingPathPolicy::SkipMetric => {
                    warn!("{e}; métrica ignorada");
                    continue;
                }
                MissingPathPolicy::SkipDevice => {
                    warn!("{e}; GPU ignorada neste ciclo");
                    return Ok(None);
                }
                MissingPathPolicy::Abort => return Err(e),
            },
        };

        match numeric_token(&leaf.text) {
            Some(value) => samples.insert(path, value),
            None => debug!("Sem valor numérico em {path}: {:?}", leaf.text),
        }
    }

    Ok(Some(samples))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gpu(temp: &str, used: &str) -> ReportNode {
        ReportNode::new("gpu")
            .with_child(
                ReportNode::new("temperature")
                    .with_child(ReportNode::new("gpu_temp").with_text(temp)),
            )
            .with_child(
                ReportNode::new("fb_memory_usage")
                    .with_child(ReportNode::new("used").with_text(used)),
            )
    }

    fn paths(raw: &[&str]) -> Vec<MetricPath> {
        raw.iter().map(|p| MetricPath::new(*p)).collect()
    }

    #[test]
    fn numeric_token_takes_first_number() {
        assert_eq!(numeric_token("45 C"), Some("45"));
        assert_eq!(numeric_token("12.50 W"), Some("12.50"));
        assert_eq!(numeric_token("P0 state 3"), Some("0"));
        assert_eq!(numeric_token("7."), Some("7"));
        assert_eq!(numeric_token("N/A"), None);
        assert_eq!(numeric_token(""), None);
    }

    #[test]
    fn extracts_all_configured_paths() {
        let dev = gpu("45 C", "512 MiB");
        let set = extract_device(
            &dev,
            &paths(&["temperature.gpu_temp", "fb_memory_usage.used"]),
            MissingPathPolicy::Abort,
        )
        .unwrap()
        .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("temperature.gpu_temp"), Some("45"));
        assert_eq!(set.get("fb_memory_usage.used"), Some("512"));
    }

    #[test]
    fn non_numeric_leaf_is_omitted_silently() {
        let dev = gpu("N/A", "512 MiB");
        let set = extract_device(
            &dev,
            &paths(&["temperature.gpu_temp", "fb_memory_usage.used"]),
            MissingPathPolicy::Abort,
        )
        .unwrap()
        .unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.get("temperature.gpu_temp").is_none());
    }

    #[test]
    fn missing_path_reports_segment() {
        let dev = gpu("45 C", "512 MiB");
        let err = resolve_path(&dev, &MetricPath::new("temperature.memory_temp")).unwrap_err();
        assert_eq!(
            err,
            ExtractError::PathNotFound {
                path: "temperature.memory_temp".into(),
                segment: "memory_temp".into(),
            }
        );
    }

    #[test]
    fn missing_path_policies() {
        let dev = gpu("45 C", "512 MiB");
        let metrics = paths(&["power_readings.power_draw", "temperature.gpu_temp"]);

        let set = extract_device(&dev, &metrics, MissingPathPolicy::SkipMetric)
            .unwrap()
            .unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("temperature.gpu_temp"), Some("45"));

        assert_eq!(
            extract_device(&dev, &metrics, MissingPathPolicy::SkipDevice).unwrap(),
            None
        );

        assert!(matches!(
            extract_device(&dev, &metrics, MissingPathPolicy::Abort),
            Err(ExtractError::PathNotFound { .. })
        ));
    }

    #[test]
    fn devices_are_numbered_in_document_order() {
        let report = ReportNode::new("nvidia_smi_log")
            .with_child(ReportNode::new("timestamp").with_text("now"))
            .with_child(gpu("40 C", "1 MiB"))
            .with_child(ReportNode::new("attached_gpus").with_text("2"))
            .with_child(gpu("50 C", "2 MiB"));

        let found: Vec<_> = devices(&report, "gpu")
            .map(|(i, node)| (i, node.find_child("temperature").unwrap().children[0].text.clone()))
            .collect();
        assert_eq!(found, vec![(1, "40 C".to_string()), (2, "50 C".to_string())]);
    }
}
