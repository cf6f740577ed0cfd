//! Tipos compartilhados entre extração e envio.

use std::collections::BTreeMap;
use std::fmt;

/// Prefixo do rótulo de grupo de cada GPU (`gpu1`, `gpu2`…).
pub const GROUP_PREFIX: &str = "gpu";

// ──────────────────────────────────────────────
// Caminho de métrica
// ──────────────────────────────────────────────

/// Caminho separado por pontos até uma folha do relatório
/// (ex: `fb_memory_usage.used`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricPath(String);

impl MetricPath {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Segmentos na ordem de navegação.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// `true` se algum segmento for vazio (`a..b`, `.a`, `a.`).
    pub fn has_empty_segment(&self) -> bool {
        self.segments().any(|s| s.trim().is_empty())
    }
}

impl fmt::Display for MetricPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ──────────────────────────────────────────────
// Conjunto de amostras
// ──────────────────────────────────────────────

/// Mapa plano caminho → valor numérico extraído, de uma GPU em um ciclo.
///
/// Os valores são mantidos como texto exatamente como extraídos
/// (`"12.50"` continua `"12.50"`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleSet {
    values: BTreeMap<String, String>,
}

impl SampleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &MetricPath, value: impl Into<String>) {
        self.values.insert(path.as_str().to_owned(), value.into());
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.values.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

// ──────────────────────────────────────────────
// Amostra por dispositivo
// ──────────────────────────────────────────────

/// Amostras de uma GPU, numerada a partir de 1 na ordem do documento.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSample {
    pub index: u32,
    pub samples: SampleSet,
}

impl DeviceSample {
    pub fn group(&self) -> String {
        group_label(self.index)
    }
}

/// Rótulo de grupo para a GPU de número `index`.
pub fn group_label(index: u32) -> String {
    format!("{GROUP_PREFIX}{index}")
}
