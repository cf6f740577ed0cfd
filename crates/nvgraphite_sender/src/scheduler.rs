//! Loop principal: amostrar → extrair → enviar → esperar.
//!
//! Tudo sequencial em uma thread. A conexão com o Graphite é criada na
//! primeira GPU processada e mantida pelo resto do processo. Se a conexão
//! falhar, o restante do ciclo não envia nada e a tentativa se repete no
//! próximo ciclo.

use crate::forwarder::{Connector, MetricSink};
use crate::sampler::ReportSource;
use nvgraphite_core::config::{AppConfig, Cadence, MissingPathPolicy};
use nvgraphite_core::extract::{ExtractError, devices, extract_device};
use nvgraphite_core::types::{DeviceSample, MetricPath};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Parâmetros fixos do loop.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub metrics: Vec<MetricPath>,
    pub device_tag: String,
    pub on_missing_path: MissingPathPolicy,
    pub cadence: Cadence,
    pub interval: Duration,
}

impl SchedulerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            metrics: config.metric_paths(),
            device_tag: config.collector.device_tag.clone(),
            on_missing_path: config.collector.on_missing_path,
            cadence: config.collector.cadence,
            interval: config.interval(),
        }
    }
}

/// Resultado de um ciclo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterationSummary {
    /// GPUs encontradas no relatório
    pub devices: u32,
    /// Lotes enviados (ou formatados, em dry-run)
    pub sent: u32,
    /// GPUs sem envio (política ou sem conexão)
    pub skipped: u32,
    pub failed: u32,
    /// Houve tentativa de conexão neste ciclo
    pub connect_attempted: bool,
}

/// Dono da fonte de relatórios e da conexão com o Graphite.
pub struct Scheduler<S: ReportSource, C: Connector> {
    source: S,
    connector: C,
    settings: SchedulerSettings,
    sink: Option<C::Sink>,
}

impl<S: ReportSource, C: Connector> Scheduler<S, C> {
    pub fn new(source: S, connector: C, settings: SchedulerSettings) -> Self {
        Self {
            source,
            connector,
            settings,
            sink: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.sink.is_some()
    }

    /// Roda para sempre. Só retorna com caminho ausente e política `abort`.
    pub fn run(&mut self) -> Result<(), ExtractError> {
        loop {
            let cycle_start = Instant::now();
            self.tick()?;

            let pause = sleep_duration(
                self.settings.cadence,
                self.settings.interval,
                cycle_start.elapsed(),
            );
            std::thread::sleep(pause);
        }
    }

    /// Um ciclo completo de SAMPLING.
    pub fn tick(&mut self) -> Result<IterationSummary, ExtractError> {
        let mut summary = IterationSummary::default();

        let report = match self.source.sample() {
            Ok(report) => report,
            Err(e) => {
                error!("{e}");
                warn!(
                    "Nova tentativa em {:.1} segundos.",
                    self.settings.interval.as_secs_f64()
                );
                return Ok(summary);
            }
        };

        for (index, device) in devices(&report, &self.settings.device_tag) {
            summary.devices += 1;

            let Some(samples) =
                extract_device(device, &self.settings.metrics, self.settings.on_missing_path)?
            else {
                summary.skipped += 1;
                continue;
            };

            let sample = DeviceSample { index, samples };
            let group = sample.group();
            debug!("{group}: {} métrica(s) extraída(s)", sample.samples.len());

            // Uma tentativa de conexão por ciclo, no máximo
            if !self.is_connected() && !summary.connect_attempted {
                summary.connect_attempted = true;
                match self.connector.connect() {
                    Ok(sink) => {
                        info!("Conectado ao Graphite em {}", self.connector.target());
                        self.sink = Some(sink);
                    }
                    Err(e) => {
                        error!("{e}");
                        warn!(
                            "Nova tentativa em {:.1} segundos.",
                            self.settings.interval.as_secs_f64()
                        );
                    }
                }
            }

            let Some(sink) = self.sink.as_mut() else {
                summary.skipped += 1;
                continue;
            };

            match sink.send_batch(&sample) {
                Ok(report) => {
                    summary.sent += 1;
                    debug!("envio={report}");
                }
                Err(e) => {
                    summary.failed += 1;
                    error!("{group}: {e}");
                }
            }
        }

        if summary.devices == 0 {
            warn!("Nenhuma GPU (<{}>) no relatório", self.settings.device_tag);
        } else {
            info!(
                "→ {} GPU(s) | {} lote(s) enviados | {} ignorada(s) | {} falha(s)",
                summary.devices, summary.sent, summary.skipped, summary.failed
            );
        }

        Ok(summary)
    }
}

/// Tempo de espera após um ciclo que levou `elapsed`.
pub fn sleep_duration(cadence: Cadence, interval: Duration, elapsed: Duration) -> Duration {
    match cadence {
        Cadence::AfterSample => interval,
        Cadence::FixedRate => interval.saturating_sub(elapsed),
    }
}
