//! # nvidia2graphite
//!
//! Amostra as GPUs NVIDIA via `nvidia-smi -q -x` e envia as métricas
//! configuradas ao Graphite (protocolo plaintext), em intervalo fixo.
//!
//! ## Uso
//! ```bash
//! nvidia2graphite                          # /etc/nvidia2graphite.conf
//! nvidia2graphite -c ./nvidia2graphite.conf
//! nvidia2graphite --dryrun --debug         # Sem envio, log detalhado
//! ```

mod forwarder;
mod sampler;
mod scheduler;

use anyhow::{Context, Result, bail};
use clap::Parser;
use forwarder::{Connector, GraphiteConnector};
use nvgraphite_core::config::{AppConfig, DEFAULT_CONFIG_PATH};
use sampler::CommandSampler;
use scheduler::{Scheduler, SchedulerSettings};
use std::path::PathBuf;
use tracing::{debug, error};

#[derive(Parser, Debug)]
#[command(name = "nvidia2graphite", version)]
#[command(about = "Envia métricas de GPUs NVIDIA para o Graphite", long_about = None)]
struct Cli {
    /// Arquivo de configuração TOML
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Extrai e formata normalmente, mas não envia nada pela rede
    #[arg(short = 'n', long)]
    dryrun: bool,

    /// Log detalhado (nível debug) em stderr
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging ──
    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // ── Carregar config ──
    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("Não foi possível carregar {}", cli.config.display()))?;
    debug!("conf={config:?}");

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("{e}");
        }
        bail!("Configuração inválida ({} erro(s))", errors.len());
    }

    let settings = SchedulerSettings::from_config(&config);
    let sampler = CommandSampler::from_config(&config.collector);
    let connector =
        GraphiteConnector::from_config(&config.graphite, config.connect_timeout(), cli.dryrun);

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   ⚡ NVIDIA2GRAPHITE – ATIVO");
    println!("══════════════════════════════════════════════");
    println!("  Destino:   {}", connector.target());
    println!("  Prefixo:   {}", config.graphite.prefix);
    println!("  Intervalo: {:.1}s", config.graphite.interval);
    println!("  Métricas:  {}", settings.metrics.len());
    println!("  Coletor:   {}", sampler.command_line());
    println!("  Modo:      {}", if cli.dryrun { "dry-run" } else { "envio" });
    println!("══════════════════════════════════════════════");
    println!();

    // ── Loop principal ──
    let mut scheduler = Scheduler::new(sampler, connector, settings);
    scheduler
        .run()
        .context("Caminho de métrica ausente (on_missing_path = \"abort\")")?;

    Ok(())
}
