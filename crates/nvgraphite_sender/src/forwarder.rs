//! Envio de lotes ao Graphite via TCP plaintext.
//!
//! A conexão é aberta uma vez e reutilizada pelo resto do processo; não há
//! health check nem reconexão. Em dry-run nenhum socket é aberto e os lotes
//! são apenas formatados.

use nvgraphite_core::config::GraphiteConfig;
use nvgraphite_core::protocol::{ProtocolError, encode_batch, join_path, unix_timestamp};
use nvgraphite_core::types::DeviceSample;
use std::fmt;
use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

/// Trecho da mensagem mostrado no log de debug.
const PREVIEW_CHARS: usize = 75;

/// Erros de conexão e envio.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("Falha ao resolver {addr}: {source}")]
    Resolve {
        addr: String,
        source: std::io::Error,
    },

    #[error("Nenhum endereço para {0}")]
    NoAddress(String),

    #[error("Falha ao conectar em {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    #[error("Erro ao enviar para o Graphite: {0}")]
    Send(#[source] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Registro do que foi enviado em um lote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    pub group: String,
    pub lines: usize,
    pub bytes: usize,
    /// `false` em dry-run
    pub transmitted: bool,
    pub message: String,
}

impl fmt::Display for SendReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preview: String = self.message.chars().take(PREVIEW_CHARS).collect();
        let verb = if self.transmitted { "enviado" } else { "simulado" };
        write!(
            f,
            "{verb} {} bytes [{}, {} linha(s)]: {preview:?}",
            self.bytes, self.group, self.lines
        )
    }
}

/// Destino de lotes de métricas.
pub trait MetricSink {
    /// Envia o conjunto inteiro de uma GPU como um único lote, sob o grupo
    /// `gpu<N>` da amostra.
    fn send_batch(&mut self, device: &DeviceSample) -> Result<SendReport, ForwardError>;
}

/// Abre o [`MetricSink`] do processo.
pub trait Connector {
    type Sink: MetricSink;

    fn connect(&self) -> Result<Self::Sink, ForwardError>;

    /// Descrição do destino, para logs.
    fn target(&self) -> String;
}

// ──────────────────────────────────────────────
// Graphite TCP
// ──────────────────────────────────────────────

/// Parâmetros de conexão ao Graphite.
#[derive(Debug, Clone)]
pub struct GraphiteConnector {
    host: String,
    port: u16,
    prefix: String,
    system_name: String,
    timeout: Duration,
    dry_run: bool,
}

impl GraphiteConnector {
    pub fn from_config(config: &GraphiteConfig, timeout: Duration, dry_run: bool) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            prefix: config.prefix.clone(),
            system_name: config.system_name.clone(),
            timeout,
            dry_run,
        }
    }

    fn open(&self) -> Result<TcpStream, ForwardError> {
        let addr = self.target();
        let candidates = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|source| ForwardError::Resolve {
                addr: addr.clone(),
                source,
            })?;

        let mut last_err = None;
        for candidate in candidates {
            match TcpStream::connect_timeout(&candidate, self.timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!("Conexão com {candidate} falhou: {e}");
                    last_err = Some(e);
                }
            }
        }

        Err(match last_err {
            Some(source) => ForwardError::Connect { addr, source },
            None => ForwardError::NoAddress(addr),
        })
    }
}

impl Connector for GraphiteConnector {
    type Sink = GraphiteClient;

    fn connect(&self) -> Result<GraphiteClient, ForwardError> {
        let stream = if self.dry_run {
            None
        } else {
            Some(self.open()?)
        };

        Ok(GraphiteClient {
            stream,
            base: join_path(&[&self.prefix, &self.system_name]),
        })
    }

    fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Conexão viva com o Graphite (ou nenhuma, em dry-run).
#[derive(Debug)]
pub struct GraphiteClient {
    stream: Option<TcpStream>,
    /// `prefix[.system_name]`
    base: String,
}

impl MetricSink for GraphiteClient {
    fn send_batch(&mut self, device: &DeviceSample) -> Result<SendReport, ForwardError> {
        let group = device.group();
        let base = join_path(&[&self.base, &group]);
        let message = encode_batch(&base, &device.samples, unix_timestamp())?;

        let transmitted = match self.stream.as_mut() {
            Some(stream) if !message.is_empty() => {
                stream
                    .write_all(message.as_bytes())
                    .and_then(|()| stream.flush())
                    .map_err(ForwardError::Send)?;
                true
            }
            Some(_) => true,
            None => false,
        };

        Ok(SendReport {
            lines: device.samples.len(),
            group,
            bytes: message.len(),
            transmitted,
            message,
        })
    }
}
