use std::io::Write;
use std::net::SocketAddr;

use log::{debug, error, info};
use tokio::signal;

use crate::config::DetokenizerConfig;
use crate::detokenizer::BatchDetokenizer;
use crate::error::{DetokenizerError, DetokenizerResult};
use crate::tokenizer::Tokenizer;
use crate::transport::{InboundReceiver, OutboundSender};

/// Message sent to the supervisor once construction succeeded.
pub const READY_MESSAGE: &str = "init ok";

/// One-shot startup handshake with the supervising process.
pub trait ReadySignal {
    fn ready(&mut self);
    fn failed(&mut self, description: &str);
}

/// Writes the handshake as a single line, e.g. to stdout or a pipe.
pub struct LineSignal<W: Write> {
    writer: W,
}

impl<W: Write> LineSignal<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn send_line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.writer, "{}", line).and_then(|_| self.writer.flush()) {
            error!("Failed to notify supervisor: {}", e);
        }
    }
}

impl<W: Write> ReadySignal for LineSignal<W> {
    fn ready(&mut self) {
        self.send_line(READY_MESSAGE);
    }

    fn failed(&mut self, description: &str) {
        // keep the handshake to one line
        self.send_line(&description.replace('\n', " | "));
    }
}

/// Receives token batches, detokenizes them and forwards the text, one batch at a time.
pub struct DetokenizerManager {
    recv_from_scheduler: InboundReceiver,
    send_to_tokenizer: OutboundSender,
    detokenizer: BatchDetokenizer,
}

impl DetokenizerManager {
    pub async fn new(config: &DetokenizerConfig, tokenizer: Tokenizer) -> DetokenizerResult<Self> {
        let recv_from_scheduler = InboundReceiver::bind(
            &config.inbound_addr(),
            config.channel_capacity,
            config.max_frame_size,
        )
        .await?;
        let send_to_tokenizer =
            OutboundSender::connect(&config.outbound_addr(), config.connect_timeout()).await?;

        Ok(Self {
            recv_from_scheduler,
            send_to_tokenizer,
            detokenizer: BatchDetokenizer::new(tokenizer),
        })
    }

    /// Validate the config, load the tokenizer from disk and open both channels.
    pub async fn from_config(config: &DetokenizerConfig) -> DetokenizerResult<Self> {
        config
            .validate()
            .map_err(|e| DetokenizerError::Init(e.into()))?;
        let tokenizer =
            Tokenizer::from_file(&config.tokenizer_path).map_err(DetokenizerError::Init)?;
        info!(
            "Loaded tokenizer from {} ({} tokens)",
            config.tokenizer_path,
            tokenizer.vocab_size()
        );
        Self::new(config, tokenizer).await
    }

    pub fn inbound_addr(&self) -> SocketAddr {
        self.recv_from_scheduler.local_addr()
    }

    /// Process a single batch: receive, detokenize, forward.
    pub async fn step(&mut self) -> DetokenizerResult<()> {
        let batch = self.recv_from_scheduler.recv_batch().await?;
        let batch_size = batch.len();
        let output = self.detokenizer.process(batch)?;
        self.send_to_tokenizer.send_batch(&output).await?;
        debug!("Forwarded detokenized batch of {} requests", batch_size);
        Ok(())
    }

    /// Runs until the first fatal error; never skips a message.
    pub async fn handle_loop(&mut self) -> DetokenizerResult<()> {
        loop {
            self.step().await?;
        }
    }
}

/// Process entry point: construct, report readiness, then serve until a fatal error or Ctrl+C.
pub fn start_detokenizer_process<S: ReadySignal>(
    config: DetokenizerConfig,
    mut signal_tx: S,
) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let mut manager = match DetokenizerManager::from_config(&config).await {
            Ok(manager) => manager,
            Err(e) => {
                error!("Detokenizer failed to start: {}", e);
                signal_tx.failed(&e.to_string());
                return Err(anyhow::Error::from(e));
            }
        };
        signal_tx.ready();
        info!("Detokenizer ready on {}", manager.inbound_addr());

        tokio::select! {
            res = manager.handle_loop() => {
                if let Err(e) = &res {
                    error!("Detokenizer terminated: {}", e);
                }
                res.map_err(anyhow::Error::from)
            }
            _ = shutdown_signal() => Ok(()),
        }
    })
}

/// Resolves on Ctrl+C or, on unix, SIGTERM from the supervisor.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_signal_ready() {
        let mut signal = LineSignal::new(Vec::new());
        signal.ready();
        assert_eq!(signal.into_inner(), b"init ok\n");
    }

    #[test]
    fn test_line_signal_failure_is_single_line() {
        let mut signal = LineSignal::new(Vec::new());
        signal.failed("bad tokenizer\ncaused by: missing file");
        let out = String::from_utf8(signal.into_inner()).unwrap();
        assert_eq!(out, "bad tokenizer | caused by: missing file\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shutdown_on_sigterm() {
        let waiter = tokio::spawn(shutdown_signal());
        // let the handler register before raising
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(std::time::Duration::from_secs(5), waiter)
            .await
            .expect("shutdown signal not observed")
            .unwrap();
    }

    #[test]
    fn test_start_reports_init_failure() {
        let config = DetokenizerConfig {
            tokenizer_port: 30002,
            tokenizer_path: "/nonexistent/tokenizer.json".to_string(),
            ..Default::default()
        };
        let mut out = Vec::new();
        let result = start_detokenizer_process(config, LineSignal::new(&mut out));
        assert!(result.is_err());

        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("Initialization failed"));
        assert!(!out.contains(READY_MESSAGE));
    }
}
