use clap::Parser;
use sgl_detokenizer_rs::config::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_HOST, DEFAULT_MAX_FRAME_SIZE,
    DetokenizerConfig,
};
use sgl_detokenizer_rs::logging::{init_logging, parse_level};
use sgl_detokenizer_rs::{LineSignal, start_detokenizer_process};

#[derive(Parser, Debug)]
#[command(name = "sgl-detokenizer")]
#[command(about = "SGLang detokenizer - turns token id batches into streamed text")]
struct CliArgs {
    /// Path to tokenizer.json or a model directory containing it
    #[arg(long)]
    tokenizer_path: String,

    /// Port to receive token batches on
    #[arg(long)]
    detokenizer_port: u16,

    /// Port of the tokenizer manager receiving text batches
    #[arg(long)]
    tokenizer_port: u16,

    /// Host address for both channels
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Number of inbound batches buffered before producers block
    #[arg(long, default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    channel_capacity: usize,

    /// Maximum frame size in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    max_frame_size: usize,

    /// Seconds to wait for the tokenizer manager to accept our connection
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    connect_timeout_secs: u64,

    /// Set the logging level
    #[arg(long, default_value = "info", value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: String,
}

impl CliArgs {
    fn to_config(&self) -> DetokenizerConfig {
        DetokenizerConfig {
            host: self.host.clone(),
            detokenizer_port: self.detokenizer_port,
            tokenizer_port: self.tokenizer_port,
            tokenizer_path: self.tokenizer_path.clone(),
            channel_capacity: self.channel_capacity,
            max_frame_size: self.max_frame_size,
            connect_timeout_secs: self.connect_timeout_secs,
        }
    }
}

fn main() {
    let args = CliArgs::parse();
    init_logging(parse_level(&args.log_level));

    let signal = LineSignal::new(std::io::stdout());
    if let Err(e) = start_detokenizer_process(args.to_config(), signal) {
        eprintln!("Detokenizer exited: {:#}", e);
        std::process::exit(1);
    }
}
