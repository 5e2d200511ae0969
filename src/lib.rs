pub mod config;
pub mod detokenizer;
pub mod error;
pub mod io_struct;
pub mod logging;
pub mod manager;
pub mod tokenizer;
pub mod transport;

pub use config::DetokenizerConfig;
pub use detokenizer::BatchDetokenizer;
pub use error::DetokenizerError;
pub use manager::{DetokenizerManager, LineSignal, ReadySignal, start_detokenizer_process};

#[cfg(feature = "python")]
mod python {
    use pyo3::{exceptions::PyRuntimeError, prelude::*};

    use crate::config::{
        DEFAULT_CHANNEL_CAPACITY, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_HOST,
        DEFAULT_MAX_FRAME_SIZE, DetokenizerConfig,
    };
    use crate::logging::{init_logging, parse_level};
    use crate::manager::{READY_MESSAGE, ReadySignal, start_detokenizer_process};

    /// Forwards the startup handshake to a Python `multiprocessing` pipe end.
    struct PyPipeSignal(Py<PyAny>);

    impl PyPipeSignal {
        fn send(&self, message: &str) {
            Python::with_gil(|py| {
                if let Err(e) = self.0.call_method1(py, "send", (message,)) {
                    log::error!("Failed to notify supervisor: {}", e);
                }
            });
        }
    }

    impl ReadySignal for PyPipeSignal {
        fn ready(&mut self) {
            self.send(READY_MESSAGE);
        }

        fn failed(&mut self, description: &str) {
            self.send(description);
        }
    }

    #[pyclass]
    pub struct DetokenizerProcess {
        config: DetokenizerConfig,
        log_level: String,
    }

    #[pymethods]
    impl DetokenizerProcess {
        #[new]
        #[pyo3(signature = (
            tokenizer_path,
            detokenizer_port,
            tokenizer_port,
            host = String::from(DEFAULT_HOST),
            channel_capacity = DEFAULT_CHANNEL_CAPACITY,
            max_frame_size = DEFAULT_MAX_FRAME_SIZE,
            connect_timeout_secs = DEFAULT_CONNECT_TIMEOUT_SECS,
            log_level = String::from("info")
        ))]
        #[allow(clippy::too_many_arguments)]
        fn new(
            tokenizer_path: String,
            detokenizer_port: u16,
            tokenizer_port: u16,
            host: String,
            channel_capacity: usize,
            max_frame_size: usize,
            connect_timeout_secs: u64,
            log_level: String,
        ) -> PyResult<Self> {
            let config = DetokenizerConfig {
                host,
                detokenizer_port,
                tokenizer_port,
                tokenizer_path,
                channel_capacity,
                max_frame_size,
                connect_timeout_secs,
            };
            config
                .validate()
                .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
            Ok(DetokenizerProcess { config, log_level })
        }

        /// Blocks until the detokenizer stops; `pipe_writer.send(...)` receives the handshake.
        fn start(&self, py: Python<'_>, pipe_writer: Py<PyAny>) -> PyResult<()> {
            init_logging(parse_level(&self.log_level));
            let config = self.config.clone();
            py.allow_threads(move || start_detokenizer_process(config, PyPipeSignal(pipe_writer)))
                .map_err(|e| PyRuntimeError::new_err(format!("{:#}", e)))
        }
    }

    #[pymodule]
    fn sgl_detokenizer_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_class::<DetokenizerProcess>()?;
        Ok(())
    }
}
