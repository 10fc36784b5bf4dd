use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use rawview_core::decode::{RawMetadata, RawOutput};
use rawview_core::DecodeSettings;
use rawview_service::{DecodeError, MemoryFileSource, RawDecoder, RawImageService, ServiceConfig};

/// Decoder driven by the file contents instead of real sensor data.
///
/// - `WxH` decodes to a flat frame of that size
/// - `fail` returns a native decode error
/// - `panic` panics inside the worker
/// - a `wait:` prefix blocks until the gate is opened once
pub struct ScriptedDecoder {
    calls: AtomicUsize,
    gate: Receiver<()>,
}

impl ScriptedDecoder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RawDecoder for ScriptedDecoder {
    fn decode(&self, bytes: &[u8], _settings: &DecodeSettings) -> Result<RawOutput, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let script = match bytes.strip_prefix(b"wait:") {
            Some(rest) => {
                let _ = self.gate.recv();
                rest
            }
            None => bytes,
        };

        match script {
            b"fail" => Err(DecodeError::NativeDecode("unsupported camera".into())),
            b"panic" => panic!("corrupt sensor data"),
            _ => {
                let (width, height) = std::str::from_utf8(script)
                    .ok()
                    .and_then(|s| s.split_once('x'))
                    .and_then(|(w, h)| Some((w.parse::<u32>().ok()?, h.parse::<u32>().ok()?)))
                    .ok_or_else(|| DecodeError::NativeDecode("not a raw file".into()))?;
                Ok(RawOutput {
                    data: Some(vec![120u8; (width * height * 3) as usize]),
                    metadata: RawMetadata {
                        width: Some(width),
                        height: Some(height),
                        ..Default::default()
                    },
                })
            }
        }
    }
}

pub struct Harness {
    pub service: RawImageService,
    pub decoder: Arc<ScriptedDecoder>,
    pub files: Arc<MemoryFileSource>,
    pub gate: Sender<()>,
}

impl Harness {
    pub fn new(config: ServiceConfig) -> Self {
        let (gate, rx) = unbounded();
        let decoder = Arc::new(ScriptedDecoder {
            calls: AtomicUsize::new(0),
            gate: rx,
        });
        let files = Arc::new(MemoryFileSource::new());
        let service = RawImageService::with_parts(config, decoder.clone(), files.clone()).unwrap();

        Self {
            service,
            decoder,
            files,
            gate,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ServiceConfig::default())
    }

    pub fn open_gate(&self) {
        self.gate.send(()).unwrap();
    }
}

/// Poll `condition` until it holds, failing the test after a few seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
