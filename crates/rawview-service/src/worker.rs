//! The per-thread decode job.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use rawview_core::{
    decode_and_encode, DecodeError, DecodeSettings, EncodeQualities, EncodedImage, ImageKind,
    RawDecoder,
};
use tracing::warn;

pub type DecodeResult = Result<EncodedImage, DecodeError>;

/// Everything a worker thread needs to turn RAW bytes into a payload.
///
/// Workers share no state with each other; a clone per thread shares only
/// the decoder backend.
#[derive(Clone)]
pub struct DecodeWorker {
    decoder: Arc<dyn RawDecoder>,
    settings: DecodeSettings,
    qualities: EncodeQualities,
    thumbnail_width: u32,
}

impl DecodeWorker {
    pub fn new(
        decoder: Arc<dyn RawDecoder>,
        qualities: EncodeQualities,
        thumbnail_width: u32,
    ) -> Self {
        Self {
            decoder,
            settings: DecodeSettings::FAST,
            qualities,
            thumbnail_width,
        }
    }

    /// Run one request to completion.
    ///
    /// Always produces a result. A panic inside the decoder or encoder is
    /// caught and reported as [`DecodeError::WorkerFault`], so the thread
    /// stays usable for the next request.
    pub fn process(&self, bytes: &[u8], kind: ImageKind) -> DecodeResult {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            decode_and_encode(
                self.decoder.as_ref(),
                bytes,
                kind,
                &self.settings,
                self.qualities,
                self.thumbnail_width,
            )
        }));

        outcome.unwrap_or_else(|payload| {
            let message = panic_message(&*payload);
            warn!(?kind, %message, "Decoder panicked, worker recovered");
            Err(DecodeError::WorkerFault(message))
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "decoder panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rawview_core::decode::{RawMetadata, RawOutput};

    struct ScriptedDecoder;

    impl RawDecoder for ScriptedDecoder {
        fn decode(&self, bytes: &[u8], _settings: &DecodeSettings) -> Result<RawOutput, DecodeError> {
            match bytes {
                b"panic" => panic!("sensor data exploded"),
                b"fail" => Err(DecodeError::NativeDecode("unsupported camera".into())),
                _ => Ok(RawOutput {
                    data: Some(vec![128u8; 64 * 48 * 3]),
                    metadata: RawMetadata {
                        width: Some(64),
                        height: Some(48),
                        ..Default::default()
                    },
                }),
            }
        }
    }

    fn worker() -> DecodeWorker {
        DecodeWorker::new(Arc::new(ScriptedDecoder), EncodeQualities::default(), 32)
    }

    #[test]
    fn test_process_full() {
        let image = worker().process(b"ok", ImageKind::Full).unwrap();
        assert_eq!((image.width(), image.height()), (64, 48));
    }

    #[test]
    fn test_process_thumbnail() {
        let image = worker().process(b"ok", ImageKind::Thumbnail).unwrap();
        assert_eq!((image.width(), image.height()), (32, 24));
    }

    #[test]
    fn test_decoder_error_passes_through() {
        assert_eq!(
            worker().process(b"fail", ImageKind::Full),
            Err(DecodeError::NativeDecode("unsupported camera".into()))
        );
    }

    #[test]
    fn test_panic_becomes_worker_fault() {
        let worker = worker();
        match worker.process(b"panic", ImageKind::Full) {
            Err(DecodeError::WorkerFault(msg)) => assert!(msg.contains("exploded")),
            other => panic!("expected worker fault, got {other:?}"),
        }
        assert!(worker.process(b"ok", ImageKind::Full).is_ok());
    }
}
