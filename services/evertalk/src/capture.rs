//! Microphone capture through cpal.
//!
//! Samples are buffered while recording. On stop the buffer is resampled to
//! the upload rate and delivered as one WAV file.
use crate::config::{INPUT_CHUNK_SIZE, RESAMPLE_CHUNK_SIZE};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FrameCount, StreamConfig};
use evertalk_core::recording::{AudioCapture, CaptureError, CaptureErrorKind, CaptureEvent};
use evertalk_native_utils::audio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub struct CpalCapture {
    device_name: Option<String>,
    events: mpsc::UnboundedSender<CaptureEvent>,
    stream: Option<cpal::Stream>,
    sample_rate: u32,
    samples: Arc<Mutex<Vec<f32>>>,
    recording: Arc<AtomicBool>,
}

impl CpalCapture {
    pub fn new(device_name: Option<String>, events: mpsc::UnboundedSender<CaptureEvent>) -> Self {
        Self {
            device_name,
            events,
            stream: None,
            sample_rate: audio::UPLOAD_SAMPLE_RATE,
            samples: Arc::new(Mutex::new(Vec::new())),
            recording: Arc::new(AtomicBool::new(false)),
        }
    }

    fn emit(&self, event: CaptureEvent) {
        if self.events.send(event).is_err() {
            tracing::warn!("capture event dropped, controller is gone");
        }
    }

    fn build_stream(&self) -> Result<(cpal::Stream, u32), CaptureError> {
        let input = evertalk_native_utils::device::get_or_default_input(self.device_name.clone())
            .map_err(|e| {
                tracing::error!("Failed to get audio input device: {:#}", e);
                CaptureError::DeviceUnavailable
            })?;
        if let Ok(name) = input.name() {
            tracing::info!("Using input device: {:?}", name);
        }

        let input_config = input
            .default_input_config()
            .map_err(|e| CaptureError::Backend(e.to_string()))?;
        let input_config = StreamConfig {
            channels: input_config.channels(),
            sample_rate: input_config.sample_rate(),
            buffer_size: cpal::BufferSize::Fixed(FrameCount::from(INPUT_CHUNK_SIZE as u32)),
        };
        let input_channel_count = input_config.channels as usize;
        tracing::info!("Input stream config: {:?}", &input_config);

        let samples = self.samples.clone();
        let recording = self.recording.clone();
        let levels = self.events.clone();
        let input_data_fn = move |data: &[f32], _: &cpal::InputCallbackInfo| {
            if !recording.load(Ordering::Acquire) {
                return;
            }
            let mono = audio::downmix(data, input_channel_count);
            let _ = levels.send(CaptureEvent::Level(audio::level(&mono)));
            if let Ok(mut buffer) = samples.lock() {
                buffer.extend_from_slice(&mono);
            }
        };

        let errors = self.events.clone();
        let (error_samples, error_recording) = (self.samples.clone(), self.recording.clone());
        let stream_rate = input_config.sample_rate.0;
        let stream = input
            .build_input_stream(
                &input_config,
                input_data_fn,
                move |err| {
                    tracing::error!("An error occurred on input stream: {}", err);
                    drain_after_error(&error_samples, &error_recording, stream_rate, &errors);
                },
                None,
            )
            .map_err(|e| match e {
                cpal::BuildStreamError::DeviceNotAvailable => CaptureError::DeviceUnavailable,
                other => CaptureError::Backend(other.to_string()),
            })?;
        Ok((stream, input_config.sample_rate.0))
    }

    fn take_wav(&self) -> Option<Vec<u8>> {
        take_wav(&self.samples, self.sample_rate)
    }
}

/// Empties the buffer and encodes it at the upload rate.
fn take_wav(samples: &Mutex<Vec<f32>>, sample_rate: u32) -> Option<Vec<u8>> {
    let samples = match samples.lock() {
        Ok(mut buffer) => std::mem::take(&mut *buffer),
        Err(_) => return None,
    };
    if samples.is_empty() {
        return None;
    }

    let encoded = audio::resample(
        &samples,
        sample_rate,
        audio::UPLOAD_SAMPLE_RATE,
        RESAMPLE_CHUNK_SIZE,
    )
    .and_then(|resampled| audio::encode_wav(&resampled, audio::UPLOAD_SAMPLE_RATE));
    match encoded {
        Ok(wav) => Some(wav),
        Err(e) => {
            tracing::error!("Failed to package recording: {:#}", e);
            None
        }
    }
}

/// Stream failure: ends the recording and hands over what was buffered
/// before reporting the error, so the controller can still flush it.
fn drain_after_error(
    samples: &Mutex<Vec<f32>>,
    recording: &AtomicBool,
    sample_rate: u32,
    events: &mpsc::UnboundedSender<CaptureEvent>,
) {
    if recording.swap(false, Ordering::AcqRel) {
        if let Some(wav) = take_wav(samples, sample_rate) {
            let _ = events.send(CaptureEvent::Audio(wav));
        }
    }
    let _ = events.send(CaptureEvent::Error(CaptureErrorKind::AudioCapture));
}

impl AudioCapture for CpalCapture {
    fn open(&mut self) -> Result<(), CaptureError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let (stream, sample_rate) = self.build_stream()?;
        self.stream = Some(stream);
        self.sample_rate = sample_rate;
        Ok(())
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        let stream = self.stream.as_ref().ok_or(CaptureError::InvalidState)?;
        if self.recording.load(Ordering::Acquire) {
            return Err(CaptureError::InvalidState);
        }
        if let Ok(mut buffer) = self.samples.lock() {
            buffer.clear();
        }
        stream
            .play()
            .map_err(|e| CaptureError::Backend(e.to_string()))?;
        self.recording.store(true, Ordering::Release);
        self.emit(CaptureEvent::Started);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        if !self.recording.swap(false, Ordering::AcqRel) {
            return Err(CaptureError::InvalidState);
        }
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.pause() {
                tracing::warn!("Failed to pause input stream: {}", e);
            }
        }
        if let Some(wav) = self.take_wav() {
            self.emit(CaptureEvent::Audio(wav));
        }
        self.emit(CaptureEvent::Stopped);
        Ok(())
    }

    fn close(&mut self) {
        self.recording.store(false, Ordering::Release);
        if self.stream.take().is_some() {
            tracing::debug!("input stream released");
        }
    }

    fn mime_type(&self) -> String {
        audio::WAV_MIME_TYPE.to_string()
    }
}
