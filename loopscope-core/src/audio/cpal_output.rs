//! Hardware output via cpal.

use crate::{
    audio::{OutputBackend, OutputStream},
    engine::render::RendererFactory,
    error::Result,
};

#[cfg(feature = "audio-cpal")]
use crate::{audio::OutputFormat, engine::render::LoopRenderer, error::LoopScopeError};

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    BufferSize, Device, FromSample, SampleFormat, SampleRate, SizedSample, Stream,
    StreamConfig,
};
#[cfg(feature = "audio-cpal")]
use tracing::{error, info, warn};

/// Plays the loop on the default (or a preferred, by name) output device.
#[derive(Debug, Clone, Default)]
pub struct CpalBackend {
    preferred_device: Option<String>,
    buffer_frames: Option<u32>,
}

impl CpalBackend {
    pub fn new(preferred_device: Option<String>, buffer_frames: Option<u32>) -> Self {
        Self {
            preferred_device,
            buffer_frames,
        }
    }

    pub fn preferred_device(&self) -> Option<&str> {
        self.preferred_device.as_deref()
    }
}

/// Keeps the cpal stream alive; dropping it stops playback.
#[cfg(feature = "audio-cpal")]
struct CpalStream {
    _stream: Stream,
    format: OutputFormat,
}

#[cfg(feature = "audio-cpal")]
impl OutputStream for CpalStream {
    fn format(&self) -> OutputFormat {
        self.format
    }
}

#[cfg(feature = "audio-cpal")]
impl OutputBackend for CpalBackend {
    fn name(&self) -> &str {
        "cpal"
    }

    fn open(&self, factory: RendererFactory) -> Result<Box<dyn OutputStream>> {
        let host = cpal::default_host();
        let device = select_output_device(&host, self.preferred_device.as_deref())?;

        info!(
            device = device.name().unwrap_or_default().as_str(),
            "opening output device"
        );

        let supported = device
            .default_output_config()
            .map_err(|e| LoopScopeError::EngineStartFailure(e.to_string()))?;

        let format = OutputFormat {
            sample_rate: supported.sample_rate().0,
            channels: supported.channels(),
        };
        let config = StreamConfig {
            channels: format.channels,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: match self.buffer_frames {
                Some(frames) => BufferSize::Fixed(frames),
                None => BufferSize::Default,
            },
        };

        info!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            sample_format = ?supported.sample_format(),
            "output config selected"
        );

        let renderer = factory.build(format)?;

        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, renderer),
            SampleFormat::I16 => build_stream::<i16>(&device, &config, renderer),
            SampleFormat::U16 => build_stream::<u16>(&device, &config, renderer),
            fmt => {
                return Err(LoopScopeError::EngineStartFailure(format!(
                    "unsupported output sample format: {fmt:?}"
                )))
            }
        }?;

        stream
            .play()
            .map_err(|e| LoopScopeError::EngineStartFailure(e.to_string()))?;

        Ok(Box::new(CpalStream {
            _stream: stream,
            format,
        }))
    }
}

/// Preferred device by exact name, otherwise the host default, otherwise the
/// first listed output.
#[cfg(feature = "audio-cpal")]
fn select_output_device(host: &cpal::Host, preferred: Option<&str>) -> Result<Device> {
    if let Some(preferred_name) = preferred {
        match host.output_devices() {
            Ok(mut devices) => {
                if let Some(device) = devices.find(|device| {
                    device
                        .name()
                        .map(|name| name == preferred_name)
                        .unwrap_or(false)
                }) {
                    return Ok(device);
                }
                warn!(
                    "preferred output device '{}' not found, falling back",
                    preferred_name
                );
            }
            Err(e) => {
                warn!("failed to list output devices while resolving preference: {e}");
            }
        }
    }

    if let Some(default) = host.default_output_device() {
        return Ok(default);
    }

    let mut devices = host
        .output_devices()
        .map_err(|e| LoopScopeError::EngineStartFailure(e.to_string()))?;
    let fallback = devices.next().ok_or_else(|| {
        LoopScopeError::EngineStartFailure("no output device available".into())
    })?;
    warn!("no default output device, falling back to first available output");
    Ok(fallback)
}

#[cfg(feature = "audio-cpal")]
fn build_stream<T>(device: &Device, config: &StreamConfig, mut renderer: LoopRenderer) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    // Whole frames only, so every chunk below interleaves cleanly.
    let mut scratch = vec![0.0f32; renderer.max_block_frames() * channels];

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for chunk in data.chunks_mut(scratch.len()) {
                    let mixed = &mut scratch[..chunk.len()];
                    renderer.render_interleaved(mixed, channels);
                    for (dst, &src) in chunk.iter_mut().zip(mixed.iter()) {
                        *dst = T::from_sample(src);
                    }
                }
            },
            |err| error!("output stream error: {err}"),
            None,
        )
        .map_err(|e| LoopScopeError::EngineStartFailure(e.to_string()))
}

/// Stub when the `audio-cpal` feature is disabled.
#[cfg(not(feature = "audio-cpal"))]
impl OutputBackend for CpalBackend {
    fn name(&self) -> &str {
        "cpal"
    }

    fn open(&self, _factory: RendererFactory) -> Result<Box<dyn OutputStream>> {
        Err(crate::error::LoopScopeError::EngineStartFailure(
            "compiled without audio-cpal feature".into(),
        ))
    }
}
