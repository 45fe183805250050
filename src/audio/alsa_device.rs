//! ALSA PCM playback sink.

use std::io;

use alsa::pcm::{Access, Format, Frames, HwParams, PCM};
use alsa::{Direction, ValueOr};

use super::sink::{PlaybackSink, SinkOpener, SinkParams};
use crate::error::SinkError;

/// Opens ALSA playback devices for speaker streams.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlsaSinkOpener;

impl SinkOpener for AlsaSinkOpener {
    fn open(&self, params: &SinkParams) -> Result<Box<dyn PlaybackSink>, SinkError> {
        Ok(Box::new(AlsaSink::open(params)?))
    }
}

/// Mono S16 playback device with a negotiated ring buffer.
pub struct AlsaSink {
    pcm: PCM,
    buffer_size: usize,
}

impl AlsaSink {
    pub fn open(params: &SinkParams) -> Result<Self, SinkError> {
        let pcm = PCM::new(&params.device, Direction::Playback, false).map_err(map_err)?;

        // Configure hardware parameters
        {
            let hwp = HwParams::any(&pcm).map_err(map_err)?;
            hwp.set_access(Access::RWInterleaved).map_err(map_err)?;
            hwp.set_format(Format::S16LE).map_err(map_err)?;
            hwp.set_channels(params.channels).map_err(map_err)?;
            hwp.set_rate(params.sample_rate, ValueOr::Nearest)
                .map_err(map_err)?;
            hwp.set_buffer_size_near(params.buffer_size as Frames)
                .map_err(map_err)?;
            hwp.set_period_size_near(params.period_size as Frames, ValueOr::Nearest)
                .map_err(map_err)?;
            pcm.hw_params(&hwp).map_err(map_err)?;
        }

        // Read back actual negotiated parameters
        let (buffer_size, period_size) = {
            let hwp = pcm.hw_params_current().map_err(map_err)?;
            let buffer = hwp.get_buffer_size().map_err(map_err)?;
            let period = hwp.get_period_size().map_err(map_err)?;
            (buffer.max(0) as usize, period.max(0) as usize)
        };

        log::info!(
            "ALSA Playback: device={}, rate={}, buffer_size={}, period_size={}",
            params.device,
            params.sample_rate,
            buffer_size,
            period_size,
        );

        Ok(Self { pcm, buffer_size })
    }
}

impl PlaybackSink for AlsaSink {
    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn free_space(&mut self) -> Result<usize, SinkError> {
        let avail = self.pcm.avail().map_err(map_err)?;
        Ok(avail.max(0) as usize)
    }

    fn write(&mut self, samples: &[i16]) -> Result<usize, SinkError> {
        let io = self.pcm.io_i16().map_err(map_err)?;
        io.writei(samples).map_err(map_err)
    }

    fn prepare(&mut self, start_threshold: usize) -> Result<(), SinkError> {
        // 先设置 start threshold，再 prepare
        {
            let swp = self.pcm.sw_params_current().map_err(map_err)?;
            swp.set_start_threshold(start_threshold as Frames)
                .map_err(map_err)?;
            self.pcm.sw_params(&swp).map_err(map_err)?;
        }
        self.pcm.prepare().map_err(map_err)
    }

    fn drop_buffered(&mut self) -> Result<(), SinkError> {
        self.pcm.drop().map_err(map_err)
    }
}

fn map_err(err: alsa::Error) -> SinkError {
    match io::Error::from_raw_os_error(err.errno()).kind() {
        io::ErrorKind::BrokenPipe => SinkError::Underrun,
        io::ErrorKind::Interrupted => SinkError::Interrupted,
        _ => SinkError::device(err),
    }
}
