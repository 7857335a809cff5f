use crate::compositor::Compositor;
use crate::error::Result;
use crate::options::DecodeOptions;
use crate::parser::{Decoder, FrameInfo};
use crate::sink::PixelSink;
use crate::source::ByteSource;

use log::{debug, info};

use std::time::{Duration, Instant};

/// Time source used to pace frames.
pub trait Clock {
    fn now(&self) -> Duration;

    /// Block until `now() >= deadline`.
    fn sleep_until(&mut self, deadline: Duration);
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep_until(&mut self, deadline: Duration) {
        let now = self.now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Frame(FrameInfo),
    /// The trailer was reached and the source rewound.
    CycleComplete { frames: usize },
}

/// Plays a gif in a loop: decode one frame, wait out its delay, present it.
pub struct Player<S: ByteSource, P: PixelSink, C: Clock = SystemClock> {
    decoder: Decoder<S>,
    compositor: Option<Compositor>,
    sink: P,
    clock: C,

    cycle_number: u32,
    frame_number: usize,
    frame_count: usize,
    cycle_time_ms: u64,
    frame_delay_ms: u32,
    last_frame_time: Duration,
}

impl<S: ByteSource, P: PixelSink> Player<S, P, SystemClock> {
    pub fn new(source: S, sink: P, options: DecodeOptions) -> Self {
        Self::with_clock(source, sink, options, SystemClock::default())
    }
}

impl<S: ByteSource, P: PixelSink, C: Clock> Player<S, P, C> {
    pub fn with_clock(source: S, sink: P, options: DecodeOptions, clock: C) -> Self {
        Self {
            decoder: Decoder::new(source, options),
            compositor: None,
            sink,
            clock,
            cycle_number: 0,
            frame_number: 0,
            frame_count: 0,
            cycle_time_ms: 0,
            frame_delay_ms: 0,
            last_frame_time: Duration::ZERO,
        }
    }

    /// Nothing reaches the sink if the header is rejected.
    pub fn start_decoding(&mut self) -> Result<()> {
        self.cycle_number = 0;
        self.frame_number = 0;
        self.frame_count = 0;
        self.cycle_time_ms = 0;
        self.frame_delay_ms = 0;
        self.compositor = None;

        self.decoder.rewind()?;
        let screen = self.decoder.read_header()?;
        info!(
            "opened gif, canvas size = {} x {}",
            screen.screen_width, screen.screen_height
        );

        let mut compositor = Compositor::new(
            screen.screen_width,
            screen.screen_height,
            screen.background_color_index,
        );
        compositor.begin_cycle();
        self.compositor = Some(compositor);

        self.sink.clear_screen();
        self.last_frame_time = self.clock.now();
        Ok(())
    }

    /// Decode and present the next frame, or restart the stream at its trailer.
    ///
    /// With `delay_after_decode` the call blocks until the frame's delay has
    /// passed since the previous frame, before presenting it.
    pub fn decode_frame(&mut self, delay_after_decode: bool) -> Result<FrameStatus> {
        if self.compositor.is_none() {
            self.start_decoding()?;
        }
        let Some(frame) = self.decoder.next_frame()? else {
            return self.restart_cycle();
        };

        let emitted = match self.compositor.as_mut() {
            Some(compositor) => compositor.apply_frame(&frame, &mut self.sink),
            None => 0,
        };
        let frame_info = frame.info;
        debug!(
            "frame {} of cycle {}: {} pixels pushed, delay {} ms",
            frame_info.index,
            self.cycle_number,
            emitted,
            frame_info.delay_ms()
        );

        self.frame_number += 1;
        self.frame_delay_ms = frame_info.delay_ms();
        if self.cycle_number == 0 {
            self.cycle_time_ms += u64::from(self.frame_delay_ms);
        }

        if delay_after_decode {
            let target = self.last_frame_time + Duration::from_millis(self.frame_delay_ms.into());
            self.clock.sleep_until(target);
            // running late resets the schedule instead of bursting to catch up
            self.last_frame_time = target.max(self.clock.now());
        } else {
            self.last_frame_time = self.clock.now();
        }

        self.sink.present();
        Ok(FrameStatus::Frame(frame_info))
    }

    fn restart_cycle(&mut self) -> Result<FrameStatus> {
        let frames = self.frame_number;
        self.frame_count = frames;
        self.frame_number = 0;
        self.cycle_number += 1;
        info!("cycle {} finished after {} frames", self.cycle_number, frames);

        self.decoder.rewind()?;
        self.decoder.read_header()?;
        if let Some(compositor) = self.compositor.as_mut() {
            compositor.begin_cycle();
        }

        Ok(FrameStatus::CycleComplete { frames })
    }

    pub fn cycle_number(&self) -> u32 {
        self.cycle_number
    }

    pub fn frame_number(&self) -> usize {
        self.frame_number
    }

    // frame_count and cycle_time_ms are only known once a cycle has completed
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn cycle_time_ms(&self) -> u64 {
        self.cycle_time_ms
    }

    pub fn frame_delay_ms(&self) -> u32 {
        self.frame_delay_ms
    }

    pub fn size(&self) -> Option<(u16, u16)> {
        self.decoder
            .logical_screen()
            .map(|screen| (screen.screen_width, screen.screen_height))
    }

    pub fn compositor(&self) -> Option<&Compositor> {
        self.compositor.as_ref()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn sink(&self) -> &P {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut P {
        &mut self.sink
    }

    pub fn into_sink(self) -> P {
        self.sink
    }
}
