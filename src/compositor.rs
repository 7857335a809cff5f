use crate::parser::{DisposalMethod, Frame, FrameInfo, Rect};
use crate::sink::{PixelSink, Rgb};

use log::debug;

#[derive(Debug, Clone, Copy)]
struct Disposal {
    rect: Rect,
    method: DisposalMethod,
    transparent_index: Option<u8>,
}

/// Owner of the persistent canvas of palette indexes.
///
/// Disposal runs one frame late: the method read with frame `i` is applied
/// to frame `i`'s rect right before frame `i + 1` is drawn.
#[derive(Debug)]
pub struct Compositor {
    width: u16,
    height: u16,
    background_index: u8,

    canvas: Vec<u8>,
    backup: Vec<u8>,
    previous: Disposal,
    keyframe_pending: bool,

    // pending run of opaque pixels, reused across frames
    run: Vec<Rgb>,
}

impl Compositor {
    pub fn new(width: u16, height: u16, background_index: u8) -> Self {
        let area = width as usize * height as usize;

        Self {
            width,
            height,
            background_index,
            canvas: vec![background_index; area],
            backup: vec![background_index; area],
            previous: Disposal {
                rect: Rect::new(0, 0, width, height),
                method: DisposalMethod::None,
                transparent_index: None,
            },
            keyframe_pending: true,
            run: Vec::with_capacity(width.into()),
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn background_index(&self) -> u8 {
        self.background_index
    }

    /// Row-major canvas of palette indexes.
    pub fn canvas(&self) -> &[u8] {
        &self.canvas
    }

    pub fn index_at(&self, x: u16, y: u16) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.canvas.get(y as usize * self.width as usize + x as usize).copied()
    }

    /// Start a new playback cycle, the next frame is treated as a keyframe.
    pub fn begin_cycle(&mut self) {
        self.keyframe_pending = true;
        self.previous = Disposal {
            rect: Rect::new(0, 0, self.width, self.height),
            method: DisposalMethod::None,
            transparent_index: None,
        };
    }

    /// Merge a decoded frame into the canvas and push its visible pixels to `sink`.
    /// Returns the number of pixels pushed.
    pub fn apply_frame<P: PixelSink + ?Sized>(&mut self, frame: &Frame<'_>, sink: &mut P) -> usize {
        self.prepare(&frame.info);
        self.draw(frame, sink)
    }

    /// Dispose of the previous frame and back up the area the next frame
    /// covers if it asks to be restored afterwards.
    pub fn prepare(&mut self, info: &FrameInfo) {
        if self.keyframe_pending {
            let fill = info
                .control
                .transparent_index
                .unwrap_or(self.background_index);
            self.canvas.fill(fill);
            self.keyframe_pending = false;
            debug!("keyframe, canvas filled with index {}", fill);
        } else {
            self.dispose_previous();
        }

        if info.control.disposal_method == DisposalMethod::RestoreToPrevious {
            let rect = info.visible.clip(self.width, self.height);
            copy_rect(&self.canvas, &mut self.backup, self.width, rect);
        }
    }

    fn dispose_previous(&mut self) {
        let Disposal {
            rect,
            method,
            transparent_index,
        } = self.previous;

        match method {
            // 0 and 1 both leave the canvas alone
            DisposalMethod::None | DisposalMethod::Leave => {}
            DisposalMethod::RestoreBackground => {
                let fill = transparent_index.unwrap_or(self.background_index);
                fill_rect(&mut self.canvas, self.width, rect, fill);
            }
            DisposalMethod::RestoreToPrevious => {
                copy_rect(&self.backup, &mut self.canvas, self.width, rect);
            }
        }
        debug!("disposed previous frame at {:?} with {:?}", rect, method);

        self.previous.method = DisposalMethod::None;
    }

    /// Copy the frame's indexes into the canvas and emit its opaque pixels.
    /// Must follow [`Compositor::prepare`] for the same frame.
    pub fn draw<P: PixelSink + ?Sized>(&mut self, frame: &Frame<'_>, sink: &mut P) -> usize {
        let info = &frame.info;
        let stride = info.visible.width as usize;
        let rect = info.visible.clip(self.width, self.height);
        let transparent_index = info.control.transparent_index;

        sink.begin_frame_drawing();

        let mut emitted = 0;
        for row in 0..rect.height {
            let y = rect.top + row;
            let start = row as usize * stride;
            let Some(pixels) = frame.pixels.get(start..start + rect.width as usize) else {
                break;
            };

            let canvas_row = y as usize * self.width as usize + rect.left as usize;
            let mut run_start = rect.left;
            for (column, pixel) in pixels.iter().enumerate() {
                match *pixel {
                    Some(index) if Some(index) != transparent_index => {
                        self.canvas[canvas_row + column] = index;
                        if self.run.is_empty() {
                            run_start = rect.left + column as u16;
                        }
                        self.run.push(frame.palette.color(index));
                    }
                    _ => emitted += flush_run(sink, run_start, y, &mut self.run),
                }
            }
            emitted += flush_run(sink, run_start, y, &mut self.run);
        }

        self.previous = Disposal {
            rect,
            method: info.control.disposal_method,
            transparent_index,
        };

        emitted
    }
}

fn flush_run<P: PixelSink + ?Sized>(sink: &mut P, x: u16, y: u16, run: &mut Vec<Rgb>) -> usize {
    if run.is_empty() {
        return 0;
    }
    sink.draw_row(x, y, run);
    let len = run.len();
    run.clear();
    len
}

fn fill_rect(buffer: &mut [u8], stride: u16, rect: Rect, value: u8) {
    for y in rect.top..rect.top + rect.height {
        let start = y as usize * stride as usize + rect.left as usize;
        buffer[start..start + rect.width as usize].fill(value);
    }
}

fn copy_rect(from: &[u8], to: &mut [u8], stride: u16, rect: Rect) {
    for y in rect.top..rect.top + rect.height {
        let start = y as usize * stride as usize + rect.left as usize;
        let end = start + rect.width as usize;
        to[start..end].copy_from_slice(&from[start..end]);
    }
}
