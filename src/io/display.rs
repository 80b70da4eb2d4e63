//! Display surfaces.
//!
//! A display consumes host-visible frame copies on the control thread and
//! doubles as the cancellation input: the driver polls it once per loop
//! iteration.  `shutdown()` is called exactly once by the driver, on every
//! exit path.
//!
//! The default build ships the headless [`NullDisplay`]; the `display`
//! feature adds an SDL2 window with keyboard cancellation.

use tracing::{debug, info};

use crate::core::types::HostFrame;
use crate::error::Result;

/// Renders frames and reports the cooperative cancellation signal.
pub trait DisplaySurface {
    /// Present one host-visible frame.
    fn render(&mut self, frame: &HostFrame) -> Result<()>;

    /// Poll for a cancellation request.  Cooperative — never preemptive.
    fn poll_cancel(&mut self) -> bool;

    /// Release the surface.  The driver calls this exactly once.
    fn shutdown(&mut self);
}

impl<T: DisplaySurface + ?Sized> DisplaySurface for Box<T> {
    fn render(&mut self, frame: &HostFrame) -> Result<()> {
        (**self).render(frame)
    }

    fn poll_cancel(&mut self) -> bool {
        (**self).poll_cancel()
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }
}

// ─── Headless display ────────────────────────────────────────────────────────

/// Accounting-only display for headless and benchmark runs.  Never cancels.
pub struct NullDisplay {
    frames_rendered: u64,
}

impl NullDisplay {
    pub fn new() -> Self {
        Self { frames_rendered: 0 }
    }

    #[inline]
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }
}

impl Default for NullDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySurface for NullDisplay {
    fn render(&mut self, frame: &HostFrame) -> Result<()> {
        self.frames_rendered += 1;
        if self.frames_rendered % 100 == 0 {
            debug!(index = frame.index, rendered = self.frames_rendered, "Display progress");
        }
        Ok(())
    }

    fn poll_cancel(&mut self) -> bool {
        false
    }

    fn shutdown(&mut self) {
        info!(rendered = self.frames_rendered, "Headless display shut down");
    }
}

// ─── SDL2 window (feature `display`) ─────────────────────────────────────────

#[cfg(feature = "display")]
pub use sdl2_display::Sdl2Display;

#[cfg(feature = "display")]
mod sdl2_display {
    use sdl2::event::Event;
    use sdl2::keyboard::Keycode;
    use sdl2::pixels::PixelFormatEnum;
    use sdl2::render::{Canvas, TextureCreator};
    use sdl2::video::{Window, WindowContext};
    use tracing::info;

    use super::DisplaySurface;
    use crate::core::types::HostFrame;
    use crate::error::{PipelineError, Result};

    /// SDL2 window display.  Cancellation: window close, `q`, or Escape.
    pub struct Sdl2Display {
        canvas: Canvas<Window>,
        texture_creator: TextureCreator<WindowContext>,
        event_pump: sdl2::EventPump,
        width: u32,
        height: u32,
        cancel_requested: bool,
    }

    impl Sdl2Display {
        pub fn new(width: u32, height: u32) -> Result<Self> {
            let sdl = sdl2::init().map_err(PipelineError::Display)?;
            let video = sdl.video().map_err(PipelineError::Display)?;
            let window = video
                .window("vidflow", width, height)
                .position_centered()
                .build()
                .map_err(|e| PipelineError::Display(e.to_string()))?;
            let canvas = window
                .into_canvas()
                .present_vsync()
                .build()
                .map_err(|e| PipelineError::Display(e.to_string()))?;
            let texture_creator = canvas.texture_creator();
            let event_pump = sdl.event_pump().map_err(PipelineError::Display)?;

            Ok(Self {
                canvas,
                texture_creator,
                event_pump,
                width,
                height,
                cancel_requested: false,
            })
        }
    }

    impl DisplaySurface for Sdl2Display {
        fn render(&mut self, frame: &HostFrame) -> Result<()> {
            let mut texture = self
                .texture_creator
                .create_texture_streaming(PixelFormatEnum::RGB24, self.width, self.height)
                .map_err(|e| PipelineError::Display(e.to_string()))?;
            texture
                .update(None, &frame.data, (self.width * 3) as usize)
                .map_err(|e| PipelineError::Display(e.to_string()))?;

            self.canvas.clear();
            self.canvas
                .copy(&texture, None, None)
                .map_err(PipelineError::Display)?;
            self.canvas.present();
            Ok(())
        }

        fn poll_cancel(&mut self) -> bool {
            for event in self.event_pump.poll_iter() {
                match event {
                    Event::Quit { .. }
                    | Event::KeyDown {
                        keycode: Some(Keycode::Q),
                        ..
                    }
                    | Event::KeyDown {
                        keycode: Some(Keycode::Escape),
                        ..
                    } => {
                        self.cancel_requested = true;
                    }
                    _ => {}
                }
            }
            self.cancel_requested
        }

        fn shutdown(&mut self) {
            info!("Display window shut down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PixelFormat;

    #[test]
    fn null_display_counts_and_never_cancels() {
        let mut display = NullDisplay::new();
        let frame = HostFrame {
            index: 0,
            width: 2,
            height: 2,
            format: PixelFormat::Rgb24,
            data: vec![0; 12],
        };
        display.render(&frame).unwrap();
        display.render(&frame).unwrap();
        assert_eq!(display.frames_rendered(), 2);
        assert!(!display.poll_cancel());
        display.shutdown();
    }
}
