use std::fs::{self, File};
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use log::info;

use jifplay::{DecodeOptions, Decoder, FrameBuffer, FrameStatus, Player};

mod ppm_writer;

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args_os().skip(1);
    let Some(input) = args.next().map(PathBuf::from) else {
        bail!("usage: jifplay <file.gif> [output dir]");
    };
    let out_dir = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("frames"));

    let file = File::open(&input).with_context(|| format!("failed to open {}", input.display()))?;
    let mut reader = BufReader::new(file);

    // read the canvas size first so the framebuffer can be allocated up front
    let screen = Decoder::new(&mut reader, DecodeOptions::default())
        .read_header()
        .with_context(|| format!("{} is not a readable gif", input.display()))?;

    fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let sink = FrameBuffer::new(screen.screen_width, screen.screen_height);
    let mut player = Player::new(reader, sink, DecodeOptions::default());
    player.start_decoding()?;

    loop {
        match player.decode_frame(false)? {
            FrameStatus::Frame(frame) => {
                let path = out_dir.join(format!("frame_{}.ppm", frame.index));
                let fb = player.sink();
                ppm_writer::write_ppm(&path, fb.width(), fb.height(), fb.pixels())?;
                if frame.degraded {
                    info!("frame {} was only partially decoded", frame.index);
                }
            }
            FrameStatus::CycleComplete { frames } => {
                info!(
                    "wrote {} frames to {}, one cycle lasts {} ms",
                    frames,
                    out_dir.display(),
                    player.cycle_time_ms()
                );
                break;
            }
        }
    }

    Ok(())
}
