use std::fs::File;
use std::io::{prelude::*, BufWriter};
use std::path::Path;

use anyhow::{ensure, Result};

use jifplay::Rgb;

const MAGIC_NUMBER: &[u8] = b"P3";

/// Write `pixels` (row-major, `width` x `height`) as a plain text ppm.
pub fn write_ppm(path: &Path, width: u16, height: u16, pixels: &[Rgb]) -> Result<()> {
    ensure!(
        pixels.len() == width as usize * height as usize,
        "expected {} pixels for a {}x{} image, got {}",
        width as usize * height as usize,
        width,
        height,
        pixels.len()
    );

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writer.write_all(MAGIC_NUMBER)?;
    writer.write_all(b"\n")?;
    writer.write_all(format!("{} {}", width, height).as_bytes())?;
    writer.write_all(b" 255")?;
    writer.write_all(b"\n")?;

    for row in pixels.chunks(width as usize) {
        let line = row
            .iter()
            .map(|rgb| format!("{: >3} {: >3} {: >3}", rgb.r, rgb.g, rgb.b))
            .collect::<Vec<_>>()
            .join(" ");
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }

    writer.flush()?;
    Ok(())
}
