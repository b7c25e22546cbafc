//! Headless capture: PNG screenshots of the UI surface.

use std::error::Error;
use std::fs;
use std::io::BufWriter;
use std::path::Path;

use spectrum_bridge::ScreenSync;

/// Save the UI-visible image as a PNG file.
pub fn save_screenshot(screen: &ScreenSync, path: &Path) -> Result<(), Box<dyn Error>> {
    let (width, height, rgba) = screen.snapshot_rgba();

    let file = fs::File::create(path)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&rgba)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectrum_bridge::{Rect, TextureSurface};

    #[test]
    fn screenshot_round_trips_through_png() {
        let screen = ScreenSync::new(4, 2, 4).expect("valid");
        let mut live = TextureSurface::new(4, 2, 4).expect("valid");
        live.set_pixel(3, 1, 0xFF12_3456);
        live.mark_dirty(Rect::new(0, 0, 4, 2));
        screen.publish(&mut live);

        let path = std::env::temp_dir().join(format!("bridge-runner-{}.png", std::process::id()));
        save_screenshot(&screen, &path).expect("write png");

        let decoder = png::Decoder::new(fs::File::open(&path).expect("open png"));
        let mut reader = decoder.read_info().expect("png header");
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).expect("png frame");
        fs::remove_file(&path).ok();

        assert_eq!((info.width, info.height), (4, 2));
        let last = &buf[(4 + 3) * 4..(4 + 3) * 4 + 4];
        assert_eq!(last, &[0x12, 0x34, 0x56, 0xFF]);
    }
}
