use super::*;

// Thin wrapper over the `image` crate for writing the presented frame.
pub struct RgbaImage {
    buffer: image::RgbaImage,
}

impl RgbaImage {
    pub fn from_bytes(size: (u32, u32), bytes: Vec<u8>) -> Result<Self> {
        ensure!(
            bytes.len() == (4 * size.0 * size.1) as usize,
            "Pixel buffer is {} bytes, expected {}",
            bytes.len(),
            4 * size.0 * size.1
        );
        let buffer = image::RgbaImage::from_raw(size.0, size.1, bytes)
            .context("Failed to wrap pixel buffer")?;
        Ok(Self { buffer })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.buffer
            .save(path)
            .with_context(|| format!("Writing image: {}", path.display()))?;
        Ok(())
    }
}
