//! 逐层切片动画 (GIF).

use super::VisError;
use crate::{CtWindow, HuVolume};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, DynamicImage, Frame, GrayImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// 按升序将每个水平切片转为肺窗灰度帧.
pub fn slice_frames(volume: &HuVolume, window: CtWindow) -> Vec<GrayImage> {
    volume
        .slice_iter()
        .map(|sli| sli.to_gray_image(window))
        .collect()
}

/// 将帧序列保存为无限循环的 GIF, 每帧持续 `delay_ms` 毫秒.
pub fn save_gif<P: AsRef<Path>>(frames: Vec<GrayImage>, delay_ms: u32, path: P) -> Result<(), VisError> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| VisError::Io {
        path: path.to_owned(),
        source,
    })?;
    let mut encoder = GifEncoder::new(BufWriter::new(file));
    encoder.set_repeat(Repeat::Infinite)?;
    let delay = Delay::from_numer_denom_ms(delay_ms, 1);
    encoder.encode_frames(frames.into_iter().map(|gray| {
        let rgba = DynamicImage::ImageLuma8(gray).into_rgba8();
        Frame::from_parts(rgba, 0, 0, delay)
    }))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifDecoder;
    use image::AnimationDecoder;
    use ndarray::Array3;

    #[test]
    fn test_gif_has_one_frame_per_slice() {
        let data = Array3::from_shape_fn((3, 4, 5), |(z, _, _)| -1000 + 400 * z as i16);
        let v = HuVolume::new(data, [1.0; 3]).unwrap();
        let frames = slice_frames(&v, CtWindow::from_lung_visual());
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].dimensions(), (5, 4));
        assert!(frames[0].get_pixel(0, 0).0[0] < frames[2].get_pixel(0, 0).0[0]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.gif");
        save_gif(frames, 100, &path).unwrap();

        let decoder = GifDecoder::new(File::open(&path).unwrap()).unwrap();
        let decoded = decoder.into_frames().collect_frames().unwrap();
        assert_eq!(decoded.len(), 3);
    }
}
