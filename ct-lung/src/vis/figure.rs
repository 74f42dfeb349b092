//! 带标题的单张图像.

use super::{chart_err, VisError};
use image::{DynamicImage, RgbImage};
use plotters::prelude::{BitMapBackend, BitMapElement, IntoDrawingArea, IntoFont, WHITE};

/// 图像四周的留白, 像素.
const PAD: u32 = 10;

/// 每行标题占用的高度, 像素.
const TITLE_LINE: u32 = 36;

/// 图像区域的最小宽度, 保证标题不被截断.
const MIN_WIDTH: u32 = 320;

/// 带 `lines` 行标题时整张图的尺寸.
pub(crate) fn figure_size(image: (u32, u32), lines: usize) -> (u32, u32) {
    let (w, h) = image;
    (
        w.max(MIN_WIDTH) + 2 * PAD,
        h + 2 * PAD + TITLE_LINE * lines as u32,
    )
}

/// 在 `img` 上方逐行绘制 `titles`, 图像水平居中.
pub fn titled_image(img: DynamicImage, titles: &[String]) -> Result<RgbImage, VisError> {
    let (iw, ih) = (img.width(), img.height());
    let (width, height) = figure_size((iw, ih), titles.len());
    let mut buf = vec![0u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;

        let mut area = root.clone();
        for line in titles {
            area = area
                .titled(line, ("sans-serif", 18).into_font())
                .map_err(chart_err)?;
        }
        // 标题之下剩余区域内居中.
        let (_, rest) = area.dim_in_pixel();
        let left = (width - iw) / 2;
        let top = rest.saturating_sub(ih) / 2;
        let elem: BitMapElement<_> = ((left as i32, top as i32), img).into();
        area.draw(&elem).map_err(chart_err)?;
        root.present().map_err(chart_err)?;
    }
    RgbImage::from_raw(width, height, buf).ok_or_else(|| VisError::Chart("figure buffer size mismatch".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb};

    #[test]
    fn test_figure_size() {
        assert_eq!(figure_size((8, 8), 2), (340, 100));
        assert_eq!(figure_size((512, 400), 1), (532, 456));
    }

    #[test]
    fn test_image_is_centered_below_titles() {
        let img = GrayImage::from_pixel(40, 30, Luma([90]));
        let titles = ["CT Slice (3)".to_string(), "Cancer Status: benign".to_string()];
        let fig = titled_image(DynamicImage::ImageLuma8(img), &titles).unwrap();
        assert_eq!(fig.dimensions(), figure_size((40, 30), 2));

        let (w, h) = fig.dimensions();
        let copied = fig.pixels().filter(|p| **p == Rgb([90, 90, 90])).count();
        assert!(copied >= 40 * 30);
        assert_eq!(*fig.get_pixel(0, h - 1), Rgb([255, 255, 255]));
        assert_eq!(*fig.get_pixel(w - 1, h - 1), Rgb([255, 255, 255]));

        let untitled = titled_image(DynamicImage::ImageLuma8(GrayImage::new(40, 30)), &[]).unwrap();
        assert_ne!(untitled.dimensions(), fig.dimensions());
    }
}
