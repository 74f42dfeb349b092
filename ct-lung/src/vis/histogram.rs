//! HU 值直方图.

use super::{chart_err, VisError};
use crate::HuVolume;
use image::RgbImage;
use plotters::prelude::{BitMapBackend, ChartBuilder, Color, IntoDrawingArea, IntoFont, Rectangle, CYAN, WHITE};

/// 横轴标签.
const X_DESC: &str = "Hounsfield Units (HU)";

/// 纵轴标签.
const Y_DESC: &str = "Frequency";

/// 等宽分箱直方图.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    lo: f64,
    hi: f64,
    counts: Vec<u64>,
}

impl Histogram {
    /// 在 `[min, max]` 上等分 `bins` 个箱统计所有 HU 值, 最后一个箱包含右端点.
    ///
    /// 所有值相同时, 使用 `[v - 0.5, v + 0.5]` 作为范围. `bins` 为 0 时按 1 处理.
    pub fn from_volume(volume: &HuVolume, bins: usize) -> Self {
        let bins = bins.max(1);
        let (min, max) = volume.min_max();
        let (lo, hi) = if min == max {
            (min as f64 - 0.5, max as f64 + 0.5)
        } else {
            (min as f64, max as f64)
        };
        let mut counts = vec![0u64; bins];
        let scale = bins as f64 / (hi - lo);
        for &hu in volume.data().iter() {
            let idx = (((hu as f64 - lo) * scale) as usize).min(bins - 1);
            counts[idx] += 1;
        }
        Self { lo, hi, counts }
    }

    /// 各箱计数.
    #[inline]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// 统计范围 `(下限, 上限)`.
    #[inline]
    pub fn range(&self) -> (f64, f64) {
        (self.lo, self.hi)
    }

    /// 单个箱的宽度.
    #[inline]
    pub fn bin_width(&self) -> f64 {
        (self.hi - self.lo) / self.counts.len() as f64
    }

    /// 总计数.
    #[inline]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// 以 `title` 为标题绘制 `width` x `height` 的柱状图. 柱为青色, 背景为白色.
    pub fn render(&self, title: &str, (width, height): (u32, u32)) -> Result<RgbImage, VisError> {
        if width == 0 || height == 0 {
            return Err(VisError::Chart(format!("empty figure size {width}x{height}")));
        }
        let mut buf = vec![0u8; width as usize * height as usize * 3];
        {
            let root = BitMapBackend::with_buffer(&mut buf, (width, height)).into_drawing_area();
            root.fill(&WHITE).map_err(chart_err)?;

            let peak = self.counts.iter().copied().max().unwrap_or(0).max(1);
            let mut chart = ChartBuilder::on(&root)
                .caption(title, ("sans-serif", 20).into_font())
                .margin(10)
                .x_label_area_size(45)
                .y_label_area_size(60)
                .build_cartesian_2d(self.lo..self.hi, 0u64..peak + peak / 10 + 1)
                .map_err(chart_err)?;
            chart
                .configure_mesh()
                .disable_x_mesh()
                .x_desc(X_DESC)
                .y_desc(Y_DESC)
                .draw()
                .map_err(chart_err)?;

            let bw = self.bin_width();
            chart
                .draw_series(self.counts.iter().enumerate().map(|(i, &c)| {
                    let x0 = self.lo + i as f64 * bw;
                    Rectangle::new([(x0, 0), (x0 + bw, c)], CYAN.filled())
                }))
                .map_err(chart_err)?;
            root.present().map_err(chart_err)?;
        }
        RgbImage::from_raw(width, height, buf).ok_or_else(|| VisError::Chart("histogram buffer size mismatch".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use ndarray::array;

    #[test]
    fn test_bin_counts() {
        let v = HuVolume::new(array![[[-1000, -1000], [0, 1000]]], [1.0; 3]).unwrap();
        let h = Histogram::from_volume(&v, 4);
        assert_eq!(h.range(), (-1000.0, 1000.0));
        assert_eq!(h.bin_width(), 500.0);
        // 0 恰好落在第 3 个箱的左端点, 1000 落在最后一个箱.
        assert_eq!(h.counts(), &[2, 0, 1, 1]);
        assert_eq!(h.total(), 4);
    }

    #[test]
    fn test_constant_volume() {
        let v = HuVolume::new(array![[[7, 7, 7]]], [1.0; 3]).unwrap();
        let h = Histogram::from_volume(&v, 80);
        assert_eq!(h.counts().len(), 80);
        assert_eq!(h.total(), 3);
        assert_eq!(h.counts()[40], 3);
    }

    #[test]
    fn test_render_has_cyan_bars() {
        let v = HuVolume::new(array![[[-1000, -1000], [0, 1000]]], [1.0; 3]).unwrap();
        let hist = Histogram::from_volume(&v, 80);
        let img = hist.render("Cancer Status: benign", (640, 480)).unwrap();
        assert_eq!(img.dimensions(), (640, 480));
        assert!(img.pixels().any(|p| *p == Rgb([0, 255, 255])));
        assert_eq!(*img.get_pixel(639, 479), Rgb([255, 255, 255]));

        // 标题不同, 图像不同.
        let other = hist.render("Cancer Status: cancerous", (640, 480)).unwrap();
        assert_ne!(img, other);

        assert!(matches!(hist.render("", (0, 480)), Err(VisError::Chart(_))));
    }
}
