//! 图像的持久化存储.

use crate::consts::gray;
use crate::{CtWindow, MaskSlice, ScanSlice};
use image::{GrayImage, ImageResult, Luma};
use std::path::Path;

/// 表明一个可以通过 **可视化友好** 模式持久化存储的图像对象.
///
/// 图像将以 "可视化友好" 的方式保存, 而不是 "as is" 的方式. 这意味着,
/// 对于 `MaskSlice` 这类二值图像, 在保存时肺会映射为白色, 背景为黑色;
/// 对于 `ScanSlice` 这类以 CT HU 值存储的扫描, 在保存时会用肺窗规范化.
pub trait ImgWriteVis {
    /// 按照一定的可视化规则将图片保存到 `path` 路径.
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

impl ScanSlice<'_> {
    /// 用给定 CT 窗将切片转化为单通道灰度图.
    pub fn to_gray_image(&self, window: CtWindow) -> GrayImage {
        let (height, width) = self.shape();
        let mut buf = GrayImage::new(width as u32, height as u32);
        for ((h, w), &hu) in self.indexed_iter() {
            buf.put_pixel(w as u32, h as u32, Luma([window.eval_hu(hu)]));
        }
        buf
    }
}

impl MaskSlice<'_> {
    /// 将掩码转化为单通道灰度图, 肺为白色, 背景为黑色.
    pub fn to_gray_image(&self) -> GrayImage {
        let (height, width) = self.shape();
        let mut buf = GrayImage::new(width as u32, height as u32);
        for ((h, w), &lung) in self.indexed_iter() {
            buf.put_pixel(w as u32, h as u32, Luma([gray::pretty(lung)]));
        }
        buf
    }
}

/// 窗位 -600, 窗宽 1500.
impl ImgWriteVis for ScanSlice<'_> {
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        self.to_gray_image(CtWindow::from_lung_visual()).save(path)
    }
}

/// 肺为白色, 背景为黑色.
impl ImgWriteVis for MaskSlice<'_> {
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        self.to_gray_image().save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::ImgWriteVis;
    use crate::{HuVolume, LungMask};
    use ndarray::Array3;

    #[test]
    fn test_save_slices() {
        let dir = tempfile::tempdir().unwrap();

        let mut data = Array3::<i16>::from_elem((1, 3, 4), -1000);
        data[(0, 2, 3)] = 400;
        let scan = HuVolume::new(data, [1.0; 3]).unwrap();
        let scan_path = dir.path().join("scan.png");
        scan.slice_at(0).save(&scan_path).unwrap();
        let img = image::open(&scan_path).unwrap().into_luma8();
        assert_eq!(img.dimensions(), (4, 3));
        assert_eq!(img.get_pixel(3, 2).0, [255]);
        assert!(img.get_pixel(0, 0).0[0] < 128);

        let mut raw = Array3::<i8>::zeros((1, 3, 4));
        raw[(0, 1, 2)] = 1;
        let mask = LungMask::from_i8(raw, [1.0; 3]).unwrap();
        let mask_path = dir.path().join("mask.png");
        mask.slice_at(0).save(&mask_path).unwrap();
        let img = image::open(&mask_path).unwrap().into_luma8();
        assert_eq!(img.get_pixel(2, 1).0, [255]);
        assert_eq!(img.get_pixel(0, 0).0, [0]);
    }
}
