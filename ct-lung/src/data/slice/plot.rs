//! 图片展示模块, 主要用于调试与交互式查看.
//!
//! # 注意
//!
//! 需要 `plot` feature.

use crate::{CtWindow, MaskSlice, ScanSlice};
use image::{GrayImage, RgbImage};
use opencv::core::{Mat, Scalar, Size, Vec3b, CV_8UC1, CV_8UC3};
use opencv::highgui::{imshow, wait_key};
use opencv::prelude::MatTrait;
use std::time::Duration;

/// 展示窗口的标题.
const WINDOW_NAME: &str = "Image";

/// 表明一个可以在窗口中可视化的对象.
pub trait ImgDisplay {
    /// 展示对象.
    fn show(&self) -> opencv::Result<()>;

    /// 同 `show()`, 但在之后自动等待一次用户按键输入.
    fn show_and_wait(&self) -> opencv::Result<i32> {
        self.show()?;
        wait_key(0)
    }

    /// 同 `show()`, 但在之后自动等待给定时间.
    fn show_and_wait_for(&self, d: Duration) -> opencv::Result<i32> {
        self.show()?;
        let ms = d.as_millis().min(i32::MAX as u128);
        wait_key(ms as i32)
    }
}

/// 将单通道灰度图复制为 OpenCV 矩阵.
fn gray_to_opencv_mat(img: &GrayImage) -> opencv::Result<Mat> {
    let (w, h) = img.dimensions();
    let mut mat = Mat::new_size_with_default(Size::new(w as i32, h as i32), CV_8UC1, Scalar::from(0))?;
    for (x, y, p) in img.enumerate_pixels() {
        *mat.at_2d_mut::<u8>(y as i32, x as i32)? = p.0[0];
    }
    Ok(mat)
}

/// 将 RGB 图复制为 OpenCV 矩阵. OpenCV 以 BGR 顺序存储.
fn rgb_to_opencv_mat(img: &RgbImage) -> opencv::Result<Mat> {
    let (w, h) = img.dimensions();
    let mut mat = Mat::new_size_with_default(Size::new(w as i32, h as i32), CV_8UC3, Scalar::from(0))?;
    for (x, y, p) in img.enumerate_pixels() {
        let [r, g, b] = p.0;
        *mat.at_2d_mut::<Vec3b>(y as i32, x as i32)? = Vec3b::from([b, g, r]);
    }
    Ok(mat)
}

impl ImgDisplay for GrayImage {
    fn show(&self) -> opencv::Result<()> {
        imshow(WINDOW_NAME, &gray_to_opencv_mat(self)?)
    }
}

impl ImgDisplay for RgbImage {
    fn show(&self) -> opencv::Result<()> {
        imshow(WINDOW_NAME, &rgb_to_opencv_mat(self)?)
    }
}

/// 以肺窗可视化扫描.
impl ImgDisplay for ScanSlice<'_> {
    fn show(&self) -> opencv::Result<()> {
        self.to_gray_image(CtWindow::from_lung_visual()).show()
    }
}

/// 肺为白色, 背景为黑色.
impl ImgDisplay for MaskSlice<'_> {
    fn show(&self) -> opencv::Result<()> {
        self.to_gray_image().show()
    }
}
