//! 可视化: 直方图, 单层切片, 等值面网格与切片动画.
//!
//! 可视化器不保留任何状态, 每次调用都只依赖传入的扫描与渲染配置.
//!
//! # 注意
//!
//! 交互式展示 ([`PlotTarget::Display`]) 需要 `plot` feature.
//! 未打开该 feature 时请求展示会返回 [`VisError::DisplayUnavailable`].

mod animation;
mod figure;
mod histogram;
mod mesh;

pub use animation::{save_gif, slice_frames};
pub use figure::titled_image;
pub use histogram::Histogram;
pub use mesh::{mask_surface_mesh, save_stl, surface_mesh, MASK_ISOVALUE};

use crate::consts::{hu::SURFACE_THRESHOLD, DEFAULT_SLICE_INDEX, HISTOGRAM_BINS};
use crate::dataset::CancerStatus;
use crate::tissue::slice_to_rgb;
use crate::{CtWindow, HuVolume, Idx3d, LungMask, VoxelGrid};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 可视化错误.
#[derive(Debug, Error)]
pub enum VisError {
    /// 图像编码或写入错误.
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// 文件系统错误.
    #[error("cannot write `{path}`: {source}")]
    Io {
        /// 文件路径.
        path: PathBuf,
        /// 底层错误.
        source: std::io::Error,
    },

    /// 切片索引越界.
    #[error("slice index {index} out of range for {len} slices")]
    SliceOutOfRange {
        /// 请求的索引.
        index: usize,
        /// 切片个数.
        len: usize,
    },

    /// 体数据太小, 无法提取等值面.
    #[error("volume {0:?} is too small for surface extraction")]
    VolumeTooSmall(Idx3d),

    /// 等值面提取失败.
    #[error("marching cubes failed: {0}")]
    Mesh(String),

    /// 图表绘制失败.
    #[error("chart rendering failed: {0}")]
    Chart(String),

    /// 该输出不支持交互式展示.
    #[error("interactive display is not supported for {0}")]
    DisplayUnsupported(&'static str),

    /// 未打开 `plot` feature.
    #[error("interactive display requires the `plot` feature")]
    DisplayUnavailable,

    /// 展示窗口错误.
    #[cfg(feature = "plot")]
    #[error("display failed: {0}")]
    Display(#[from] opencv::Error),
}

/// 将 `plotters` 的绘制错误转为 [`VisError::Chart`].
fn chart_err<E: std::fmt::Display>(e: E) -> VisError {
    VisError::Chart(e.to_string())
}

/// 输出方式.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlotTarget {
    /// 保存到给定路径. 父目录不存在时自动创建.
    Save(PathBuf),

    /// 在窗口中交互式展示.
    Display,
}

/// 渲染配置.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// 等值面 HU 阈值.
    pub threshold: f32,
    /// 绘制的水平切片索引.
    pub slice_index: usize,
    /// 是否按组织类型伪彩色绘制切片.
    pub color: bool,
    /// 灰度绘制时使用的 CT 窗.
    pub window: CtWindow,
    /// 直方图分箱个数.
    pub bins: usize,
    /// 直方图图像尺寸 (宽, 高).
    pub histogram_size: (u32, u32),
    /// 动画每帧持续时间, 毫秒.
    pub frame_delay_ms: u32,
    /// 病人的癌症状态, 用于标题.
    pub status: CancerStatus,
    /// 自定义标题. 为 `None` 时使用 `Cancer Status: <status>`.
    pub title: Option<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            threshold: SURFACE_THRESHOLD,
            slice_index: DEFAULT_SLICE_INDEX,
            color: false,
            window: CtWindow::from_lung_visual(),
            bins: HISTOGRAM_BINS,
            histogram_size: (640, 480),
            frame_delay_ms: 100,
            status: CancerStatus::Unknown,
            title: None,
        }
    }
}

impl RenderConfig {
    /// 图表标题.
    pub fn title(&self) -> String {
        match &self.title {
            Some(t) => t.clone(),
            None => format!("Cancer Status: {}", self.status),
        }
    }

    /// 切片图的标题行: 切片索引, 然后是图表标题.
    pub fn slice_titles(&self) -> [String; 2] {
        [format!("CT Slice ({})", self.slice_index), self.title()]
    }
}

/// 确保 `path` 的父目录存在.
fn ensure_parent(path: &Path) -> Result<(), VisError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            std::fs::create_dir_all(dir).map_err(|source| VisError::Io {
                path: dir.to_owned(),
                source,
            })
        }
        _ => Ok(()),
    }
}

/// 保存或展示一张图像.
fn emit(img: DynamicImage, target: &PlotTarget) -> Result<(), VisError> {
    match target {
        PlotTarget::Save(path) => {
            ensure_parent(path)?;
            img.save(path)?;
            Ok(())
        }
        PlotTarget::Display => display(img),
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "plot")] {
        fn display(img: DynamicImage) -> Result<(), VisError> {
            use crate::ImgDisplay;
            match img {
                DynamicImage::ImageLuma8(gray) => gray.show_and_wait()?,
                other => other.into_rgb8().show_and_wait()?,
            };
            Ok(())
        }
    } else {
        fn display(_img: DynamicImage) -> Result<(), VisError> {
            Err(VisError::DisplayUnavailable)
        }
    }
}

/// 无状态可视化器.
#[derive(Debug, Clone, Default)]
pub struct Visualizer {
    config: RenderConfig,
}

impl Visualizer {
    /// 以给定渲染配置构建.
    #[inline]
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// 渲染配置.
    #[inline]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// 渲染第 `slice_index` 层切片: 灰度 (CT 窗) 或组织伪彩色.
    pub fn render_slice(&self, volume: &HuVolume) -> Result<DynamicImage, VisError> {
        let index = self.config.slice_index;
        if index >= volume.len_z() {
            return Err(VisError::SliceOutOfRange {
                index,
                len: volume.len_z(),
            });
        }
        let sli = volume.slice_at(index);
        Ok(if self.config.color {
            DynamicImage::ImageRgb8(slice_to_rgb(&sli))
        } else {
            DynamicImage::ImageLuma8(sli.to_gray_image(self.config.window))
        })
    }

    /// HU 值直方图 (青色柱), 带标题与坐标轴标签.
    pub fn plot_histogram(&self, volume: &HuVolume, target: &PlotTarget) -> Result<Histogram, VisError> {
        let hist = Histogram::from_volume(volume, self.config.bins);
        let img = hist.render(&self.config.title(), self.config.histogram_size)?;
        emit(DynamicImage::ImageRgb8(img), target)?;
        Ok(hist)
    }

    /// 单层切片, 上方标注切片索引与标题.
    pub fn plot_slice(&self, volume: &HuVolume, target: &PlotTarget) -> Result<(), VisError> {
        let fig = titled_image(self.render_slice(volume)?, &self.config.slice_titles())?;
        emit(DynamicImage::ImageRgb8(fig), target)
    }

    /// 等值面网格, 保存为二进制 STL. 返回三角形个数.
    pub fn plot_3d(&self, volume: &HuVolume, target: &PlotTarget) -> Result<usize, VisError> {
        let PlotTarget::Save(path) = target else {
            return Err(VisError::DisplayUnsupported("3D meshes"));
        };
        let triangles = surface_mesh(volume, self.config.threshold)?;
        ensure_parent(path)?;
        save_stl(&triangles, path)?;
        Ok(triangles.len())
    }

    /// 肺掩码的表面网格 (等值面 0.5), 保存为二进制 STL. 返回三角形个数.
    pub fn plot_mask_3d(&self, mask: &LungMask, target: &PlotTarget) -> Result<usize, VisError> {
        let PlotTarget::Save(path) = target else {
            return Err(VisError::DisplayUnsupported("3D meshes"));
        };
        let triangles = mask_surface_mesh(mask)?;
        ensure_parent(path)?;
        save_stl(&triangles, path)?;
        Ok(triangles.len())
    }

    /// 全部水平切片组成的动画. 交互式展示时逐帧播放.
    pub fn plot_animation(&self, volume: &HuVolume, target: &PlotTarget) -> Result<(), VisError> {
        let frames = slice_frames(volume, self.config.window);
        match target {
            PlotTarget::Save(path) => {
                ensure_parent(path)?;
                save_gif(frames, self.config.frame_delay_ms, path)
            }
            PlotTarget::Display => play(frames, self.config.frame_delay_ms),
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "plot")] {
        fn play(frames: Vec<image::GrayImage>, delay_ms: u32) -> Result<(), VisError> {
            use crate::ImgDisplay;
            let d = std::time::Duration::from_millis(delay_ms as u64);
            for frame in frames.iter() {
                frame.show_and_wait_for(d)?;
            }
            Ok(())
        }
    } else {
        fn play(_frames: Vec<image::GrayImage>, _delay_ms: u32) -> Result<(), VisError> {
            Err(VisError::DisplayUnavailable)
        }
    }
}
