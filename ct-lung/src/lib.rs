#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 提供 Kaggle 肺癌数据集 (DICOM 序列) 的结构化信息和基础预处理算法.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 数据流严格按照 "加载 -> HU 校准 -> 重采样 -> 肺分割 -> 可视化" 进行,
//!   每个阶段均接受借用的输入, 并返回新分配的结果.
//! 2. 所有可恢复的错误均以 `Result` 返回; 退化输入 (如全空气扫描)
//!   不视为错误.
//!
//! # 功能概览
//!
//! ### DICOM 序列加载 ✅
//!
//! 按 InstanceNumber 排序切片, 由 ImagePositionPatient / SliceLocation
//! 推导层间距.
//!
//! 实现位于 `ct-lung/src/dataset/series.rs`.
//!
//! ### HU 校准与归一化 ✅
//!
//! 实现位于 `ct-lung/src/calibrate.rs`.
//!
//! ### 各向同性重采样 ✅
//!
//! 实现位于 `ct-lung/src/resample.rs`.
//!
//! ### 基于连通域的肺分割 ✅
//!
//! 3D 26-邻域与 2D 8-邻域连通域标记, 最大连通域筛选.
//!
//! 实现位于 `ct-lung/src/segment`.
//!
//! ### CT window 视图 ✅
//!
//! 提供一个独立的 CT 窗口对象, 以便将 CT HU 值转换为 8-bit 灰度值.
//!
//! 实现位于 `ct-lung/src/data/window.rs`.
//!
//! ### 组织类型映射与可视化 ✅
//!
//! 直方图, 单层切片 (灰度或组织伪彩色), 等值面网格 (STL) 与切片动画 (GIF).
//!
//! 实现位于 `ct-lung/src/tissue.rs` 与 `ct-lung/src/vis`.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 3D CT 基础数据结构.
mod data;

pub use data::{
    CtWindow, HuVolume, ImgWriteVis, LungMask, MaskSlice, ScanSlice, VolumeError, VoxelGrid,
};

pub use data::slice::PosIter;

#[cfg(feature = "plot")]
pub use data::ImgDisplay;

pub mod consts;

pub mod calibrate;

pub mod resample;

pub mod segment;

pub mod tissue;

pub mod config;

pub mod dataset;

pub mod vis;

pub mod prelude;
