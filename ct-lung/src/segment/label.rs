//! 连通域标记.
//!
//! 3D 使用 26-邻域, 2D 使用 8-邻域, 连通域为取值相同的极大区域.
//! 标签从 1 开始, 按照行优先扫描时首次出现的顺序编号; 0 代表背景.

use crate::{Idx2d, Idx3d, PosIter};
use ndarray::{Array2, Array3, ArrayView2, ArrayView3};
use std::collections::VecDeque;

/// 连通域标记结果.
#[derive(Debug, Clone)]
pub struct Labeling<L> {
    labels: L,
    sizes: Vec<usize>,
}

/// 3D 标记结果.
pub type Labeling3d = Labeling<Array3<u32>>;

/// 2D 标记结果.
pub type Labeling2d = Labeling<Array2<u32>>;

impl<L> Labeling<L> {
    /// 标签数组. 0 为背景.
    #[inline]
    pub fn labels(&self) -> &L {
        &self.labels
    }

    /// 连通域个数 (不含背景).
    #[inline]
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// 是否不存在任何连通域?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// 标签 `label` 对应连通域的体素个数. 背景或不存在的标签返回 0.
    #[inline]
    pub fn size_of(&self, label: u32) -> usize {
        match label {
            0 => 0,
            l => self.sizes.get(l as usize - 1).copied().unwrap_or(0),
        }
    }

    /// 最大连通域的标签. 若存在多个最大者, 取标签最小 (即行优先最先出现) 的那个.
    ///
    /// 不存在连通域时返回 `None`.
    pub fn largest(&self) -> Option<u32> {
        let mut best: Option<(u32, usize)> = None;
        for (i, &size) in self.sizes.iter().enumerate() {
            if best.map_or(true, |(_, s)| size > s) {
                best = Some((i as u32 + 1, size));
            }
        }
        best.map(|(label, _)| label)
    }
}

/// 获得 `pos` 的合法 26-邻居索引.
fn neighbour26((z, h, w): Idx3d, (lz, lh, lw): Idx3d) -> impl Iterator<Item = Idx3d> {
    (-1isize..=1)
        .flat_map(|dz| (-1isize..=1).flat_map(move |dh| (-1isize..=1).map(move |dw| (dz, dh, dw))))
        .filter(|d| *d != (0, 0, 0))
        .filter_map(move |(dz, dh, dw)| {
            let nz = z.checked_add_signed(dz)?;
            let nh = h.checked_add_signed(dh)?;
            let nw = w.checked_add_signed(dw)?;
            (nz < lz && nh < lh && nw < lw).then_some((nz, nh, nw))
        })
}

/// 获得 `pos` 的合法 8-邻居索引.
fn neighbour8((h, w): Idx2d, (lh, lw): Idx2d) -> impl Iterator<Item = Idx2d> {
    (-1isize..=1)
        .flat_map(|dh| (-1isize..=1).map(move |dw| (dh, dw)))
        .filter(|d| *d != (0, 0))
        .filter_map(move |(dh, dw)| {
            let nh = h.checked_add_signed(dh)?;
            let nw = w.checked_add_signed(dw)?;
            (nh < lh && nw < lw).then_some((nh, nw))
        })
}

/// 3D 26-邻域连通域标记. 值等于 `background` 的体素标记为 0;
/// `background` 为 `None` 时所有取值均参与标记.
pub fn label_3d<T: PartialEq + Copy>(data: ArrayView3<'_, T>, background: Option<T>) -> Labeling3d {
    let dim = data.dim();
    let mut labels = Array3::<u32>::zeros(dim);
    let mut sizes = Vec::new();
    let mut bfs_q = VecDeque::with_capacity(64);

    for (seed, &value) in data.indexed_iter() {
        if labels[seed] != 0 || background == Some(value) {
            continue;
        }
        let label = sizes.len() as u32 + 1;
        let mut size = 0usize;
        labels[seed] = label;
        bfs_q.push_back(seed);
        while let Some(cur) = bfs_q.pop_front() {
            size += 1;
            for next in neighbour26(cur, dim) {
                if labels[next] == 0 && data[next] == value {
                    labels[next] = label;
                    bfs_q.push_back(next);
                }
            }
        }
        sizes.push(size);
    }
    Labeling { labels, sizes }
}

/// 2D 8-邻域连通域标记. 值等于 `background` 的像素标记为 0;
/// `background` 为 `None` 时所有取值均参与标记.
pub fn label_2d<T: PartialEq + Copy>(data: ArrayView2<'_, T>, background: Option<T>) -> Labeling2d {
    let dim = data.dim();
    let mut labels = Array2::<u32>::zeros(dim);
    let mut sizes = Vec::new();
    let mut bfs_q = VecDeque::with_capacity(16);

    for seed in PosIter::new(dim) {
        let value = data[seed];
        if labels[seed] != 0 || background == Some(value) {
            continue;
        }
        let label = sizes.len() as u32 + 1;
        let mut size = 0usize;
        labels[seed] = label;
        bfs_q.push_back(seed);
        while let Some(cur) = bfs_q.pop_front() {
            size += 1;
            for next in neighbour8(cur, dim) {
                if labels[next] == 0 && data[next] == value {
                    labels[next] = label;
                    bfs_q.push_back(next);
                }
            }
        }
        sizes.push(size);
    }
    Labeling { labels, sizes }
}

/// 仅保留 `mask` 中最大的 26-邻域连通域. 全为 `false` 时原样返回.
pub fn keep_largest_component(mask: ArrayView3<'_, bool>) -> Array3<bool> {
    let labeling = label_3d(mask, Some(false));
    match labeling.largest() {
        None => mask.to_owned(),
        Some(keep) => labeling.labels.mapv(|l| l == keep),
    }
}
