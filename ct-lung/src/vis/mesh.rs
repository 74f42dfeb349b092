//! 等值面网格提取 (marching cubes) 与 STL 导出.

use super::VisError;
use crate::{HuVolume, Idx3d, LungMask, VoxelGrid};
use lin_alg::f32::Vec3;
use mcubes::{MarchingCubes, MeshSide};
use ndarray::ArrayView3;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use stl_io::{Normal, Triangle, Vertex};

/// 按直立姿态排列体素: 轴转置为 (列, 行, 层), 且层方向翻转.
///
/// 返回 x 变化最快的扁平数组, 即 `values[x + y * cols + z * cols * rows]`.
fn upright_values<T: Copy>(data: ArrayView3<'_, T>, to_f32: impl Fn(T) -> f32) -> Vec<f32> {
    let mut values = Vec::with_capacity(data.len());
    for sli in data.outer_iter().rev() {
        values.extend(sli.iter().map(|&v| to_f32(v)));
    }
    values
}

/// 二值掩码的等值面取在 0 与 1 的中点.
pub const MASK_ISOVALUE: f32 = 0.5;

/// 三角形法向量. 退化三角形返回 +z.
fn face_normal(v: &[[f32; 3]; 3]) -> [f32; 3] {
    let e1 = [v[1][0] - v[0][0], v[1][1] - v[0][1], v[1][2] - v[0][2]];
    let e2 = [v[2][0] - v[0][0], v[2][1] - v[0][1], v[2][2] - v[0][2]];
    let n = [
        e1[1] * e2[2] - e1[2] * e2[1],
        e1[2] * e2[0] - e1[0] * e2[2],
        e1[0] * e2[1] - e1[1] * e2[0],
    ];
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    if len > 0.0 {
        [n[0] / len, n[1] / len, n[2] / len]
    } else {
        [0.0, 0.0, 1.0]
    }
}

/// 在 `threshold` 等值面处提取扫描的三角网格. 坐标以毫米为单位.
///
/// 每个维度至少需要 2 个体素.
pub fn surface_mesh(volume: &HuVolume, threshold: f32) -> Result<Vec<Triangle>, VisError> {
    let values = upright_values(volume.data(), f32::from);
    march(values, volume.shape(), volume.spacing(), threshold)
}

/// 肺掩码表面的三角网格, 等值面为 [`MASK_ISOVALUE`]. 排列方式与 [`surface_mesh`] 相同.
pub fn mask_surface_mesh(mask: &LungMask) -> Result<Vec<Triangle>, VisError> {
    let values = upright_values(mask.data(), |lung| if lung { 1.0 } else { 0.0 });
    march(values, mask.shape(), mask.spacing(), MASK_ISOVALUE)
}

/// 对直立排列的 `values` 执行 marching cubes.
fn march(
    values: Vec<f32>,
    (z, h, w): Idx3d,
    [sz, sh, sw]: [f64; 3],
    threshold: f32,
) -> Result<Vec<Triangle>, VisError> {
    if z < 2 || h < 2 || w < 2 {
        return Err(VisError::VolumeTooSmall((z, h, w)));
    }
    let mc = MarchingCubes::new(
        (w, h, z),
        (
            (w as f64 * sw) as f32,
            (h as f64 * sh) as f32,
            (z as f64 * sz) as f32,
        ),
        (w as f32, h as f32, z as f32),
        Vec3::new_zero(),
        values,
        threshold,
    )
    .map_err(|e| VisError::Mesh(format!("{e:?}")))?;
    let mesh = mc.generate(MeshSide::OutsideOnly);

    let triangles: Vec<Triangle> = mesh
        .indices
        .chunks_exact(3)
        .map(|tri| {
            let v = [tri[0], tri[1], tri[2]].map(|i| {
                let p = &mesh.vertices[i].posit;
                [p.x, p.y, p.z]
            });
            Triangle {
                normal: Normal::new(face_normal(&v)),
                vertices: v.map(Vertex::new),
            }
        })
        .collect();
    log::debug!(
        "marching cubes at {threshold}: {} vertices, {} triangles",
        mesh.vertices.len(),
        triangles.len()
    );
    Ok(triangles)
}

/// 以二进制 STL 格式保存三角网格.
pub fn save_stl<P: AsRef<Path>>(triangles: &[Triangle], path: P) -> Result<(), VisError> {
    let path = path.as_ref();
    let io_err = |source| VisError::Io {
        path: path.to_owned(),
        source,
    };
    let mut file = BufWriter::new(File::create(path).map_err(io_err)?);
    stl_io::write_stl(&mut file, triangles.iter()).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{s, Array3};

    fn cube() -> HuVolume {
        let mut data = Array3::<i16>::from_elem((6, 6, 6), -1000);
        data.slice_mut(s![2..4, 2..4, 2..4]).fill(40);
        HuVolume::new(data, [1.0; 3]).unwrap()
    }

    #[test]
    fn test_upright_values_flip_slices() {
        let mut data = Array3::<i16>::zeros((2, 1, 2));
        data[(0, 0, 1)] = 1;
        data[(1, 0, 0)] = 2;
        assert_eq!(upright_values(data.view(), f32::from), vec![2.0, 0.0, 0.0, 1.0]);

        let mut raw = Array3::<i8>::zeros((2, 1, 2));
        raw[(0, 0, 1)] = 1;
        let mask = LungMask::from_i8(raw, [1.0; 3]).unwrap();
        let values = upright_values(mask.data(), |lung| if lung { 1.0 } else { 0.0 });
        assert_eq!(values, vec![0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_face_normal() {
        let n = face_normal(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        assert_eq!(n, [0.0, 0.0, 1.0]);
        let degenerate = face_normal(&[[1.0; 3]; 3]);
        assert_eq!(degenerate, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_cube_surface_to_stl() {
        let triangles = surface_mesh(&cube(), -300.0).unwrap();
        assert!(!triangles.is_empty());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.stl");
        save_stl(&triangles, &path).unwrap();
        // 二进制 STL: 80 字节头 + 4 字节计数 + 每个三角形 50 字节.
        let len = std::fs::metadata(&path).unwrap().len();
        assert_eq!(len, 84 + 50 * triangles.len() as u64);
    }

    #[test]
    fn test_mask_surface_matches_scan_topology() {
        let mut raw = Array3::<i8>::zeros((6, 6, 6));
        raw.slice_mut(s![2..4, 2..4, 2..4]).fill(1);
        let mask = LungMask::from_i8(raw, [2.0, 1.0, 1.0]).unwrap();
        let triangles = mask_surface_mesh(&mask).unwrap();
        assert!(!triangles.is_empty());

        // 角点符号与扫描在 -300 处的分类一致, 因此三角形个数相同.
        let scan = HuVolume::new(cube().data().to_owned(), [2.0, 1.0, 1.0]).unwrap();
        assert_eq!(triangles.len(), surface_mesh(&scan, -300.0).unwrap().len());

        // z 方向物理尺寸为 12 mm.
        for t in &triangles {
            for v in &t.vertices {
                assert!((0.0..=12.0).contains(&v[2]));
            }
        }

        let empty = LungMask::from_i8(Array3::zeros((3, 3, 3)), [1.0; 3]).unwrap();
        assert!(mask_surface_mesh(&empty).unwrap().is_empty());
    }

    #[test]
    fn test_too_small() {
        let v = HuVolume::new(Array3::zeros((1, 4, 4)), [1.0; 3]).unwrap();
        assert!(matches!(
            surface_mesh(&v, -300.0),
            Err(VisError::VolumeTooSmall((1, 4, 4)))
        ));
        let mask = LungMask::from_i8(Array3::zeros((4, 1, 4)), [1.0; 3]).unwrap();
        assert!(matches!(
            mask_surface_mesh(&mask),
            Err(VisError::VolumeTooSmall((4, 1, 4)))
        ));
    }
}
