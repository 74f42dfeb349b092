//! CT scan/mask 切片对象的操作.

mod core;
mod iter;
mod save;

pub use core::{MaskSlice, ScanSlice};

pub use iter::PosIter;

pub use save::ImgWriteVis;

cfg_if::cfg_if! {
    if #[cfg(feature = "plot")] {
        mod plot;

        pub use plot::ImgDisplay;
    }
}
