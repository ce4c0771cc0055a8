mod buffer;
mod cluster;
mod coalesce;
mod ops;
mod smooth;

pub use buffer::{buffer, buffer_lines, disk};
pub use cluster::{cluster_within, mp_distance, poly_distance, IndexedBounds};
pub use coalesce::{coalesce, cull_frags, shrink_wrap};
pub use ops::{
    canonicalize, clean_clip, clean_erase, dissolve, drop_small_parts, explode, fill_holes_area,
    fill_holes_pct, generalize, line_length, perimeter, point_seg_distance, ring_area, union_all,
};
pub use smooth::smooth_paek;
