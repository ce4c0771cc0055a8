mod csv;
mod geojson;

pub use csv::{write_element_sheet, write_eo_sheet, write_site_sheet};
pub use geojson::write_geojson;
