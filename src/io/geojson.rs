use std::path::Path;

use anyhow::{Context, Result};
use geo::MultiPolygon;
use serde_json::{json, Value};

/// Write a layer of multipolygons to a GeoJSON FeatureCollection file.
pub fn write_geojson(path: &Path, geoms: &[MultiPolygon<f64>]) -> Result<()> {
    let features: Vec<Value> = geoms
        .iter()
        .enumerate()
        .map(|(idx, mp)| {
            let mut polygons_json = Vec::new();
            for polygon in mp.0.iter() {
                let exterior: Vec<Vec<f64>> = polygon
                    .exterior()
                    .coords()
                    .map(|c| vec![c.x, c.y])
                    .collect();
                let interiors: Vec<Vec<Vec<f64>>> = polygon
                    .interiors()
                    .iter()
                    .map(|ls| ls.coords().map(|c| vec![c.x, c.y]).collect())
                    .collect();
                let mut rings = vec![exterior];
                rings.extend(interiors);
                polygons_json.push(json!(rings));
            }
            json!({
                "type": "Feature",
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": polygons_json
                },
                "properties": { "index": idx }
            })
        })
        .collect();

    let collection = json!({
        "type": "FeatureCollection",
        "features": features,
    });

    let bytes = serde_json::to_vec(&collection).context("failed to serialize GeoJSON")?;
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}
