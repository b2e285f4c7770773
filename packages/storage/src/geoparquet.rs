//! `GeoParquet` 1.0 reading and writing.
//!
//! Geometry is stored WKB-encoded in a `geometry` binary column. The `geo`
//! file metadata names the primary column, the geometry types present,
//! the bounding box and the CRS as a PROJJSON `id` reference
//! (`{"id": {"authority": "EPSG", "code": 2227}}`).

use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BinaryBuilder, BooleanBuilder, Float64Builder, Int64Builder,
    StringBuilder,
};
use arrow::datatypes::{DataType, Field, Float32Type, Float64Type, Int32Type, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use diridon_spatial_models::{AttributeValue, Crs, Feature, Layer, Properties};
use geo::BoundingRect;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use serde_json::json;

use crate::paths::ensure_parent;
use crate::{StorageError, wkb};

/// Name of the geometry column.
pub const GEOMETRY_COLUMN: &str = "geometry";

/// File metadata key holding `GeoParquet` metadata.
pub const GEO_METADATA_KEY: &str = "geo";

/// Arrow type chosen for an attribute column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Only booleans (and nulls).
    Boolean,
    /// Only integers (and nulls).
    Int64,
    /// Numbers, possibly mixed with integers.
    Float64,
    /// Anything containing text, or only nulls.
    Utf8,
}

impl ColumnType {
    const fn data_type(self) -> DataType {
        match self {
            Self::Boolean => DataType::Boolean,
            Self::Int64 => DataType::Int64,
            Self::Float64 => DataType::Float64,
            Self::Utf8 => DataType::Utf8,
        }
    }
}

/// Infers the narrowest column type holding every value of `column`.
#[must_use]
pub fn infer_column_type(layer: &Layer, column: &str) -> ColumnType {
    let mut seen_bool = false;
    let mut seen_int = false;
    let mut seen_float = false;

    for feature in &layer.features {
        match feature.get(column) {
            AttributeValue::Null => {}
            AttributeValue::Bool(_) => seen_bool = true,
            AttributeValue::Integer(_) => seen_int = true,
            AttributeValue::Number(_) => seen_float = true,
            AttributeValue::Text(_) => return ColumnType::Utf8,
        }
    }

    match (seen_bool, seen_int, seen_float) {
        (true, false, false) => ColumnType::Boolean,
        (false, true, false) => ColumnType::Int64,
        (false, _, true) => ColumnType::Float64,
        _ => ColumnType::Utf8,
    }
}

fn build_column(layer: &Layer, column: &str, kind: ColumnType) -> ArrayRef {
    let values = layer.features.iter().map(|f| f.get(column));

    match kind {
        ColumnType::Boolean => {
            let mut builder = BooleanBuilder::with_capacity(layer.len());
            for v in values {
                builder.append_option(v.as_bool());
            }
            Arc::new(builder.finish())
        }
        ColumnType::Int64 => {
            let mut builder = Int64Builder::with_capacity(layer.len());
            for v in values {
                builder.append_option(match v {
                    AttributeValue::Integer(i) => Some(*i),
                    _ => None,
                });
            }
            Arc::new(builder.finish())
        }
        ColumnType::Float64 => {
            let mut builder = Float64Builder::with_capacity(layer.len());
            for v in values {
                builder.append_option(v.as_f64());
            }
            Arc::new(builder.finish())
        }
        ColumnType::Utf8 => {
            let mut builder = StringBuilder::new();
            for v in values {
                builder.append_option(v.as_text());
            }
            Arc::new(builder.finish())
        }
    }
}

/// Builds the `geo` metadata document for a layer.
#[must_use]
pub fn geo_metadata(layer: &Layer) -> serde_json::Value {
    let types: BTreeSet<&str> = layer
        .features
        .iter()
        .filter_map(|f| f.geometry.as_ref())
        .map(wkb::geometry_type_name)
        .collect();

    let bbox = layer
        .features
        .iter()
        .filter_map(|f| f.geometry.as_ref()?.bounding_rect())
        .reduce(|a, b| {
            geo::Rect::new(
                geo::coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                geo::coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
            )
        });

    let mut column = json!({
        "encoding": "WKB",
        "geometry_types": types,
        "crs": { "id": { "authority": "EPSG", "code": layer.crs.epsg() } },
    });
    if let Some(rect) = bbox {
        column["bbox"] = json!([rect.min().x, rect.min().y, rect.max().x, rect.max().y]);
    }

    json!({
        "version": "1.0.0",
        "primary_column": GEOMETRY_COLUMN,
        "columns": { GEOMETRY_COLUMN: column },
    })
}

/// Converts a layer into a single Arrow record batch: one column per
/// attribute (sorted by name) followed by the WKB geometry column.
///
/// # Errors
///
/// Returns [`StorageError::Arrow`] if the batch cannot be assembled.
pub fn layer_to_record_batch(layer: &Layer) -> Result<RecordBatch, StorageError> {
    let mut fields = Vec::new();
    let mut arrays: Vec<ArrayRef> = Vec::new();

    for column in layer.columns() {
        if column == GEOMETRY_COLUMN {
            log::warn!(
                "Layer '{}' has an attribute named '{GEOMETRY_COLUMN}'; it is not written",
                layer.name
            );
            continue;
        }
        let kind = infer_column_type(layer, &column);
        arrays.push(build_column(layer, &column, kind));
        fields.push(Field::new(column, kind.data_type(), true));
    }

    let mut geometry = BinaryBuilder::new();
    for feature in &layer.features {
        geometry.append_option(feature.geometry.as_ref().map(wkb::encode));
    }
    arrays.push(Arc::new(geometry.finish()));
    fields.push(Field::new(GEOMETRY_COLUMN, DataType::Binary, true));

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// Writes a layer as `GeoParquet` (Snappy-compressed).
///
/// # Errors
///
/// Returns [`StorageError`] if the file cannot be created or encoded.
pub fn write_geoparquet(layer: &Layer, path: &Path) -> Result<(), StorageError> {
    ensure_parent(path)?;
    let batch = layer_to_record_batch(layer)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_key_value_metadata(Some(vec![KeyValue::new(
            GEO_METADATA_KEY.to_string(),
            geo_metadata(layer).to_string(),
        )]))
        .build();

    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    log::info!(
        "Wrote {} rows ({} columns) to {}",
        layer.len(),
        batch.num_columns(),
        path.display()
    );
    Ok(())
}

/// Geometry column name and CRS declared by `geo` metadata.
fn parse_geo_metadata(raw: Option<&str>, path: &Path) -> Result<(String, Crs), StorageError> {
    let Some(raw) = raw else {
        log::warn!(
            "{} has no '{GEO_METADATA_KEY}' metadata; assuming '{GEOMETRY_COLUMN}' in {}",
            path.display(),
            Crs::WGS84
        );
        return Ok((GEOMETRY_COLUMN.to_string(), Crs::WGS84));
    };

    let meta: serde_json::Value = serde_json::from_str(raw)?;
    let primary = meta["primary_column"]
        .as_str()
        .unwrap_or(GEOMETRY_COLUMN)
        .to_string();

    // A missing or null crs means OGC:CRS84, i.e. WGS84 lon/lat.
    let crs = match &meta["columns"][&primary]["crs"] {
        serde_json::Value::Null => Crs::WGS84,
        crs => {
            let code = crs["id"]["code"]
                .as_u64()
                .or_else(|| crs["id"]["code"].as_str().and_then(|s| s.parse().ok()))
                .and_then(|c| u32::try_from(c).ok())
                .ok_or_else(|| StorageError::Schema {
                    message: format!("{}: CRS has no EPSG id", path.display()),
                })?;
            Crs::from_epsg(code)
        }
    };

    Ok((primary, crs))
}

fn attribute_at(array: &dyn Array, row: usize) -> Result<AttributeValue, StorageError> {
    if array.is_null(row) {
        return Ok(AttributeValue::Null);
    }
    Ok(match array.data_type() {
        DataType::Boolean => AttributeValue::Bool(array.as_boolean().value(row)),
        DataType::Int64 => AttributeValue::Integer(array.as_primitive::<Int64Type>().value(row)),
        DataType::Int32 => {
            AttributeValue::Integer(i64::from(array.as_primitive::<Int32Type>().value(row)))
        }
        DataType::Float64 => {
            AttributeValue::from_f64(Some(array.as_primitive::<Float64Type>().value(row)))
        }
        DataType::Float32 => AttributeValue::from_f64(Some(f64::from(
            array.as_primitive::<Float32Type>().value(row),
        ))),
        DataType::Utf8 => AttributeValue::Text(array.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => {
            AttributeValue::Text(array.as_string::<i64>().value(row).to_string())
        }
        _ => AttributeValue::Text(array_value_to_string(array, row)?),
    })
}

fn geometry_at(array: &dyn Array, row: usize) -> Result<Option<geo::Geometry<f64>>, StorageError> {
    if array.is_null(row) {
        return Ok(None);
    }
    let bytes = match array.data_type() {
        DataType::Binary => array.as_binary::<i32>().value(row),
        DataType::LargeBinary => array.as_binary::<i64>().value(row),
        other => {
            return Err(StorageError::Schema {
                message: format!("geometry column has type {other}, expected WKB binary"),
            });
        }
    };
    wkb::decode(bytes).map(Some)
}

/// Reads a `GeoParquet` file into a layer named after the file stem.
///
/// # Errors
///
/// Returns [`StorageError`] if the file cannot be read, the geometry
/// column is missing or not WKB, or a geometry fails to decode.
pub fn read_geoparquet(path: &Path) -> Result<Layer, StorageError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;

    let raw_geo = builder
        .metadata()
        .file_metadata()
        .key_value_metadata()
        .and_then(|kvs| kvs.iter().find(|kv| kv.key == GEO_METADATA_KEY))
        .and_then(|kv| kv.value.clone());
    let (geometry_column, crs) = parse_geo_metadata(raw_geo.as_deref(), path)?;

    let reader = builder.build()?;
    let mut features = Vec::new();

    for batch in reader {
        let batch = batch?;
        let schema = batch.schema();
        let geometry_index =
            schema
                .index_of(&geometry_column)
                .map_err(|_| StorageError::Schema {
                    message: format!(
                        "{} has no geometry column '{geometry_column}'",
                        path.display()
                    ),
                })?;

        for row in 0..batch.num_rows() {
            let mut feature = Feature {
                geometry: geometry_at(batch.column(geometry_index).as_ref(), row)?,
                properties: Properties::new(),
            };
            for (i, field) in schema.fields().iter().enumerate() {
                if i == geometry_index {
                    continue;
                }
                let value = attribute_at(batch.column(i).as_ref(), row)?;
                feature.properties.insert(field.name().clone(), value);
            }
            features.push(feature);
        }
    }

    let name = path
        .file_stem()
        .map_or_else(|| "layer".to_string(), |s| s.to_string_lossy().into_owned());
    log::info!("Read {} rows from {} ({crs})", features.len(), path.display());

    Ok(Layer::with_features(name, crs, features))
}
