use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{ArrayRef, Float64Array, Float64Builder, Int64Array, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use eframe::egui::ColorImage;
use parquet::arrow::ArrowWriter;
use serde_json::{Map, Value as JsonValue};

use super::analysis::find_peak;
use super::model::{DisplayMode, Frame, MetadataValue, PeakKind, SeriesRecord};
use crate::device::DeviceInfo;

/// File written by the "save data" command inside the save directory.
pub const DATA_FILE_NAME: &str = "data.json";

pub fn default_data_path(dir: &Path) -> PathBuf {
    dir.join(DATA_FILE_NAME)
}

/// `<mode>.png`, or `<mode>_w_peak.png` when the peak marker is drawn.
pub fn figure_file_name(mode: DisplayMode, peak_finder: bool) -> String {
    if peak_finder {
        format!("{}_w_peak.png", mode.file_stem())
    } else {
        format!("{}.png", mode.file_stem())
    }
}

// ---------------------------------------------------------------------------
// Frame → records
// ---------------------------------------------------------------------------

/// Flatten a frame into one record per series (intensity, and when a blank
/// is stored: blank, transmittance, absorbance).
///
/// Non-finite points (absorbance of a zero-count pixel, ratios of negative
/// counts) are dropped from both `x` and `y`, and the recorded peak is taken
/// over the points that remain.
pub fn frame_records(frame: &Frame, device: &DeviceInfo) -> Vec<SeriesRecord> {
    let mut series: Vec<(&str, &[f64], &[f64], PeakKind)> = vec![(
        "intensity",
        frame.wavelengths.as_slice(),
        frame.intensities.as_slice(),
        PeakKind::Max,
    )];
    if let Some(abs) = &frame.absorption {
        let masked = abs.wavelengths_masked.as_slice();
        series.push(("blank", &frame.wavelengths[..], &abs.blank[..], PeakKind::Max));
        series.push(("transmittance", masked, &abs.transmittance[..], PeakKind::Min));
        series.push(("absorbance", masked, &abs.absorbance[..], PeakKind::Max));
    }

    series
        .into_iter()
        .map(|(name, x, y, kind)| {
            let (x, y): (Vec<f64>, Vec<f64>) = x
                .iter()
                .zip(y)
                .filter(|(_, v)| v.is_finite())
                .map(|(&xi, &yi)| (xi, yi))
                .unzip();
            let peak = find_peak(&x, &y, kind);
            let mut metadata = BTreeMap::new();
            metadata.insert("series".to_string(), name.into());
            metadata.insert("mode".to_string(), frame.mode.file_stem().into());
            metadata.insert("model".to_string(), device.model.as_str().into());
            metadata.insert("serial".to_string(), device.serial.as_str().into());
            metadata.insert(
                "integration_time_us".to_string(),
                i64::from(frame.integration_time_us).into(),
            );
            metadata.insert(
                "peak_wavelength".to_string(),
                peak.map_or(f64::NAN, |p| p.wavelength).into(),
            );
            metadata.insert(
                "peak_value".to_string(),
                peak.map_or(f64::NAN, |p| p.value).into(),
            );
            SeriesRecord { x, y, metadata }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Save a frame to a file. Dispatch by extension.
///
/// Supported formats, all in the records layout (`x`, `y`, metadata columns):
/// * `.json`    – `[{ "x": [...], "y": [...], "series": "absorbance", ... }, ...]`
/// * `.csv`     – `x` and `y` as semicolon-separated floats, one row per series
/// * `.parquet` – `x` and `y` as List<Float64> columns
pub fn save_frame(path: &Path, frame: &Frame, device: &DeviceInfo) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let records = frame_records(frame, device);
    ensure_parent_dir(path)?;

    match ext.as_str() {
        "json" => write_json(path, &records),
        "csv" => write_csv(path, &records),
        "parquet" | "pq" => write_parquet(path, &records),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating directory {}", dir.display()))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// JSON writer
// ---------------------------------------------------------------------------

fn write_json(path: &Path, records: &[SeriesRecord]) -> Result<()> {
    let rows: Vec<JsonValue> = records
        .iter()
        .map(|rec| {
            let mut obj = Map::new();
            obj.insert("x".to_string(), JsonValue::from(rec.x.clone()));
            obj.insert("y".to_string(), JsonValue::from(rec.y.clone()));
            for (key, val) in &rec.metadata {
                obj.insert(key.clone(), metadata_json(val));
            }
            JsonValue::Object(obj)
        })
        .collect();

    let file = File::create(path).context("creating JSON file")?;
    serde_json::to_writer_pretty(BufWriter::new(file), &rows).context("writing JSON")?;
    Ok(())
}

/// JSON has no NaN or infinity; a missing peak is written as `null`.
fn metadata_json(val: &MetadataValue) -> JsonValue {
    match val {
        MetadataValue::String(s) => JsonValue::from(s.as_str()),
        MetadataValue::Integer(i) => JsonValue::from(*i),
        MetadataValue::Float(f) => serde_json::Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
    }
}

// ---------------------------------------------------------------------------
// CSV writer
// ---------------------------------------------------------------------------

fn write_csv(path: &Path, records: &[SeriesRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;

    let meta_cols: Vec<&String> = records
        .first()
        .map(|r| r.metadata.keys().collect())
        .unwrap_or_default();

    let mut header = vec!["x", "y"];
    header.extend(meta_cols.iter().map(|c| c.as_str()));
    writer.write_record(&header).context("writing CSV header")?;

    for (row_no, rec) in records.iter().enumerate() {
        let mut row = vec![join_semicolon(&rec.x), join_semicolon(&rec.y)];
        for col in &meta_cols {
            let cell = rec
                .metadata
                .get(*col)
                .with_context(|| format!("CSV row {row_no}: missing '{col}'"))?;
            row.push(cell.to_string());
        }
        writer
            .write_record(&row)
            .with_context(|| format!("CSV row {row_no}"))?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

fn join_semicolon(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(";")
}

// ---------------------------------------------------------------------------
// Parquet writer
// ---------------------------------------------------------------------------

fn list_column(rows: impl Iterator<Item = Vec<f64>>) -> ArrayRef {
    let mut builder = ListBuilder::new(Float64Builder::new());
    for row in rows {
        builder.values().append_slice(&row);
        builder.append(true);
    }
    Arc::new(builder.finish())
}

fn metadata_cell<'a>(records: &'a [SeriesRecord], key: &str, i: usize) -> Result<&'a MetadataValue> {
    records[i]
        .metadata
        .get(key)
        .with_context(|| format!("Row {i}: missing '{key}'"))
}

/// One Arrow column per metadata key, typed by the first record's value.
fn metadata_column(records: &[SeriesRecord], key: &str) -> Result<(DataType, ArrayRef)> {
    let cell = |i: usize| metadata_cell(records, key, i);

    match cell(0)? {
        MetadataValue::String(_) => {
            let mut values = Vec::with_capacity(records.len());
            for i in 0..records.len() {
                match cell(i)? {
                    MetadataValue::String(s) => values.push(s.as_str()),
                    other => bail!("Row {i}: '{key}' is {other:?}, expected a string"),
                }
            }
            Ok((DataType::Utf8, Arc::new(StringArray::from(values))))
        }
        MetadataValue::Integer(_) => {
            let mut values = Vec::with_capacity(records.len());
            for i in 0..records.len() {
                match cell(i)? {
                    MetadataValue::Integer(v) => values.push(*v),
                    other => bail!("Row {i}: '{key}' is {other:?}, expected an integer"),
                }
            }
            Ok((DataType::Int64, Arc::new(Int64Array::from(values))))
        }
        MetadataValue::Float(_) => {
            let mut values = Vec::with_capacity(records.len());
            for i in 0..records.len() {
                match cell(i)? {
                    MetadataValue::Float(v) => values.push(*v),
                    MetadataValue::Integer(v) => values.push(*v as f64),
                    other => bail!("Row {i}: '{key}' is {other:?}, expected a number"),
                }
            }
            Ok((DataType::Float64, Arc::new(Float64Array::from(values))))
        }
    }
}

fn write_parquet(path: &Path, records: &[SeriesRecord]) -> Result<()> {
    if records.is_empty() {
        bail!("nothing to write");
    }

    let list_type = DataType::List(Arc::new(Field::new("item", DataType::Float64, true)));
    let mut fields = vec![
        Field::new("x", list_type.clone(), false),
        Field::new("y", list_type, false),
    ];
    let mut columns = vec![
        list_column(records.iter().map(|r| r.x.clone())),
        list_column(records.iter().map(|r| r.y.clone())),
    ];

    for key in records[0].metadata.keys() {
        let (data_type, array) = metadata_column(records, key)?;
        fields.push(Field::new(key.as_str(), data_type, false));
        columns.push(array);
    }

    let schema = Arc::new(Schema::new(fields));
    let batch =
        RecordBatch::try_new(schema.clone(), columns).context("building parquet record batch")?;

    let file = File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Figures
// ---------------------------------------------------------------------------

/// Write a captured screen region as PNG.
pub fn save_png(path: &Path, image: &ColorImage) -> Result<()> {
    ensure_parent_dir(path)?;
    let [w, h] = image.size;
    let rgba: Vec<u8> = image.pixels.iter().flat_map(|c| c.to_array()).collect();
    let buffer = image::RgbaImage::from_raw(w as u32, h as u32, rgba)
        .context("screenshot size does not match its pixel data")?;
    buffer
        .save(path)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::analysis::INTENSITY_THRESHOLD;
    use crate::data::model::Spectrum;
    use eframe::egui::Color32;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("spectra-live-export-{}-{name}", std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        dir
    }

    fn device() -> DeviceInfo {
        DeviceInfo {
            model: "USB4000".to_string(),
            serial: "USB4F01234".to_string(),
        }
    }

    fn frame(with_blank: bool) -> Frame {
        let spectrum = Spectrum {
            wavelengths: vec![400.0, 450.0, 500.0, 550.0],
            intensities: vec![10.0, 60.0, 25.0, 90.0],
        };
        let blank = vec![0.5, 100.0, 100.0, 100.0];
        Frame::build(
            DisplayMode::Absorbance,
            spectrum,
            with_blank.then_some(blank.as_slice()),
            INTENSITY_THRESHOLD,
            4000,
        )
        .unwrap()
    }

    #[test]
    fn records_cover_every_series() {
        let recs = frame_records(&frame(true), &device());
        let names: Vec<String> = recs.iter().map(|r| r.metadata["series"].to_string()).collect();
        assert_eq!(names, ["intensity", "blank", "transmittance", "absorbance"]);
        assert_eq!(recs[2].x, vec![450.0, 500.0, 550.0]);
        assert_eq!(recs[2].metadata["peak_wavelength"], MetadataValue::Float(500.0));
        assert_eq!(recs[0].metadata["integration_time_us"], MetadataValue::Integer(4000));

        assert_eq!(frame_records(&frame(false), &device()).len(), 1);
    }

    #[test]
    fn json_round_trips_records_layout() {
        let dir = temp_dir("json");
        let path = default_data_path(&dir);
        save_frame(&path, &frame(true), &device()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let rows: JsonValue = serde_json::from_str(&text).unwrap();
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[3]["series"], "absorbance");
        assert_eq!(rows[0]["serial"], "USB4F01234");
        assert_eq!(rows[0]["y"].as_array().unwrap().len(), 4);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn zero_count_pixel_keeps_json_numeric() {
        let spectrum = Spectrum {
            wavelengths: vec![400.0, 450.0, 500.0],
            intensities: vec![0.0, 50.0, 80.0],
        };
        let blank = vec![100.0, 100.0, 100.0];
        let frame =
            Frame::build(DisplayMode::Absorbance, spectrum, Some(blank.as_slice()), INTENSITY_THRESHOLD, 4000)
                .unwrap();
        assert!(frame.absorption.as_ref().unwrap().absorbance[0].is_infinite());

        let recs = frame_records(&frame, &device());
        assert_eq!(recs[3].x, vec![450.0, 500.0]);
        assert_eq!(recs[3].y.len(), 2);
        assert_eq!(recs[3].metadata["peak_wavelength"], MetadataValue::Float(450.0));
        // transmittance 0 is finite and stays
        assert_eq!(recs[2].y[0], 0.0);

        let dir = temp_dir("json-nonfinite");
        let path = default_data_path(&dir);
        save_frame(&path, &frame, &device()).unwrap();
        let rows: JsonValue = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        for row in rows.as_array().unwrap() {
            let x = row["x"].as_array().unwrap();
            let y = row["y"].as_array().unwrap();
            assert_eq!(x.len(), y.len());
            assert!(x.iter().chain(y).all(|v| v.as_f64().is_some()));
            assert!(row["peak_value"].as_f64().is_some());
        }
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_peak_is_json_null() {
        assert_eq!(metadata_json(&MetadataValue::Float(f64::NAN)), JsonValue::Null);
        assert_eq!(metadata_json(&MetadataValue::Float(1.5)), JsonValue::from(1.5));
        assert_eq!(metadata_json(&MetadataValue::Integer(4000)), JsonValue::from(4000));
        assert_eq!(metadata_json(&"absorbance".into()), JsonValue::from("absorbance"));
    }

    #[test]
    fn csv_has_semicolon_series() {
        let dir = temp_dir("csv");
        let path = dir.join("nested").join("capture.csv");
        save_frame(&path, &frame(false), &device()).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "x");
        assert_eq!(&headers[1], "y");
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][1], "10;60;25;90");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn parquet_has_list_columns_and_metadata() {
        let dir = temp_dir("parquet");
        let path = dir.join("capture.parquet");
        save_frame(&path, &frame(true), &device()).unwrap();

        let file = File::open(&path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 4);

        let schema = batches[0].schema();
        assert!(matches!(schema.field_with_name("x").unwrap().data_type(), DataType::List(_)));
        assert_eq!(
            schema.field_with_name("integration_time_us").unwrap().data_type(),
            &DataType::Int64
        );
        assert_eq!(schema.field_with_name("mode").unwrap().data_type(), &DataType::Utf8);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = temp_dir("ext");
        let err = save_frame(&dir.join("capture.pkl"), &frame(false), &device()).unwrap_err();
        assert!(err.to_string().contains(".pkl"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn figure_names() {
        assert_eq!(figure_file_name(DisplayMode::Intensity, false), "intensity.png");
        assert_eq!(
            figure_file_name(DisplayMode::Transmittance, true),
            "transmittance_w_peak.png"
        );
    }

    #[test]
    fn png_is_written() {
        let dir = temp_dir("png");
        let path = dir.join("absorbance.png");
        let img = ColorImage::new([3, 2], Color32::RED);
        save_png(&path, &img).unwrap();

        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (3, 2));
        std::fs::remove_dir_all(&dir).ok();
    }
}
