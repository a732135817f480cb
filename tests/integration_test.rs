use ndarray::{ArrayD, IxDyn};
use netcdf::{create, open, AttributeValue};
use satbands::band::RawDtype;
use satbands::config::{AttributeKeys, PipelineConfig};
use satbands::data_source::{Attributes, BandSource, MemoryBandSource};
use satbands::errors::SatBandsError;
use satbands::geoframe::GeoBounds;
use satbands::geotiff_io::GeoTiffRasterWriter;
use satbands::metadata::{extract_metadata, ProductLevel};
use satbands::netcdf_io::{NetCdfBandSource, NetCdfRasterWriter};
use satbands::output::{ArchivePackager, Raster, RasterSink, ZipPackager};
use satbands::pipeline::Pipeline;
use satbands::products::ProductKind;
use satbands::projection::ProjectionDef;
use serde_json::{json, Value};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::tempdir;

const ROWS: usize = 4;
const COLS: usize = 6;
const STEM: &str = "3RIMG_30MAR2025_0615_L1C_ASIA_MER_V01R00";

/// Thermal counts: `0.25 * count + 200` K, 1023 is fill.
fn thermal_counts() -> Vec<u16> {
    let mut counts: Vec<u16> = (0..ROWS * COLS).map(|i| 360 + i as u16 * 10).collect();
    // 200 + 0.25 * 700 = 375 K: the only fire cell
    counts[5] = 700;
    counts[0] = 1023;
    counts
}

fn reflectance(offset: f32) -> Vec<f32> {
    (0..ROWS * COLS).map(|i| offset + i as f32 * 0.01).collect()
}

fn write_l1c_fixture(path: &Path) {
    let mut file = create(path).expect("Failed to create NetCDF file");

    file.add_dimension("time", 1)
        .expect("Failed to add dimension time");
    file.add_dimension("y", ROWS)
        .expect("Failed to add dimension y");
    file.add_dimension("x", COLS)
        .expect("Failed to add dimension x");

    for name in ["IMG_TIR1", "IMG_TIR2"] {
        let mut var = file
            .add_variable::<u16>(name, &["time", "y", "x"])
            .expect("Failed to add thermal variable");
        var.put_attribute("_FillValue", 1023u16)
            .expect("Failed to add fill value");
        var.put_attribute(&format!("{name}_lab_radiance_scale_factor"), 0.25f64)
            .expect("Failed to add scale");
        var.put_attribute(&format!("{name}_lab_radiance_add_offset"), 200.0f64)
            .expect("Failed to add offset");
        var.put_attribute("units", "K".to_string())
            .expect("Failed to add units");
        var.put_values(&thermal_counts(), ..)
            .expect("Failed to write data");
    }

    for (name, offset) in [
        ("IMG_VIS", 0.05f32),
        ("IMG_SWIR", 0.02),
        ("IMG_MIR", 1.5),
        ("IMG_WV", 0.4),
    ] {
        let mut var = file
            .add_variable::<f32>(name, &["time", "y", "x"])
            .expect("Failed to add variable");
        var.put_attribute("long_name", format!("{name} reflectance"))
            .expect("Failed to add long name");
        var.put_values(&reflectance(offset), ..)
            .expect("Failed to write data");
    }

    file.add_attribute("title", "Test L1C Sector".to_string())
        .expect("Failed to add title");
    file.add_attribute("left_longitude", 44.5f64)
        .expect("Failed to add bounds");
    file.add_attribute("lower_latitude", -10.0f64)
        .expect("Failed to add bounds");
    file.add_attribute("right_longitude", 110.0f64)
        .expect("Failed to add bounds");
    file.add_attribute("upper_latitude", 45.5f64)
        .expect("Failed to add bounds");
}

fn string_attribute(var: &netcdf::Variable<'_>, name: &str) -> String {
    match var
        .attribute(name)
        .expect("attribute present")
        .value()
        .expect("readable attribute")
    {
        AttributeValue::Str(s) => s,
        other => panic!("expected string attribute, got {other:?}"),
    }
}

fn read_json(path: &Path) -> Value {
    serde_json::from_reader(File::open(path).expect("Failed to open JSON")).expect("valid JSON")
}

#[test]
fn test_netcdf_band_source_loads_calibrated_band() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join(format!("{STEM}.nc"));
    write_l1c_fixture(&path);

    let source = NetCdfBandSource::open(&path).expect("Failed to open source");
    let bands = source.list_bands().expect("list");
    assert!(bands.contains(&"IMG_TIR1".to_string()));
    assert!(bands.contains(&"IMG_WV".to_string()));

    let band = source
        .load_band("IMG_TIR1", &AttributeKeys::default())
        .expect("load TIR1");
    assert_eq!(band.dtype, RawDtype::U16);
    assert_eq!(band.shape(), &[1, ROWS, COLS]);
    assert_eq!(band.calibration.scale_factor, 0.25);
    assert_eq!(band.calibration.add_offset, 200.0);
    assert_eq!(band.calibration.fill_value, Some(1023.0));
    assert_eq!(band.units.as_deref(), Some("K"));

    let cal = satbands::calibration::calibrate_band(&band).expect("calibrate");
    assert_eq!(cal.dim(), (ROWS, COLS));
    assert!(!cal.mask()[[0, 0]]);
    assert_eq!(cal.values()[[0, 5]], 375.0);
    assert_eq!(cal.valid_count(), ROWS * COLS - 1);

    let bounds = source.bounds_from_attributes().expect("bounds");
    assert_eq!(bounds, GeoBounds::asia_sector());

    let missing = source.load_band("IMG_NIR", &AttributeKeys::default());
    assert!(matches!(missing, Err(SatBandsError::MissingBand { .. })));
}

#[test]
fn test_extract_metadata() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join(format!("{STEM}.nc"));
    write_l1c_fixture(&path);

    let source = NetCdfBandSource::open(&path).expect("Failed to open source");
    let metadata = extract_metadata(&source).expect("metadata");

    assert_eq!(metadata["root_attributes"]["title"], "Test L1C Sector");
    assert_eq!(metadata["datasets"]["IMG_TIR1"]["shape"], json!([1, ROWS, COLS]));
    assert_eq!(metadata["datasets"]["IMG_TIR1"]["dtype"], "uint16");
    assert_eq!(metadata["file_info"]["product_level"], "L1C");
    assert_eq!(metadata["file_info"]["filename"], format!("{STEM}.nc"));
}

#[test]
fn test_pipeline_end_to_end() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join(format!("{STEM}.nc"));
    write_l1c_fixture(&path);
    let out_dir = temp_dir.path().join("output");

    let config = PipelineConfig {
        output_dir: out_dir.clone(),
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::new(config).expect("valid config");
    let source = NetCdfBandSource::open(&path).expect("Failed to open source");
    let packager = ZipPackager::new(&out_dir);
    let report = pipeline
        .run(
            &source,
            &NetCdfRasterWriter::default(),
            Some(&packager as &dyn ArchivePackager),
        )
        .expect("pipeline run");

    assert_eq!(report.level, Some(ProductLevel::L1C));
    // No NIR/red mapping on this imager
    assert_eq!(report.skipped_names(), vec!["ndvi"]);
    assert_eq!(report.stats.len(), ProductKind::ALL.len() - 1);
    assert!(report.outputs.iter().all(|p| p.exists()));
    assert!(!report
        .outputs
        .iter()
        .any(|p| p.to_string_lossy().contains("ndvi")));

    // Product raster: georeferenced and carrying its no-data value
    let lst_path = out_dir.join(format!("{STEM}_lst.nc"));
    let file = open(&lst_path).expect("Failed to open product raster");
    let crs = file.variable("crs").expect("crs variable");
    let geotransform: Vec<f64> = string_attribute(&crs, "GeoTransform")
        .split_whitespace()
        .map(|v| v.parse().expect("number"))
        .collect();
    assert_eq!(geotransform.len(), 6);
    assert!((geotransform[0] + 3_473_242.7337).abs() < 1e-3);
    assert!((geotransform[3] - 5_401_854.4202).abs() < 1e-3);
    assert!(geotransform[1] > 0.0);
    assert!(geotransform[5] < 0.0);

    let lst = file.variable("lst").expect("lst variable");
    assert_eq!(string_attribute(&lst, "grid_mapping"), "crs");
    match lst.attribute("_FillValue").expect("fill").value().expect("value") {
        AttributeValue::Float(v) => assert_eq!(v, -9999.0),
        other => panic!("unexpected fill value {other:?}"),
    }
    let values: Vec<f32> = lst.get_values::<f32, _>(..).expect("values");
    assert_eq!(values.len(), ROWS * COLS);
    assert_eq!(values[0], -9999.0);
    assert!((values[5] - (375.0 - 273.15)).abs() < 1e-3);

    // Fire mask is written as bytes
    let fire_file = open(out_dir.join(format!("{STEM}_fire_mask.nc"))).expect("fire raster");
    let fire = fire_file.variable("fire_mask").expect("fire variable");
    let fire_values: Vec<u8> = fire.get_values::<u8, _>(..).expect("values");
    assert_eq!(fire_values[0], 255);
    assert_eq!(fire_values.iter().filter(|&&v| v == 1).count(), 1);

    // Normalized stack holds the value and alpha bands
    let norm_file = open(out_dir.join(format!("{STEM}_ndsi_normalized.nc"))).expect("stack");
    let norm = norm_file.variable("ndsi").expect("normalized variable");
    let shape: Vec<usize> = norm.dimensions().iter().map(|d| d.len()).collect();
    assert_eq!(shape, vec![2, ROWS, COLS]);

    // Statistics JSON
    let stats = read_json(&out_dir.join(format!("{STEM}_lst_stats.json")));
    assert_eq!(stats["product"], "lst");
    assert_eq!(stats["valid_cells"], ROWS * COLS - 1);
    assert_eq!(stats["total_cells"], ROWS * COLS);
    assert!(stats["min"].is_number());
    assert!(stats["std"].is_number());

    let fire_stats = read_json(&out_dir.join(format!("{STEM}_fire_mask_stats.json")));
    assert_eq!(fire_stats["fire_pixel_count"], 1);
    assert_eq!(fire_stats["threshold_used"], 350.0);
    assert_eq!(fire_stats["max_fire_temperature"], 375.0);

    let aod_stats = read_json(&out_dir.join(format!("{STEM}_aod_stats.json")));
    assert!(aod_stats["aod_level.clear.percentage"].is_number());

    // Archive holds every written file plus a manifest listing them
    let archive = report.archive.expect("archive");
    assert_eq!(archive, out_dir.join(format!("{STEM}_products.zip")));
    let mut zip = zip::ZipArchive::new(File::open(&archive).expect("archive file")).expect("zip");
    assert_eq!(zip.len(), report.outputs.len() + 1);
    let names: Vec<String> = zip.file_names().map(str::to_string).collect();
    assert!(names.contains(&format!("{STEM}_lst.nc")));
    assert!(names.contains(&format!("{STEM}_lst_stats.json")));
    let manifest: Value =
        serde_json::from_reader(zip.by_name("manifest.json").expect("manifest entry"))
            .expect("valid JSON");
    let listed = manifest["files"].as_array().expect("file list");
    assert_eq!(listed.len(), report.outputs.len());
    assert!(listed.iter().any(|f| f == &json!(format!("{STEM}_lst.nc"))));
}

#[test]
fn test_pipeline_rejects_l2c_input() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir
        .path()
        .join("3RIMG_30MAR2025_0615_L2C_FOG_V01R00.nc");
    write_l1c_fixture(&path);

    let config = PipelineConfig {
        output_dir: temp_dir.path().join("output"),
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::new(config).expect("valid config");
    let source = NetCdfBandSource::open(&path).expect("Failed to open source");
    let err = pipeline
        .run(&source, &NetCdfRasterWriter::default(), None)
        .unwrap_err();
    assert!(matches!(err, SatBandsError::InvalidConfig(_)));
    assert!(err.is_fatal());
    assert!(!temp_dir.path().join("output").exists());
}

/// Records raster names instead of writing files
#[derive(Default)]
struct RecordingSink {
    written: Mutex<Vec<String>>,
}

impl RasterSink for RecordingSink {
    fn extension(&self) -> &'static str {
        "tif"
    }

    fn write_raster(&self, path: &Path, raster: &Raster<'_>) -> satbands::Result<()> {
        assert_eq!(raster.crs, &ProjectionDef::WebMercator);
        self.written
            .lock()
            .expect("lock")
            .push(path.file_name().expect("name").to_string_lossy().into_owned());
        Ok(())
    }
}

fn grid(values: Vec<f64>) -> ArrayD<f64> {
    ArrayD::from_shape_vec(IxDyn(&[2, 2]), values).expect("shape")
}

#[test]
fn test_failed_product_contributes_no_file() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let mut fill = Attributes::new();
    fill.insert("_FillValue".into(), json!(-1.0));

    // Every VIS cell is fill: AOD and NDSI have no valid cells
    let source = MemoryBandSource::new("scene_L1B.h5")
        .with_band("IMG_VIS", RawDtype::F32, grid(vec![-1.0; 4]), fill)
        .with_band("IMG_SWIR", RawDtype::F32, grid(vec![0.1; 4]), Attributes::new())
        .with_band(
            "IMG_TIR1",
            RawDtype::F32,
            grid(vec![290.0, 300.0, 310.0, 360.0]),
            Attributes::new(),
        );

    let config = PipelineConfig {
        projection: ProjectionDef::WebMercator,
        bounds: Some(GeoBounds::new(70.0, 5.0, 90.0, 25.0)),
        products: vec![ProductKind::Aod, ProductKind::Ndsi, ProductKind::Lst],
        normalized: false,
        output_dir: temp_dir.path().to_path_buf(),
        ..PipelineConfig::default()
    };
    let sink = RecordingSink::default();
    let report = Pipeline::new(config)
        .expect("valid config")
        .run(&source, &sink, None)
        .expect("run");

    assert_eq!(report.level, Some(ProductLevel::L1B));
    let mut skipped = report.skipped_names();
    skipped.sort_unstable();
    assert_eq!(skipped, vec!["aod", "ndsi"]);
    assert!(report.skipped.iter().all(|s| s.reason.contains("no valid cells")));

    let written = sink.written.lock().expect("lock").clone();
    assert_eq!(written, vec!["scene_L1B_lst.tif".to_string()]);
    let expected: Vec<PathBuf> = vec![
        temp_dir.path().join("scene_L1B_lst.tif"),
        temp_dir.path().join("scene_L1B_lst_stats.json"),
    ];
    assert_eq!(report.outputs, expected);
    assert!(report.archive.is_none());
}

#[test]
fn test_degenerate_bounds_abort_run() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let source = MemoryBandSource::new("scene.h5").with_band(
        "IMG_TIR1",
        RawDtype::F32,
        grid(vec![300.0; 4]),
        Attributes::new(),
    );
    let config = PipelineConfig {
        bounds: Some(GeoBounds::new(80.0, 0.0, 80.0, 10.0)),
        products: vec![ProductKind::Lst],
        output_dir: temp_dir.path().join("out"),
        ..PipelineConfig::default()
    };
    let err = Pipeline::new(config)
        .expect("valid config")
        .run(&source, &RecordingSink::default(), None)
        .unwrap_err();
    assert!(matches!(err, SatBandsError::DegenerateFrame { .. }));
}

#[test]
fn test_missing_bounds_attributes_is_reported() {
    let source = MemoryBandSource::new("scene.h5").with_band(
        "IMG_TIR1",
        RawDtype::F32,
        grid(vec![300.0; 4]),
        Attributes::new(),
    );
    let config = PipelineConfig {
        products: vec![ProductKind::Lst],
        ..PipelineConfig::default()
    };
    let err = Pipeline::new(config)
        .expect("valid config")
        .run(&source, &RecordingSink::default(), None)
        .unwrap_err();
    assert!(format!("{err}").contains("left_longitude"));
}

#[test]
fn test_base_band_export() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let source = MemoryBandSource::new("scene_L1C.h5").with_band(
        "IMG_TIR1",
        RawDtype::F32,
        grid(vec![300.0, 301.0, 302.0, 303.0]),
        Attributes::new(),
    );
    let config = PipelineConfig {
        projection: ProjectionDef::WebMercator,
        bounds: Some(GeoBounds::new(70.0, 5.0, 90.0, 25.0)),
        products: vec![ProductKind::Lst],
        base_bands: true,
        normalized: false,
        output_dir: temp_dir.path().to_path_buf(),
        ..PipelineConfig::default()
    };
    let sink = RecordingSink::default();
    let report = Pipeline::new(config)
        .expect("valid config")
        .run(&source, &sink, None)
        .expect("run");

    let written = sink.written.lock().expect("lock").clone();
    assert_eq!(
        written,
        vec![
            "scene_L1C_lst.tif".to_string(),
            "scene_L1C_IMG_TIR1.tif".to_string()
        ]
    );
    // Requested base bands that the source lacks are reported
    let mut skipped = report.skipped_names();
    skipped.sort_unstable();
    assert_eq!(
        skipped,
        vec!["IMG_MIR", "IMG_SWIR", "IMG_TIR2", "IMG_VIS", "IMG_WV"]
    );
}

#[test]
fn test_l2c_base_dataset_export() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let mut dhi = Attributes::new();
    dhi.insert("DHI__FillValue".into(), json!(-999.0));
    dhi.insert("DHI_units".into(), json!("W m-2"));
    dhi.insert("DHI_long_name".into(), json!("Diffuse Horizontal Irradiance"));
    let mut ghi = Attributes::new();
    ghi.insert("GHI__FillValue".into(), json!(-999.0));

    let source = MemoryBandSource::new("3RIMG_30MAR2025_0615_L2C_ASIA_MER_V01R00.h5")
        .with_band("DHI", RawDtype::F32, grid(vec![-999.0, 80.0, 90.0, 100.0]), dhi)
        .with_band("GHI", RawDtype::F32, grid(vec![500.0, 510.0, 520.0, -999.0]), ghi);

    let config = PipelineConfig {
        projection: ProjectionDef::WebMercator,
        bounds: Some(GeoBounds::new(70.0, 5.0, 90.0, 25.0)),
        products: vec![ProductKind::Lst, ProductKind::Aod],
        base_bands: true,
        output_dir: temp_dir.path().to_path_buf(),
        ..PipelineConfig::default()
    };
    let sink = RecordingSink::default();
    let report = Pipeline::new(config)
        .expect("valid config")
        .run(&source, &sink, None)
        .expect("base export of L2C input");

    assert_eq!(report.level, Some(ProductLevel::L2C));
    let written = sink.written.lock().expect("lock").clone();
    assert_eq!(
        written,
        vec![
            "3RIMG_30MAR2025_0615_L2C_ASIA_MER_V01R00_DHI.tif".to_string(),
            "3RIMG_30MAR2025_0615_L2C_ASIA_MER_V01R00_GHI.tif".to_string(),
        ]
    );
    assert!(report.stats.is_empty());

    let mut skipped = report.skipped_names();
    skipped.sort_unstable();
    assert_eq!(skipped, vec!["DNI", "INS", "aod", "lst"]);
    let lst = report.skipped.iter().find(|s| s.name == "lst").expect("lst");
    assert!(lst.reason.contains("L2C"));
}

#[test]
fn test_l2c_base_dataset_list_is_configurable() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let source = MemoryBandSource::new("scene_L2C.h5").with_band(
        "INS",
        RawDtype::F32,
        grid(vec![1.0, 2.0, 3.0, 4.0]),
        Attributes::new(),
    );
    let config = PipelineConfig {
        projection: ProjectionDef::WebMercator,
        bounds: Some(GeoBounds::new(70.0, 5.0, 90.0, 25.0)),
        products: vec![ProductKind::Lst],
        base_bands: true,
        base_datasets: Some(vec!["INS".into()]),
        output_dir: temp_dir.path().to_path_buf(),
        ..PipelineConfig::default()
    };
    let sink = RecordingSink::default();
    let report = Pipeline::new(config)
        .expect("valid config")
        .run(&source, &sink, None)
        .expect("run");

    let written = sink.written.lock().expect("lock").clone();
    assert_eq!(written, vec!["scene_L2C_INS.tif".to_string()]);
    assert_eq!(report.skipped_names(), vec!["lst"]);
}

#[test]
fn test_area_of_interest_masks_cells_outside() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let source = MemoryBandSource::new("scene_L1C.h5").with_band(
        "IMG_TIR1",
        RawDtype::F32,
        grid(vec![300.0, 301.0, 302.0, 303.0]),
        Attributes::new(),
    );
    // Western half of a 2x2 grid spanning 70..90 E
    let config = PipelineConfig {
        projection: ProjectionDef::WebMercator,
        bounds: Some(GeoBounds::new(70.0, 5.0, 90.0, 25.0)),
        aoi: Some(GeoBounds::new(69.0, 4.0, 79.0, 26.0)),
        products: vec![ProductKind::Lst],
        normalized: false,
        output_dir: temp_dir.path().to_path_buf(),
        ..PipelineConfig::default()
    };
    let report = Pipeline::new(config)
        .expect("valid config")
        .run(&source, &GeoTiffRasterWriter, None)
        .expect("run");

    let stats = &report.stats[0];
    assert_eq!(stats.summary.valid_cells, 2);
    assert_eq!(stats.summary.total_cells, 4);
    assert!((stats.summary.min - (300.0 - 273.15)).abs() < 1e-9);
    assert!((stats.summary.max - (302.0 - 273.15)).abs() < 1e-9);

    let record = read_json(&temp_dir.path().join("scene_L1C_lst_stats.json"));
    assert_eq!(record["valid_cells"], 2);
    assert!(temp_dir.path().join("scene_L1C_lst.tif").exists());
}

#[test]
fn test_area_of_interest_outside_frame_leaves_no_valid_cells() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let source = MemoryBandSource::new("scene_L1C.h5").with_band(
        "IMG_TIR1",
        RawDtype::F32,
        grid(vec![300.0; 4]),
        Attributes::new(),
    );
    let config = PipelineConfig {
        projection: ProjectionDef::WebMercator,
        bounds: Some(GeoBounds::new(70.0, 5.0, 90.0, 25.0)),
        aoi: Some(GeoBounds::new(100.0, 5.0, 110.0, 25.0)),
        products: vec![ProductKind::Lst],
        output_dir: temp_dir.path().to_path_buf(),
        ..PipelineConfig::default()
    };
    let report = Pipeline::new(config)
        .expect("valid config")
        .run(&source, &RecordingSink::default(), None)
        .expect("run");
    assert_eq!(report.skipped_names(), vec!["lst"]);
    assert!(report.outputs.is_empty());
}

/// Writes real files but fails on the normalized stack
struct FailingStackSink;

impl RasterSink for FailingStackSink {
    fn extension(&self) -> &'static str {
        "tif"
    }

    fn write_raster(&self, path: &Path, _raster: &Raster<'_>) -> satbands::Result<()> {
        fs::write(path, b"partial")?;
        if path.to_string_lossy().contains("_normalized") {
            return Err(SatBandsError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        Ok(())
    }
}

#[test]
fn test_failed_write_removes_partial_product_files() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let source = MemoryBandSource::new("scene_L1C.h5").with_band(
        "IMG_TIR1",
        RawDtype::F32,
        grid(vec![300.0, 301.0, 302.0, 303.0]),
        Attributes::new(),
    );
    let config = PipelineConfig {
        projection: ProjectionDef::WebMercator,
        bounds: Some(GeoBounds::new(70.0, 5.0, 90.0, 25.0)),
        products: vec![ProductKind::Lst],
        output_dir: temp_dir.path().to_path_buf(),
        ..PipelineConfig::default()
    };
    let report = Pipeline::new(config)
        .expect("valid config")
        .run(&source, &FailingStackSink, None)
        .expect("run");

    assert_eq!(report.skipped_names(), vec!["lst"]);
    assert!(report.skipped[0].reason.contains("disk full"));
    assert!(report.outputs.is_empty());
    assert!(report.stats.is_empty());
    assert!(!temp_dir.path().join("scene_L1C_lst.tif").exists());
    assert!(!temp_dir.path().join("scene_L1C_lst_normalized.tif").exists());
    assert!(!temp_dir.path().join("scene_L1C_lst_stats.json").exists());
}
