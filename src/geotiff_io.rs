//! GeoTIFF raster writer
//!
//! [`GeoTiffRasterWriter`] encodes rasters through the `tiff` crate and attaches
//! the georeferencing tags GDAL reads: `ModelPixelScale`, `ModelTiepoint`, a
//! GeoKey directory describing the CRS, `GDAL_NODATA` and the tag map as
//! `GDAL_METADATA`. Band stacks are written one page per band.

use crate::errors::Result;
use crate::output::{Raster, RasterData, RasterSink, Tags};
use crate::products::OutputDtype;
use crate::projection::{ProjectionDef, Projector};
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use tiff::encoder::colortype::{ColorType, Gray32Float, Gray8};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;
use tracing::debug;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GEO_DOUBLE_PARAMS: u16 = 34736;
const GEO_ASCII_PARAMS: u16 = 34737;
const GDAL_METADATA: u16 = 42112;
const GDAL_NODATA: u16 = 42113;

const USER_DEFINED: u16 = 32767;

/// GeoKey directory under construction
#[derive(Debug, Default)]
struct GeoKeys {
    entries: Vec<[u16; 4]>,
    doubles: Vec<f64>,
    ascii: String,
}

impl GeoKeys {
    fn short(&mut self, key: u16, value: u16) -> &mut Self {
        self.entries.push([key, 0, 1, value]);
        self
    }

    #[allow(clippy::cast_possible_truncation)]
    fn double(&mut self, key: u16, value: f64) -> &mut Self {
        self.entries
            .push([key, GEO_DOUBLE_PARAMS, 1, self.doubles.len() as u16]);
        self.doubles.push(value);
        self
    }

    #[allow(clippy::cast_possible_truncation)]
    fn ascii(&mut self, key: u16, value: &str) -> &mut Self {
        let text = format!("{value}|");
        self.entries.push([
            key,
            GEO_ASCII_PARAMS,
            text.len() as u16,
            self.ascii.len() as u16,
        ]);
        self.ascii.push_str(&text);
        self
    }

    fn for_crs(crs: &ProjectionDef) -> Self {
        let mut keys = Self::default();
        match *crs {
            ProjectionDef::Geographic => {
                keys.short(1024, 2).short(1025, 1).short(2048, 4326);
            }
            ProjectionDef::WebMercator => {
                keys.short(1024, 1).short(1025, 1).short(3072, 3857);
            }
            ProjectionDef::Mercator { lon_0, lat_ts, a, b } => {
                keys.short(1024, 1)
                    .short(1025, 1)
                    .ascii(1026, &crs.proj_string())
                    .short(2048, USER_DEFINED)
                    .short(2050, USER_DEFINED)
                    .short(2054, 9102)
                    .double(2057, a)
                    .double(2058, b)
                    .short(3072, USER_DEFINED)
                    .short(3074, USER_DEFINED)
                    // CT_Mercator, metres
                    .short(3075, 7)
                    .short(3076, 9001)
                    .double(3078, lat_ts)
                    .double(3080, lon_0)
                    .double(3082, 0.0)
                    .double(3083, 0.0);
            }
        }
        keys.entries.sort_by_key(|e| e[0]);
        keys
    }

    #[allow(clippy::cast_possible_truncation)]
    fn directory(&self) -> Vec<u16> {
        let mut dir = vec![1, 1, 0, self.entries.len() as u16];
        dir.extend(self.entries.iter().flatten());
        dir
    }
}

/// TIFF ASCII tags only carry 7-bit text.
fn escape_xml(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii() { c } else { '?' })
        .collect::<String>()
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn gdal_metadata(tags: &Tags) -> String {
    let mut xml = String::from("<GDALMetadata>");
    for (key, value) in tags {
        xml.push_str(&format!(
            "<Item name=\"{}\">{}</Item>",
            escape_xml(key),
            escape_xml(value)
        ));
    }
    xml.push_str("</GDALMetadata>");
    xml
}

/// Per-page tag values shared by every band of a raster
struct PageTags {
    scale: [f64; 3],
    tiepoint: [f64; 6],
    geokeys: GeoKeys,
    nodata: Option<String>,
    metadata: String,
}

fn write_page<W, C>(
    encoder: &mut TiffEncoder<W>,
    cols: u32,
    rows: u32,
    samples: &[C::Inner],
    page: &PageTags,
) -> Result<()>
where
    W: Write + Seek,
    C: ColorType,
    [C::Inner]: TiffValue,
{
    let mut image = encoder.new_image::<C>(cols, rows)?;
    let dir = image.encoder();
    dir.write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &page.scale[..])?;
    dir.write_tag(Tag::Unknown(MODEL_TIEPOINT), &page.tiepoint[..])?;
    dir.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), &page.geokeys.directory()[..])?;
    if !page.geokeys.doubles.is_empty() {
        dir.write_tag(Tag::Unknown(GEO_DOUBLE_PARAMS), &page.geokeys.doubles[..])?;
    }
    if !page.geokeys.ascii.is_empty() {
        dir.write_tag(Tag::Unknown(GEO_ASCII_PARAMS), page.geokeys.ascii.as_str())?;
    }
    if let Some(nodata) = &page.nodata {
        dir.write_tag(Tag::Unknown(GDAL_NODATA), nodata.as_str())?;
    }
    dir.write_tag(Tag::Unknown(GDAL_METADATA), page.metadata.as_str())?;
    image.write_data(samples)?;
    Ok(())
}

/// [`RasterSink`] writing GeoTIFF files
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffRasterWriter;

impl RasterSink for GeoTiffRasterWriter {
    fn extension(&self) -> &'static str {
        "tif"
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn write_raster(&self, path: &Path, raster: &Raster<'_>) -> Result<()> {
        let (bands, rows, cols) = raster.data.dim();
        let t = raster.transform;
        let page = PageTags {
            scale: [t.a, -t.e, 0.0],
            tiepoint: [0.0, 0.0, 0.0, t.c, t.f, 0.0],
            geokeys: GeoKeys::for_crs(raster.crs),
            nodata: raster.nodata.map(|v| match raster.dtype {
                OutputDtype::Float32 => (v as f32).to_string(),
                OutputDtype::UInt8 => (v.clamp(0.0, 255.0) as u8).to_string(),
            }),
            metadata: gdal_metadata(&raster.tags),
        };

        let planes: Vec<Vec<f64>> = match raster.data {
            RasterData::Single(a) => vec![a.iter().copied().collect()],
            RasterData::Stack(a) => a
                .outer_iter()
                .map(|p| p.iter().copied().collect())
                .collect(),
        };

        let (width, height) = (cols as u32, rows as u32);
        let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path)?))?;
        for plane in &planes {
            match raster.dtype {
                OutputDtype::Float32 => {
                    let data: Vec<f32> = plane.iter().map(|&v| v as f32).collect();
                    write_page::<_, Gray32Float>(&mut encoder, width, height, &data, &page)?;
                }
                OutputDtype::UInt8 => {
                    let data: Vec<u8> = plane
                        .iter()
                        .map(|&v| v.round().clamp(0.0, 255.0) as u8)
                        .collect();
                    write_page::<_, Gray8>(&mut encoder, width, height, &data, &page)?;
                }
            }
        }

        debug!(
            path = %path.display(),
            raster = raster.name,
            bands,
            rows,
            cols,
            "wrote raster"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geoframe::AffineTransform;
    use ndarray::{arr2, Array3};
    use tempfile::tempdir;
    use tiff::decoder::{Decoder, DecodingResult};

    fn transform() -> AffineTransform {
        AffineTransform {
            a: 1000.0,
            b: 0.0,
            c: -3000.0,
            d: 0.0,
            e: -500.0,
            f: 2000.0,
        }
    }

    #[test]
    fn writes_georeferenced_float_raster() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lst.tif");
        let values = arr2(&[[300.5, 301.0, -999.0], [299.0, 298.5, 297.0]]);
        let crs = ProjectionDef::sector_mercator();
        let mut tags = Tags::new();
        tags.insert("PRODUCT".into(), "lst".into());
        let raster = Raster {
            name: "lst",
            data: RasterData::Single(values.view()),
            dtype: OutputDtype::Float32,
            nodata: Some(-999.0),
            transform: transform(),
            crs: &crs,
            tags,
        };
        GeoTiffRasterWriter.write_raster(&path, &raster).unwrap();

        let mut decoder = Decoder::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(decoder.dimensions().unwrap(), (3, 2));
        assert_eq!(
            decoder.get_tag_f64_vec(Tag::Unknown(MODEL_TIEPOINT)).unwrap(),
            vec![0.0, 0.0, 0.0, -3000.0, 2000.0, 0.0]
        );
        assert_eq!(
            decoder.get_tag_f64_vec(Tag::Unknown(MODEL_PIXEL_SCALE)).unwrap(),
            vec![1000.0, 500.0, 0.0]
        );
        assert_eq!(
            decoder.get_tag_ascii_string(Tag::Unknown(GDAL_NODATA)).unwrap(),
            "-999"
        );
        let metadata = decoder.get_tag_ascii_string(Tag::Unknown(GDAL_METADATA)).unwrap();
        assert!(metadata.contains("<Item name=\"PRODUCT\">lst</Item>"));
        match decoder.read_image().unwrap() {
            DecodingResult::F32(data) => assert_eq!(data[0], 300.5),
            _ => panic!("unexpected sample type"),
        }
    }

    #[test]
    fn stack_is_written_one_page_per_band() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ndvi_normalized.tif");
        let stack = Array3::from_shape_fn((2, 2, 2), |(b, r, c)| (b * 4 + r * 2 + c) as f64);
        let crs = ProjectionDef::WebMercator;
        let raster = Raster {
            name: "ndvi",
            data: RasterData::Stack(stack.view()),
            dtype: OutputDtype::Float32,
            nodata: None,
            transform: transform(),
            crs: &crs,
            tags: Tags::new(),
        };
        GeoTiffRasterWriter.write_raster(&path, &raster).unwrap();

        let mut decoder = Decoder::new(File::open(&path).unwrap()).unwrap();
        let directory = decoder.get_tag_u16_vec(Tag::Unknown(GEO_KEY_DIRECTORY)).unwrap();
        assert_eq!(&directory[..4], &[1, 1, 0, 3]);
        assert!(directory.chunks(4).any(|k| k == [3072, 0, 1, 3857]));
        assert!(decoder.more_images());
        decoder.next_image().unwrap();
        match decoder.read_image().unwrap() {
            DecodingResult::F32(data) => assert_eq!(data, vec![4.0, 5.0, 6.0, 7.0]),
            _ => panic!("unexpected sample type"),
        }
        assert!(!decoder.more_images());
    }

    #[test]
    fn mask_raster_is_eight_bit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fire.tif");
        let mask = arr2(&[[0.0, 1.0], [255.0, 1.0]]);
        let crs = ProjectionDef::Geographic;
        let raster = Raster {
            name: "fire",
            data: RasterData::Single(mask.view()),
            dtype: OutputDtype::UInt8,
            nodata: Some(255.0),
            transform: transform(),
            crs: &crs,
            tags: Tags::new(),
        };
        GeoTiffRasterWriter.write_raster(&path, &raster).unwrap();

        let mut decoder = Decoder::new(File::open(&path).unwrap()).unwrap();
        match decoder.read_image().unwrap() {
            DecodingResult::U8(data) => assert_eq!(data, vec![0, 1, 255, 1]),
            _ => panic!("unexpected sample type"),
        }
    }

    #[test]
    fn sector_mercator_keys_are_sorted() {
        let keys = GeoKeys::for_crs(&ProjectionDef::sector_mercator());
        let ids: Vec<u16> = keys.entries.iter().map(|e| e[0]).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
        assert_eq!(keys.doubles[0], crate::projection::WGS84_A);
        assert!(keys.ascii.starts_with("+proj=merc"));
    }
}
