//! Stack single-band GeoTIFFs into one multi-page TIFF, one page per band.
//!
//! Each page keeps the georeferencing tags of the band it came from so GIS
//! tools can still place it.
use crate::error::CompositeError;
use std::fs::File;
use std::io::{BufReader, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::{self, ColorType};
use tiff::encoder::{Compression, DeflateLevel, TiffEncoder, TiffValue};
use tiff::tags::Tag;
use tracing::{debug, warn};

enum Samples {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    I16(Vec<i16>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

#[derive(Default)]
struct GeoTags {
    pixel_scale: Option<Vec<f64>>,
    tiepoint: Option<Vec<f64>>,
    transformation: Option<Vec<f64>>,
    key_directory: Option<Vec<u16>>,
    double_params: Option<Vec<f64>>,
    ascii_params: Option<String>,
}

impl GeoTags {
    fn read(decoder: &mut Decoder<BufReader<File>>) -> Self {
        Self {
            pixel_scale: decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok(),
            tiepoint: decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok(),
            transformation: decoder.get_tag_f64_vec(Tag::ModelTransformationTag).ok(),
            key_directory: decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).ok(),
            double_params: decoder.get_tag_f64_vec(Tag::GeoDoubleParamsTag).ok(),
            ascii_params: decoder.get_tag_ascii_string(Tag::GeoAsciiParamsTag).ok(),
        }
    }
}

struct Band {
    width: u32,
    height: u32,
    samples: Samples,
    geo: GeoTags,
}

fn read_band(path: &Path) -> Result<Band, CompositeError> {
    let file = BufReader::new(File::open(path)?);
    // Full Landsat scenes exceed the default decoding buffer
    let mut decoder = Decoder::new(file)?.with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions()?;
    let geo = GeoTags::read(&mut decoder);

    let samples = match decoder.read_image()? {
        DecodingResult::U8(buf) => Samples::U8(buf),
        DecodingResult::U16(buf) => Samples::U16(buf),
        DecodingResult::U32(buf) => Samples::U32(buf),
        DecodingResult::I16(buf) => Samples::I16(buf),
        DecodingResult::F32(buf) => Samples::F32(buf),
        DecodingResult::F64(buf) => Samples::F64(buf),
        _ => return Err(CompositeError::UnsupportedSamples(path.display().to_string())),
    };

    Ok(Band {
        width,
        height,
        samples,
        geo,
    })
}

fn write_page<W, C>(
    encoder: &mut TiffEncoder<W>,
    band: &Band,
    data: &[C::Inner],
) -> Result<(), CompositeError>
where
    W: Write + Seek,
    C: ColorType,
    [C::Inner]: TiffValue,
{
    let mut image = encoder.new_image::<C>(band.width, band.height)?;

    let directory = image.encoder();
    if let Some(scale) = &band.geo.pixel_scale {
        directory.write_tag(Tag::ModelPixelScaleTag, scale.as_slice())?;
    }
    if let Some(tiepoint) = &band.geo.tiepoint {
        directory.write_tag(Tag::ModelTiepointTag, tiepoint.as_slice())?;
    }
    if let Some(transformation) = &band.geo.transformation {
        directory.write_tag(Tag::ModelTransformationTag, transformation.as_slice())?;
    }
    if let Some(keys) = &band.geo.key_directory {
        directory.write_tag(Tag::GeoKeyDirectoryTag, keys.as_slice())?;
    }
    if let Some(params) = &band.geo.double_params {
        directory.write_tag(Tag::GeoDoubleParamsTag, params.as_slice())?;
    }
    if let Some(params) = &band.geo.ascii_params {
        directory.write_tag(Tag::GeoAsciiParamsTag, params.as_str())?;
    }

    image.write_data(data)?;
    Ok(())
}

fn write_band<W: Write + Seek>(
    encoder: &mut TiffEncoder<W>,
    band: &Band,
) -> Result<(), CompositeError> {
    match &band.samples {
        Samples::U8(data) => write_page::<W, colortype::Gray8>(encoder, band, data),
        Samples::U16(data) => write_page::<W, colortype::Gray16>(encoder, band, data),
        Samples::U32(data) => write_page::<W, colortype::Gray32>(encoder, band, data),
        Samples::I16(data) => write_page::<W, colortype::GrayI16>(encoder, band, data),
        Samples::F32(data) => write_page::<W, colortype::Gray32Float>(encoder, band, data),
        Samples::F64(data) => write_page::<W, colortype::Gray64Float>(encoder, band, data),
    }
}

fn read_dimensions(path: &Path) -> Result<(u32, u32), CompositeError> {
    let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;
    Ok(decoder.dimensions()?)
}

/// The size shared by most bands. Ties go to the size seen first.
fn common_size(sizes: &[(u32, u32)]) -> Option<(u32, u32)> {
    let mut counts: Vec<((u32, u32), usize)> = vec![];
    for size in sizes {
        match counts.iter_mut().find(|(s, _)| s == size) {
            Some((_, count)) => *count += 1,
            None => counts.push((*size, 1)),
        }
    }
    // max_by_key keeps the last maximum, so walk the counts backwards
    counts.into_iter().rev().max_by_key(|(_, count)| *count).map(|(size, _)| size)
}

/// Write `inputs` as consecutive pages of `output` and return the number of
/// pages written. Only bands with the most common size are kept, so the 15 m
/// panchromatic band is dropped from a stack of 30 m bands wherever it appears.
pub fn build_composite<P: AsRef<Path>>(inputs: &[P], output: &Path) -> Result<usize, CompositeError> {
    let sizes = inputs
        .iter()
        .map(|input| read_dimensions(input.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    let (width, height) = common_size(&sizes).ok_or(CompositeError::NoInputs)?;
    debug!("Composite size is {}x{}", width, height);

    let mut encoder = TiffEncoder::new(File::create(output)?)?
        .with_compression(Compression::Deflate(DeflateLevel::Balanced));

    let mut pages = 0;
    for (input, size) in inputs.iter().zip(sizes) {
        let input = input.as_ref();
        if size != (width, height) {
            warn!(
                "Skipping {}: {}x{} does not match {}x{}",
                input.display(),
                size.0,
                size.1,
                width,
                height
            );
            continue;
        }
        debug!("Adding {} to composite", input.display());
        write_band(&mut encoder, &read_band(input)?)?;
        pages += 1;
    }

    Ok(pages)
}
