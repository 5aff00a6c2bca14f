//! Image-to-PDF conversion: one raster file in, one single-page PDF
//! buffer out, sized exactly to the pixel dimensions of the image.

use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use tracing::debug;

use crate::error::ConvertError;
use crate::sniff::ImageKind;

/// Fixed quality for the lossy re-encode. Scanned pages survive this
/// fine and the page streams stay small.
const JPEG_QUALITY: u8 = 85;

/// Convert an image file into a single-page PDF buffer.
///
/// The image is decoded, its stored EXIF orientation applied so the page
/// reads the way the photo was taken, re-encoded as JPEG, and drawn to
/// fill a page whose MediaBox equals the pixel dimensions (1 px = 1 pt,
/// no margin).
pub fn image_to_pdf(path: &Path, kind: ImageKind) -> Result<Vec<u8>, ConvertError> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let mut decoder = reader.into_decoder().map_err(|e| decode_error(kind, e))?;
    let orientation = decoder
        .orientation()
        .unwrap_or(Orientation::NoTransforms);
    let mut image = DynamicImage::from_decoder(decoder).map_err(|e| decode_error(kind, e))?;
    image.apply_orientation(orientation);

    // JPEG has no alpha channel; flatten before encoding.
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(ConvertError::Encode)?;

    debug!(
        "Converted {} ({}x{} px, {} byte jpeg) to a PDF page",
        path.display(),
        width,
        height,
        jpeg.len()
    );

    build_page(width, height, jpeg)
}

/// The image crate has no HEIC codec; surface that as its own failure
/// class instead of the raw decoder error.
fn decode_error(kind: ImageKind, err: image::ImageError) -> ConvertError {
    if kind == ImageKind::Heic {
        ConvertError::HeicCodec
    } else {
        ConvertError::Decode(err)
    }
}

/// Assemble a one-page document with the JPEG drawn full-page.
fn build_page(width: u32, height: u32, jpeg: Vec<u8>) -> Result<Vec<u8>, ConvertError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut image_stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg,
    );
    // The stream is already DCT-compressed.
    image_stream.allows_compression = false;
    let image_id = doc.add_object(image_stream);

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    (width as i64).into(),
                    0.into(),
                    0.into(),
                    (height as i64).into(),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("Do", vec!["Im0".into()]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! { "Im0" => image_id },
    });

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), (width as i64).into(), (height as i64).into()],
        "Contents" => content_id,
        "Resources" => resources_id,
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use lopdf::Document;

    fn page_media_box(data: &[u8]) -> (i64, i64) {
        let doc = Document::load_mem(data).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);
        let (_, page_id) = pages.into_iter().next().unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        let w = media_box[2].as_i64().unwrap();
        let h = media_box[3].as_i64().unwrap();
        (w, h)
    }

    #[test]
    fn page_dimensions_equal_pixel_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        RgbImage::from_pixel(37, 21, Rgb([200, 10, 10]))
            .save(&path)
            .unwrap();

        let data = image_to_pdf(&path, ImageKind::Png).unwrap();
        assert_eq!(page_media_box(&data), (37, 21));
    }

    #[test]
    fn alpha_images_are_flattened() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay.png");
        RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0]))
            .save(&path)
            .unwrap();

        let data = image_to_pdf(&path, ImageKind::Png).unwrap();
        assert_eq!(page_media_box(&data), (8, 8));
    }

    #[test]
    fn output_starts_with_pdf_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.jpg");
        RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])).save(&path).unwrap();

        let data = image_to_pdf(&path, ImageKind::Jpeg).unwrap();
        assert!(data.starts_with(b"%PDF"));
    }

    #[test]
    fn heic_gets_the_distinguished_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.heic");
        let mut bytes = vec![0x00, 0x00, 0x00, 0x18];
        bytes.extend_from_slice(b"ftypheic");
        bytes.extend_from_slice(&[0u8; 32]);
        std::fs::write(&path, bytes).unwrap();

        let err = image_to_pdf(&path, ImageKind::Heic).unwrap_err();
        assert!(matches!(err, ConvertError::HeicCodec));
        assert!(err.to_string().contains("HEIC"));
    }

    #[test]
    fn garbage_input_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.png");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\nnot really a png").unwrap();

        let err = image_to_pdf(&path, ImageKind::Png).unwrap_err();
        assert!(matches!(
            err,
            ConvertError::Decode(_) | ConvertError::Io(_)
        ));
    }
}
