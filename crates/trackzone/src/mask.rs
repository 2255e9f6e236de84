use std::path::Path;

use trackzone_core::{GrayImage, GrayImageView};

/// Borrow an `image::GrayImage` as the lightweight core view type.
pub fn gray_view(img: &::image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Decode an image file and convert it to 8-bit luma.
pub fn load_gray(path: impl AsRef<Path>) -> Result<GrayImage, ::image::ImageError> {
    let img = ::image::ImageReader::open(path)?.decode()?.to_luma8();
    Ok(gray_view(&img).to_owned())
}
