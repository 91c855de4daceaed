use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};
use imageproc::contrast::otsu_level;
use imageproc::map::map_colors;

use crate::config::Region;

/// Crops a sub-region from an image using percentage coordinates.
///
/// Converts the region to pixels, clamps to image bounds, and returns the
/// cropped sub-image. A region entirely outside the image yields an empty image.
pub fn crop_region(img: &RgbImage, region: &Region) -> RgbImage {
    let (w, h) = img.dimensions();
    let (x, y, rw, rh) = region.to_pixels(w, h);

    let x0 = x.min(w);
    let y0 = y.min(h);
    let rw = rw.min(w - x0);
    let rh = rh.min(h - y0);

    imageops::crop_imm(img, x0, y0, rw, rh).to_image()
}

/// Grayscale, upscaled by `scale` with cubic interpolation.
pub fn grayscale_scaled(img: &RgbImage, scale: u32) -> GrayImage {
    let gray = imageops::grayscale(img);
    upscale(&gray, scale)
}

/// Otsu binarisation of the upscaled grayscale image with colours inverted,
/// so bright text on the blue scoreboard becomes black on white.
pub fn threshold_inverted(img: &RgbImage, scale: u32) -> GrayImage {
    let gray = grayscale_scaled(img, scale);
    if gray.width() == 0 || gray.height() == 0 {
        return gray;
    }
    let level = otsu_level(&gray);
    map_colors(&gray, |p| {
        if p[0] > level {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    })
}

/// Upscaled grayscale with colours inverted.
pub fn inverted(img: &RgbImage, scale: u32) -> GrayImage {
    let mut gray = grayscale_scaled(img, scale);
    imageops::invert(&mut gray);
    gray
}

fn upscale(gray: &GrayImage, scale: u32) -> GrayImage {
    let (w, h) = gray.dimensions();
    if scale <= 1 || w == 0 || h == 0 {
        return gray.clone();
    }
    imageops::resize(gray, w * scale, h * scale, FilterType::CatmullRom)
}
