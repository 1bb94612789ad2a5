// src/detection/color_segmenter.rs
//
// Per-species color segmentation of a BGR frame into binary candidate masks.
//
//   Weed: BGR → HSV → in_range → binarize → open → dilate
//   Crop: BGR → Lab → equalize(L) → in_range → invert → open → close
//
// Both paths finish with the same cleanup: external contours are filtered
// (area, and aspect ratio for crop), grouped with the species merge radius
// and redrawn filled into a fresh mask.

use super::contour_grouper::{group_contours, Contour};
use crate::types::{Config, CropSegmentationConfig, WeedSegmentationConfig};
use anyhow::Result;
use opencv::{
    core::{self, Mat, Point, Scalar, Size, Vector},
    imgproc,
    prelude::*,
};
use tracing::debug;

pub struct ColorSegmenter {
    weed: WeedSegmentationConfig,
    crop: CropSegmentationConfig,
}

impl ColorSegmenter {
    pub fn new(weed: WeedSegmentationConfig, crop: CropSegmentationConfig) -> Self {
        Self { weed, crop }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.weed.clone(), config.crop.clone())
    }

    /// Weed candidate mask (CV_8UC1, 255 on candidates).
    pub fn segment_weed(&self, frame: &Mat) -> Result<Mat> {
        let mut hsv = Mat::default();
        imgproc::cvt_color_def(frame, &mut hsv, imgproc::COLOR_BGR2HSV)?;

        let mut ranged = Mat::default();
        core::in_range(
            &hsv,
            &self.weed.range.lower(),
            &self.weed.range.upper(),
            &mut ranged,
        )?;

        let mut binary = Mat::default();
        imgproc::threshold(&ranged, &mut binary, 0.0, 255.0, imgproc::THRESH_BINARY)?;

        let kernel = imgproc::get_structuring_element(
            imgproc::MORPH_RECT,
            Size::new(self.weed.morph_open_size, self.weed.morph_open_size),
            Point::new(-1, -1),
        )?;

        let mut opened = Mat::default();
        imgproc::morphology_ex(
            &binary,
            &mut opened,
            imgproc::MORPH_OPEN,
            &kernel,
            Point::new(-1, -1),
            1,
            core::BORDER_CONSTANT,
            imgproc::morphology_default_border_value()?,
        )?;

        // Grow the blobs
        let mut grown = Mat::default();
        imgproc::dilate(
            &opened,
            &mut grown,
            &kernel,
            Point::new(-1, -1),
            self.weed.dilate_iterations,
            core::BORDER_CONSTANT,
            imgproc::morphology_default_border_value()?,
        )?;

        let area_threshold = self.weed.area_threshold;
        cleaned_mask(&grown, self.weed.group_max_distance, |contour| {
            Ok(imgproc::contour_area_def(contour)? >= area_threshold)
        })
    }

    /// Crop candidate mask (CV_8UC1, 255 on candidates).
    pub fn segment_crop(&self, frame: &Mat) -> Result<Mat> {
        let mut lab = Mat::default();
        imgproc::cvt_color_def(frame, &mut lab, imgproc::COLOR_BGR2Lab)?;

        let mut channels = Vector::<Mat>::new();
        core::split(&lab, &mut channels)?;
        let mut equalized = Mat::default();
        imgproc::equalize_hist(&channels.get(0)?, &mut equalized)?;
        channels.set(0, equalized)?;
        core::merge(&channels, &mut lab)?;

        let mut ranged = Mat::default();
        core::in_range(
            &lab,
            &self.crop.range.lower(),
            &self.crop.range.upper(),
            &mut ranged,
        )?;

        // Leaves fall outside the soil band
        let mut foliage = Mat::default();
        core::bitwise_not(&ranged, &mut foliage, &core::no_array())?;

        let ksize = odd_kernel_size(self.crop.morph_kernel_size);
        let kernel = imgproc::get_structuring_element(
            imgproc::MORPH_ELLIPSE,
            Size::new(ksize, ksize),
            Point::new(-1, -1),
        )?;

        let mut opened = Mat::default();
        imgproc::morphology_ex(
            &foliage,
            &mut opened,
            imgproc::MORPH_OPEN,
            &kernel,
            Point::new(-1, -1),
            self.crop.morph_iterations,
            core::BORDER_CONSTANT,
            imgproc::morphology_default_border_value()?,
        )?;

        let mut closed = Mat::default();
        imgproc::morphology_ex(
            &opened,
            &mut closed,
            imgproc::MORPH_CLOSE,
            &kernel,
            Point::new(-1, -1),
            self.crop.morph_iterations,
            core::BORDER_CONSTANT,
            imgproc::morphology_default_border_value()?,
        )?;

        let area_threshold = self.crop.area_threshold;
        let (ratio_min, ratio_max) = (self.crop.aspect_ratio_min, self.crop.aspect_ratio_max);
        cleaned_mask(&closed, self.crop.group_max_distance, |contour| {
            if imgproc::contour_area_def(contour)? < area_threshold {
                return Ok(false);
            }
            let rect = imgproc::bounding_rect(contour)?;
            if rect.height == 0 {
                return Ok(false);
            }
            let aspect = rect.width as f64 / rect.height as f64;
            Ok(aspect >= ratio_min && aspect <= ratio_max)
        })
    }
}

/// Kernel sizes must be odd and at least 1.
fn odd_kernel_size(size: i32) -> i32 {
    let size = size.max(1);
    if size % 2 == 0 {
        size + 1
    } else {
        size
    }
}

fn cleaned_mask<F>(mask: &Mat, max_distance: f64, keep: F) -> Result<Mat>
where
    F: Fn(&Contour) -> Result<bool>,
{
    let mut contours = Vector::<Contour>::new();
    imgproc::find_contours(
        mask,
        &mut contours,
        imgproc::RETR_EXTERNAL,
        imgproc::CHAIN_APPROX_SIMPLE,
        Point::new(0, 0),
    )?;

    let mut kept = Vec::with_capacity(contours.len());
    for contour in contours.iter() {
        if keep(&contour)? {
            kept.push(contour);
        }
    }

    let groups = group_contours(&kept, max_distance)?;
    debug!(
        "Segmentation cleanup: {} contours, {} kept, {} groups",
        contours.len(),
        kept.len(),
        groups.len()
    );

    let mut cleaned = Mat::zeros(mask.rows(), mask.cols(), core::CV_8UC1)?.to_mat()?;
    if !groups.is_empty() {
        let groups: Vector<Contour> = groups.into_iter().collect();
        imgproc::draw_contours(
            &mut cleaned,
            &groups,
            -1,
            Scalar::all(255.0),
            imgproc::FILLED,
            imgproc::LINE_8,
            &core::no_array(),
            i32::MAX,
            Point::new(0, 0),
        )?;
    }

    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::Rect;

    const SOIL_GRAY: f64 = 100.0;

    fn frame_with_patch(background: Scalar, patch: Rect, color: Scalar) -> Mat {
        let mut frame =
            Mat::new_rows_cols_with_default(200, 300, core::CV_8UC3, background).unwrap();
        imgproc::rectangle(&mut frame, patch, color, imgproc::FILLED, imgproc::LINE_8, 0)
            .unwrap();
        frame
    }

    fn pixel(mask: &Mat, x: i32, y: i32) -> u8 {
        *mask.at_2d::<u8>(y, x).unwrap()
    }

    #[test]
    fn test_odd_kernel_size() {
        assert_eq!(odd_kernel_size(3), 3);
        assert_eq!(odd_kernel_size(4), 5);
        assert_eq!(odd_kernel_size(0), 1);
        assert_eq!(odd_kernel_size(-2), 1);
    }

    #[test]
    fn test_weed_patch_segmented() {
        // Dark violet (HSV ~ 120, 102, 100) on bright green soil.
        let frame = frame_with_patch(
            Scalar::new(40.0, 160.0, 40.0, 0.0),
            Rect::new(100, 60, 40, 40),
            Scalar::new(100.0, 60.0, 60.0, 0.0),
        );
        let segmenter = ColorSegmenter::from_config(&Config::default());
        let mask = segmenter.segment_weed(&frame).unwrap();

        assert_eq!(mask.size().unwrap(), frame.size().unwrap());
        assert_eq!(pixel(&mask, 120, 80), 255);
        assert_eq!(pixel(&mask, 10, 10), 0);
        assert_eq!(pixel(&mask, 250, 150), 0);
    }

    #[test]
    fn test_crop_patch_segmented() {
        let frame = frame_with_patch(
            Scalar::all(SOIL_GRAY),
            Rect::new(100, 60, 60, 60),
            Scalar::new(40.0, 160.0, 40.0, 0.0),
        );
        let segmenter = ColorSegmenter::from_config(&Config::default());
        let mask = segmenter.segment_crop(&frame).unwrap();

        assert_eq!(pixel(&mask, 130, 90), 255);
        assert_eq!(pixel(&mask, 10, 10), 0);
    }

    #[test]
    fn test_elongated_crop_candidate_dropped() {
        let frame = frame_with_patch(
            Scalar::all(SOIL_GRAY),
            Rect::new(20, 90, 240, 10),
            Scalar::new(40.0, 160.0, 40.0, 0.0),
        );
        let segmenter = ColorSegmenter::from_config(&Config::default());
        let mask = segmenter.segment_crop(&frame).unwrap();

        assert_eq!(core::count_non_zero(&mask).unwrap(), 0);
    }

    #[test]
    fn test_uniform_soil_yields_empty_masks() {
        let frame =
            Mat::new_rows_cols_with_default(120, 160, core::CV_8UC3, Scalar::all(SOIL_GRAY))
                .unwrap();
        let segmenter = ColorSegmenter::from_config(&Config::default());

        let crop = segmenter.segment_crop(&frame).unwrap();
        assert_eq!(core::count_non_zero(&crop).unwrap(), 0);
    }
}
