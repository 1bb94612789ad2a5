// src/detection/species_classifier.rs
//
// Crop / weed classification of the combined candidate mask.
//
// Passes, in order:
//   1. score every external contour and split at the score threshold
//   2. declustering: small borderline crops next to a weed become weeds
//   3. species-aware regrouping into Plant records
//   4. weed-near-crop suppression
//   5. edge-overlap pruning (and full-frame blob rejection)

use super::contour_grouper::{group_indices, Contour};
use super::types::{Plant, Species};
use crate::geometry;
use crate::types::{ClassifierConfig, Config};
use anyhow::Result;
use opencv::{
    core::{self, Mat, Point, Point2d, Rect, Scalar, Vector},
    imgproc,
    prelude::*,
};
use tracing::debug;

// ============================================================================
// FEATURES
// ============================================================================

/// Shape features of a single contour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlobFeatures {
    pub area: f64,
    pub center: Point2d,
    /// area / convex hull area, 0 when the hull is degenerate.
    pub solidity: f64,
    /// area / bounding box area, 0 when the box is empty.
    pub extent: f64,
    /// Horizontal distance from the frame's vertical centerline.
    pub distance_from_center: f64,
}

impl BlobFeatures {
    pub fn measure(contour: &Contour, frame_width: i32, frame_height: i32) -> Result<Self> {
        let area = imgproc::contour_area_def(contour)?;
        let bbox = geometry::clip_to_frame(
            imgproc::bounding_rect(contour)?,
            frame_width,
            frame_height,
        );

        let m = imgproc::moments_def(contour)?;
        let center = if m.m00 != 0.0 {
            Point2d::new(m.m10 / m.m00, m.m01 / m.m00)
        } else {
            geometry::center(bbox)
        };

        let mut hull = Vector::<Point>::new();
        imgproc::convex_hull_def(contour, &mut hull)?;
        let hull_area = imgproc::contour_area_def(&hull)?;
        let solidity = if hull_area > 0.0 { area / hull_area } else { 0.0 };

        let bbox_area = bbox.width as f64 * bbox.height as f64;
        let extent = if bbox_area > 0.0 { area / bbox_area } else { 0.0 };

        Ok(Self {
            area,
            center,
            solidity,
            extent,
            distance_from_center: (center.x - frame_width as f64 / 2.0).abs(),
        })
    }
}

struct Candidate {
    contour: Contour,
    features: BlobFeatures,
    score: f64,
    species: Species,
}

// ============================================================================
// CLASSIFIER
// ============================================================================

pub struct SpeciesClassifier {
    config: ClassifierConfig,
}

impl SpeciesClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.classifier.clone())
    }

    /// Classify every blob of `combined_mask`.
    ///
    /// `frame` supplies the frame geometry; `edge_mask` must cover the same
    /// extent. The order of the returned plants is unspecified.
    pub fn classify(
        &self,
        combined_mask: &Mat,
        frame: &Mat,
        edge_mask: &Mat,
        score_threshold: f64,
    ) -> Result<Vec<Plant>> {
        let (width, height) = (frame.cols(), frame.rows());

        let mut contours = Vector::<Contour>::new();
        imgproc::find_contours(
            combined_mask,
            &mut contours,
            imgproc::RETR_EXTERNAL,
            imgproc::CHAIN_APPROX_SIMPLE,
            Point::new(0, 0),
        )?;

        if contours.is_empty() {
            debug!("No candidate contours in combined mask");
            return Ok(Vec::new());
        }

        let mut candidates = Vec::with_capacity(contours.len());
        for contour in contours.iter() {
            let features = BlobFeatures::measure(&contour, width, height)?;
            let score = self.score(&features, width);
            let species = if score >= score_threshold {
                Species::Crop
            } else {
                Species::Weed
            };
            candidates.push(Candidate {
                contour,
                features,
                score,
                species,
            });
        }

        let initial_crops = candidates
            .iter()
            .filter(|c| c.species == Species::Crop)
            .count();

        let diagonal = geometry::frame_diagonal(width, height);
        let reclassified = self.decluster(&mut candidates, diagonal, score_threshold);

        let mut plants = self.regroup(&candidates, width, height)?;
        let grouped = plants.len();

        let suppressed = self.suppress_weeds_near_crops(&mut plants);
        let pruned = self.prune_without_edges(&mut plants, edge_mask)?;

        debug!(
            "Classified {} contours: {} crop / {} weed, {} declustered, {} plants after grouping, {} weeds suppressed, {} pruned",
            candidates.len(),
            initial_crops,
            candidates.len() - initial_crops,
            reclassified,
            grouped,
            suppressed,
            pruned
        );

        Ok(plants)
    }

    /// Blob score. Crop when at or above the threshold.
    pub fn score(&self, features: &BlobFeatures, frame_width: i32) -> f64 {
        let cfg = &self.config;
        let mut score = features.area / cfg.area_divisor;

        if features.solidity > cfg.min_solidity {
            score += features.solidity;
        }

        if features.extent > cfg.min_extent {
            score += 1.0;
        }

        // Crop rows run along the frame centerline
        if features.distance_from_center < frame_width as f64 * cfg.center_band_ratio {
            let d = features.distance_from_center;
            let divisor = if d > 0.0 { d } else { d + 1.0 };
            score += 1.0 / divisor;
        }

        score
    }

    /// Small crops whose score barely cleared the threshold and that sit next
    /// to a weed are reclassified as weed. Returns the number reclassified.
    fn decluster(&self, candidates: &mut [Candidate], diagonal: f64, score_threshold: f64) -> usize {
        let weed_centers: Vec<Point2d> = candidates
            .iter()
            .filter(|c| c.species == Species::Weed)
            .map(|c| c.features.center)
            .collect();

        if weed_centers.is_empty() {
            return 0;
        }

        let radius = self.config.decluster_distance_ratio * diagonal;
        let score_ceiling = score_threshold + self.config.decluster_score_margin;
        let mut reclassified = 0;

        for candidate in candidates.iter_mut() {
            if candidate.species != Species::Crop
                || candidate.features.area >= self.config.decluster_max_area
                || candidate.score >= score_ceiling
            {
                continue;
            }

            let near_weed = weed_centers
                .iter()
                .any(|w| geometry::distance(candidate.features.center, *w) < radius);

            if near_weed {
                candidate.species = Species::Weed;
                reclassified += 1;
            }
        }

        reclassified
    }

    fn regroup(&self, candidates: &[Candidate], width: i32, height: i32) -> Result<Vec<Plant>> {
        let mut plants = Vec::new();

        for (species, max_distance) in [
            (Species::Crop, self.config.crop_group_distance),
            (Species::Weed, self.config.weed_group_distance),
        ] {
            let members: Vec<&Candidate> =
                candidates.iter().filter(|c| c.species == species).collect();
            let contours: Vec<Contour> = members.iter().map(|c| c.contour.clone()).collect();

            for group in group_indices(&contours, max_distance)? {
                let parts: Vec<&Candidate> = group.iter().map(|&k| members[k]).collect();
                if let Some(plant) = build_plant(&parts, species, width, height)? {
                    plants.push(plant);
                }
            }
        }

        Ok(plants)
    }

    /// Drop weeds whose centroid lies in the removal circle of any crop.
    fn suppress_weeds_near_crops(&self, plants: &mut Vec<Plant>) -> usize {
        let circles: Vec<(Point2d, f64)> = plants
            .iter()
            .filter(|p| p.species == Species::Crop)
            .map(|p| {
                (
                    p.center,
                    p.bounding_box.width as f64 / self.config.suppression_radius_divisor,
                )
            })
            .collect();

        let before = plants.len();
        plants.retain(|p| {
            p.species == Species::Crop
                || !circles
                    .iter()
                    .any(|(c, r)| geometry::distance(p.center, *c) < *r)
        });
        before - plants.len()
    }

    /// Drop plants with no edge pixel inside their box, and implausibly large blobs.
    fn prune_without_edges(&self, plants: &mut Vec<Plant>, edge_mask: &Mat) -> Result<usize> {
        let bounds = Rect::new(0, 0, edge_mask.cols(), edge_mask.rows());
        let before = plants.len();
        let mut kept = Vec::with_capacity(before);

        for plant in plants.drain(..) {
            if plant.area >= self.config.max_plant_area {
                continue;
            }

            let window = geometry::intersect(plant.bounding_box, bounds);
            if window.width == 0 || window.height == 0 {
                continue;
            }

            let edges = edge_mask.roi(window)?.try_clone()?;
            if core::count_non_zero(&edges)? > 0 {
                kept.push(plant);
            }
        }

        *plants = kept;
        Ok(before - plants.len())
    }
}

/// Rasterize one group of same-species contours into a Plant.
fn build_plant(
    parts: &[&Candidate],
    species: Species,
    width: i32,
    height: i32,
) -> Result<Option<Plant>> {
    let points: Contour = parts.iter().flat_map(|c| c.contour.iter()).collect();
    if points.is_empty() {
        return Ok(None);
    }

    let bbox = geometry::clip_to_frame(imgproc::bounding_rect(&points)?, width, height);
    if bbox.width <= 0 || bbox.height <= 0 {
        return Ok(None);
    }

    let mut mask = Mat::zeros(bbox.height, bbox.width, core::CV_8UC1)?.to_mat()?;
    let outlines: Vector<Contour> = parts.iter().map(|c| c.contour.clone()).collect();
    imgproc::draw_contours(
        &mut mask,
        &outlines,
        -1,
        Scalar::all(255.0),
        imgproc::FILLED,
        imgproc::LINE_8,
        &core::no_array(),
        i32::MAX,
        Point::new(-bbox.x, -bbox.y),
    )?;

    let position = Point::new(bbox.x, bbox.y);
    let center =
        geometry::mask_centroid(&mask, position)?.unwrap_or_else(|| geometry::center(bbox));

    let area = parts.iter().map(|c| c.features.area).sum();
    let score = parts
        .iter()
        .map(|c| c.score)
        .fold(f64::NEG_INFINITY, f64::max);

    Ok(Some(Plant {
        bounding_box: bbox,
        position,
        center,
        mask,
        species,
        area,
        score,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: i32 = 400;
    const H: i32 = 400;

    fn blank(value: f64) -> Mat {
        Mat::new_rows_cols_with_default(H, W, core::CV_8UC1, Scalar::all(value)).unwrap()
    }

    fn fill(mask: &mut Mat, rect: Rect) {
        imgproc::rectangle(
            mask,
            rect,
            Scalar::all(255.0),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )
        .unwrap();
    }

    fn frame() -> Mat {
        Mat::new_rows_cols_with_default(H, W, core::CV_8UC3, Scalar::all(0.0)).unwrap()
    }

    fn plant(species: Species, bbox: Rect, center: Point2d, area: f64) -> Plant {
        Plant {
            bounding_box: bbox,
            position: Point::new(bbox.x, bbox.y),
            center,
            mask: Mat::new_rows_cols_with_default(
                bbox.height,
                bbox.width,
                core::CV_8UC1,
                Scalar::all(255.0),
            )
            .unwrap(),
            species,
            area,
            score: 0.0,
        }
    }

    fn features(area: f64, solidity: f64, extent: f64, distance: f64) -> BlobFeatures {
        BlobFeatures {
            area,
            center: Point2d::new(W as f64 / 2.0 + distance, 100.0),
            solidity,
            extent,
            distance_from_center: distance,
        }
    }

    #[test]
    fn test_score_large_centered_blob_is_crop() {
        let classifier = SpeciesClassifier::new(ClassifierConfig::default());
        let score = classifier.score(&features(10_000.0, 0.9, 0.6, 0.0), W);

        // 25 + 0.9 + 1.0 + 1/(0+1)
        assert!((score - 27.9).abs() < 1e-9);
        assert!(score >= 4.0);
    }

    #[test]
    fn test_score_degenerate_features_stay_finite() {
        let classifier = SpeciesClassifier::new(ClassifierConfig::default());
        let score = classifier.score(&features(0.0, 0.0, 0.0, 0.0), W);
        assert!(score.is_finite());
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_no_bonus_outside_center_band() {
        let classifier = SpeciesClassifier::new(ClassifierConfig::default());
        // 30% of 400 = 120
        let score = classifier.score(&features(800.0, 0.5, 0.4, 150.0), W);
        assert!((score - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_measure_square_contour() {
        let contour = Contour::from_iter([
            Point::new(150, 100),
            Point::new(150, 200),
            Point::new(250, 200),
            Point::new(250, 100),
        ]);
        let f = BlobFeatures::measure(&contour, W, H).unwrap();

        assert!((f.area - 10_000.0).abs() < 1e-6);
        assert!((f.solidity - 1.0).abs() < 1e-6);
        assert!((f.center.x - 200.0).abs() < 1e-6);
        assert!(f.distance_from_center < 1e-6);
        assert!(f.extent > 0.95 && f.extent <= 1.0);
    }

    #[test]
    fn test_measure_degenerate_contour() {
        let contour = Contour::from_iter([Point::new(10, 10), Point::new(30, 10)]);
        let f = BlobFeatures::measure(&contour, W, H).unwrap();

        assert_eq!(f.area, 0.0);
        assert_eq!(f.solidity, 0.0);
        assert!(f.center.x.is_finite() && f.center.y.is_finite());
    }

    #[test]
    fn test_empty_mask_yields_no_plants() {
        let classifier = SpeciesClassifier::from_config(&Config::default());
        let plants = classifier
            .classify(&blank(0.0), &frame(), &blank(255.0), 4.0)
            .unwrap();
        assert!(plants.is_empty());
    }

    #[test]
    fn test_large_centered_blob_classified_crop() {
        let mut mask = blank(0.0);
        fill(&mut mask, Rect::new(150, 100, 101, 101));

        let classifier = SpeciesClassifier::from_config(&Config::default());
        let plants = classifier
            .classify(&mask, &frame(), &blank(255.0), 4.0)
            .unwrap();

        assert_eq!(plants.len(), 1);
        let p = &plants[0];
        assert_eq!(p.species, Species::Crop);
        assert!((p.area - 10_000.0).abs() < 1.0);
        assert_eq!(p.mask.size().unwrap(), p.bounding_box.size());
        assert!(geometry::contains(
            p.bounding_box,
            Point::new(p.center.x as i32, p.center.y as i32)
        ));
    }

    #[test]
    fn test_classification_is_deterministic() {
        let mut mask = blank(0.0);
        fill(&mut mask, Rect::new(150, 100, 101, 101));
        fill(&mut mask, Rect::new(20, 300, 12, 12));
        fill(&mut mask, Rect::new(330, 40, 20, 9));

        let classifier = SpeciesClassifier::from_config(&Config::default());
        let run = || {
            let mut out: Vec<(i32, i32, Species, u64)> = classifier
                .classify(&mask, &frame(), &blank(255.0), 4.0)
                .unwrap()
                .into_iter()
                .map(|p| (p.bounding_box.x, p.bounding_box.y, p.species, p.score.to_bits()))
                .collect();
            out.sort_by_key(|t| (t.0, t.1));
            out
        };

        assert_eq!(run(), run());
    }

    /// Small blob with centroid 0.5px off the centerline scores ~4.42 (crop,
    /// below threshold + 1) and sits 16px from a weed blob.
    fn decluster_mask() -> Mat {
        let mut mask = blank(0.0);
        fill(&mut mask, Rect::new(193, 100, 14, 14));
        fill(&mut mask, Rect::new(210, 100, 12, 12));
        mask
    }

    #[test]
    fn test_small_crop_near_weed_is_reclassified() {
        let classifier = SpeciesClassifier::from_config(&Config::default());
        let plants = classifier
            .classify(&decluster_mask(), &frame(), &blank(255.0), 4.0)
            .unwrap();

        assert!(!plants.is_empty());
        assert!(plants.iter().all(|p| p.species == Species::Weed));
    }

    #[test]
    fn test_small_crop_survives_without_declustering() {
        let config = ClassifierConfig {
            decluster_max_area: 0.0,
            ..ClassifierConfig::default()
        };
        let classifier = SpeciesClassifier::new(config);
        let plants = classifier
            .classify(&decluster_mask(), &frame(), &blank(255.0), 4.0)
            .unwrap();

        assert_eq!(plants.len(), 2);
        assert_eq!(
            plants.iter().filter(|p| p.species == Species::Crop).count(),
            1
        );
    }

    #[test]
    fn test_plant_without_edge_overlap_is_pruned() {
        let mut mask = blank(0.0);
        fill(&mut mask, Rect::new(150, 100, 101, 101));

        let classifier = SpeciesClassifier::from_config(&Config::default());
        let plants = classifier
            .classify(&mask, &frame(), &blank(0.0), 4.0)
            .unwrap();
        assert!(plants.is_empty());
    }

    #[test]
    fn test_edge_pixel_inside_box_keeps_plant() {
        let mut mask = blank(0.0);
        fill(&mut mask, Rect::new(150, 100, 101, 101));
        let mut edges = blank(0.0);
        *edges.at_2d_mut::<u8>(150, 200).unwrap() = 255;

        let classifier = SpeciesClassifier::from_config(&Config::default());
        let plants = classifier.classify(&mask, &frame(), &edges, 4.0).unwrap();
        assert_eq!(plants.len(), 1);
    }

    #[test]
    fn test_oversized_plant_is_pruned() {
        let classifier = SpeciesClassifier::from_config(&Config::default());
        let mut plants = vec![
            plant(
                Species::Crop,
                Rect::new(0, 0, 400, 300),
                Point2d::new(200.0, 150.0),
                110_000.0,
            ),
            plant(
                Species::Weed,
                Rect::new(10, 10, 20, 20),
                Point2d::new(20.0, 20.0),
                300.0,
            ),
        ];
        let pruned = classifier
            .prune_without_edges(&mut plants, &blank(255.0))
            .unwrap();

        assert_eq!(pruned, 1);
        assert_eq!(plants.len(), 1);
        assert_eq!(plants[0].species, Species::Weed);
    }

    #[test]
    fn test_weed_inside_crop_circle_is_suppressed() {
        let classifier = SpeciesClassifier::from_config(&Config::default());
        // Crop bbox width 120 -> radius 20 around (200, 200).
        let mut plants = vec![
            plant(
                Species::Crop,
                Rect::new(140, 140, 120, 120),
                Point2d::new(200.0, 200.0),
                9000.0,
            ),
            plant(
                Species::Weed,
                Rect::new(205, 205, 10, 10),
                Point2d::new(210.0, 210.0),
                80.0,
            ),
            plant(
                Species::Weed,
                Rect::new(240, 190, 10, 10),
                Point2d::new(245.0, 195.0),
                80.0,
            ),
        ];

        let removed = classifier.suppress_weeds_near_crops(&mut plants);

        assert_eq!(removed, 1);
        assert_eq!(plants.len(), 2);
        assert!(plants
            .iter()
            .any(|p| p.species == Species::Weed && (p.center.x - 245.0).abs() < 1e-9));
    }

    #[test]
    fn test_regrouped_crop_fragments_become_one_plant() {
        let mut mask = blank(0.0);
        // Two crop fragments whose box centers are 45px apart, split by a 5px gap.
        fill(&mut mask, Rect::new(160, 100, 71, 60));
        fill(&mut mask, Rect::new(160, 165, 71, 20));

        let classifier = SpeciesClassifier::from_config(&Config::default());
        let plants = classifier
            .classify(&mask, &frame(), &blank(255.0), 4.0)
            .unwrap();

        assert_eq!(plants.len(), 1);
        let p = &plants[0];
        assert_eq!(p.species, Species::Crop);
        assert_eq!(p.bounding_box, Rect::new(160, 100, 71, 85));
        assert_eq!(p.mask.size().unwrap(), p.bounding_box.size());
        // The gap rows between the fragments stay empty in the mask.
        assert!(!p.mask_at(Point::new(35, 62)).unwrap());
        assert!(p.mask_at(Point::new(35, 35)).unwrap());
    }
}
