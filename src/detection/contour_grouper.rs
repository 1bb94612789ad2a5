// src/detection/contour_grouper.rs
//
// Greedy single-pass merge of nearby contours into plant blobs.
//
// Each unmerged contour seeds a group. Every later unmerged contour joins the
// seed's group when its bounding rect overlaps the SEED's rect or the rect
// centers are closer than `max_distance`. Membership is judged against the
// seed only, so A–B–C chains where C is only near B stay split.

use crate::geometry;
use anyhow::Result;
use opencv::{
    core::{Point, Rect, Vector},
    imgproc,
};

pub type Contour = Vector<Point>;

pub fn group_contours(contours: &[Contour], max_distance: f64) -> Result<Vec<Contour>> {
    let groups = group_indices(contours, max_distance)?;
    Ok(groups
        .into_iter()
        .map(|members| {
            members
                .into_iter()
                .flat_map(|k| contours[k].iter())
                .collect::<Contour>()
        })
        .collect())
}

/// Same pass as [`group_contours`], returning member indices per group.
/// The seed is always the first index of its group.
pub fn group_indices(contours: &[Contour], max_distance: f64) -> Result<Vec<Vec<usize>>> {
    let rects = contours
        .iter()
        .map(bounding_rect)
        .collect::<Result<Vec<Rect>>>()?;

    let mut merged = vec![false; contours.len()];
    let mut groups = Vec::new();

    for i in 0..contours.len() {
        if merged[i] {
            continue;
        }
        merged[i] = true;

        let mut members = vec![i];
        let seed_rect = rects[i];
        let seed_center = geometry::center(seed_rect);

        for j in (i + 1)..contours.len() {
            if merged[j] {
                continue;
            }

            let overlaps = geometry::overlap_area(seed_rect, rects[j]) > 0;
            let close = geometry::distance(seed_center, geometry::center(rects[j])) < max_distance;

            if overlaps || close {
                members.push(j);
                merged[j] = true;
            }
        }

        groups.push(members);
    }

    Ok(groups)
}

fn bounding_rect(contour: &Contour) -> Result<Rect> {
    if contour.is_empty() {
        return Ok(Rect::default());
    }
    Ok(imgproc::bounding_rect(contour)?)
}
