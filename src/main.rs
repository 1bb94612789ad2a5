// src/main.rs

use anyhow::{bail, Result};
use laserweed_vision::{Config, FrameAnalysis, LaserBehavior, Species};
use opencv::{imgcodecs, prelude::*};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

const DEFAULT_CONFIG: &str = "config.yaml";

fn main() -> Result<()> {
    let config_path =
        std::env::var("LASERWEED_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG.to_string());

    let config = if Path::new(&config_path).exists() {
        Config::load(&config_path)?
    } else {
        Config::default()
    };

    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| format!("laserweed_vision={}", config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🌱 Laser weeding vision starting");
    if Path::new(&config_path).exists() {
        info!("✓ Configuration loaded from {}", config_path);
    } else {
        warn!("{} not found, using built-in defaults", config_path);
    }

    info!(
        "Classifier: score_threshold={:.2}, crop_group={:.0}px, weed_group={:.0}px, weed_tolerance={}px",
        config.classifier.score_threshold,
        config.classifier.crop_group_distance,
        config.classifier.weed_group_distance,
        config.jet.weed_tolerance
    );

    let images: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if images.is_empty() {
        bail!("usage: laserweed-vision <image> [<image> ...]");
    }

    let mut stats = ProcessingStats::default();

    for (frame_id, path) in images.iter().enumerate() {
        match process_image(frame_id as u64, path, &config) {
            Ok(analysis) => stats.record(&analysis),
            Err(e) => {
                error!("❌ {}: {:#}", path.display(), e);
                stats.failed += 1;
            }
        }
    }

    stats.log_summary();
    Ok(())
}

fn process_image(frame_id: u64, path: &Path, config: &Config) -> Result<FrameAnalysis> {
    let frame = imgcodecs::imread(&path.to_string_lossy(), imgcodecs::IMREAD_COLOR)?;
    if frame.empty() {
        bail!("could not read image");
    }

    let analysis = FrameAnalysis::new(frame_id, frame, config)?;

    let crops = analysis
        .plants()
        .iter()
        .filter(|p| p.species == Species::Crop)
        .count();
    let weeds = analysis.plants().len() - crops;

    let aim = analysis
        .aim_point()
        .map(|p| format!("({}, {})", p.x, p.y))
        .unwrap_or_else(|| "none".to_string());

    info!(
        "{}: {} crop, {} weed, aim {}, laser {}",
        path.display(),
        crops,
        weeds,
        aim,
        analysis.laser_behavior().label()
    );

    for plant in analysis.plants() {
        info!(
            "  {} bbox=({}, {}, {}x{}) center=({:.1}, {:.1}) area={:.0} score={:.2}",
            plant.species.as_str(),
            plant.bounding_box.x,
            plant.bounding_box.y,
            plant.bounding_box.width,
            plant.bounding_box.height,
            plant.center.x,
            plant.center.y,
            plant.area,
            plant.score
        );
    }

    Ok(analysis)
}

#[derive(Debug, Default)]
struct ProcessingStats {
    frames: usize,
    failed: usize,
    crops: usize,
    weeds: usize,
    behaviors: HashMap<LaserBehavior, usize>,
}

impl ProcessingStats {
    fn record(&mut self, analysis: &FrameAnalysis) {
        self.frames += 1;
        for plant in analysis.plants() {
            match plant.species {
                Species::Crop => self.crops += 1,
                Species::Weed => self.weeds += 1,
            }
        }
        *self.behaviors.entry(analysis.laser_behavior()).or_insert(0) += 1;
    }

    fn log_summary(&self) {
        info!("========================================");
        info!("✓ Processed {} image(s), {} failed", self.frames, self.failed);
        info!("  Plants: {} crop, {} weed", self.crops, self.weeds);
        for behavior in [
            LaserBehavior::OnWeed,
            LaserBehavior::OnCrop,
            LaserBehavior::OnNothing,
            LaserBehavior::NotDetected,
        ] {
            let count = self.behaviors.get(&behavior).copied().unwrap_or(0);
            info!("  Laser {}: {}", behavior.label(), count);
        }
        info!("========================================");
    }
}
