//! Synthetic crowd driver for the occlusion pipeline.
//!
//! Scatters capsule figures over a plaza, orbits a camera around them and
//! logs per-frame statistics.
//!
//! ```text
//! capsule-occlusion [OPTIONS.toml] [FRAMES] [PEOPLE]
//! capsule-occlusion --schema
//! ```
//!
//! Output goes through the logger at `info` unless `RUST_LOG` says
//! otherwise (`debug` adds per-frame lines, `trace` stage timings).

use capsule_occlusion::camera::Camera;
use capsule_occlusion::capsule::figure::crowd;
use capsule_occlusion::error::OcclusionError;
use capsule_occlusion::options::Options;
use capsule_occlusion::pipeline::OcclusionPipeline;
use glam::Vec3;

const DEFAULT_FRAMES: usize = 240;
const DEFAULT_PEOPLE: usize = 150;
const PLAZA_EXTENT: f32 = 25.0;
const ORBIT_RADIUS: f32 = 30.0;

fn parse_count(arg: Option<String>, default: usize) -> Result<usize, OcclusionError> {
    arg.map_or(Ok(default), |s| {
        s.parse()
            .map_err(|e| OcclusionError::OptionsParse(format!("bad count '{s}': {e}")))
    })
}

fn schema_json() -> Result<String, OcclusionError> {
    serde_json::to_string_pretty(&Options::json_schema())
        .map_err(|e| OcclusionError::OptionsParse(e.to_string()))
}

fn run() -> Result<(), OcclusionError> {
    let mut args = std::env::args().skip(1).peekable();
    if args.peek().is_some_and(|a| a == "--schema") {
        log::info!("options schema:\n{}", schema_json()?);
        return Ok(());
    }
    let options = match args.next() {
        Some(path) if path != "-" => {
            let options = Options::load(std::path::Path::new(&path))?;
            log::info!("Loaded options from '{path}'");
            options
        }
        _ => Options::default(),
    };
    let frames = parse_count(args.next(), DEFAULT_FRAMES)?;
    let people = parse_count(args.next(), DEFAULT_PEOPLE)?;

    let mut pipeline = OcclusionPipeline::new(options);
    for capsule in crowd(people, PLAZA_EXTENT, 0x0cc1_0de5) {
        let _ = pipeline.capsules_mut().insert(capsule);
    }
    log::info!("{} capsules in {} figures", pipeline.capsules().len(), people);

    let mut camera = Camera {
        target: Vec3::new(0.0, 1.0, 0.0),
        ..Camera::default()
    };
    for frame in 0..frames {
        let angle = frame as f32 / frames.max(1) as f32 * std::f32::consts::TAU;
        camera.eye = Vec3::new(ORBIT_RADIUS * angle.cos(), 1.7, ORBIT_RADIUS * angle.sin());
        let _ = pipeline.begin_frame(&camera.frame());
        pipeline.end_frame();

        let stats = pipeline.stats();
        log::debug!(
            "frame {frame}: {} visible, {} selected, {}/{} cells occupied, {:.3} ms",
            stats.visible_capsules,
            stats.selected_capsules,
            stats.occupied_clusters,
            stats.cluster_count,
            stats.timings.total().as_secs_f64() * 1000.0,
        );
    }

    let stats = pipeline.stats();
    log::info!(
        "{} frames, {:.3} ms smoothed, {} bytes of cluster buffers",
        stats.frames,
        stats.timings.smoothed_ms(),
        stats.byte_count,
    );
    log::info!(
        "last frame: {} active, {} visible, {} selected, {}/{} records",
        stats.active_capsules,
        stats.visible_capsules,
        stats.selected_capsules,
        stats.records_used,
        stats.record_capacity,
    );
    if stats.overflow_frames > 0 {
        log::warn!(
            "{} frames overflowed, {} appends dropped in total",
            stats.overflow_frames,
            stats.total_dropped,
        );
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_lists_every_section() {
        let schema: serde_json::Value = serde_json::from_str(&schema_json().unwrap()).unwrap();
        let properties = schema["properties"].as_object().unwrap();
        for section in ["clustering", "selection", "effect", "debug"] {
            assert!(properties.contains_key(section), "{section}");
        }
    }

    #[test]
    fn counts_fall_back_to_defaults() {
        assert_eq!(parse_count(None, 7).unwrap(), 7);
        assert_eq!(parse_count(Some("12".to_owned()), 7).unwrap(), 12);
        assert!(matches!(
            parse_count(Some("many".to_owned()), 7),
            Err(OcclusionError::OptionsParse(_))
        ));
    }
}
