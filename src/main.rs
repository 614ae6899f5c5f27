#![deny(future_incompatible)]
#![deny(nonstandard_style)]
#![deny(clippy::pedantic)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::many_single_char_names,
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::struct_excessive_bools,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::unreadable_literal,
    clippy::wildcard_imports
)]

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
    time::Instant,
};

use anyhow::{bail, ensure, Context, Result};
use bytemuck::{Pod, Zeroable};
use log::{debug, info, warn};
use nalgebra as na;
use nalgebra::vector;
use rand::prelude::*;
use rayon::prelude::*;
use serde::Deserialize;

#[cfg(test)]
use approx::{assert_abs_diff_eq, assert_ulps_eq};

mod color;
mod gltf;
mod img;
mod math;
mod scene;
mod wavefront;

use color::*;
use math::*;

const PI: f32 = std::f32::consts::PI;

// The one intersection epsilon: degenerate tie-breaks, self-intersection
// offsets, and degenerate-geometry rejection all share it.
const EPSILON: f32 = 1e-5;

//
// Main
//

#[derive(clap::Parser)]
#[clap(author, version, about)]
struct Args {
    /// Scene description file.
    scene: PathBuf,

    /// Output image path. Defaults to the scene's FILE name with a .png
    /// extension.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Override the scene's iteration count.
    #[arg(long)]
    iterations: Option<u32>,

    /// Override the scene's maximum path depth.
    #[arg(long)]
    depth: Option<u32>,

    /// Sort paths by material id before shading.
    #[arg(long)]
    sort_by_material: bool,

    /// Compact terminated paths out of the pool after every bounce.
    #[arg(long)]
    stream_compact: bool,

    /// Cache first-bounce intersections across iterations. Disables
    /// sub-pixel jitter.
    #[arg(long)]
    cache_first_intersection: bool,

    /// Intersect meshes by linear scan instead of BVH traversal.
    #[arg(long)]
    no_bvh: bool,

    /// Disable Russian roulette path termination.
    #[arg(long)]
    no_russian_roulette: bool,

    /// Write linear values without the Reinhard + gamma display transform.
    #[arg(long)]
    no_tonemap: bool,
}

fn main() -> Result<()> {
    use clap::Parser;

    env_logger::init();
    run(&Args::parse())
}

fn run(args: &Args) -> Result<()> {
    // Load scene.
    let mut desc = scene::load_from_file(&args.scene)?;
    if let Some(iterations) = args.iterations {
        ensure!(iterations > 0, "--iterations must be positive");
        desc.iterations = iterations;
    }
    if let Some(depth) = args.depth {
        ensure!(depth > 0, "--depth must be positive");
        desc.trace_depth = depth;
    }

    // Init renderer.
    let toggles = wavefront::RenderToggles {
        sort_by_material: args.sort_by_material,
        stream_compact: args.stream_compact,
        cache_first_intersection: args.cache_first_intersection,
        enable_bvh: !args.no_bvh,
        enable_russian_roulette: !args.no_russian_roulette,
        enable_hdr_gamma_correction: !args.no_tonemap,
    };
    let mut renderer = wavefront::Renderer::new(&desc, toggles)?;

    // Render.
    let iterations = desc.iterations;
    let stop = AtomicBool::new(false);
    let pb = indicatif::ProgressBar::new(u64::from(iterations)).with_style(
        indicatif::ProgressStyle::with_template(
            "{wide_bar} {pos}/{len} elapsed={elapsed_precise} eta={eta_precise}",
        )?,
    );
    let timer = Instant::now();
    let completed = renderer.render(iterations, &stop, |_| pb.inc(1));
    pb.finish();
    let elapsed = timer.elapsed().as_secs_f64();
    info!(
        "Rendered {completed} iterations in {:.03} s, {:.03} rays/s",
        elapsed,
        renderer.rays_traced() as f64 / elapsed
    );

    // Write image.
    let (width, height) = renderer.camera().resolution;
    let mut rgba = vec![0_u8; 4 * (width * height) as usize];
    renderer.present(&mut rgba);
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}.png", desc.output_file)));
    img::RgbaImage::from_bytes((width, height), rgba)?.save(&output)?;
    info!("Wrote {}", output.display());

    Ok(())
}
