use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use outline_core::bake::{bake_in_place, BakeOptions};
use outline_core::config::{self, schema::OutlineConfig};
use outline_core::export;
use outline_core::render::backend::{Command as GpuCommand, Extent, RecordingBackend};
use outline_core::render::material::MaterialParameterBlock;
use outline_core::render::mesh::{generate_split_cube, generate_uv_sphere, Mesh};
use outline_core::render::outline::{resolve_policy, OutlineMode, StencilLayer};
use outline_core::render::post::{CameraKind, FrameContext, FrameOutcome, PostProcessOrchestrator, COMPOSITOR_PROGRAM};
use outline_core::VERSION;

#[derive(Parser, Debug)]
#[command(name = "outline", version = VERSION, about = "Outline baking and post-pass tools")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Shape {
    Cube,
    Sphere,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load and inspect an outline config YAML
    Inspect { path: String },
    /// Bake smoothed outline normals for a procedural mesh
    Bake {
        #[arg(long, value_enum, default_value_t = Shape::Cube)]
        shape: Shape,
        /// Config to read `outline.tangent_space` from
        #[arg(long)]
        config: Option<String>,
        /// Force tangent-space encoding
        #[arg(long)]
        tangent_space: bool,
        #[arg(long, default_value_t = 16)]
        stacks: u32,
        #[arg(long, default_value_t = 24)]
        slices: u32,
        #[arg(long, default_value = "baked.json")]
        out: String,
        /// Also write baked normals as an RGB PNG, one pixel per vertex
        #[arg(long)]
        preview: Option<String>,
    },
    /// Print the depth/stencil policy of every outline mode
    Modes {
        #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..8))]
        layer: u8,
    },
    /// Record post-pass frames against an in-memory backend
    Frames {
        #[arg(long)]
        config: Option<String>,
        #[arg(long, default_value_t = 3)]
        frames: u32,
        #[arg(long, default_value_t = 1280)]
        width: u32,
        #[arg(long, default_value_t = 720)]
        height: u32,
        /// Resize to twice the resolution before this frame
        #[arg(long)]
        resize_at: Option<u32>,
        /// Simulate a host without the compositor shader
        #[arg(long)]
        no_compositor: bool,
    },
}

fn load_config(path: Option<&str>) -> Result<OutlineConfig> {
    match path {
        Some(p) => config::load_from_path(p),
        None => Ok(OutlineConfig::default()),
    }
}

fn write_preview(path: &str, mesh: &Mesh) -> Result<()> {
    let normals = mesh.baked_normals().context("mesh has no baked normals")?;
    let width = (normals.len() as f64).sqrt().ceil().max(1.0) as u32;
    let height = (normals.len() as u32).div_ceil(width);
    let mut pixels = export::encode_normals_rgb8(normals);
    pixels.resize((width * height * 3) as usize, 0);
    let img = image::RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| anyhow::anyhow!("Failed to create image from raw"))?;
    img.save(path)?;
    info!("Wrote {}x{} preview to {}", width, height, path);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Inspect { path } => {
            let cfg = config::load_from_path(&path)?;
            let o = &cfg.outline;
            let p = &cfg.post;
            println!("Loaded config: {}", path);
            println!("  outline: mode={:?} width={:.2} layer={} tangent_space={} baked={}", o.mode, o.width, o.layer, o.tangent_space, o.baked);
            println!("  outline color: {:?}", o.color.to_array());
            println!("  post: width={:.2} active={} only_outline={}", p.width, p.is_active(), p.only_outline);
            println!("  thresholds: distance={:.2}, normal={:.2} (x{:.2})", p.distance_threshold, p.normal_threshold, p.normal_threshold_scale);
        }
        Command::Bake { shape, config, tangent_space, stacks, slices, out, preview } => {
            let cfg = load_config(config.as_deref())?;
            let options = BakeOptions { tangent_space: tangent_space || cfg.outline.tangent_space };
            let mut mesh = match shape {
                Shape::Cube => generate_split_cube(0.5),
                Shape::Sphere => generate_uv_sphere(1.0, stacks, slices),
            };
            let summary = bake_in_place(&mut mesh, &options)?;
            println!(
                "Baked {}: {} vertices -> {} groups ({} degenerate), submeshes={}, tangent_space={}",
                mesh.name,
                summary.smooth.vertices,
                summary.smooth.groups,
                summary.smooth.degenerate_groups,
                summary.submesh_count,
                summary.tangent_space
            );
            export::save_mesh_json(&out, &mesh, options.tangent_space)?;
            info!("Wrote {}", out);
            if let Some(path) = preview {
                write_preview(&path, &mesh)?;
            }
        }
        Command::Modes { layer } => {
            let layer = StencilLayer::new(layer.into())?;
            for mode in OutlineMode::ALL {
                let p = resolve_policy(mode, layer);
                let (mode, fill, mask) = (format!("{:?}", mode), format!("{:?}", p.fill_test), format!("{:?}", p.mask_test));
                println!("{:<9} fill={:<12} mask={:<12} stencil={:#04x}", mode, fill, mask, p.stencil);
            }
        }
        Command::Frames { config, frames, width, height, resize_at, no_compositor } => {
            let cfg = load_config(config.as_deref())?;
            let compositor = (!no_compositor).then(|| MaterialParameterBlock::new(COMPOSITOR_PROGRAM));
            let mut post = PostProcessOrchestrator::new(compositor);
            let mut recorder = RecordingBackend::new();
            let mut targets = RecordingBackend::new();
            let mut extent = Extent::new(width, height);
            let color_target = recorder.camera_target(extent);

            for i in 0..frames {
                if resize_at == Some(i) {
                    extent = Extent::new(width * 2, height * 2);
                }
                let ctx = FrameContext { camera: CameraKind::Game, color_target, extent };
                let outcome = post.render_frame(&ctx, &cfg.post, &mut targets, &mut recorder)?;
                match outcome {
                    FrameOutcome::Skipped => println!("frame {}: skipped", i),
                    FrameOutcome::Rendered(r) => println!("frame {}: composited={} toggles={}", i, r.composited, r.toggles),
                }
                for GpuCommand::Blit { source, destination, program } in recorder.take_commands() {
                    println!("  blit {:?} -> {:?}{}", source, destination, if program.is_some() { " (outline)" } else { "" });
                }
            }
            post.dispose(&mut targets);
            info!("Allocations: {}, live after dispose: {}", targets.allocations(), targets.live_targets());
        }
    }
    Ok(())
}
