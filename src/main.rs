/// Headless renderer entry point
/// Renders a grid of spheres sweeping metallic and roughness and writes a PNG.
use clap::Parser;
use glam::{Mat4, Vec3};
use log::{info, warn};
use mimalloc::MiMalloc;
use soft_pbr::*;
use std::error::Error;
use std::path::PathBuf;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "soft_pbr")]
#[command(about = "CPU physically based software rasterizer", long_about = None)]
#[command(version)]
struct Cli {
    /// Output PNG path
    #[arg(short, long, default_value = "render.png")]
    output: PathBuf,

    #[arg(long, default_value_t = 1280)]
    width: usize,

    #[arg(long, default_value_t = 720)]
    height: usize,

    /// Equirectangular HDR/EXR environment for the sky and image-based lighting
    #[arg(short, long)]
    environment: Option<PathBuf>,

    /// Linear exposure applied before tone mapping
    #[arg(long, default_value_t = 1.0)]
    exposure: f32,

    /// Disable the FXAA pass
    #[arg(long)]
    no_fxaa: bool,

    /// Clamp instead of applying the ACES curve
    #[arg(long)]
    no_tonemap: bool,

    /// Spheres per row and column
    #[arg(long, default_value_t = 5)]
    grid: usize,

    /// Camera yaw and pitch in degrees
    #[arg(long, default_value_t = 0.0)]
    yaw: f32,
    #[arg(long, default_value_t = 10.0)]
    pitch: f32,
}

/// Spheres on the XY plane: metallic rises left to right, roughness bottom to top.
fn build_sphere_grid(grid: usize) -> RenderQueue {
    let mut queue = RenderQueue::new();
    let sphere = queue.add_mesh(Mesh::uv_sphere(0.4, 48, 24));
    let grid = grid.max(1);
    let step = 1.0;
    let offset = (grid - 1) as f32 * step * 0.5;
    let denom = (grid.max(2) - 1) as f32;

    for row in 0..grid {
        for col in 0..grid {
            let metallic = col as f32 / denom;
            let roughness = (row as f32 / denom).max(0.05);
            let material = queue.add_material(PbrMaterial::new(Vec3::new(0.9, 0.35, 0.2), metallic, roughness));
            let position = Vec3::new(col as f32 * step - offset, row as f32 * step - offset, 0.0);
            queue.push(sphere, material, Mat4::from_translation(position));
        }
    }

    // Floor under the grid
    let floor = queue.add_mesh(Mesh::quad(grid as f32));
    let floor_material = queue.add_material(PbrMaterial::new(Vec3::splat(0.6), 0.0, 0.8).double_sided(true));
    queue.push(
        floor,
        floor_material,
        Mat4::from_translation(Vec3::new(0.0, -offset - 0.6, 0.0)) * Mat4::from_rotation_x(-std::f32::consts::FRAC_PI_2),
    );
    queue
}

fn bgra_to_rgba(pixels: &[u32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(pixels.len() * 4);
    for &p in pixels {
        bytes.extend_from_slice(&[(p >> 16) as u8, (p >> 8) as u8, p as u8, (p >> 24) as u8]);
    }
    bytes
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let width = cli.width.max(1);
    let height = cli.height.max(1);

    let mut environment = EnvironmentMap::new();
    if let Some(path) = &cli.environment {
        if let Err(e) = environment.load_from_file(path) {
            warn!("continuing without image-based lighting: {}", e);
        }
    }

    let config = RendererConfig::default().with_post_process(!cli.no_fxaa, !cli.no_tonemap, cli.exposure);
    let mut renderer = Renderer::new(width, height, config);

    let queue = build_sphere_grid(cli.grid);

    let mut camera = OrbitCamera::new(Vec3::ZERO, cli.grid.max(1) as f32 * 1.6 + 2.0, width as f32 / height as f32);
    camera.rotate(cli.yaw.to_radians(), cli.pitch.to_radians());

    let key_light = DirectionalLight::new(Vec3::new(-0.4, -0.8, -0.6), Vec3::ONE, 3.0);
    let frame = FrameContextBuilder::new(config.frame)
        .lights(&[key_light])
        .environment(Some(&environment), 1.0)
        .build(&camera, width, height);

    let stats = renderer.render(&queue, &frame);
    info!(
        "rendered {}x{} in {:.2}ms: {} triangles, {} pixels shaded",
        width,
        height,
        stats.total_ms(),
        stats.triangles_raster,
        stats.pixels_shaded
    );

    let rgba = bgra_to_rgba(renderer.framebuffer().color());
    image::save_buffer(&cli.output, &rgba, width as u32, height as u32, image::ColorType::Rgba8)?;
    info!("wrote {}", cli.output.display());

    Ok(())
}
