//! lumen-cli: drive the forward renderer over the demo scene.
//!
//! There is no window. Frames render headlessly on the GPU through wgpu and
//! the last one can be saved as a PNG; the recording backend instead traces
//! the device command stream.

mod demo;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use lumen_common::ViewportSize;
use lumen_kernel::{EntityId, World};
use lumen_render::{
    shaders, ForwardRenderer, FrameOutcome, GraphicsDevice, RecordingDevice, RendererConfig,
};
use lumen_render_wgpu::WgpuDevice;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lumen-cli", about = "lumen forward renderer CLI")]
struct Cli {
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    /// Headless GPU rendering
    Wgpu,
    /// In-memory command recorder
    Recording,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version info for all crates
    Info,
    /// Render the demo scene and report per-frame statistics
    Render {
        /// Number of frames to render
        #[arg(short, long, default_value = "3")]
        frames: usize,
        /// Draw the demo sky
        #[arg(long)]
        sky: bool,
        /// Post-process fragment shader path (the built-in grayscale filter is
        /// assets/shaders/postprocess/grayscale.frag)
        #[arg(long)]
        postprocess: Option<String>,
        /// Renderer config file (JSON); flags override its keys
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Viewport width
        #[arg(long, default_value = "1280")]
        width: u32,
        /// Viewport height
        #[arg(long, default_value = "720")]
        height: u32,
        /// Graphics backend
        #[arg(short, long, value_enum, default_value = "wgpu")]
        backend: Backend,
        /// Save the last frame as a PNG (wgpu backend only)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print every device command of the last frame (recording backend only)
        #[arg(long)]
        trace: bool,
    },
    /// Print the demo scene hierarchy
    Inspect,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("lumen v0.1.0");
            println!("  {}", lumen_common::crate_info());
            println!("  {}", lumen_assets::crate_info());
            println!("  {}", lumen_ecs::crate_info());
            println!("  {}", lumen_kernel::crate_info());
            println!("  {}", lumen_render::crate_info());
            println!("  built-in shaders: {}", shaders::BUILTIN.len());
        }
        Commands::Render {
            frames,
            sky,
            postprocess,
            config,
            width,
            height,
            backend,
            output,
            trace,
        } => {
            let mut config = match config {
                Some(path) => RendererConfig::load(&path)
                    .with_context(|| format!("loading renderer config {}", path.display()))?,
                None => RendererConfig::default(),
            };
            if sky {
                config = config.with_sky(demo::SKY_IMAGE_PATH);
            }
            if let Some(path) = postprocess {
                config = config.with_postprocess(path);
            }
            let options = RenderOptions {
                frames,
                viewport: ViewportSize::new(width, height),
                backend,
                output,
                trace,
            };
            render(&options, &config)?;
        }
        Commands::Inspect => {
            let mut device = RecordingDevice::new();
            let mut demo = demo::build(&mut device)?;
            println!("{} entities", demo.world.len());
            let roots: Vec<EntityId> = demo
                .world
                .entity_ids()
                .into_iter()
                .filter(|&id| demo.world.parent_of(id).is_none())
                .collect();
            for root in roots {
                print_entity(&demo.world, root, 0);
            }
            demo.library.clear(&mut device);
        }
    }

    Ok(())
}

struct RenderOptions {
    frames: usize,
    viewport: ViewportSize,
    backend: Backend,
    output: Option<PathBuf>,
    trace: bool,
}

/// The opened backend, with what each one can report about a frame.
enum Device {
    Recording(RecordingDevice),
    Wgpu { device: Box<WgpuDevice>, frame_start: usize },
}

impl Device {
    fn open(backend: Backend, viewport: ViewportSize) -> anyhow::Result<Self> {
        Ok(match backend {
            Backend::Recording => Device::Recording(RecordingDevice::new()),
            Backend::Wgpu => Device::Wgpu {
                device: Box::new(WgpuDevice::headless(viewport).context("opening the wgpu device")?),
                frame_start: 0,
            },
        })
    }

    fn graphics(&mut self) -> &mut dyn GraphicsDevice {
        match self {
            Device::Recording(device) => device,
            Device::Wgpu { device, .. } => device.as_mut(),
        }
    }

    fn begin_frame(&mut self) {
        match self {
            Device::Recording(device) => {
                device.take_commands();
            }
            Device::Wgpu { device, frame_start } => *frame_start = device.draw_calls(),
        }
    }

    fn frame_draws(&self) -> usize {
        match self {
            Device::Recording(device) => device.draw_count(),
            Device::Wgpu { device, frame_start } => device.draw_calls() - frame_start,
        }
    }

    fn live_object_count(&self) -> usize {
        match self {
            Device::Recording(device) => device.live_object_count(),
            Device::Wgpu { device, .. } => device.live_object_count(),
        }
    }
}

fn render(options: &RenderOptions, config: &RendererConfig) -> anyhow::Result<()> {
    if options.output.is_some() && matches!(options.backend, Backend::Recording) {
        anyhow::bail!("--output needs the wgpu backend");
    }
    let viewport = options.viewport;
    let mut device = Device::open(options.backend, viewport)?;
    let mut demo = demo::build(device.graphics())?;
    let mut renderer = ForwardRenderer::new();
    renderer.initialize(device.graphics(), &demo.source, viewport, config);
    tracing::info!(
        backend = ?options.backend,
        width = viewport.width,
        height = viewport.height,
        sky = renderer.has_sky(),
        postprocess = renderer.has_postprocess(),
        "renderer ready"
    );
    // Scene construction events are not part of any frame report.
    demo.world.drain_events();

    for frame in 0..options.frames {
        device.begin_frame();
        match renderer.render(device.graphics(), &demo.world, &demo.library) {
            FrameOutcome::Rendered(stats) => println!(
                "frame {frame}: {} opaque, {} transparent, {} lights, {} skipped, {} device draws",
                stats.opaque_draws,
                stats.transparent_draws,
                stats.lights,
                stats.skipped_commands,
                device.frame_draws()
            ),
            FrameOutcome::NoCamera => println!("frame {frame}: no camera"),
            FrameOutcome::NotReady => anyhow::bail!("renderer not ready"),
        }
        for name in demo::step(&mut demo.world, demo.car) {
            println!("  car hit {name}");
        }
        let destroyed = demo::drain_destroyed(&mut demo.world);
        if destroyed > 0 {
            tracing::debug!(frame, destroyed, remaining = demo.world.len(), "entities destroyed");
        }
    }

    match &mut device {
        Device::Recording(recording) if options.trace => {
            println!("device commands of the last frame:");
            for command in recording.commands() {
                println!("  {command:?}");
            }
        }
        Device::Wgpu { device, .. } => {
            if options.trace {
                tracing::warn!("--trace only applies to the recording backend");
            }
            if let Some(path) = &options.output {
                save_png(device, path)?;
                println!("wrote {}", path.display());
            }
        }
        _ => {}
    }

    renderer.destroy(device.graphics());
    demo.library.clear(device.graphics());
    let live = device.live_object_count();
    tracing::info!(live, "renderer torn down");
    println!("live GPU objects after teardown: {live}");
    Ok(())
}

/// Read back the default target; PNG rows run top-down, the device's bottom-up.
fn save_png(device: &WgpuDevice, path: &Path) -> anyhow::Result<()> {
    let frame = device.read_pixels().context("reading back the last frame")?;
    let mut image = image::RgbaImage::from_raw(frame.width(), frame.height(), frame.pixels().to_vec())
        .context("read-back size does not match the viewport")?;
    image::imageops::flip_vertical_in_place(&mut image);
    image
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("writing {}", path.display()))
}

fn print_entity(world: &World, id: EntityId, depth: usize) {
    let Some(entity) = world.get(id) else {
        return;
    };
    let position = world
        .local_to_world_matrix(id)
        .map(|m| m.w_axis.truncate())
        .unwrap_or_default();
    let components: Vec<String> = entity.components().map(|(_, c)| c.tag().to_string()).collect();
    println!(
        "{:indent$}{} [{}] at ({:.2}, {:.2}, {:.2}) {{{}}}",
        "",
        entity.name,
        entity.tag,
        position.x,
        position.y,
        position.z,
        components.join(", "),
        indent = depth * 2
    );
    for child in world.children_of(id) {
        print_entity(world, child, depth + 1);
    }
}
