//! GPU context for drawing the cell grid
//!
//! `GridRenderer` owns the device, queue and surface, plus whatever buffers,
//! pipeline and bind groups the configured stage needs. Everything is created
//! once at startup; rendering only records a single pass per frame.

use std::sync::Arc;

use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, Buffer, BufferUsages, CommandEncoderDescriptor, Device, FragmentState,
    Instance, LoadOp, MultisampleState, Operations, PipelineLayoutDescriptor, PrimitiveState,
    Queue, RenderPassColorAttachment, RenderPassDescriptor, RenderPipeline,
    RenderPipelineDescriptor, ShaderStages, StoreOp, Surface, SurfaceConfiguration,
    TextureFormat, TextureUsages, TextureViewDescriptor, VertexState,
    util::{BufferInitDescriptor, DeviceExt},
};
use winit::window::Window;

use crate::{
    cells::{CellStates, StatePhase},
    config::{GridConfig, Stage},
    error::StartupError,
    host::{self, GraphicsProbe, HostProbe},
    rendering::{self, CLEAR_COLOR, GridUniform, SQUARE_VERTICES, VERTEX_COUNT, VERTEX_LAYOUT},
};

pub struct GridRenderer {
    #[allow(dead_code)]
    instance: Instance, // Keep instance alive for the lifetime of the renderer
    device: Device,
    queue: Queue,
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,
    window: Arc<Window>,
    stage: Stage,
    /// `None` for the clear-only stage
    draw: Option<DrawResources>,
}

/// What a single frame binds and draws
struct DrawResources {
    pipeline: RenderPipeline,
    vertex_buffer: Buffer,
    /// Empty for the square stage, one for the grid stage, one per state
    /// phase for the cells stage
    bind_groups: Vec<BindGroup>,
    instance_count: u32,
}

impl GridRenderer {
    pub async fn new(window: Arc<Window>, config: &GridConfig) -> Result<Self, StartupError> {
        Self::with_probe(window, config, &HostProbe).await
    }

    /// Start up against an explicit capability probe
    ///
    /// Both fatal checks (graphics capability, then adapter) run before any
    /// buffer is created.
    pub async fn with_probe(
        window: Arc<Window>,
        config: &GridConfig,
        probe: &impl GraphicsProbe,
    ) -> Result<Self, StartupError> {
        check_startup(config, probe)?;

        let instance = Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            })
            .await
            .map_err(|e| {
                log::debug!("adapter request failed: {e}");
                StartupError::NoAdapter
            })?;

        log::info!("Using adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("gridcells device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::MemoryUsage,
                trace: wgpu::Trace::Off,
            })
            .await?;

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        // The first reported format is the adapter's preferred one
        let surface_format = surface_caps
            .formats
            .first()
            .copied()
            .ok_or(StartupError::NoSurfaceFormat)?;
        log::info!("Surface format: {surface_format:?}");

        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let draw = rendering::shader_source(config.stage)
            .map(|source| Self::create_draw_resources(&device, config, surface_format, source));

        log::info!(
            "{} stage ready: {}x{} grid, {} instances",
            config.stage,
            config.grid_size,
            config.grid_size,
            draw.as_ref().map_or(0, |d| d.instance_count)
        );

        Ok(Self {
            instance,
            device,
            queue,
            surface,
            surface_config,
            window,
            stage: config.stage,
            draw,
        })
    }

    fn create_draw_resources(
        device: &Device,
        config: &GridConfig,
        surface_format: TextureFormat,
        shader_source: &'static str,
    ) -> DrawResources {
        let stage = config.stage;

        let vertex_buffer = device.create_buffer_init(&BufferInitDescriptor {
            label: Some("Cell vertices"),
            contents: bytemuck::cast_slice(&SQUARE_VERTICES),
            usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
        });

        let (bind_group_layout, bind_groups) = if stage.uses_grid() {
            let (layout, groups) = Self::create_bind_groups(device, config);
            (Some(layout), groups)
        } else {
            (None, Vec::new())
        };

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Cell shader"),
            source: wgpu::ShaderSource::Wgsl(shader_source.into()),
        });

        let bind_group_layouts: Vec<&BindGroupLayout> = bind_group_layout.iter().collect();
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Cell pipeline layout"),
            bind_group_layouts: &bind_group_layouts,
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Cell pipeline"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &shader,
                entry_point: Some(rendering::VERTEX_ENTRY),
                buffers: &[VERTEX_LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: Some(rendering::FRAGMENT_ENTRY),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        DrawResources {
            pipeline,
            vertex_buffer,
            bind_groups,
            instance_count: config.instance_count(),
        }
    }

    /// Grid uniform at binding 0, and for the cells stage one bind group per
    /// seeded state buffer at binding 1
    fn create_bind_groups(
        device: &Device,
        config: &GridConfig,
    ) -> (BindGroupLayout, Vec<BindGroup>) {
        let uniform_buffer = device.create_buffer_init(&BufferInitDescriptor {
            label: Some("Grid Uniforms"),
            contents: bytemuck::bytes_of(&GridUniform::square(config.grid_size)),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });

        let mut layout_entries = vec![BindGroupLayoutEntry {
            binding: 0,
            visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }];
        if config.stage.uses_cell_state() {
            layout_entries.push(BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            });
        }

        let layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Cell Bind Group Layout"),
            entries: &layout_entries,
        });

        if !config.stage.uses_cell_state() {
            let bind_group = device.create_bind_group(&BindGroupDescriptor {
                label: Some("Cell renderer bind group"),
                layout: &layout,
                entries: &[BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });
            return (layout, vec![bind_group]);
        }

        let states = CellStates::seeded(config.grid_size);
        let bind_groups = [StatePhase::A, StatePhase::B]
            .into_iter()
            .map(|phase| {
                let state_buffer = device.create_buffer_init(&BufferInitDescriptor {
                    label: Some(match phase {
                        StatePhase::A => "Cell State A",
                        StatePhase::B => "Cell State B",
                    }),
                    contents: bytemuck::cast_slice(states.get(phase)),
                    usage: BufferUsages::STORAGE | BufferUsages::COPY_DST,
                });
                device.create_bind_group(&BindGroupDescriptor {
                    label: Some(match phase {
                        StatePhase::A => "Cell renderer bind group A",
                        StatePhase::B => "Cell renderer bind group B",
                    }),
                    layout: &layout,
                    entries: &[
                        BindGroupEntry {
                            binding: 0,
                            resource: uniform_buffer.as_entire_binding(),
                        },
                        BindGroupEntry {
                            binding: 1,
                            resource: state_buffer.as_entire_binding(),
                        },
                    ],
                })
            })
            .collect();

        (layout, bind_groups)
    }

    /// Request a redraw of the window
    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Clear the surface and draw the grid with the state buffer for `phase`
    ///
    /// Stages without cell state ignore `phase`.
    pub fn render(&self, phase: StatePhase) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("render encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("render pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(CLEAR_COLOR.as_wgpu()),
                        store: StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(draw) = &self.draw {
                render_pass.set_pipeline(&draw.pipeline);
                render_pass.set_vertex_buffer(0, draw.vertex_buffer.slice(..));
                let bind_group = draw
                    .bind_groups
                    .get(phase.index())
                    .or_else(|| draw.bind_groups.first());
                if let Some(bind_group) = bind_group {
                    render_pass.set_bind_group(0, bind_group, &[]);
                }
                render_pass.draw(0..VERTEX_COUNT, 0..draw.instance_count);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }

    /// Resize the render surface
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.surface_config.width = width;
            self.surface_config.height = height;
            self.surface.configure(&self.device, &self.surface_config);
        }
    }

    /// Reconfigure the surface at the window's current size
    pub fn reconfigure(&mut self) {
        let size = self.window.inner_size();
        if size.width > 0 && size.height > 0 {
            self.surface_config.width = size.width;
            self.surface_config.height = size.height;
        }
        self.surface.configure(&self.device, &self.surface_config);
    }
}

/// Both fatal startup checks that need no GPU objects, in order: graphics
/// capability first, then the configuration
pub fn check_startup(config: &GridConfig, probe: &impl GraphicsProbe) -> Result<(), StartupError> {
    host::ensure_graphics(probe)?;
    config.validate()?;
    Ok(())
}

/// Something a frame can be rendered into and, when lost, reconfigured
pub trait FrameTarget {
    fn render_frame(&mut self, phase: StatePhase) -> Result<(), wgpu::SurfaceError>;
    fn reconfigure_surface(&mut self);
}

impl FrameTarget for GridRenderer {
    fn render_frame(&mut self, phase: StatePhase) -> Result<(), wgpu::SurfaceError> {
        self.render(phase)
    }

    fn reconfigure_surface(&mut self) {
        self.reconfigure();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    Skipped,
    OutOfMemory,
}

/// Render one frame, reconfiguring and retrying once if the surface was lost
/// or outdated
///
/// A surface that is still unusable after the retry skips the frame; the
/// caller does not schedule another redraw for it.
pub fn present_frame(target: &mut impl FrameTarget, phase: StatePhase) -> FrameOutcome {
    let first = match target.render_frame(phase) {
        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
            target.reconfigure_surface();
            target.render_frame(phase)
        }
        other => other,
    };
    match first {
        Ok(()) => FrameOutcome::Presented,
        Err(wgpu::SurfaceError::OutOfMemory) => FrameOutcome::OutOfMemory,
        Err(e) => {
            log::warn!("Surface error: {e:?}");
            FrameOutcome::Skipped
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::error::ConfigError;

    struct CountingProbe {
        available: bool,
        calls: Cell<u32>,
    }

    impl GraphicsProbe for CountingProbe {
        fn graphics_available(&self) -> bool {
            self.calls.set(self.calls.get() + 1);
            self.available
        }
    }

    #[test]
    fn capability_is_checked_before_config() {
        let probe = CountingProbe {
            available: false,
            calls: Cell::new(0),
        };
        let config = GridConfig {
            grid_size: 0,
            ..GridConfig::default()
        };
        let err = check_startup(&config, &probe).unwrap_err();
        assert!(matches!(err, StartupError::GraphicsUnsupported));
        assert_eq!(probe.calls.get(), 1);
    }

    #[test]
    fn oversized_grid_fails_startup() {
        let probe = CountingProbe {
            available: true,
            calls: Cell::new(0),
        };
        let config = GridConfig {
            grid_size: 8192,
            ..GridConfig::for_stage(Stage::Cells)
        };
        let err = check_startup(&config, &probe).unwrap_err();
        assert!(matches!(
            err,
            StartupError::Config(ConfigError::GridTooLarge(8192))
        ));
        assert!(check_startup(&GridConfig::default(), &probe).is_ok());
    }

    /// Replays a fixed list of render results
    struct ScriptedTarget {
        results: Vec<Result<(), wgpu::SurfaceError>>,
        renders: u32,
        reconfigures: u32,
    }

    impl ScriptedTarget {
        fn new(mut results: Vec<Result<(), wgpu::SurfaceError>>) -> Self {
            results.reverse();
            Self {
                results,
                renders: 0,
                reconfigures: 0,
            }
        }
    }

    impl FrameTarget for ScriptedTarget {
        fn render_frame(&mut self, _phase: StatePhase) -> Result<(), wgpu::SurfaceError> {
            self.renders += 1;
            self.results.pop().unwrap_or(Ok(()))
        }

        fn reconfigure_surface(&mut self) {
            self.reconfigures += 1;
        }
    }

    #[test]
    fn healthy_surface_presents_without_reconfigure() {
        let mut target = ScriptedTarget::new(vec![Ok(())]);
        assert_eq!(present_frame(&mut target, StatePhase::A), FrameOutcome::Presented);
        assert_eq!((target.renders, target.reconfigures), (1, 0));
    }

    #[test]
    fn outdated_surface_recovers_after_reconfigure() {
        let mut target = ScriptedTarget::new(vec![Err(wgpu::SurfaceError::Outdated), Ok(())]);
        assert_eq!(present_frame(&mut target, StatePhase::B), FrameOutcome::Presented);
        assert_eq!((target.renders, target.reconfigures), (2, 1));
    }

    #[test]
    fn persistently_outdated_surface_skips_the_frame() {
        let mut target = ScriptedTarget::new(vec![
            Err(wgpu::SurfaceError::Outdated),
            Err(wgpu::SurfaceError::Outdated),
            Err(wgpu::SurfaceError::Outdated),
        ]);
        assert_eq!(present_frame(&mut target, StatePhase::A), FrameOutcome::Skipped);
        assert_eq!((target.renders, target.reconfigures), (2, 1));
    }

    #[test]
    fn out_of_memory_is_reported() {
        let mut target = ScriptedTarget::new(vec![Err(wgpu::SurfaceError::OutOfMemory)]);
        assert_eq!(present_frame(&mut target, StatePhase::A), FrameOutcome::OutOfMemory);
        assert_eq!(target.reconfigures, 0);
    }
}
