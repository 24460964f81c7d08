use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::coords::{Size, ViewportRect};
use crate::error::RenderError;
use crate::layer::ImageSource;
use crate::paint::Color;
use crate::shader::ShaderStage;

use super::surface::{self, SurfaceErrorAction};
use super::{BaselineState, Built, GpuInit, GraphicsDevice};

/// Compiled shader stage. `module` is `None` when the source was rejected.
#[derive(Debug, Clone)]
pub struct GpuShader {
    stage: ShaderStage,
    module: Option<Arc<wgpu::ShaderModule>>,
}

/// Linked composition program. `pipeline` is `None` when linking failed.
#[derive(Debug, Clone)]
pub struct GpuProgram {
    pipeline: Option<Arc<wgpu::RenderPipeline>>,
}

/// Uploaded layer texture together with its sampling bind group.
#[derive(Debug, Clone)]
pub struct GpuTexture {
    texture: Arc<wgpu::Texture>,
    bind_group: Arc<wgpu::BindGroup>,
}

impl GpuTexture {
    #[inline]
    pub fn size(&self) -> Size {
        Size::new(self.texture.width(), self.texture.height())
    }
}

/// wgpu-backed [`GraphicsDevice`] bound to one window surface.
///
/// Device loss is reported by wgpu on its own thread; the callback only raises
/// a flag. The host polls it with [`Gpu::poll_context_lost`] between frames and
/// calls [`Gpu::restore`] to acquire a replacement device.
pub struct Gpu {
    /// Surface bound to the window.
    surface: wgpu::Surface<'static>,

    /// Adapter kept for re-acquiring a device after loss.
    adapter: wgpu::Adapter,

    /// Logical device.
    device: wgpu::Device,

    /// Command queue.
    queue: wgpu::Queue,

    /// Active surface configuration.
    config: wgpu::SurfaceConfiguration,

    /// Current drawable size in physical pixels.
    size: Size,

    init: GpuInit,

    /// Raised by the device-lost callback.
    lost: Arc<AtomicBool>,
    loss_reported: bool,

    /// Objects every program and texture depends on; recreated with the device.
    shared: SharedObjects,

    baseline: BaselineState,
    viewport: ViewportRect,

    /// Commands recorded since the default framebuffer was bound.
    frame: Option<FrameRecord>,
}

impl Gpu {
    /// Creates a GPU context bound to `window`.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn new(window: Arc<Window>, init: GpuInit) -> Result<Self> {
        let size = Size::from(window.inner_size());
        anyhow::ensure!(!size.is_empty(), "window has zero size");

        let flags = if init.debug {
            wgpu::InstanceFlags::debugging()
        } else {
            wgpu::InstanceFlags::from_build_config()
        };

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let lost = Arc::new(AtomicBool::new(false));
        let (device, queue) = open_device(&adapter, &init).await?;
        watch_device_loss(&device, &lost);

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface::choose_surface_format(&surface_caps, init.prefer_srgb)
            .context("no supported surface formats")?;
        let alpha_mode = surface::choose_alpha_mode(&surface_caps, &init.attributes);

        let attrs = init.attributes;
        if attrs.depth || attrs.stencil {
            log::warn!("depth/stencil attributes requested; compositing runs without them");
        }
        if attrs.antialias {
            log::debug!("compositing draws axis-aligned quads; surface stays single-sampled");
        }

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode: init.present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: init.desired_maximum_frame_latency,
        };

        surface.configure(&device, &config);

        let shared = SharedObjects::new(&device);

        log::info!(
            "gpu ready: {} ({:?}), surface {:?} {}x{}",
            adapter.get_info().name,
            adapter.get_info().backend,
            format,
            size.width,
            size.height,
        );

        Ok(Self {
            surface,
            adapter,
            device,
            queue,
            config,
            size,
            init,
            lost,
            loss_reported: false,
            shared,
            baseline: BaselineState::with_clear_color(Color::BLACK),
            viewport: size.full_viewport(),
            frame: None,
        })
    }

    /// Returns the active surface format.
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Returns the current drawable size (physical pixels).
    pub fn size(&self) -> Size {
        self.size
    }

    /// Returns `true` exactly once per loss, the first time it is observed.
    pub fn poll_context_lost(&mut self) -> bool {
        if self.loss_reported || !self.lost.load(Ordering::Acquire) {
            return false;
        }
        self.loss_reported = true;
        true
    }

    /// Marks the context lost as if the driver had reset.
    ///
    /// The device stays usable by wgpu, but the engine treats every object
    /// created on it as gone until [`restore`](Self::restore) runs.
    pub fn lose_context(&self) {
        log::warn!("gpu context loss requested by host");
        self.lost.store(true, Ordering::Release);
    }

    /// Acquires a fresh device from the adapter and rebinds the surface to it.
    ///
    /// Every handle issued before the call belongs to the discarded device.
    pub fn restore(&mut self) -> Result<()> {
        let (device, queue) = pollster::block_on(open_device(&self.adapter, &self.init))?;

        let lost = Arc::new(AtomicBool::new(false));
        watch_device_loss(&device, &lost);

        if !self.size.is_empty() {
            self.surface.configure(&device, &self.config);
        }

        self.shared = SharedObjects::new(&device);
        self.device = device;
        self.queue = queue;
        self.lost = lost;
        self.loss_reported = false;
        self.frame = None;

        log::info!("gpu device restored");
        Ok(())
    }

    fn create_pipeline(
        &self,
        vertex: &wgpu::ShaderModule,
        fragment: &wgpu::ShaderModule,
    ) -> wgpu::RenderPipeline {
        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("cartograph composite pipeline layout"),
                bind_group_layouts: &[&self.shared.texture_layout],
                immediate_size: 0,
            });

        let cull_mode = self.baseline.cull_face.then_some(wgpu::Face::Back);

        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("cartograph composite pipeline"),
                layout: Some(&layout),

                vertex: wgpu::VertexState {
                    module: vertex,
                    entry_point: Some(ShaderStage::Vertex.entry_point()),
                    compilation_options: Default::default(),
                    buffers: &[QuadVertex::layout()],
                },

                fragment: Some(wgpu::FragmentState {
                    module: fragment,
                    entry_point: Some(ShaderStage::Fragment.entry_point()),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.config.format,
                        blend: Some(opacity_blend()),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),

                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },

                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            })
    }

    fn encode_frame(&mut self, record: FrameRecord) -> Result<(), RenderError> {
        if self.size.is_empty() {
            return Ok(());
        }

        let surface_texture = match self.surface.get_current_texture() {
            Ok(t) => t,
            Err(err) => {
                let message = err.to_string();
                let action = surface::map_surface_error(
                    &self.surface,
                    &self.device,
                    &self.config,
                    self.size,
                    err,
                );
                return match action {
                    SurfaceErrorAction::Fatal => Err(RenderError::Present { message }),
                    SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => {
                        log::debug!("frame dropped: {message}");
                        Ok(())
                    }
                };
            }
        };

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("cartograph frame encoder"),
            });

        let load = if record.clear {
            wgpu::LoadOp::Clear(self.baseline.clear_color.to_wgpu())
        } else {
            wgpu::LoadOp::Load
        };

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("cartograph composite pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            let vp = self.viewport.clamped_to(self.size);
            if !vp.is_empty() {
                rpass.set_viewport(
                    vp.x as f32,
                    vp.y as f32,
                    vp.width as f32,
                    vp.height as f32,
                    0.0,
                    1.0,
                );

                rpass.set_vertex_buffer(0, self.shared.quad.slice(..));
                for draw in &record.draws {
                    let o = draw.opacity as f64;
                    rpass.set_pipeline(&draw.pipeline);
                    rpass.set_bind_group(0, &*draw.bind_group, &[]);
                    rpass.set_blend_constant(wgpu::Color { r: o, g: o, b: o, a: o });
                    rpass.draw(0..QUAD_VERTICES.len() as u32, 0..1);
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
        Ok(())
    }
}

impl GraphicsDevice for Gpu {
    type Shader = GpuShader;
    type Program = GpuProgram;
    type Texture = GpuTexture;

    fn is_context_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Built<GpuShader> {
        if let Err(log) = validate_wgsl(stage, source) {
            return Built::failed(GpuShader { stage, module: None }, log);
        }

        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(match stage {
                    ShaderStage::Vertex => "cartograph vertex stage",
                    ShaderStage::Fragment => "cartograph fragment stage",
                }),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });

        Built::ok(GpuShader {
            stage,
            module: Some(Arc::new(module)),
        })
    }

    fn link_program(&mut self, fragment: &GpuShader, vertex: &GpuShader) -> Built<GpuProgram> {
        let unlinked = GpuProgram { pipeline: None };

        if fragment.stage != ShaderStage::Fragment || vertex.stage != ShaderStage::Vertex {
            return Built::failed(
                unlinked,
                format!(
                    "expected fragment + vertex stages, got {} + {}",
                    fragment.stage, vertex.stage
                ),
            );
        }

        let (Some(fs), Some(vs)) = (&fragment.module, &vertex.module) else {
            return Built::failed(unlinked, "an attached stage did not compile");
        };

        let pipeline = self.create_pipeline(vs, fs);
        Built::ok(GpuProgram {
            pipeline: Some(Arc::new(pipeline)),
        })
    }

    fn upload_texture(&mut self, image: &ImageSource) -> GpuTexture {
        let extent = wgpu::Extent3d {
            width: image.width(),
            height: image.height(),
            depth_or_array_layers: 1,
        };

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(image.locator()),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.pixels(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * image.width()),
                rows_per_image: Some(image.height()),
            },
            extent,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("cartograph layer texture bind group"),
            layout: &self.shared.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.shared.sampler),
                },
            ],
        });

        GpuTexture {
            texture: Arc::new(texture),
            bind_group: Arc::new(bind_group),
        }
    }

    fn delete_shader(&mut self, shader: GpuShader) {
        drop(shader);
    }

    fn delete_program(&mut self, program: GpuProgram) {
        drop(program);
    }

    fn delete_texture(&mut self, texture: GpuTexture) {
        texture.texture.destroy();
    }

    fn reset_state(&mut self, baseline: &BaselineState) {
        self.baseline = *baseline;
    }

    fn resize(&mut self, size: Size) {
        surface::apply_resize(
            &self.surface,
            &self.device,
            &mut self.config,
            &mut self.size,
            size,
        );
    }

    fn viewport(&mut self, rect: ViewportRect) {
        self.viewport = rect;
    }

    fn bind_default_framebuffer(&mut self) {
        self.frame.get_or_insert_with(FrameRecord::default);
    }

    fn clear(&mut self) {
        self.frame.get_or_insert_with(FrameRecord::default).clear = true;
    }

    fn use_program(&mut self, program: &GpuProgram) {
        let frame = self.frame.get_or_insert_with(FrameRecord::default);
        frame.program = program.pipeline.clone();
    }

    fn bind_texture(&mut self, texture: &GpuTexture) {
        let frame = self.frame.get_or_insert_with(FrameRecord::default);
        frame.bind_group = Some(Arc::clone(&texture.bind_group));
    }

    fn draw_quad(&mut self, opacity: f32) {
        let frame = self.frame.get_or_insert_with(FrameRecord::default);
        let (Some(pipeline), Some(bind_group)) = (&frame.program, &frame.bind_group) else {
            log::debug!("draw_quad without a linked program and bound texture; skipped");
            return;
        };
        let draw = PendingDraw {
            pipeline: Arc::clone(pipeline),
            bind_group: Arc::clone(bind_group),
            opacity: opacity.clamp(0.0, 1.0),
        };
        frame.draws.push(draw);
    }

    fn present(&mut self) -> Result<(), RenderError> {
        match self.frame.take() {
            Some(record) => self.encode_frame(record),
            None => Ok(()),
        }
    }
}

async fn open_device(
    adapter: &wgpu::Adapter,
    init: &GpuInit,
) -> Result<(wgpu::Device, wgpu::Queue)> {
    adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("cartograph device"),
            required_features: wgpu::Features::empty(),
            required_limits: init.required_limits.clone(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        })
        .await
        .context("failed to create wgpu device/queue")
}

fn watch_device_loss(device: &wgpu::Device, lost: &Arc<AtomicBool>) {
    let lost = Arc::clone(lost);
    device.set_device_lost_callback(move |reason, message| {
        // Dropping a device on restore or teardown reports `Destroyed`.
        if matches!(reason, wgpu::DeviceLostReason::Destroyed) {
            return;
        }
        log::warn!("gpu device lost ({reason:?}): {message}");
        lost.store(true, Ordering::Release);
    });
}

/// Parses and validates WGSL, returning the diagnostic log on failure.
fn validate_wgsl(stage: ShaderStage, source: &str) -> Result<(), String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| e.to_string())?;

    let naga_stage = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };
    let entry = stage.entry_point();
    if !module
        .entry_points
        .iter()
        .any(|ep| ep.name == entry && ep.stage == naga_stage)
    {
        return Err(format!("missing {stage} entry point `{entry}`"));
    }

    Ok(())
}

fn opacity_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::Constant,
            dst_factor: wgpu::BlendFactor::OneMinusConstant,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent::REPLACE,
    }
}

/// Device objects shared by every program and texture.
struct SharedObjects {
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    quad: wgpu::Buffer,
}

impl SharedObjects {
    fn new(device: &wgpu::Device) -> Self {
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("cartograph layer texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("cartograph layer sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let quad = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("cartograph quad vbo"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Self {
            texture_layout,
            sampler,
            quad,
        }
    }
}

#[derive(Default)]
struct FrameRecord {
    clear: bool,
    program: Option<Arc<wgpu::RenderPipeline>>,
    bind_group: Option<Arc<wgpu::BindGroup>>,
    draws: Vec<PendingDraw>,
}

struct PendingDraw {
    pipeline: Arc<wgpu::RenderPipeline>,
    bind_group: Arc<wgpu::BindGroup>,
    opacity: f32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct QuadVertex {
    position: [f32; 2],  // NDC
    tex_coord: [f32; 2], // 0..1, top-left origin
}

impl QuadVertex {
    const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x2, // position
        1 => Float32x2  // tex_coord
    ];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// Full-screen quad as a triangle strip.
const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex { position: [-1.0, -1.0], tex_coord: [0.0, 1.0] },
    QuadVertex { position: [1.0, -1.0], tex_coord: [1.0, 1.0] },
    QuadVertex { position: [-1.0, 1.0], tex_coord: [0.0, 0.0] },
    QuadVertex { position: [1.0, 1.0], tex_coord: [1.0, 0.0] },
];
