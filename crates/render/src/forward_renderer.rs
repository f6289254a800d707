//! Forward renderer: one pass per material over every renderable entity.
//!
//! # Invariants
//! - Lifecycle is `Uninitialized -> Ready -> Destroyed`; `render` only draws
//!   in `Ready`.
//! - Pass order is opaque, sky, transparent, post-process.
//! - Transparent commands are drawn back to front along the camera forward
//!   vector; opaque commands keep scene order.
//! - Everything created in `initialize` is released exactly once by `destroy`.

use crate::config::RendererConfig;
use crate::device::{
    Attachment, ClearMask, CompareFunction, Face, FramebufferId, FramebufferStatus, GraphicsDevice,
    TextureFormat, TextureWrap, VertexArrayId,
};
use crate::library::AssetLibrary;
use crate::lights::{collect_lights, upload_lights, LightData, SkyLight};
use crate::material::Material;
use crate::mesh::Mesh;
use crate::mesh_utils;
use crate::pipeline_state::{DepthTesting, FaceCulling, PipelineState};
use crate::sampler::{Sampler, SamplerDescriptor};
use crate::shader::ShaderProgram;
use crate::shaders;
use crate::source::AssetSource;
use crate::texture::Texture2D;
use glam::{Mat4, UVec2, Vec3, Vec4};
use lumen_common::ViewportSize;
use lumen_ecs::{CameraComponent, MaterialHandle, MeshHandle, MeshRendererComponent};
use lumen_kernel::World;
use std::cmp::Ordering;

/// Applied after the view-projection so every sky fragment lands on the far
/// plane: clip `z` becomes `w`.
pub const ALWAYS_BEHIND: Mat4 = Mat4::from_cols(
    Vec4::X,
    Vec4::Y,
    Vec4::ZERO,
    Vec4::new(0.0, 0.0, 1.0, 1.0),
);

const SKY_SEGMENTS: UVec2 = UVec2::new(16, 16);

/// One draw, rebuilt every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderCommand {
    pub local_to_world: Mat4,
    pub center: Vec3,
    pub mesh: MeshHandle,
    pub material: MaterialHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Uninitialized,
    Ready,
    Destroyed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub opaque_draws: usize,
    pub transparent_draws: usize,
    /// Mesh renderers whose mesh or material is not in the library.
    pub skipped_commands: usize,
    pub lights: usize,
    pub sky: bool,
    pub postprocess: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Rendered(FrameStats),
    /// No entity carries a camera; nothing was drawn.
    NoCamera,
    /// The renderer is not initialized, or already destroyed.
    NotReady,
}

impl FrameOutcome {
    pub fn stats(&self) -> Option<FrameStats> {
        match self {
            FrameOutcome::Rendered(stats) => Some(*stats),
            _ => None,
        }
    }
}

/// Sort back to front: larger projection onto `camera_forward` draws first.
/// `camera_forward` need not be normalized. Equal projections have no
/// defined order.
pub fn sort_back_to_front(commands: &mut [RenderCommand], camera_forward: Vec3) {
    commands.sort_unstable_by(|a, b| {
        let a = a.center.dot(camera_forward);
        let b = b.center.dot(camera_forward);
        b.partial_cmp(&a).unwrap_or(Ordering::Equal)
    });
}

/// Sky transform centered on the eye and pinned to the far plane.
pub fn sky_transform(view_projection: Mat4, eye: Vec3) -> Mat4 {
    ALWAYS_BEHIND * view_projection * Mat4::from_translation(eye)
}

#[derive(Debug)]
struct SkyPass {
    sphere: Mesh,
    program: ShaderProgram,
    texture: Option<Texture2D>,
    sampler: Sampler,
    material: Material,
}

impl SkyPass {
    fn new(device: &mut dyn GraphicsDevice, source: &dyn AssetSource, image_path: &str) -> Self {
        let sphere = mesh_utils::sphere(device, SKY_SEGMENTS);
        let (program, _) = ShaderProgram::from_paths(
            device,
            source,
            shaders::TEXTURED_VERT_PATH,
            shaders::TEXTURED_FRAG_PATH,
        );
        // Drawn from inside the sphere after the opaque pass.
        let pipeline_state = PipelineState {
            face_culling: FaceCulling {
                enabled: true,
                culled_face: Face::Front,
                ..FaceCulling::default()
            },
            depth_testing: DepthTesting {
                enabled: true,
                function: CompareFunction::Lequal,
            },
            ..PipelineState::default()
        };
        let texture = match source.image(image_path) {
            Some(image) => Some(Texture2D::from_image(device, &image, false)),
            None => {
                tracing::warn!(path = image_path, "sky image not found; sky is drawn untextured");
                None
            }
        };
        let sampler = Sampler::from_descriptor(
            device,
            &SamplerDescriptor::linear(TextureWrap::Repeat, TextureWrap::ClampToEdge),
        );
        let material = Material::textured(
            program.id(),
            Vec4::ONE,
            1.0,
            texture.as_ref().map(Texture2D::id),
            Some(sampler.id()),
        )
        .with_pipeline_state(pipeline_state);
        Self {
            sphere,
            program,
            texture,
            sampler,
            material,
        }
    }

    fn draw(&self, device: &mut dyn GraphicsDevice, view_projection: Mat4, eye: Vec3) {
        self.material.setup(device);
        device.set_uniform(
            self.material.program,
            "transform",
            sky_transform(view_projection, eye).into(),
        );
        self.sphere.draw(device);
    }

    fn destroy(self, device: &mut dyn GraphicsDevice) {
        self.sphere.destroy(device);
        self.program.destroy(device);
        if let Some(texture) = self.texture {
            texture.destroy(device);
        }
        self.sampler.destroy(device);
    }
}

#[derive(Debug)]
struct PostprocessPass {
    framebuffer: FramebufferId,
    vertex_array: VertexArrayId,
    color_target: Texture2D,
    depth_target: Texture2D,
    sampler: Sampler,
    program: ShaderProgram,
    material: Material,
}

impl PostprocessPass {
    fn new(
        device: &mut dyn GraphicsDevice,
        source: &dyn AssetSource,
        viewport: ViewportSize,
        fragment_path: &str,
    ) -> Self {
        let framebuffer = device.create_framebuffer();
        device.bind_framebuffer(Some(framebuffer));
        let color_target = Texture2D::empty(device, TextureFormat::Rgba8, viewport, viewport.mip_levels());
        device.framebuffer_texture(framebuffer, Attachment::Color0, color_target.id());
        let depth_target = Texture2D::empty(device, TextureFormat::Depth24, viewport, 1);
        device.framebuffer_texture(framebuffer, Attachment::Depth, depth_target.id());
        let status = device.framebuffer_status(framebuffer);
        if status != FramebufferStatus::Complete {
            tracing::error!(?status, width = viewport.width, height = viewport.height, "post-process framebuffer is not complete");
        }
        device.bind_framebuffer(None);

        let vertex_array = device.create_vertex_array();
        let sampler = Sampler::from_descriptor(
            device,
            &SamplerDescriptor::linear(TextureWrap::ClampToEdge, TextureWrap::ClampToEdge),
        );
        let (program, _) =
            ShaderProgram::from_paths(device, source, shaders::FULLSCREEN_VERT_PATH, fragment_path);
        let material = Material::textured(
            program.id(),
            Vec4::ONE,
            0.0,
            Some(color_target.id()),
            Some(sampler.id()),
        )
        .with_pipeline_state(PipelineState {
            depth_mask: false,
            ..PipelineState::default()
        });
        Self {
            framebuffer,
            vertex_array,
            color_target,
            depth_target,
            sampler,
            program,
            material,
        }
    }

    fn draw(&self, device: &mut dyn GraphicsDevice) {
        device.bind_framebuffer(None);
        self.material.setup(device);
        device.bind_vertex_array(Some(self.vertex_array));
        device.draw_arrays(0, 3);
        device.bind_vertex_array(None);
    }

    fn destroy(self, device: &mut dyn GraphicsDevice) {
        device.delete_framebuffer(self.framebuffer);
        device.delete_vertex_array(self.vertex_array);
        self.color_target.destroy(device);
        self.depth_target.destroy(device);
        self.sampler.destroy(device);
        self.program.destroy(device);
    }
}

/// Per-frame values shared by every command.
struct FrameUniforms {
    view_projection: Mat4,
    camera_position: Vec3,
    lights: Vec<LightData>,
    sky: SkyLight,
}

impl FrameUniforms {
    fn draw(&self, device: &mut dyn GraphicsDevice, library: &AssetLibrary, command: &RenderCommand) -> bool {
        let (Some(material), Some(mesh)) = (library.material(command.material), library.mesh(command.mesh))
        else {
            return false;
        };
        material.setup(device);
        let program = material.program;
        let model = command.local_to_world;
        device.set_uniform(program, "transform", (self.view_projection * model).into());
        device.set_uniform(program, "M", model.into());
        device.set_uniform(program, "M_IT", model.inverse().transpose().into());
        device.set_uniform(program, "VP", self.view_projection.into());
        device.set_uniform(program, "camera_position", self.camera_position.into());
        upload_lights(device, program, &self.lights, &self.sky);
        mesh.draw(device);
        true
    }
}

#[derive(Debug)]
pub struct ForwardRenderer {
    state: RendererState,
    viewport: ViewportSize,
    sky_light: SkyLight,
    sky: Option<SkyPass>,
    postprocess: Option<PostprocessPass>,
    opaque: Vec<RenderCommand>,
    transparent: Vec<RenderCommand>,
}

impl Default for ForwardRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ForwardRenderer {
    pub fn new() -> Self {
        Self {
            state: RendererState::Uninitialized,
            viewport: ViewportSize::new(0, 0),
            sky_light: SkyLight::default(),
            sky: None,
            postprocess: None,
            opaque: Vec::new(),
            transparent: Vec::new(),
        }
    }

    pub fn state(&self) -> RendererState {
        self.state
    }

    pub fn viewport(&self) -> ViewportSize {
        self.viewport
    }

    pub fn sky_light(&self) -> &SkyLight {
        &self.sky_light
    }

    pub fn set_sky_light(&mut self, sky_light: SkyLight) {
        self.sky_light = sky_light;
    }

    pub fn has_sky(&self) -> bool {
        self.sky.is_some()
    }

    pub fn has_postprocess(&self) -> bool {
        self.postprocess.is_some()
    }

    /// Opaque commands of the last rendered frame, in scene order.
    pub fn opaque_commands(&self) -> &[RenderCommand] {
        &self.opaque
    }

    /// Transparent commands of the last rendered frame, back to front.
    pub fn transparent_commands(&self) -> &[RenderCommand] {
        &self.transparent
    }

    /// Build the optional sky and post-process passes named in `config`.
    /// Only valid once, from the uninitialized state.
    pub fn initialize(
        &mut self,
        device: &mut dyn GraphicsDevice,
        source: &dyn AssetSource,
        viewport: ViewportSize,
        config: &RendererConfig,
    ) {
        if self.state != RendererState::Uninitialized {
            tracing::warn!(state = ?self.state, "initialize ignored");
            return;
        }
        let _span = tracing::info_span!("renderer_initialize", width = viewport.width, height = viewport.height).entered();

        self.viewport = viewport;
        if let Some(path) = &config.sky {
            self.sky = Some(SkyPass::new(device, source, path));
        }
        if let Some(path) = &config.postprocess {
            self.postprocess = Some(PostprocessPass::new(device, source, viewport, path));
        }
        self.state = RendererState::Ready;
        tracing::info!(
            sky = self.sky.is_some(),
            postprocess = self.postprocess.is_some(),
            "forward renderer ready"
        );
    }

    pub fn render(&mut self, device: &mut dyn GraphicsDevice, world: &World, library: &AssetLibrary) -> FrameOutcome {
        if self.state != RendererState::Ready {
            tracing::warn!(state = ?self.state, "render skipped");
            return FrameOutcome::NotReady;
        }
        let _span = tracing::info_span!("render_frame", entities = world.len()).entered();

        let mut stats = FrameStats::default();
        let Some((camera, camera_matrix)) = self.collect_commands(world, library, &mut stats) else {
            tracing::debug!("no camera in world; frame skipped");
            return FrameOutcome::NoCamera;
        };

        sort_back_to_front(&mut self.transparent, CameraComponent::forward(&camera_matrix));

        let frame = FrameUniforms {
            view_projection: camera.projection_matrix(self.viewport) * camera.view_matrix(&camera_matrix),
            camera_position: CameraComponent::eye(&camera_matrix),
            lights: collect_lights(world),
            sky: self.sky_light,
        };
        stats.lights = frame.lights.len();

        device.bind_framebuffer(self.postprocess.as_ref().map(|p| p.framebuffer));
        device.viewport(0, 0, self.viewport.width, self.viewport.height);
        device.clear_color(Vec4::new(0.0, 0.0, 0.0, 1.0));
        device.clear_depth(1.0);
        device.color_mask([true; 4]);
        device.depth_mask(true);
        device.clear(ClearMask::COLOR_AND_DEPTH);

        for command in &self.opaque {
            if frame.draw(device, library, command) {
                stats.opaque_draws += 1;
            }
        }

        if let Some(sky) = &self.sky {
            sky.draw(device, frame.view_projection, frame.camera_position);
            stats.sky = true;
        }

        for command in &self.transparent {
            if frame.draw(device, library, command) {
                stats.transparent_draws += 1;
            }
        }

        if let Some(postprocess) = &self.postprocess {
            postprocess.draw(device);
            stats.postprocess = true;
        }

        tracing::debug!(?stats, "frame rendered");
        FrameOutcome::Rendered(stats)
    }

    /// Rebuild the command lists and return the first camera found.
    fn collect_commands(
        &mut self,
        world: &World,
        library: &AssetLibrary,
        stats: &mut FrameStats,
    ) -> Option<(CameraComponent, Mat4)> {
        self.opaque.clear();
        self.transparent.clear();
        let mut camera = None;

        for entity in world.entities() {
            if camera.is_none() {
                if let Some(found) = entity.get_component::<CameraComponent>() {
                    camera = world
                        .local_to_world_matrix(entity.id())
                        .map(|matrix| (*found, matrix));
                }
            }
            let Some(renderer) = entity.get_component::<MeshRendererComponent>() else {
                continue;
            };
            let material = library.material(renderer.material);
            if material.is_none() || library.mesh(renderer.mesh).is_none() {
                tracing::debug!(entity = %entity.name, "mesh renderer references a missing asset");
                stats.skipped_commands += 1;
                continue;
            }
            let Some(local_to_world) = world.local_to_world_matrix(entity.id()) else {
                continue;
            };
            let command = RenderCommand {
                local_to_world,
                center: local_to_world.transform_point3(Vec3::ZERO),
                mesh: renderer.mesh,
                material: renderer.material,
            };
            if material.is_some_and(|m| m.transparent) {
                self.transparent.push(command);
            } else {
                self.opaque.push(command);
            }
        }
        camera
    }

    /// Release everything `initialize` created. Safe to call more than once.
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        if self.state == RendererState::Destroyed {
            return;
        }
        if let Some(sky) = self.sky.take() {
            sky.destroy(device);
        }
        if let Some(postprocess) = self.postprocess.take() {
            postprocess.destroy(device);
        }
        self.opaque.clear();
        self.transparent.clear();
        self.state = RendererState::Destroyed;
        tracing::info!("forward renderer destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{MeshId, UniformValue};
    use crate::recording::{DeviceCommand, RecordingDevice};
    use crate::source::InMemoryAssetSource;
    use crate::texture::ImageData;
    use lumen_assets::AssetId;
    use lumen_common::Transform;
    use lumen_ecs::LightComponent;
    use lumen_kernel::EntityId;

    const SKY_PATH: &str = "assets/textures/sky.png";
    const VIEWPORT: ViewportSize = ViewportSize {
        width: 1280,
        height: 720,
    };

    struct Fixture {
        device: RecordingDevice,
        source: InMemoryAssetSource,
        library: AssetLibrary,
        world: World,
        cube: MeshHandle,
        solid: MaterialHandle,
        glass: MaterialHandle,
    }

    impl Fixture {
        fn new() -> Self {
            let mut device = RecordingDevice::new();
            let mut source = InMemoryAssetSource::with_builtin_shaders();
            source.insert_image(SKY_PATH, ImageData::solid(4, 2, [100, 150, 255, 255]).unwrap());

            let mut library = AssetLibrary::new();
            let (program, linked) =
                ShaderProgram::from_paths(&mut device, &source, shaders::LIT_VERT_PATH, shaders::LIT_FRAG_PATH);
            assert!(linked);
            let program_id = program.id();
            library.add_shader("lit", program).unwrap();
            let cube = library.add_mesh("cube", mesh_utils::cube(&mut device)).unwrap();
            let solid = library
                .add_material(
                    "solid",
                    Material::tinted(program_id, Vec4::ONE).with_pipeline_state(PipelineState::opaque()),
                )
                .unwrap();
            let glass = library
                .add_material(
                    "glass",
                    Material::tinted(program_id, Vec4::new(1.0, 1.0, 1.0, 0.5))
                        .with_pipeline_state(PipelineState::transparent())
                        .with_transparency(true),
                )
                .unwrap();
            device.take_commands();
            Self {
                device,
                source,
                library,
                world: World::new(),
                cube,
                solid,
                glass,
            }
        }

        fn camera(&mut self, transform: Transform) -> EntityId {
            let id = self.world.add_named("camera");
            let e = self.world.get_mut(id).unwrap();
            e.local_transform = transform;
            e.add_component(CameraComponent::default());
            id
        }

        fn object(&mut self, material: MaterialHandle, mesh: MeshHandle, position: Vec3) -> EntityId {
            let id = self.world.add();
            let e = self.world.get_mut(id).unwrap();
            e.local_transform = Transform::from_position(position);
            e.add_component(MeshRendererComponent::new(mesh, material));
            id
        }

        fn mesh(&mut self, name: &str) -> MeshHandle {
            let mesh = mesh_utils::cube(&mut self.device);
            self.library.add_mesh(name, mesh).unwrap()
        }

        fn mesh_id(&self, handle: MeshHandle) -> MeshId {
            self.library.mesh(handle).unwrap().id()
        }

        fn renderer(&mut self, config: &RendererConfig) -> ForwardRenderer {
            let mut renderer = ForwardRenderer::new();
            renderer.initialize(&mut self.device, &self.source, VIEWPORT, config);
            renderer
        }

        fn render(&mut self, renderer: &mut ForwardRenderer) -> FrameOutcome {
            self.device.take_commands();
            renderer.render(&mut self.device, &self.world, &self.library)
        }

        fn lit_program(&self) -> crate::device::ProgramId {
            self.library.shaders().get_by_name("lit").unwrap().id()
        }
    }

    fn drawn_meshes(commands: &[DeviceCommand]) -> Vec<MeshId> {
        commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::DrawMesh(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    fn command_at(mesh: MeshHandle, z: f32) -> RenderCommand {
        RenderCommand {
            local_to_world: Mat4::from_translation(Vec3::new(0.0, 0.0, z)),
            center: Vec3::new(0.0, 0.0, z),
            mesh,
            material: MaterialHandle(AssetId(0)),
        }
    }

    #[test]
    fn render_before_initialize_is_not_ready() {
        let mut f = Fixture::new();
        f.camera(Transform::default());
        let mut renderer = ForwardRenderer::new();
        assert_eq!(f.render(&mut renderer), FrameOutcome::NotReady);
        assert!(f.device.commands().is_empty());
    }

    #[test]
    fn frame_without_camera_draws_nothing() {
        let mut f = Fixture::new();
        let (solid, cube) = (f.solid, f.cube);
        f.object(solid, cube, Vec3::new(0.0, 0.0, -5.0));
        let mut renderer = f.renderer(&RendererConfig::default());
        assert_eq!(f.render(&mut renderer), FrameOutcome::NoCamera);
        assert_eq!(f.device.draw_count(), 0);
    }

    #[test]
    fn splits_opaque_and_transparent() {
        let mut f = Fixture::new();
        let (solid, glass, cube) = (f.solid, f.glass, f.cube);
        f.camera(Transform::default());
        f.object(solid, cube, Vec3::new(0.0, 0.0, -3.0));
        f.object(glass, cube, Vec3::new(0.0, 0.0, -4.0));
        f.object(solid, cube, Vec3::new(1.0, 0.0, -3.0));
        let mut renderer = f.renderer(&RendererConfig::default());

        let stats = f.render(&mut renderer).stats().unwrap();
        assert_eq!(stats.opaque_draws, 2);
        assert_eq!(stats.transparent_draws, 1);
        assert!(!stats.sky && !stats.postprocess);
        assert_eq!(renderer.opaque_commands().len(), 2);
        assert_eq!(renderer.transparent_commands().len(), 1);
    }

    #[test]
    fn transparent_objects_draw_back_to_front_after_opaque() {
        let mut f = Fixture::new();
        let glass = f.glass;
        let solid = f.solid;
        let (near, far, middle, wall) = (f.mesh("near"), f.mesh("far"), f.mesh("middle"), f.mesh("wall"));
        f.camera(Transform::default());
        f.object(glass, near, Vec3::new(0.0, 0.0, -2.0));
        f.object(glass, far, Vec3::new(0.0, 0.0, -10.0));
        f.object(solid, wall, Vec3::new(0.0, 0.0, -20.0));
        f.object(glass, middle, Vec3::new(0.0, 0.0, -5.0));
        let mut renderer = f.renderer(&RendererConfig::default());

        f.render(&mut renderer);
        let expected: Vec<MeshId> = [wall, far, middle, near].into_iter().map(|m| f.mesh_id(m)).collect();
        assert_eq!(drawn_meshes(f.device.commands()), expected);
    }

    #[test]
    fn opaque_commands_keep_scene_order() {
        let mut f = Fixture::new();
        let solid = f.solid;
        let (a, b) = (f.mesh("a"), f.mesh("b"));
        f.camera(Transform::default());
        f.object(solid, a, Vec3::new(0.0, 0.0, -2.0));
        f.object(solid, b, Vec3::new(0.0, 0.0, -10.0));
        let mut renderer = f.renderer(&RendererConfig::default());

        f.render(&mut renderer);
        assert_eq!(drawn_meshes(f.device.commands()), vec![f.mesh_id(a), f.mesh_id(b)]);
    }

    #[test]
    fn sort_uses_unnormalized_forward() {
        let (near, far) = (MeshHandle(AssetId(1)), MeshHandle(AssetId(2)));
        let mut commands = vec![command_at(near, -1.0), command_at(far, -7.0)];
        sort_back_to_front(&mut commands, Vec3::new(0.0, 0.0, -3.0));
        assert_eq!(commands[0].mesh, far);
        assert_eq!(commands[1].mesh, near);
    }

    #[test]
    fn rotated_camera_sorts_along_its_own_forward() {
        let mut f = Fixture::new();
        let glass = f.glass;
        let (near, far) = (f.mesh("near"), f.mesh("far"));
        // Yaw 90 degrees: forward is -X.
        f.camera(Transform::from_degrees(Vec3::ZERO, Vec3::new(0.0, 90.0, 0.0), Vec3::ONE));
        f.object(glass, near, Vec3::new(-1.0, 0.0, -50.0));
        f.object(glass, far, Vec3::new(-8.0, 0.0, 0.0));
        let mut renderer = f.renderer(&RendererConfig::default());

        f.render(&mut renderer);
        assert_eq!(drawn_meshes(f.device.commands()), vec![f.mesh_id(far), f.mesh_id(near)]);
    }

    #[test]
    fn first_camera_wins() {
        let mut f = Fixture::new();
        let (solid, cube) = (f.solid, f.cube);
        f.camera(Transform::from_position(Vec3::new(0.0, 1.0, 0.0)));
        f.camera(Transform::from_position(Vec3::new(0.0, 50.0, 0.0)));
        f.object(solid, cube, Vec3::ZERO);
        let mut renderer = f.renderer(&RendererConfig::default());

        f.render(&mut renderer);
        assert_eq!(
            f.device.uniform(f.lit_program(), "camera_position"),
            Some(UniformValue::Vec3(Vec3::new(0.0, 1.0, 0.0)))
        );
    }

    #[test]
    fn draw_uploads_transform_and_lighting_uniforms() {
        let mut f = Fixture::new();
        let (solid, cube) = (f.solid, f.cube);
        f.camera(Transform::from_position(Vec3::new(0.0, 0.0, 5.0)));
        let id = f.object(solid, cube, Vec3::new(1.0, 2.0, 3.0));
        f.world.get_mut(id).unwrap().local_transform.scale = Vec3::new(2.0, 1.0, 1.0);
        let light = f.world.add();
        f.world.get_mut(light).unwrap().add_component(LightComponent::default());
        let mut renderer = f.renderer(&RendererConfig::default());

        let stats = f.render(&mut renderer).stats().unwrap();
        assert_eq!(stats.lights, 1);

        let camera_matrix = Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0));
        let camera = CameraComponent::default();
        let vp = camera.projection_matrix(VIEWPORT) * camera.view_matrix(&camera_matrix);
        let model = f.world.local_to_world_matrix(id).unwrap();

        let program = f.lit_program();
        let Some(UniformValue::Mat4(transform)) = f.device.uniform(program, "transform") else {
            panic!("transform not uploaded");
        };
        assert!(transform.abs_diff_eq(vp * model, 1e-5));
        assert_eq!(f.device.uniform(program, "M"), Some(UniformValue::Mat4(model)));
        let Some(UniformValue::Mat4(m_it)) = f.device.uniform(program, "M_IT") else {
            panic!("M_IT not uploaded");
        };
        assert!(m_it.abs_diff_eq(model.inverse().transpose(), 1e-5));
        assert_eq!(f.device.uniform(program, "light_count"), Some(UniformValue::Int(1)));
        assert!(f.device.uniform(program, "sky.horizon").is_some());
    }

    #[test]
    fn light_limit_applies_per_frame() {
        let mut f = Fixture::new();
        f.camera(Transform::default());
        for _ in 0..12 {
            let id = f.world.add();
            f.world.get_mut(id).unwrap().add_component(LightComponent::default());
        }
        let mut renderer = f.renderer(&RendererConfig::default());
        assert_eq!(f.render(&mut renderer).stats().unwrap().lights, 8);
    }

    #[test]
    fn clear_runs_with_write_masks_open() {
        let mut f = Fixture::new();
        let (glass, cube) = (f.glass, f.cube);
        f.camera(Transform::default());
        f.object(glass, cube, Vec3::new(0.0, 0.0, -3.0));
        let mut renderer = f.renderer(&RendererConfig::default());

        // The transparent material leaves depth writes off at the end of a frame.
        f.render(&mut renderer);
        assert!(!f.device.state().depth_mask);

        f.render(&mut renderer);
        let commands = f.device.commands();
        let clear_at = commands
            .iter()
            .position(|c| matches!(c, DeviceCommand::Clear(_)))
            .unwrap();
        let before = &commands[..clear_at];
        assert!(before.contains(&DeviceCommand::DepthMask(true)));
        assert!(before.contains(&DeviceCommand::ColorMask([true; 4])));
        assert!(before.contains(&DeviceCommand::ClearDepth(1.0)));
        assert!(before.contains(&DeviceCommand::ClearColor(Vec4::new(0.0, 0.0, 0.0, 1.0))));
        assert_eq!(commands[clear_at], DeviceCommand::Clear(ClearMask::COLOR_AND_DEPTH));
        assert_eq!(commands[0], DeviceCommand::BindFramebuffer(None));
    }

    #[test]
    fn sky_draws_between_opaque_and_transparent() {
        let mut f = Fixture::new();
        let (solid, glass, cube) = (f.solid, f.glass, f.cube);
        f.camera(Transform::default());
        f.object(glass, cube, Vec3::new(0.0, 0.0, -3.0));
        f.object(solid, cube, Vec3::new(0.0, 0.0, -6.0));
        let mut renderer = f.renderer(&RendererConfig::default().with_sky(SKY_PATH));
        assert!(renderer.has_sky());

        let stats = f.render(&mut renderer).stats().unwrap();
        assert!(stats.sky);
        let drawn = drawn_meshes(f.device.commands());
        let cube_id = f.mesh_id(cube);
        assert_eq!(drawn.len(), 3);
        assert_eq!(drawn[0], cube_id);
        assert_ne!(drawn[1], cube_id);
        assert_eq!(drawn[2], cube_id);

        // The sky culls front faces and keeps the far-plane depth test.
        let commands = f.device.commands();
        let sky_draw = commands
            .iter()
            .position(|c| *c == DeviceCommand::DrawMesh(drawn[1]))
            .unwrap();
        let sky_setup = &commands[..sky_draw];
        let last = |pred: &dyn Fn(&DeviceCommand) -> bool| sky_setup.iter().rev().find(|c| pred(*c)).cloned();
        assert_eq!(last(&|c| matches!(c, DeviceCommand::CullFace(_))), Some(DeviceCommand::CullFace(Face::Front)));
        assert_eq!(
            last(&|c| matches!(c, DeviceCommand::DepthFunc(_))),
            Some(DeviceCommand::DepthFunc(CompareFunction::Lequal))
        );
        assert!(sky_setup.iter().any(|c| matches!(c, DeviceCommand::BindTexture { unit: 0, texture: Some(_) })));
    }

    #[test]
    fn sky_transform_pins_depth_to_far_plane() {
        let camera = CameraComponent::default();
        let eye = Vec3::new(3.0, 1.0, -2.0);
        let camera_matrix = Mat4::from_translation(eye);
        let vp = camera.projection_matrix(VIEWPORT) * camera.view_matrix(&camera_matrix);
        let sky = sky_transform(vp, eye);
        for p in [Vec3::new(0.0, 0.0, -1.0), Vec3::new(0.3, -0.2, -0.9), Vec3::new(0.5, 0.5, -0.5)] {
            let clip = sky * p.extend(1.0);
            assert!((clip.z - clip.w).abs() < 1e-5, "{clip:?}");
            assert!(clip.w > 0.0);
        }
        // The sphere is centered on the eye, whatever its position.
        let center = sky * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let expected = ALWAYS_BEHIND * vp * eye.extend(1.0);
        assert!(center.abs_diff_eq(expected, 1e-4));
    }

    #[test]
    fn missing_sky_image_skips_texture_bind() {
        let mut f = Fixture::new();
        f.camera(Transform::default());
        let mut renderer = f.renderer(&RendererConfig::default().with_sky("assets/textures/missing.png"));
        let stats = f.render(&mut renderer).stats().unwrap();
        assert!(stats.sky);
        assert!(!f
            .device
            .commands()
            .iter()
            .any(|c| matches!(c, DeviceCommand::BindTexture { .. })));
    }

    #[test]
    fn postprocess_renders_offscreen_then_fullscreen_triangle() {
        let mut f = Fixture::new();
        let (solid, cube) = (f.solid, f.cube);
        f.camera(Transform::default());
        f.object(solid, cube, Vec3::new(0.0, 0.0, -3.0));
        let config = RendererConfig::default().with_postprocess(shaders::GRAYSCALE_FRAG_PATH);
        let mut renderer = f.renderer(&config);

        let init = f.device.commands().to_vec();
        assert!(init.iter().any(|c| matches!(
            c,
            DeviceCommand::FramebufferStatus { status: FramebufferStatus::Complete, .. }
        )));
        let color_target = init
            .iter()
            .find_map(|c| match c {
                DeviceCommand::FramebufferTexture {
                    attachment: Attachment::Color0,
                    texture,
                    ..
                } => Some(*texture),
                _ => None,
            })
            .unwrap();
        assert!(init.contains(&DeviceCommand::TextureStorage {
            texture: color_target,
            format: TextureFormat::Rgba8,
            levels: 11,
            width: 1280,
            height: 720,
        }));
        assert!(init.iter().any(|c| matches!(
            c,
            DeviceCommand::TextureStorage { format: TextureFormat::Depth24, levels: 1, .. }
        )));

        let stats = f.render(&mut renderer).stats().unwrap();
        assert!(stats.postprocess);
        let commands = f.device.commands();
        assert!(matches!(commands[0], DeviceCommand::BindFramebuffer(Some(_))));
        let mesh_draw = commands.iter().position(|c| matches!(c, DeviceCommand::DrawMesh(_))).unwrap();
        let back_to_default = commands
            .iter()
            .rposition(|c| *c == DeviceCommand::BindFramebuffer(None))
            .unwrap();
        assert!(mesh_draw < back_to_default);
        let last_draw = commands.iter().rev().find(|c| c.is_draw()).unwrap();
        assert_eq!(*last_draw, DeviceCommand::DrawArrays { first: 0, count: 3 });
        assert!(!f.device.state().depth_mask);
    }

    #[test]
    fn destroy_releases_each_resource_once() {
        let mut f = Fixture::new();
        f.camera(Transform::default());
        let baseline = f.device.live_object_count();
        let config = RendererConfig::default()
            .with_sky(SKY_PATH)
            .with_postprocess(shaders::GRAYSCALE_FRAG_PATH);
        let mut renderer = f.renderer(&config);
        assert!(f.device.live_object_count() > baseline);
        f.render(&mut renderer);

        renderer.destroy(&mut f.device);
        assert_eq!(renderer.state(), RendererState::Destroyed);
        assert_eq!(f.device.live_object_count(), baseline);
        assert_eq!(f.device.invalid_deletes(), 0);

        f.device.take_commands();
        renderer.destroy(&mut f.device);
        assert!(f.device.commands().is_empty());
        assert_eq!(f.render(&mut renderer), FrameOutcome::NotReady);
    }

    #[test]
    fn destroy_without_optional_passes_deletes_nothing() {
        let mut f = Fixture::new();
        let mut renderer = f.renderer(&RendererConfig::default());
        f.device.take_commands();
        renderer.destroy(&mut f.device);
        assert!(f.device.commands().is_empty());
        assert_eq!(renderer.state(), RendererState::Destroyed);
    }

    #[test]
    fn initialize_is_single_shot() {
        let mut f = Fixture::new();
        let config = RendererConfig::default().with_sky(SKY_PATH);
        let mut renderer = f.renderer(&config);
        let live = f.device.live_object_count();
        renderer.initialize(&mut f.device, &f.source, VIEWPORT, &config);
        assert_eq!(f.device.live_object_count(), live);

        renderer.destroy(&mut f.device);
        renderer.initialize(&mut f.device, &f.source, VIEWPORT, &config);
        assert_eq!(renderer.state(), RendererState::Destroyed);
        assert!(!renderer.has_sky());
    }

    #[test]
    fn missing_assets_are_skipped() {
        let mut f = Fixture::new();
        let (solid, cube) = (f.solid, f.cube);
        f.camera(Transform::default());
        f.object(MaterialHandle(AssetId(999)), cube, Vec3::ZERO);
        f.object(solid, MeshHandle(AssetId(998)), Vec3::ZERO);
        f.object(solid, cube, Vec3::ZERO);
        let mut renderer = f.renderer(&RendererConfig::default());
        let stats = f.render(&mut renderer).stats().unwrap();
        assert_eq!(stats.skipped_commands, 2);
        assert_eq!(stats.opaque_draws, 1);
    }

    #[test]
    fn child_commands_use_world_space_center() {
        let mut f = Fixture::new();
        let (glass, cube) = (f.glass, f.cube);
        f.camera(Transform::default());
        let parent = f.world.add();
        f.world.get_mut(parent).unwrap().local_transform = Transform::from_position(Vec3::new(0.0, 0.0, -10.0));
        let child = f.object(glass, cube, Vec3::new(1.0, 0.0, 0.0));
        f.world.set_parent(child, Some(parent)).unwrap();
        let mut renderer = f.renderer(&RendererConfig::default());

        f.render(&mut renderer);
        let center = renderer.transparent_commands()[0].center;
        assert!(center.abs_diff_eq(Vec3::new(1.0, 0.0, -10.0), 1e-5));
    }
}
