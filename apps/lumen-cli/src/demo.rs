//! The built-in demo scene: a car driving down a road into obstacles.

use anyhow::Context;
use glam::{UVec2, Vec2, Vec3, Vec4};
use lumen_common::Transform;
use lumen_ecs::{CameraComponent, CollisionComponent, LightComponent, MeshRendererComponent};
use lumen_kernel::{EntityId, World, WorldEvent};
use lumen_render::{
    mesh_utils, shaders, AssetLibrary, GraphicsDevice, ImageData, InMemoryAssetSource, Material,
    MaterialDescriptor, PipelineState, Sampler, SamplerDescriptor, ShaderProgram, Texture2D,
};

pub const SKY_IMAGE_PATH: &str = "assets/textures/sky.png";
const CAR_SPEED: f32 = 2.0;

pub struct Demo {
    pub world: World,
    pub library: AssetLibrary,
    pub source: InMemoryAssetSource,
    pub car: EntityId,
}

pub fn build(device: &mut dyn GraphicsDevice) -> anyhow::Result<Demo> {
    let source = demo_source()?;
    let library = demo_library(device, &source)?;
    let (world, car) = demo_world(&library)?;
    Ok(Demo {
        world,
        library,
        source,
        car,
    })
}

fn demo_source() -> anyhow::Result<InMemoryAssetSource> {
    let mut source = InMemoryAssetSource::with_builtin_shaders();
    let (width, height) = (64u32, 32u32);
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        let t = y as f32 / (height - 1) as f32;
        let [r, g, b] = [0.9 - 0.6 * t, 0.9 - 0.4 * t, 1.0].map(|c| (c * 255.0) as u8);
        for _ in 0..width {
            pixels.extend_from_slice(&[r, g, b, 255]);
        }
    }
    source.insert_image(SKY_IMAGE_PATH, ImageData::new(width, height, pixels)?);
    Ok(source)
}

fn demo_library(device: &mut dyn GraphicsDevice, source: &InMemoryAssetSource) -> anyhow::Result<AssetLibrary> {
    let mut library = AssetLibrary::new();

    let (lit, linked) = ShaderProgram::from_paths(device, source, shaders::LIT_VERT_PATH, shaders::LIT_FRAG_PATH);
    anyhow::ensure!(linked, "built-in lit shader failed to link");
    library.add_shader("lit", lit)?;

    let checker = ImageData::checkerboard(64, 8, [200, 200, 200, 255], [60, 60, 60, 255])?;
    library.add_texture("checker", Texture2D::from_image(device, &checker, true))?;
    let white = ImageData::solid(1, 1, [255; 4])?;
    library.add_texture("white", Texture2D::from_image(device, &white, false))?;
    library.add_sampler("default", Sampler::from_descriptor(device, &SamplerDescriptor::default()))?;

    library.add_mesh("cube", mesh_utils::cube(device))?;
    library.add_mesh("sphere", mesh_utils::sphere(device, UVec2::new(24, 16)))?;
    library.add_mesh("plane", mesh_utils::plane(device))?;

    let documents = [
        (
            "road",
            r#"{"type": "textured", "shader": "lit", "texture": "checker", "sampler": "default",
                "pipelineState": {"faceCulling": {"enabled": true}, "depthTesting": {"enabled": true}}}"#,
        ),
        (
            "glass",
            r#"{"type": "textured", "shader": "lit", "texture": "white", "sampler": "default",
                "transparent": true, "tint": [0.6, 0.8, 1.0, 0.35],
                "pipelineState": {"depthTesting": {"enabled": true}, "blending": {"enabled": true}, "depthMask": false}}"#,
        ),
    ];
    for (name, document) in documents {
        let descriptor: MaterialDescriptor =
            serde_json::from_str(document).with_context(|| format!("material {name}"))?;
        let material = library.build_material(&descriptor)?;
        library.add_material(name, material)?;
    }

    let lit = library.shaders().require("lit")?;
    let program = library
        .shaders()
        .get(lit)
        .context("lit shader vanished")?
        .id();
    let white = library.textures().get_by_name("white").map(Texture2D::id);
    let sampler = library.samplers().get_by_name("default").map(Sampler::id);
    library.add_material(
        "car",
        Material::textured(program, Vec4::new(0.95, 0.75, 0.1, 1.0), 0.0, white, sampler)
            .with_pipeline_state(PipelineState::opaque()),
    )?;
    library.add_material(
        "obstacle",
        Material::textured(program, Vec4::new(0.8, 0.2, 0.2, 1.0), 0.0, white, sampler)
            .with_pipeline_state(PipelineState::opaque()),
    )?;
    Ok(library)
}

fn spawn(world: &mut World, name: &str, tag: &str, transform: Transform) -> EntityId {
    let id = world.add_named(name);
    if let Some(entity) = world.get_mut(id) {
        entity.tag = tag.to_string();
        entity.local_transform = transform;
    }
    id
}

fn renderable(library: &AssetLibrary, mesh: &str, material: &str) -> anyhow::Result<MeshRendererComponent> {
    let mesh = library
        .mesh_handle(mesh)
        .with_context(|| format!("mesh {mesh} missing"))?;
    let material = library
        .material_handle(material)
        .with_context(|| format!("material {material} missing"))?;
    Ok(MeshRendererComponent::new(mesh, material))
}

fn demo_world(library: &AssetLibrary) -> anyhow::Result<(World, EntityId)> {
    let mut world = World::new();

    let road = spawn(
        &mut world,
        "road",
        "scenery",
        Transform::from_degrees(Vec3::ZERO, Vec3::new(-90.0, 0.0, 0.0), Vec3::new(8.0, 60.0, 1.0)),
    );
    let car = spawn(&mut world, "car", "player", Transform::from_position(Vec3::new(0.0, 0.5, 0.0)));
    let camera = spawn(
        &mut world,
        "camera",
        "camera",
        Transform::from_degrees(Vec3::new(0.0, 2.5, 6.0), Vec3::new(-15.0, 0.0, 0.0), Vec3::ONE),
    );
    let headlight = spawn(&mut world, "headlight", "light", Transform::from_position(Vec3::new(0.0, 0.2, -0.6)));
    let sun = spawn(
        &mut world,
        "sun",
        "light",
        Transform::from_degrees(Vec3::ZERO, Vec3::new(-50.0, 30.0, 0.0), Vec3::ONE),
    );
    let lamp = spawn(&mut world, "lamp", "light", Transform::from_position(Vec3::new(3.0, 4.0, -10.0)));

    world.set_parent(camera, Some(car))?;
    world.set_parent(headlight, Some(car))?;

    let road_renderer = renderable(library, "plane", "road")?;
    let car_renderer = renderable(library, "cube", "car")?;
    let obstacle_renderer = renderable(library, "sphere", "obstacle")?;
    let glass_renderer = renderable(library, "cube", "glass")?;

    if let Some(e) = world.get_mut(road) {
        e.add_component(road_renderer);
    }
    if let Some(e) = world.get_mut(car) {
        e.add_component(car_renderer);
        e.add_component(CollisionComponent {
            center: Vec3::ZERO,
            radius: 0.75,
        });
    }
    if let Some(e) = world.get_mut(camera) {
        e.add_component(CameraComponent::default());
    }
    if let Some(e) = world.get_mut(headlight) {
        e.add_component(LightComponent::spot(
            Vec3::new(1.0, 0.95, 0.8),
            Vec3::NEG_Z,
            Vec3::new(0.02, 0.0, 1.0),
            Vec2::new(15f32.to_radians(), 30f32.to_radians()),
        ));
    }
    if let Some(e) = world.get_mut(sun) {
        e.add_component(LightComponent::directional(Vec3::new(1.0, 0.95, 0.9), Vec3::NEG_Z));
    }
    if let Some(e) = world.get_mut(lamp) {
        e.add_component(LightComponent::point(Vec3::new(1.0, 0.6, 0.3), Vec3::new(0.05, 0.0, 1.0)));
    }

    for (i, x) in [0.0, -2.0, 0.0].into_iter().enumerate() {
        let z = -4.0 * (i as f32 + 1.0);
        let id = spawn(
            &mut world,
            &format!("obstacle-{i}"),
            "obstacle",
            Transform::from_position(Vec3::new(x, 0.5, z)),
        );
        if let Some(e) = world.get_mut(id) {
            e.add_component(obstacle_renderer);
            e.add_component(CollisionComponent {
                center: Vec3::ZERO,
                radius: 0.5,
            });
        }
    }

    for (i, z) in [-6.0, -14.0].into_iter().enumerate() {
        let id = spawn(
            &mut world,
            &format!("glass-{i}"),
            "scenery",
            Transform {
                position: Vec3::new(2.5, 1.0, z),
                scale: Vec3::new(0.1, 2.0, 3.0),
                ..Transform::default()
            },
        );
        if let Some(e) = world.get_mut(id) {
            e.add_component(glass_renderer);
        }
    }

    Ok((world, car))
}

/// Drain the world's event log and count the entities it reports destroyed.
pub fn drain_destroyed(world: &mut World) -> usize {
    world
        .drain_events()
        .into_iter()
        .filter(|event| matches!(event, WorldEvent::Destroyed(_)))
        .count()
}

/// Advance the car one frame and remove any obstacle it hits.
/// Returns the names of the removed obstacles.
pub fn step(world: &mut World, car: EntityId) -> Vec<String> {
    if let Some(entity) = world.get_mut(car) {
        entity.local_transform.position.z -= CAR_SPEED;
    }
    let Some(car_matrix) = world.local_to_world_matrix(car) else {
        return Vec::new();
    };
    let Some(car_collider) = world
        .get(car)
        .and_then(|e| e.get_component::<CollisionComponent>())
        .copied()
    else {
        return Vec::new();
    };

    let hits: Vec<EntityId> = world
        .find_by_tag("obstacle")
        .into_iter()
        .filter(|&id| {
            let collider = world.get(id).and_then(|e| e.get_component::<CollisionComponent>());
            match (collider, world.local_to_world_matrix(id)) {
                (Some(collider), Some(matrix)) => car_collider.overlaps(&car_matrix, collider, &matrix),
                _ => false,
            }
        })
        .collect();

    let mut removed = Vec::new();
    for id in hits {
        if world.mark_for_removal(id) {
            if let Some(e) = world.get(id) {
                removed.push(e.name.clone());
            }
        }
    }
    world.delete_marked_entities();
    removed
}
