use super::*;
use crate::scene::{Material, MaterialId, MATERIAL_WORDS};

#[test]
fn test_materials_upload_during_render() {
    let Fixture { headless, scene, .. } = fixture();
    let red = scene.add_material(Material::new("red").with_base_color(Vec3::x(), 1.0));
    let glass = scene.add_material(Material::new("glass").with_base_color(Vec3::z(), 0.3));
    assert_eq!((red, glass), (MaterialId(0), MaterialId(1)));
    assert_eq!(scene.find_material("glass"), Some(glass));
    assert!(scene.material(glass).is_some_and(|m| m.is_transparent()));

    scene.render(0.0);
    let bound = headless.bound_materials().expect("materials bound");
    assert_eq!(headless.buffer_len(bound), Some(2 * MATERIAL_WORDS * 4));
    assert_eq!(headless.stats().buffers_created, 1);

    // Same-named material keeps its slot and reuses the buffer
    assert_eq!(scene.add_material(Material::new("red")), red);
    assert_eq!(scene.material_count(), 2);
    scene.render(0.0);
    assert_eq!(headless.stats().buffers_created, 1);
    assert_eq!(headless.stats().buffer_writes, 1);
}

#[test]
fn test_display_lifecycle() {
    let Fixture { headless, scene, .. } = fixture();
    assert_eq!(scene.display_size(), None);
    assert!(!scene.clear_display());

    assert!(scene.configure_display(640, 480, 0.5));
    assert_eq!(scene.display_size(), Some((320, 240)));
    assert_eq!(headless.live_targets(), 2);
    assert!(scene.clear_display());
    let (target, _, depth) = headless.last_clear().expect("cleared");
    assert_eq!(Some(target), scene.display_gbuffer());
    assert_eq!(depth, Some(1.0));

    assert!(scene.reset_display());
    assert_eq!(scene.display_size(), Some((1280, 720)));
    assert_eq!(headless.live_targets(), 2);

    drop(scene);
    assert_eq!(headless.live_targets(), 0);
}

#[test]
fn test_render_clears_display_each_frame() {
    let Fixture { headless, scene, .. } = fixture();
    add_camera(&scene, CullingMode::Disabled);
    scene.configure_display(32, 32, 1.0);

    scene.tick(0.016, 0.0);
    scene.tick(0.016, 0.016);
    // Output and g-buffer per frame
    assert_eq!(headless.stats().clears, 4);
}

#[test]
fn test_scene_releases_device_resources() {
    let Fixture { headless, scene, .. } = fixture();
    add_camera(&scene, CullingMode::Disabled);
    let id = scene.create_entity("mesh");
    scene.add(id, mesh(&scene, "tri"));
    scene.add_material(Material::new("stone"));
    scene.tick(0.016, 0.0);
    assert!(headless.live_shaders() > 0);

    drop(scene);
    assert_eq!(headless.live_shaders(), 0);
    assert_eq!(headless.live_buffers(), 0);
    assert_eq!(headless.live_queries(), 0);
}

#[test]
fn test_scene_without_device_skips_gpu_work() {
    let context = EngineContext::new(EngineConfig::new().with_worker_threads(0));
    let scene = SceneGraph::new(&context);
    assert!(scene.device().is_none());
    assert!(scene.caches().is_none());

    let camera = scene.create_entity("camera");
    scene.add(camera, Camera::new(scene.create_render_system()));
    assert!(scene.set_camera(camera));
    let id = scene.create_entity("mesh");
    scene.add(id, MeshDrawable::empty(Aabb::unit()));
    scene.add_material(Material::new("plain"));

    assert!(scene.tick(0.016, 0.0));
    assert!(!scene.configure_display(64, 64, 1.0));
    assert!(!scene.upload_materials());
    assert_eq!(scene.display_output(), None);
}
