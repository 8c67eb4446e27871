//! Picking tests that need no GPU.
//!
//! Ray picks are traced on the host; region picks that are not degenerate
//! need the id-buffer and so fail here, which exercises the failure path.

use std::sync::Arc;

use pickscope::*;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;
const CENTER: Vec2 = Vec2::new(400.0, 300.0);

fn camera() -> PickCamera {
    PickCamera::look_at(
        Vec3::new(0.0, 0.0, 10.0),
        Vec3::ZERO,
        Vec3::Y,
        60f32.to_radians(),
        WIDTH as f32 / HEIGHT as f32,
    )
}

fn quad() -> Arc<Geometry> {
    Geometry::new(
        vec![
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
        ],
        vec![[0, 1, 2], [0, 2, 3]],
    )
    .shared()
}

fn host_picker() -> ScenePicker {
    let options = PickOptions {
        point_pick_method: PointPickMethod::Ray,
        ..PickOptions::default()
    };
    let mut picker = ScenePicker::new(options);
    picker.resize(WIDTH, HEIGHT).unwrap();
    picker.set_camera(camera());
    picker
}

/// Quads at distance 5 (A) and 10 (B) along the center ray.
fn stacked_scene() -> (ScenePicker, ObjectId, ObjectId) {
    let mut picker = host_picker();
    let geometry = quad();
    // Far one first so registration order cannot decide
    let b = picker
        .add_object(Arc::clone(&geometry), Mat4::IDENTITY, "B")
        .unwrap();
    let a = picker
        .add_object(geometry, Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0)), "A")
        .unwrap();
    picker.build().unwrap();
    (picker, a, b)
}

#[test]
fn test_unobstructed_hit() {
    let mut picker = host_picker();
    let center = Vec3::new(1.5, 0.5, 0.0);
    let id = picker
        .add_object(
            Geometry::uv_sphere(0.5, 16, 24).shared(),
            Mat4::from_translation(center),
            "Sphere 1",
        )
        .unwrap();

    let screen = picker.camera().project(center, (WIDTH, HEIGHT)).unwrap();
    let result = picker.pick_ray(screen).unwrap();
    assert!(result.hit);
    assert_eq!(result.id, Some(id));
    let expected = (center - Vec3::new(0.0, 0.0, 10.0)).length() - 0.5;
    assert!((result.distance - expected).abs() < 0.05);

    // Empty space next to it
    let result = picker.pick_ray(Vec2::new(10.0, 10.0)).unwrap();
    assert_eq!(result, PickResult::miss());
}

#[test]
fn test_nearest_wins() {
    let (mut picker, a, b) = stacked_scene();
    let result = picker.pick_ray(CENTER).unwrap();
    assert_eq!(result.id, Some(a));
    assert_ne!(result.id, Some(b));
    assert!((result.distance - 5.0).abs() < 1e-3);
}

#[test]
fn test_removal_invalidates() {
    let (mut picker, a, b) = stacked_scene();
    picker.remove_object(a).unwrap();
    assert_eq!(picker.pick_ray(CENTER).unwrap().id, Some(b));

    picker.remove_object(b).unwrap();
    assert!(!picker.pick_ray(CENTER).unwrap().hit);

    assert!(matches!(
        picker.remove_object(a),
        Err(PickError::ObjectNotFound(id)) if id == a
    ));

    // Identifiers are never handed out again
    let c = picker.add_object(quad(), Mat4::IDENTITY, "C").unwrap();
    assert!(c != a && c != b);
}

#[test]
fn test_transform_update_moves_object() {
    let (mut picker, a, b) = stacked_scene();
    picker
        .update_transform(a, Mat4::from_translation(Vec3::new(50.0, 0.0, 5.0)))
        .unwrap();
    assert!(picker.accel().is_dirty());
    assert_eq!(picker.pick_ray(CENTER).unwrap().id, Some(b));
    assert_eq!(
        picker.registry().get(a).unwrap().transform,
        Mat4::from_translation(Vec3::new(50.0, 0.0, 5.0))
    );
}

#[test]
fn test_non_selectable_object_occludes() {
    let (mut picker, a, _b) = stacked_scene();
    picker.set_selectable(a, false).unwrap();
    let result = picker.pick_ray(CENTER).unwrap();
    assert!(!result.hit);

    picker.set_selectable(a, true).unwrap();
    assert_eq!(picker.pick_ray(CENTER).unwrap().id, Some(a));
}

#[test]
fn test_failed_build_disables_ray_picks() {
    let (mut picker, a, _b) = stacked_scene();
    let broken = picker
        .add_object(Geometry::default().shared(), Mat4::IDENTITY, "empty")
        .unwrap();

    assert!(matches!(
        picker.build(),
        Err(PickError::Build(BuildError::EmptyGeometry(id))) if id == broken
    ));
    assert!(!picker.pick_ray(CENTER).unwrap().hit);

    picker.remove_object(broken).unwrap();
    assert_eq!(picker.pick_ray(CENTER).unwrap().id, Some(a));
}

#[test]
fn test_picks_need_a_viewport() {
    let mut picker = ScenePicker::new(PickOptions::default());
    assert!(matches!(
        picker.pick_ray(CENTER),
        Err(PickError::InvalidViewport { .. })
    ));
    assert!(matches!(
        picker.resize(0, 10),
        Err(PickError::InvalidViewport { width: 0, height: 10 })
    ));
}

#[test]
fn test_id_buffer_point_pick_falls_back_to_ray_without_gpu() {
    let (mut picker, a, _b) = stacked_scene();
    picker.options_mut().point_pick_method = PointPickMethod::IdBuffer;
    assert!(!picker.has_gpu());
    assert_eq!(picker.pick_point(CENTER).unwrap().id, Some(a));
    assert!(matches!(
        picker.pick_id_buffer_point(CENTER),
        Err(PickError::GpuUnavailable)
    ));
}

#[test]
fn test_click_selects_nearest_object() {
    let (picker, a, _b) = stacked_scene();
    let mut session = PickSession::new(picker);

    session.on_pointer_down(CENTER);
    session.on_pointer_move(CENTER + Vec2::new(1.0, 0.5));
    let outcome = session.on_pointer_up(CENTER + Vec2::new(1.0, 1.0));
    assert!(matches!(outcome, GestureOutcome::Point(r) if r.id == Some(a)));
    assert_eq!(session.get_selection().into_iter().collect::<Vec<_>>(), vec![a]);

    // Click on empty space clears it
    session.on_pointer_down(Vec2::new(5.0, 5.0));
    session.on_pointer_up(Vec2::new(5.0, 5.0));
    assert!(session.get_selection().is_empty());
}

#[test]
fn test_thin_drag_resolves_as_point() {
    let (picker, a, _b) = stacked_scene();
    let mut session = PickSession::new(picker);

    // Far enough to be a drag, but zero width
    session.on_pointer_down(Vec2::new(400.0, 280.0));
    let outcome = session.on_pointer_up(Vec2::new(400.0, 320.0));
    assert!(matches!(outcome, GestureOutcome::Region(ref ids) if ids.contains(&a)));
    assert_eq!(session.get_selection().len(), 1);
}

#[test]
fn test_region_pick_without_gpu_clears_selection() {
    let (picker, a, _b) = stacked_scene();
    let mut session = PickSession::new(picker);
    session.on_pointer_down(CENTER);
    session.on_pointer_up(CENTER);
    assert!(session.get_selection().contains(&a));

    session.on_pointer_down(Vec2::new(100.0, 100.0));
    session.on_pointer_move(Vec2::new(200.0, 200.0));
    let outcome = session.on_pointer_up(Vec2::new(300.0, 300.0));
    assert_eq!(outcome, GestureOutcome::Failed);
    assert!(session.get_selection().is_empty());
    assert_eq!(session.gesture_state(), GestureState::Idle);
}

#[test]
fn test_removing_through_session_prunes_selection() {
    let (picker, a, b) = stacked_scene();
    let mut session = PickSession::new(picker);
    session.on_pointer_down(CENTER);
    session.on_pointer_up(CENTER);
    assert!(session.get_selection().contains(&a));

    session.remove_object(a).unwrap();
    assert!(session.get_selection().is_empty());

    session.on_pointer_down(CENTER);
    session.on_pointer_up(CENTER);
    assert!(session.get_selection().contains(&b));
}

#[test]
fn test_selection_drops_objects_removed_through_picker() {
    let (picker, a, b) = stacked_scene();
    let mut session = PickSession::new(picker);
    session.on_pointer_down(CENTER);
    session.on_pointer_up(CENTER);
    assert!(session.get_selection().contains(&a));

    session.picker_mut().remove_object(a).unwrap();
    assert!(session.get_selection().is_empty());

    // Same for an object that stops being selectable
    session.on_pointer_down(CENTER);
    session.on_pointer_up(CENTER);
    assert!(session.get_selection().contains(&b));
    session.picker_mut().set_selectable(b, false).unwrap();
    assert!(session.get_selection().is_empty());
}
