//! Demo showing click and drag selection on a headless device.
//!
//! A row of spheres is registered, then a click and a marquee drag are fed
//! through a pick session. Set `RUST_LOG=debug` to see each pick resolve.

use pickscope::*;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

fn main() -> Result<()> {
    init_logger();

    let mut picker = match ScenePicker::headless(PickOptions::default(), WIDTH, HEIGHT) {
        Ok(picker) => picker,
        Err(err) => {
            log::warn!("no GPU available ({err}), falling back to host ray picking");
            let mut picker = ScenePicker::new(PickOptions {
                point_pick_method: PointPickMethod::Ray,
                ..PickOptions::default()
            });
            picker.resize(WIDTH, HEIGHT)?;
            picker
        }
    };
    let camera = PickCamera::look_at(
        Vec3::new(0.0, 2.0, 12.0),
        Vec3::ZERO,
        Vec3::Y,
        50f32.to_radians(),
        WIDTH as f32 / HEIGHT as f32,
    );
    picker.set_camera(camera);

    // Five spheres along x, a ground slab behind them that cannot be selected
    let sphere = Geometry::uv_sphere(0.6, 16, 32).shared();
    let mut centers = Vec::new();
    for i in 0..5 {
        let center = Vec3::new(-4.0 + 2.0 * i as f32, 0.0, 0.0);
        picker.add_object(
            sphere.clone(),
            Mat4::from_translation(center),
            format!("Sphere {}", i + 1),
        )?;
        centers.push(center);
    }
    let ground = picker.add_object(
        Geometry::cube(1.0).shared(),
        Mat4::from_translation(Vec3::new(0.0, -1.5, -2.0)) * Mat4::from_scale(Vec3::new(6.0, 0.1, 3.0)),
        "ground",
    )?;
    picker.set_selectable(ground, false)?;
    picker.build()?;

    println!("Registered {} objects", picker.registry().len());

    let mut session = PickSession::new(picker);
    let name_of = |session: &PickSession, id: ObjectId| {
        session
            .picker()
            .registry()
            .get(id)
            .map_or_else(|| id.to_string(), |object| object.name.clone())
    };

    // Click on the middle sphere
    let target = camera
        .project(centers[2], (WIDTH, HEIGHT))
        .unwrap_or(Vec2::new(WIDTH as f32 / 2.0, HEIGHT as f32 / 2.0));
    session.on_pointer_down(target);
    let outcome = session.on_pointer_up(target);
    println!("Click at {target}: {outcome:?}");

    // Drag over the left half of the row
    let start = camera
        .project(Vec3::new(-5.0, 1.0, 0.0), (WIDTH, HEIGHT))
        .unwrap_or(Vec2::ZERO);
    let end = camera
        .project(Vec3::new(-1.0, -1.0, 0.0), (WIDTH, HEIGHT))
        .unwrap_or(Vec2::new(WIDTH as f32, HEIGHT as f32));
    session.on_pointer_down(start);
    session.on_pointer_move((start + end) / 2.0);
    let outcome = session.on_pointer_up(end);
    match outcome {
        GestureOutcome::Failed => println!("Drag selection failed, selection cleared"),
        _ => println!("Drag from {start} to {end}"),
    }

    let names: Vec<String> = session
        .get_selection()
        .into_iter()
        .map(|id| name_of(&session, id))
        .collect();
    println!("Selected: {names:?}");

    Ok(())
}
