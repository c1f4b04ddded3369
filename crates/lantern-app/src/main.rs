// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use glam::{Vec3, Vec4};
use lantern_core::{init_tracing, FpsCounter, FrameClock};
use lantern_math::{Camera, FreeFly, Transform};
use lantern_platform::PlatformWindow;
use lantern_render::{GlobalUbo, IdleGuard, PresentStatus, SurfaceWindow};
use lantern_render_vk::{DeviceContext, FrameResourceSet, ObjectPass, PointLightPass, VkFrameContext, VkRenderer};
use tracing::{debug, error, info};

mod config;
mod state;
mod world;

use config::{AppCfg, Args};
use state::AppState;

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let mut cfg = config::load(&args.config);
    cfg.apply_args(&args);
    info!(
        "config: {}x{}, vsync {} ({:?}), validation {}",
        cfg.window.width, cfg.window.height, cfg.render.vsync, cfg.render.vsync_mode, cfg.render.validation
    );

    run(&cfg).inspect_err(|e| error!("fatal: {e:#}"))
}

fn run(cfg: &AppCfg) -> Result<()> {
    let mut window = PlatformWindow::new(&cfg.window_options())?;
    let ctx = Arc::new(DeviceContext::new(&window, &window, &cfg.device_options())?);

    let mut renderer = VkRenderer::new(ctx.clone(), &mut window)?;
    renderer.set_clear_color(cfg.render.clear_color);

    let mut resources = FrameResourceSet::new(&ctx)?;
    let render_pass = renderer.surface().render_pass();
    let mut objects = ObjectPass::new(&ctx, render_pass, resources.global_layout())?;
    let lights = PointLightPass::new(&ctx, render_pass, resources.global_layout(), cfg.scene.light_speed)?;

    let (mut scene, assets) = world::build(&ctx, &cfg.scene)?;
    // Declared after every GPU-owning local so it drops first: any exit from
    // here on, `?` included, waits for in-flight frames before teardown.
    let _idle = IdleGuard::new(ctx.clone());

    let controller = FreeFly {
        move_speed: cfg.camera.move_speed,
        look_speed: cfg.camera.look_speed,
    };
    let mut viewer = Transform::at(Vec3::new(0.0, -0.5, -2.5));
    let mut camera = Camera::default();
    let ambient = Vec4::from_array(cfg.render.ambient);

    let mut app = AppState::default();
    let mut clock = FrameClock::new();
    let mut fps = FpsCounter::new(Instant::now());

    loop {
        let events = window.poll_events();
        let (next, actions) = state::step(app, &events);
        if next.paused() != app.paused() {
            info!(paused = next.paused(), "render state changed");
        }
        app = next;
        if actions.exit {
            break;
        }

        let dt = clock.tick();
        if actions.steer {
            controller.apply(window.held_keys(), dt, &mut viewer);
        }
        if !actions.render {
            window.wait_events();
            continue;
        }

        camera.set_view_yxz(viewer.translation, viewer.rotation);
        camera.set_perspective(
            cfg.camera.fov_degrees.to_radians(),
            renderer.aspect_ratio(),
            cfg.camera.near,
            cfg.camera.far,
        );

        let Some(cmd) = renderer.begin_frame(&mut window)? else {
            continue;
        };
        let slot = renderer.frame_index();

        let mut ubo = GlobalUbo::new(&camera, ambient);
        lights.update(dt, &mut scene, &mut ubo);

        let (slot_resources, global_layout) = resources.slot_mut(slot);
        let global_set = slot_resources.begin(&ubo, global_layout)?;
        let frame = VkFrameContext {
            frame_index: slot,
            frame_time: dt,
            command_buffer: cmd,
            camera: &camera,
            global_descriptor_set: global_set,
        };

        renderer.begin_render_pass(cmd)?;
        objects.render(&frame, &scene, &assets, slot_resources)?;
        lights.render(&frame, &scene, slot_resources)?;
        renderer.end_render_pass(cmd)?;

        match renderer.end_frame(&mut window)? {
            PresentStatus::Presented => {}
            status => debug!(?status, "swapchain rebuilt after present"),
        }

        fps.frame();
        if let Some(n) = fps.poll(Instant::now()) {
            info!("fps ~ {n} ({} swapchain rebuilds)", renderer.recreation_count());
        }
    }

    info!("shutting down");
    Ok(())
}
