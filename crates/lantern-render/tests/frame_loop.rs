// SPDX-License-Identifier: CEPL-1.0
mod support;

use lantern_render::{
    Acquired, FrameState, IdleGuard, PresentStatus, RenderError, RenderResult, RenderSize, Renderer,
    MAX_FRAMES_IN_FLIGHT,
};
use support::{count, journal, Call, FakeDevice, FakeResource, FakeWindow};

const EXTENT: RenderSize = RenderSize::new(800, 600);

fn record_frame(renderer: &mut Renderer<FakeDevice>, window: &mut FakeWindow) -> Option<PresentStatus> {
    let cmd = renderer.begin_frame(window).unwrap()?;
    renderer.begin_render_pass(cmd).unwrap();
    renderer.end_render_pass(cmd).unwrap();
    Some(renderer.end_frame(window).unwrap())
}

#[test]
fn slot_index_is_frame_count_mod_k() {
    let log = journal();
    let mut window = FakeWindow::new(&log, EXTENT);
    let mut renderer = Renderer::new(FakeDevice::new(&log), &mut window).unwrap();

    for n in 1..=7 {
        assert_eq!(record_frame(&mut renderer, &mut window), Some(PresentStatus::Presented));
        assert_eq!(renderer.frame_index(), n % MAX_FRAMES_IN_FLIGHT);
    }
    assert_eq!(renderer.recreation_count(), 0);
}

#[test]
fn end_to_end_suboptimal_present_recreates_and_advances() {
    let log = journal();
    let device = FakeDevice::new(&log);
    let mut window = FakeWindow::new(&log, EXTENT);
    let mut renderer = Renderer::new(device.clone(), &mut window).unwrap();
    assert_eq!(renderer.extent(), EXTENT);

    let cmd = renderer.begin_frame(&mut window).unwrap();
    assert_eq!(cmd, Some(100));
    assert_eq!(renderer.frame_index(), 0);
    assert_eq!(renderer.state(), FrameState::FrameBegun);

    device
        .script
        .borrow_mut()
        .presents
        .push_back(Some(PresentStatus::Suboptimal));
    let cmd = renderer.current_command_buffer().unwrap();
    renderer.begin_render_pass(cmd).unwrap();
    renderer.end_render_pass(cmd).unwrap();
    let status = renderer.end_frame(&mut window).unwrap();

    assert_eq!(status, PresentStatus::Suboptimal);
    assert_eq!(renderer.recreation_count(), 1);
    assert_eq!(renderer.frame_index(), 1);
    assert_eq!(renderer.state(), FrameState::Idle);

    let calls = log.borrow();
    let tail: Vec<_> = calls.iter().rev().take(3).rev().cloned().collect();
    assert_eq!(
        tail,
        vec![
            Call::WaitIdle,
            Call::CreateSurface {
                extent: EXTENT,
                recycled: true
            },
            Call::DropSurface { generation: 1 },
        ]
    );
}

#[test]
fn out_of_date_acquire_skips_the_frame() {
    let log = journal();
    let device = FakeDevice::new(&log);
    let mut window = FakeWindow::new(&log, EXTENT);
    let mut renderer = Renderer::new(device.clone(), &mut window).unwrap();

    device
        .script
        .borrow_mut()
        .acquires
        .push_back(Acquired::OutOfDate);
    assert_eq!(renderer.begin_frame(&mut window).unwrap(), None);
    assert_eq!(renderer.recreation_count(), 1);
    assert_eq!(renderer.frame_index(), 0);
    assert!(!renderer.is_frame_in_progress());
    assert_eq!(count(&log, |c| matches!(c, Call::Begin(_))), 0);

    // next tick renders normally on the same slot
    assert!(record_frame(&mut renderer, &mut window).is_some());
    assert_eq!(renderer.frame_index(), 1);
}

#[test]
fn recreation_waits_while_extent_is_zero() {
    let log = journal();
    let device = FakeDevice::new(&log);
    let mut window = FakeWindow::new(&log, EXTENT);
    let mut renderer = Renderer::new(device.clone(), &mut window).unwrap();

    let restored = RenderSize::new(1024, 768);
    window.minimise_then([RenderSize::new(0, 0), restored]);
    device
        .script
        .borrow_mut()
        .acquires
        .push_back(Acquired::OutOfDate);
    log.borrow_mut().clear();

    assert_eq!(renderer.begin_frame(&mut window).unwrap(), None);

    assert_eq!(
        *log.borrow(),
        vec![
            Call::Acquire { slot: 0 },
            Call::WaitEvents,
            Call::WaitEvents,
            Call::WaitIdle,
            Call::CreateSurface {
                extent: restored,
                recycled: true
            },
            Call::DropSurface { generation: 1 },
        ]
    );
    assert_eq!(renderer.extent(), restored);
}

#[test]
fn format_drift_is_fatal() {
    let log = journal();
    let device = FakeDevice::new(&log);
    device.script.borrow_mut().formats.extend([44, 50]);
    let mut window = FakeWindow::new(&log, EXTENT);
    let mut renderer = Renderer::new(device.clone(), &mut window).unwrap();

    device
        .script
        .borrow_mut()
        .acquires
        .push_back(Acquired::OutOfDate);
    let err = renderer.begin_frame(&mut window).unwrap_err();
    match err {
        RenderError::FormatDrift { previous, current } => {
            assert_eq!(previous, "44");
            assert_eq!(current, "50");
        }
        other => panic!("expected format drift, got {other:?}"),
    }
    assert_eq!(renderer.recreation_count(), 0);
}

#[test]
fn window_resize_triggers_recreation_after_present() {
    let log = journal();
    let mut window = FakeWindow::new(&log, EXTENT);
    let mut renderer = Renderer::new(FakeDevice::new(&log), &mut window).unwrap();

    let bigger = RenderSize::new(1280, 720);
    window.resize(bigger);
    assert_eq!(record_frame(&mut renderer, &mut window), Some(PresentStatus::Presented));
    assert_eq!(renderer.recreation_count(), 1);
    assert!(!window.resized);

    log.borrow_mut().clear();
    record_frame(&mut renderer, &mut window);
    assert!(log.borrow().contains(&Call::Viewport(bigger)));
}

#[test]
fn out_of_date_present_still_advances_the_slot() {
    let log = journal();
    let device = FakeDevice::new(&log);
    let mut window = FakeWindow::new(&log, EXTENT);
    let mut renderer = Renderer::new(device.clone(), &mut window).unwrap();

    device
        .script
        .borrow_mut()
        .presents
        .push_back(Some(PresentStatus::OutOfDate));
    assert_eq!(record_frame(&mut renderer, &mut window), Some(PresentStatus::OutOfDate));
    assert_eq!(renderer.frame_index(), 1);
    assert_eq!(renderer.recreation_count(), 1);

    record_frame(&mut renderer, &mut window);
    assert!(log.borrow().contains(&Call::Acquire { slot: 1 }));
}

#[test]
fn fatal_present_propagates() {
    let log = journal();
    let device = FakeDevice::new(&log);
    let mut window = FakeWindow::new(&log, EXTENT);
    let mut renderer = Renderer::new(device.clone(), &mut window).unwrap();

    device.script.borrow_mut().presents.push_back(None);
    renderer.begin_frame(&mut window).unwrap();
    let err = renderer.end_frame(&mut window).unwrap_err();
    assert!(matches!(err, RenderError::Gpu(_)));
    assert_eq!(renderer.recreation_count(), 0);
}

#[test]
fn render_pass_outside_a_frame_is_rejected() {
    let log = journal();
    let mut window = FakeWindow::new(&log, EXTENT);
    let mut renderer = Renderer::new(FakeDevice::new(&log), &mut window).unwrap();

    assert!(matches!(
        renderer.begin_render_pass(100),
        Err(RenderError::FrameState {
            state: FrameState::Idle,
            ..
        })
    ));
    assert!(renderer.end_frame(&mut window).is_err());
    assert!(renderer.current_command_buffer().is_err());

    // a pass can't be left open across end_frame
    let cmd = renderer.begin_frame(&mut window).unwrap().unwrap();
    renderer.begin_render_pass(cmd).unwrap();
    assert!(matches!(
        renderer.end_frame(&mut window),
        Err(RenderError::FrameState {
            state: FrameState::InRenderPass,
            ..
        })
    ));
}

#[test]
fn render_pass_rejects_another_slots_command_buffer() {
    let log = journal();
    let mut window = FakeWindow::new(&log, EXTENT);
    let mut renderer = Renderer::new(FakeDevice::new(&log), &mut window).unwrap();

    let cmd = renderer.begin_frame(&mut window).unwrap().unwrap();
    assert!(matches!(
        renderer.begin_render_pass(cmd + 1),
        Err(RenderError::ForeignCommandBuffer)
    ));
}

#[test]
fn startup_waits_for_a_visible_window() {
    let log = journal();
    let mut window = FakeWindow::new(&log, EXTENT);
    window.minimise_then([EXTENT]);

    let renderer = Renderer::new(FakeDevice::new(&log), &mut window).unwrap();
    assert_eq!(renderer.extent(), EXTENT);
    assert_eq!(log.borrow()[0], Call::WaitEvents);
}

#[test]
fn drop_waits_idle_then_frees_command_buffers() {
    let log = journal();
    let mut window = FakeWindow::new(&log, EXTENT);
    let renderer = Renderer::new(FakeDevice::new(&log), &mut window).unwrap();
    log.borrow_mut().clear();

    drop(renderer);
    assert_eq!(
        *log.borrow(),
        vec![
            Call::WaitIdle,
            Call::FreeCommandBuffers(MAX_FRAMES_IN_FLIGHT),
            Call::DropSurface { generation: 1 },
        ]
    );
}

#[test]
fn fatal_exit_waits_idle_before_releasing_gpu_objects() {
    let log = journal();
    let device = FakeDevice::new(&log);
    let mut window = FakeWindow::new(&log, EXTENT);
    device.script.borrow_mut().presents.push_back(None);

    let mut run = || -> RenderResult<()> {
        let mut renderer = Renderer::new(device.clone(), &mut window)?;
        let _assets = FakeResource::new(&log, "assets");
        let _idle = IdleGuard::new(device.clone());
        loop {
            let Some(cmd) = renderer.begin_frame(&mut window)? else {
                continue;
            };
            renderer.begin_render_pass(cmd)?;
            renderer.end_render_pass(cmd)?;
            renderer.end_frame(&mut window)?;
        }
    };
    assert!(run().is_err());

    let calls = log.borrow();
    let first_drop = calls
        .iter()
        .position(|c| matches!(c, Call::DropResource(_)))
        .unwrap();
    assert_eq!(calls[first_drop - 1], Call::WaitIdle);
    assert_eq!(calls[first_drop], Call::DropResource("assets"));
}
