use lattice_engine::api::GpuError;
use lattice_engine::recording::{Command, RecordingBackend, RecordingDevice};
use lattice_engine::{FrameContext, LatticeConfig, LatticeError, LatticeHooks, LatticeRenderer};

type Renderer = LatticeRenderer<RecordingBackend>;

fn frame(renderer: &mut Renderer, device: &mut RecordingDevice, config: &LatticeConfig) {
    renderer.on_frame(device, &FrameContext::new(config)).expect("frame");
}

#[test]
fn steady_frames_do_not_reallocate() {
    let mut renderer = Renderer::new();
    let mut device = RecordingDevice::new();
    let config = LatticeConfig::default();
    frame(&mut renderer, &mut device, &config);
    device.take();

    frame(&mut renderer, &mut device, &config);
    assert_eq!(device.count(|c| matches!(c, Command::CreateBuffer { .. } | Command::CreateProgram { .. })), 0);
    assert_eq!(device.count(|c| matches!(c, Command::Blit { .. })), 3);
}

#[test]
fn config_change_rebuilds_buffers_and_mesh_but_keeps_programs() {
    let mut renderer = Renderer::new();
    let mut device = RecordingDevice::new();
    let mut config = LatticeConfig::default();
    frame(&mut renderer, &mut device, &config);
    let old_buffers = renderer.pool().buffers().all().map(|(p, a, b)| [*p, *a, *b]).unwrap();
    device.take();

    config.columns = 250;
    renderer.on_config_changed();
    assert!(renderer.needs_reset());
    frame(&mut renderer, &mut device, &config);

    let cmds = &device.commands;
    let destroyed: Vec<_> = cmds
        .iter()
        .filter_map(|c| match c {
            Command::DestroyBuffer(id) => Some(*id),
            _ => None,
        })
        .collect();
    assert_eq!(destroyed, old_buffers.to_vec());
    assert_eq!(device.count(|c| matches!(c, Command::CreateBuffer { .. })), 3);
    assert_eq!(device.count(|c| matches!(c, Command::UpdateMesh { .. })), 1);
    assert_eq!(device.count(|c| matches!(c, Command::UploadMesh { .. })), 0);
    assert_eq!(device.count(|c| matches!(c, Command::CreateProgram { .. } | Command::DestroyProgram(_))), 0);

    let rebuilt = cmds.iter().rposition(|c| matches!(c, Command::CreateBuffer { .. })).unwrap();
    let first_work = cmds.iter().position(|c| matches!(c, Command::Blit { .. } | Command::Draw { .. })).unwrap();
    assert!(rebuilt < first_work);
    assert_eq!(renderer.rows(), Some(96));
}

#[test]
fn mesh_rebuild_follows_segment_rows() {
    let mut renderer = Renderer::new();
    let mut device = RecordingDevice::new();
    let mut config = LatticeConfig { columns: 10, rows: 10, ..Default::default() };
    frame(&mut renderer, &mut device, &config);
    assert!(device.commands.contains(&Command::UploadMesh { id: lattice_engine::recording::MeshId(1), vertices: 600 }));

    device.take();
    config.rows = 20;
    renderer.notify_config_change();
    frame(&mut renderer, &mut device, &config);
    assert!(device.count(|c| matches!(c, Command::UpdateMesh { vertices: 1200, .. })) == 1);
}

#[test]
fn teardown_before_anything_exists_is_a_no_op() {
    let mut renderer = Renderer::new();
    let mut device = RecordingDevice::new();
    renderer.on_teardown(&mut device);
    renderer.on_teardown(&mut device);
    assert!(device.commands.is_empty());
}

#[test]
fn teardown_releases_everything_once() {
    let mut renderer = Renderer::new();
    let mut device = RecordingDevice::new();
    frame(&mut renderer, &mut device, &LatticeConfig::default());
    device.take();

    renderer.teardown(&mut device);
    assert_eq!(device.count(|c| matches!(c, Command::DestroyBuffer(_))), 3);
    assert_eq!(device.count(|c| matches!(c, Command::DestroyProgram(_))), 5);
    assert_eq!(device.count(|c| matches!(c, Command::DestroyMesh(_))), 1);

    device.take();
    renderer.teardown(&mut device);
    assert!(device.commands.is_empty());
    assert!(renderer.plan().is_none());
}

#[test]
fn renderer_recovers_after_teardown() {
    let mut renderer = Renderer::new();
    let mut device = RecordingDevice::new();
    let config = LatticeConfig::default();
    frame(&mut renderer, &mut device, &config);
    renderer.teardown(&mut device);
    device.take();

    frame(&mut renderer, &mut device, &config);
    assert_eq!(device.count(|c| matches!(c, Command::CreateProgram { .. })), 5);
    assert_eq!(device.count(|c| matches!(c, Command::UploadMesh { .. })), 1);
}

#[test]
fn allocation_failure_is_fatal_to_the_frame() {
    let mut renderer = Renderer::new();
    let mut device = RecordingDevice::with_buffer_budget(1);
    let config = LatticeConfig::default();

    let err = renderer.frame(&mut device, &FrameContext::new(&config)).unwrap_err();
    assert!(matches!(err, LatticeError::Gpu(GpuError::OutOfMemory(_))));
    assert!(renderer.needs_reset());
    assert_eq!(device.count(|c| matches!(c, Command::Blit { .. } | Command::Draw { .. })), 0);

    // Whatever was allocated is still owned and released on teardown.
    device.take();
    renderer.teardown(&mut device);
    assert_eq!(device.count(|c| matches!(c, Command::DestroyBuffer(_))), 1);
}

#[test]
fn degenerate_grid_deforms_but_draws_nothing() {
    let mut renderer = Renderer::new();
    let mut device = RecordingDevice::new();
    let config = LatticeConfig { columns: 4096, rows: 5, ..Default::default() };
    let stats = renderer.frame(&mut device, &FrameContext::new(&config)).unwrap();
    assert_eq!(stats.segments, 0);
    assert_eq!(device.draws().count(), 0);
    assert_eq!(device.count(|c| matches!(c, Command::Blit { .. })), 3);
}

#[test]
fn debug_overlay_draws_three_thumbnails_when_enabled() {
    let mut renderer = Renderer::new();
    let mut device = RecordingDevice::new();
    let mut config = LatticeConfig::default();

    // Before any resources exist there is nothing to show.
    config.debug = true;
    renderer.on_repaint(&mut device, &config);
    assert!(device.commands.is_empty());

    frame(&mut renderer, &mut device, &config);
    device.take();
    renderer.on_repaint(&mut device, &config);

    let debug = renderer.pool().programs().debug.unwrap();
    let (position, normal_a, normal_b) = renderer.pool().buffers().all().map(|(p, a, b)| (*p, *a, *b)).unwrap();
    let shown: Vec<_> = device
        .commands
        .iter()
        .map(|c| match c {
            Command::DrawTexture { rect, buffer, program } => {
                assert_eq!(*program, debug);
                (rect.x, *buffer)
            }
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(shown, vec![(0.0, position), (64.0, normal_a), (128.0, normal_b)]);

    device.take();
    config.debug = false;
    renderer.on_repaint(&mut device, &config);
    assert!(device.commands.is_empty());
}
