use glam::{Quat, Vec2, Vec3, Vec4};
use lattice_engine::api::{
    BufferSlot, FilterMode, KernelPass, Placement, ProgramKind, ShadowSettings, Submesh, Switch, TextureSlot,
    VectorParam, WrapMode,
};
use lattice_engine::recording::{Command, RecordingBackend, RecordingDevice, TextureId};
use lattice_engine::{FrameContext, LatticeConfig, LatticeRenderer, NoiseDepth, SurfaceMaps};

type Renderer = LatticeRenderer<RecordingBackend>;

fn run_frame(renderer: &mut Renderer, device: &mut RecordingDevice, config: &LatticeConfig) {
    renderer.frame(device, &FrameContext::new(config)).expect("frame");
}

fn position_of(commands: &[Command], pred: impl Fn(&Command) -> bool) -> usize {
    commands.iter().position(pred).expect("command present")
}

#[test]
fn first_frame_builds_resources_before_any_work() {
    let mut renderer = Renderer::new();
    let mut device = RecordingDevice::new();
    let config = LatticeConfig::default();

    assert!(renderer.needs_reset());
    let stats = renderer.frame(&mut device, &FrameContext::new(&config)).unwrap();
    assert!(stats.reset);
    assert!(!renderer.needs_reset());

    let cmds = &device.commands;
    assert_eq!(device.count(|c| matches!(c, Command::CreateBuffer { .. })), 3);
    assert_eq!(device.count(|c| matches!(c, Command::CreateProgram { .. })), 5);
    assert_eq!(device.count(|c| matches!(c, Command::UploadMesh { .. })), 1);

    let last_create = cmds
        .iter()
        .rposition(|c| matches!(c, Command::CreateBuffer { .. } | Command::CreateProgram { .. }))
        .unwrap();
    let first_blit = position_of(cmds, |c| matches!(c, Command::Blit { .. }));
    assert!(last_create < first_blit);
}

#[test]
fn buffers_use_point_sampling_and_repeat_wrap() {
    let mut renderer = Renderer::new();
    let mut device = RecordingDevice::new();
    let config = LatticeConfig { columns: 250, rows: 100, ..Default::default() };
    run_frame(&mut renderer, &mut device, &config);

    for cmd in &device.commands {
        if let Command::CreateBuffer { desc, .. } = cmd {
            assert_eq!((desc.width, desc.height), (502, 97));
            assert_eq!(desc.filter, FilterMode::Point);
            assert_eq!(desc.wrap, WrapMode::Repeat);
            assert!(desc.transient);
        }
    }
    assert_eq!(renderer.columns(), Some(250));
    assert_eq!(renderer.rows(), Some(96));
}

#[test]
fn deformation_passes_run_in_order() {
    let mut renderer = Renderer::new();
    let mut device = RecordingDevice::new();
    run_frame(&mut renderer, &mut device, &LatticeConfig::default());

    let buffers = renderer.pool().buffers();
    let (position, normal_a, normal_b) = buffers.all().map(|(p, a, b)| (*p, *a, *b)).unwrap();

    let blits: Vec<_> = device
        .commands
        .iter()
        .filter_map(|c| match c {
            Command::Blit { pass, source, target, .. } => Some((*pass, *source, *target)),
            _ => None,
        })
        .collect();
    assert_eq!(
        blits,
        vec![
            (KernelPass::Position, None, position),
            (KernelPass::NormalA, Some(position), normal_a),
            (KernelPass::NormalB, Some(position), normal_b),
        ]
    );

    let last_blit = device.commands.iter().rposition(|c| matches!(c, Command::Blit { .. })).unwrap();
    let first_draw = position_of(&device.commands, |c| matches!(c, Command::Draw { .. }));
    assert!(last_blit < first_draw);
}

#[test]
fn kernel_receives_packed_parameters() {
    let mut renderer = Renderer::new();
    let mut device = RecordingDevice::new();
    let config = LatticeConfig {
        size: Vec2::new(8.0, 6.0),
        noise_offset: Vec2::new(3.0, -2.0),
        noise_frequency: 0.7,
        noise_elevation: 2.0,
        noise_clamp_min: -1.0,
        noise_clamp_max: 0.5,
        noise_warp: 0.25,
        ..Default::default()
    };
    run_frame(&mut renderer, &mut device, &config);

    let kernel = renderer.pool().programs().kernel.unwrap();
    let vector = |param: VectorParam| {
        device
            .commands
            .iter()
            .find_map(|c| match c {
                Command::SetVector { program, param: p, value } if *program == kernel && *p == param => Some(*value),
                _ => None,
            })
            .unwrap()
    };
    assert_eq!(vector(VectorParam::Size), Vec4::new(8.0, 6.0, 0.0, 0.0));
    assert_eq!(vector(VectorParam::Noise), Vec4::new(0.7, 3.0, -2.0, 0.0));
    assert_eq!(vector(VectorParam::Displace), Vec4::new(2.0, -1.0, 0.5, 0.5));
    assert_eq!(vector(VectorParam::Grid), Vec4::new(100.0, 100.0, 0.0, 0.0));
}

fn switches(device: &RecordingDevice, program: lattice_engine::recording::ProgramId) -> Vec<(Switch, bool)> {
    device
        .commands
        .iter()
        .filter_map(|c| match c {
            Command::SetSwitch { program: p, switch, enabled } if *p == program => Some((*switch, *enabled)),
            _ => None,
        })
        .collect()
}

#[test]
fn exactly_one_depth_variant_is_enabled() {
    for depth in NoiseDepth::ALL {
        let mut renderer = Renderer::new();
        let mut device = RecordingDevice::new();
        run_frame(&mut renderer, &mut device, &LatticeConfig { noise_depth: depth, ..Default::default() });

        let kernel = renderer.pool().programs().kernel.unwrap();
        let enabled: Vec<_> = switches(&device, kernel)
            .into_iter()
            .filter_map(|(s, on)| match s {
                Switch::Depth(d) if on => Some(d),
                _ => None,
            })
            .collect();
        assert_eq!(enabled, vec![depth]);
        let depth_toggles = switches(&device, kernel).iter().filter(|(s, _)| matches!(s, Switch::Depth(_))).count();
        assert_eq!(depth_toggles, 5);
    }
}

#[test]
fn warp_switch_follows_warp_strength() {
    for (warp, expected) in [(0.0, false), (0.3, true)] {
        let mut renderer = Renderer::new();
        let mut device = RecordingDevice::new();
        run_frame(&mut renderer, &mut device, &LatticeConfig { noise_warp: warp, ..Default::default() });
        let kernel = renderer.pool().programs().kernel.unwrap();
        assert!(switches(&device, kernel).contains(&(Switch::Warp, expected)));
    }
}

#[test]
fn three_segment_grid_draws_three_slices() {
    let mut renderer = Renderer::new();
    let mut device = RecordingDevice::new();
    let config = LatticeConfig { columns: 250, rows: 100, ..Default::default() };
    let stats = renderer.frame(&mut device, &FrameContext::new(&config)).unwrap();
    assert_eq!(stats.segments, 3);
    assert_eq!(stats.draws, 9);

    let offsets: Vec<Vec2> = device
        .draws()
        .filter_map(|c| match c {
            Command::Draw { submesh: Submesh::SurfaceA, uv_offset, .. } => Some(*uv_offset),
            _ => None,
        })
        .collect();
    let expected: Vec<Vec2> =
        [0.0f32, 32.0, 64.0].iter().map(|i| Vec2::new(0.5 / 502.0, (0.5 + i) / 97.0)).collect();
    assert_eq!(offsets, expected);
}

#[test]
fn segment_draws_pair_submeshes_with_programs() {
    let mut renderer = Renderer::new();
    let mut device = RecordingDevice::new();
    let config = LatticeConfig { cast_shadows: true, receive_shadows: true, ..Default::default() };
    let placement = Placement { translation: Vec3::new(1.0, 2.0, 3.0), rotation: Quat::from_rotation_y(0.5) };
    let ctx = FrameContext { config: &config, placement, maps: SurfaceMaps::default() };
    renderer.frame(&mut device, &ctx).unwrap();

    let programs = renderer.pool().programs();
    let draws: Vec<_> = device
        .draws()
        .map(|c| match c {
            Command::Draw { submesh, program, placement, shadows, .. } => (*submesh, *program, *placement, *shadows),
            _ => unreachable!(),
        })
        .collect();
    let surface_shadows = ShadowSettings { cast: true, receive: true };
    assert_eq!(
        draws,
        vec![
            (Submesh::SurfaceA, programs.surface_a.unwrap(), placement, surface_shadows),
            (Submesh::SurfaceB, programs.surface_b.unwrap(), placement, surface_shadows),
            (Submesh::Lines, programs.line.unwrap(), placement, ShadowSettings::NONE),
        ]
    );
}

#[test]
fn transparent_line_color_skips_line_draws() {
    let mut renderer = Renderer::new();
    let mut device = RecordingDevice::new();
    let config = LatticeConfig { line_color: Vec4::new(1.0, 0.0, 0.0, 0.0), columns: 250, ..Default::default() };
    let stats = renderer.frame(&mut device, &FrameContext::new(&config)).unwrap();

    assert_eq!(stats.draws, stats.segments * 2);
    assert!(device.draws().all(|c| !matches!(c, Command::Draw { submesh: Submesh::Lines, .. })));
}

#[test]
fn normal_buffers_bind_to_their_own_surface() {
    let mut renderer = Renderer::new();
    let mut device = RecordingDevice::new();
    run_frame(&mut renderer, &mut device, &LatticeConfig::default());

    let programs = renderer.pool().programs();
    let (position, normal_a, normal_b) = renderer.pool().buffers().all().map(|(p, a, b)| (*p, *a, *b)).unwrap();
    let binds: Vec<_> = device
        .commands
        .iter()
        .filter_map(|c| match c {
            Command::BindBuffer { program, slot, buffer } => Some((*program, *slot, *buffer)),
            _ => None,
        })
        .collect();

    let (a, b, line) = (programs.surface_a.unwrap(), programs.surface_b.unwrap(), programs.line.unwrap());
    assert!(binds.contains(&(a, BufferSlot::Position, position)));
    assert!(binds.contains(&(a, BufferSlot::Normal, normal_a)));
    assert!(binds.contains(&(b, BufferSlot::Position, position)));
    assert!(binds.contains(&(b, BufferSlot::Normal, normal_b)));
    assert!(binds.contains(&(line, BufferSlot::Position, position)));
    assert_eq!(binds.len(), 5);
}

#[test]
fn texture_switches_follow_map_presence() {
    let mut renderer = Renderer::new();
    let mut device = RecordingDevice::new();
    let config = LatticeConfig { occlusion_strength: 0.8, ..Default::default() };
    let albedo = TextureId(900);
    let maps = SurfaceMaps { albedo: Some(&albedo), normal: None, occlusion: None };
    renderer.frame(&mut device, &FrameContext { config: &config, placement: Placement::default(), maps }).unwrap();

    let surface = renderer.pool().programs().surface_a.unwrap();
    let sw = switches(&device, surface);
    assert!(sw.contains(&(Switch::AlbedoMap, true)));
    assert!(sw.contains(&(Switch::NormalMap, false)));
    assert!(sw.contains(&(Switch::OcclusionMap, false)));
    assert!(device.commands.contains(&Command::BindTexture {
        program: surface,
        slot: TextureSlot::Albedo,
        texture: Some(albedo)
    }));
    assert!(device.commands.contains(&Command::BindTexture { program: surface, slot: TextureSlot::NormalMap, texture: None }));
    assert_eq!(device.count(|c| matches!(c, Command::SetFloat { .. })), 0);
}

#[test]
fn occlusion_strength_only_pushed_with_occlusion_map() {
    let mut renderer = Renderer::new();
    let mut device = RecordingDevice::new();
    let config = LatticeConfig { occlusion_strength: 0.8, ..Default::default() };
    let occlusion = TextureId(7);
    let maps = SurfaceMaps { albedo: None, normal: None, occlusion: Some(&occlusion) };
    renderer.frame(&mut device, &FrameContext { config: &config, placement: Placement::default(), maps }).unwrap();

    // Once per surface program.
    assert_eq!(device.count(|c| matches!(c, Command::SetFloat { value, .. } if *value == 0.8)), 2);
    let surface = renderer.pool().programs().surface_b.unwrap();
    assert!(switches(&device, surface).contains(&(Switch::OcclusionMap, true)));
}

#[test]
fn map_params_share_noise_space() {
    let mut renderer = Renderer::new();
    let mut device = RecordingDevice::new();
    let config = LatticeConfig { noise_offset: Vec2::new(4.0, 5.0), map_scale: 2.5, ..Default::default() };
    run_frame(&mut renderer, &mut device, &config);

    let expected = Vec4::new(4.0, 0.0, 5.0, 2.5);
    let map_params = device.count(|c| {
        matches!(c, Command::SetVector { param: VectorParam::MapParams, value, .. } if *value == expected)
    });
    assert_eq!(map_params, 2);
}

#[test]
fn line_program_gets_line_color_and_kinds_match() {
    let mut renderer = Renderer::new();
    let mut device = RecordingDevice::new();
    let config = LatticeConfig { line_color: Vec4::new(0.2, 0.4, 0.6, 0.8), ..Default::default() };
    run_frame(&mut renderer, &mut device, &config);

    let programs = renderer.pool().programs();
    let line = programs.line.unwrap();
    assert!(device.commands.contains(&Command::SetVector {
        program: line,
        param: VectorParam::Color,
        value: config.line_color
    }));

    let kinds: Vec<_> = device
        .commands
        .iter()
        .filter_map(|c| match c {
            Command::CreateProgram { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect();
    assert_eq!(
        kinds,
        vec![ProgramKind::Kernel, ProgramKind::Surface, ProgramKind::Surface, ProgramKind::Line, ProgramKind::Debug]
    );
}
