/// Orchestration tests for the blur filter.
///
/// These tests drive `BlurFilter` against the recording backend and validate
/// the capture cycles, bound textures and uploaded parameters of each pass.
///
/// Run with:   cargo test --test blur_orchestration
use composite_blur::{
    BackgroundCompositor, BlendState, BlurConfig, BlurFamily, BlurFilter, BlurVariant,
    ParamInfo, ParamType, PassthroughCompositor, ProgramId, RenderError,
    TextureBackgroundCompositor,
};
use composite_blur_test_scenes::recording::builtin_params;
use composite_blur_test_scenes::scene::{box_area, gaussian_zoom};
use composite_blur_test_scenes::{
    all_scenarios, check_capture_cycles, check_draw, ParamExpectation, RecordedValue,
    RecordingBackend, TextureRef, CANVAS_HEIGHT, CANVAS_WIDTH,
};

const INPUT: TextureRef = TextureRef::External(0);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn config(family: BlurFamily, variant: BlurVariant) -> BlurConfig {
    BlurConfig::new(family, variant)
        .unwrap()
        .with_size(CANVAS_WIDTH, CANVAS_HEIGHT)
}

fn render(
    filter: &mut BlurFilter<RecordingBackend>,
    backend: &mut RecordingBackend,
) -> Result<composite_blur::FrameStats, RenderError> {
    filter.render(backend, &mut PassthroughCompositor, Some(&INPUT))
}

fn assert_no_failures(failures: Vec<String>) {
    if !failures.is_empty() {
        let message = format!(
            "{} expectation(s) failed:\n{}",
            failures.len(),
            failures.join("\n"),
        );
        panic!("{message}");
    }
}

/// Every scenario issues its expected passes with its expected parameters.
#[test]
fn scenario_pass_expectations() {
    init_logging();
    let mut failures = Vec::new();

    for scenario in all_scenarios() {
        let mut backend = RecordingBackend::new();
        let mut filter = BlurFilter::new(scenario.config.clone());

        match render(&mut filter, &mut backend) {
            Ok(stats) => {
                if stats.program != scenario.program {
                    failures.push(format!(
                        "[{}] rendered with {:?}, expected {:?}",
                        scenario.label, stats.program, scenario.program
                    ));
                }
                if stats.passes as usize != scenario.passes.len() {
                    failures.push(format!(
                        "[{}] reported {} passes, expected {}",
                        scenario.label,
                        stats.passes,
                        scenario.passes.len()
                    ));
                }
            }
            Err(error) => {
                failures.push(format!("[{}] frame skipped: {error}", scenario.label));
                continue;
            }
        }

        failures.extend(check_capture_cycles(
            scenario.label,
            &backend,
            scenario.passes.len(),
        ));

        let draws = backend.draws_with(scenario.program.source_name());
        if draws.len() != scenario.passes.len() {
            failures.push(format!(
                "[{}] {} draws, expected {}",
                scenario.label,
                draws.len(),
                scenario.passes.len()
            ));
        }
        for (index, (draw, expectations)) in draws.iter().zip(&scenario.passes).enumerate() {
            let label = format!("{} pass {}", scenario.label, index);
            failures.extend(check_draw(&label, draw, expectations));
        }
    }

    assert_no_failures(failures);
}

#[test]
fn box_area_issues_two_captures_per_pass() {
    for passes in 1..=4 {
        let mut backend = RecordingBackend::new();
        let mut filter = BlurFilter::new(config(BlurFamily::Box, BlurVariant::Area).with_passes(passes));

        let stats = render(&mut filter, &mut backend).unwrap();

        assert_eq!(stats.passes, 2 * passes);
        assert_eq!(backend.capture_cycles(), 2 * passes as usize);
    }
}

#[test]
fn single_pass_variants_ignore_pass_count() {
    for (family, variant) in [
        (BlurFamily::Box, BlurVariant::Directional),
        (BlurFamily::Box, BlurVariant::Zoom),
        (BlurFamily::Gaussian, BlurVariant::Directional),
        (BlurFamily::Gaussian, BlurVariant::Zoom),
        (BlurFamily::Gaussian, BlurVariant::Motion),
    ] {
        let mut backend = RecordingBackend::new();
        let mut filter = BlurFilter::new(config(family, variant).with_passes(10));

        render(&mut filter, &mut backend).unwrap();

        assert_eq!(backend.capture_cycles(), 1, "{family} {variant}");
    }
}

#[test]
fn passes_ping_pong_between_two_targets() {
    let scenario = box_area(3);
    let mut backend = RecordingBackend::new();
    let mut filter = BlurFilter::new(scenario.config);

    render(&mut filter, &mut backend).unwrap();

    let draws = backend.draws();
    assert_eq!(draws.len(), 6);
    assert_eq!(backend.targets_created(), 2);
    assert_eq!(draws[0].image(), Some(INPUT));
    for pair in draws.windows(2) {
        let (previous, current) = (pair[0], pair[1]);
        let previous_target = previous.target.unwrap();
        assert_ne!(current.target, Some(previous_target));
        assert_eq!(current.image(), Some(TextureRef::Target(previous_target)));
    }

    let last_target = draws[5].target.unwrap();
    assert_eq!(
        filter.output_texture(&backend),
        Some(TextureRef::Target(last_target))
    );
}

#[test]
fn next_frame_starts_on_the_slot_without_the_previous_output() {
    let mut backend = RecordingBackend::new();
    let mut filter = BlurFilter::new(config(BlurFamily::Gaussian, BlurVariant::Zoom));

    render(&mut filter, &mut backend).unwrap();
    let first_output = filter.output_texture(&backend).unwrap();
    backend.clear_events();

    render(&mut filter, &mut backend).unwrap();
    let draw = backend.draws()[0].clone();
    assert_ne!(draw.target.map(TextureRef::Target), Some(first_output));
    assert_eq!(backend.targets_created(), 2);
}

#[test]
fn missing_program_skips_the_frame_without_touching_targets() {
    init_logging();
    let mut backend = RecordingBackend::new();
    backend.fail_program("box_1d");
    let mut filter = BlurFilter::new(config(BlurFamily::Box, BlurVariant::Area).with_passes(3));

    let result = render(&mut filter, &mut backend);

    assert_eq!(
        result,
        Err(RenderError::ProgramUnavailable {
            family: BlurFamily::Box,
            variant: BlurVariant::Area,
        })
    );
    assert_eq!(backend.capture_cycles(), 0);
    assert_eq!(backend.targets_created(), 0);
    assert!(backend.draws().is_empty());
    assert_eq!(filter.output_texture(&backend), None);
}

#[test]
fn failed_program_load_is_retried_next_frame() {
    let mut backend = RecordingBackend::new();
    backend.fail_program("gaussian_1d");
    let mut filter = BlurFilter::new(config(BlurFamily::Gaussian, BlurVariant::Area));

    assert!(render(&mut filter, &mut backend).is_err());
    backend.restore_program("gaussian_1d");
    assert!(render(&mut filter, &mut backend).is_ok());

    assert_eq!(backend.program_loads("gaussian_1d"), 2);
}

#[test]
fn programs_are_loaded_once_across_variant_switches() {
    let mut backend = RecordingBackend::new();
    let area = config(BlurFamily::Gaussian, BlurVariant::Area);
    let zoom = config(BlurFamily::Gaussian, BlurVariant::Zoom);
    let mut filter = BlurFilter::new(area.clone());

    render(&mut filter, &mut backend).unwrap();
    filter.update(zoom);
    render(&mut filter, &mut backend).unwrap();
    filter.update(area);
    render(&mut filter, &mut backend).unwrap();

    assert_eq!(backend.program_loads("gaussian_1d"), 1);
    assert_eq!(backend.program_loads("gaussian_radial"), 1);
}

#[test]
fn previous_output_survives_a_skipped_frame() {
    let mut backend = RecordingBackend::new();
    let mut filter = BlurFilter::new(config(BlurFamily::Box, BlurVariant::Area));

    render(&mut filter, &mut backend).unwrap();
    let output = filter.output_texture(&backend);
    assert!(output.is_some());

    let skipped = filter.render(&mut backend, &mut PassthroughCompositor, None);
    assert_eq!(skipped, Err(RenderError::InputUnavailable));
    assert_eq!(filter.output_texture(&backend), output);
}

#[test]
fn zero_sized_surface_is_skipped() {
    let mut backend = RecordingBackend::new();
    let mut filter = BlurFilter::new(config(BlurFamily::Box, BlurVariant::Area).with_size(0, 48));

    let result = render(&mut filter, &mut backend);

    assert_eq!(
        result,
        Err(RenderError::EmptySurface {
            width: 0,
            height: 48
        })
    );
    assert_eq!(backend.targets_created(), 0);
}

#[test]
fn target_allocation_failure_is_reported() {
    let mut backend = RecordingBackend::new();
    backend.fail_target_creation(true);
    let mut filter = BlurFilter::new(config(BlurFamily::Box, BlurVariant::Area));

    let result = render(&mut filter, &mut backend);

    assert!(matches!(result, Err(RenderError::Target(_))));
    assert_eq!(backend.capture_cycles(), 0);
}

#[test]
fn capture_failure_leaves_no_output() {
    let mut backend = RecordingBackend::new();
    backend.fail_captures(true);
    let mut filter = BlurFilter::new(config(BlurFamily::Box, BlurVariant::Zoom));

    let result = render(&mut filter, &mut backend);

    assert_eq!(result, Err(RenderError::CaptureFailed));
    assert!(backend.draws().is_empty());
    assert_eq!(backend.blend_depth(), 0);
    assert_eq!(filter.output_texture(&backend), None);
}

#[test]
fn aborted_multi_pass_frame_never_exposes_a_partial_blur() {
    init_logging();
    let mut backend = RecordingBackend::new();
    let mut filter = BlurFilter::new(config(BlurFamily::Box, BlurVariant::Area).with_passes(2));

    render(&mut filter, &mut backend).unwrap();
    let previous = filter.surfaces().output_index();
    assert!(previous.is_some());

    // The second frame's third capture fails, after its second pass wrote
    // into the slot of the previous output.
    backend.clear_events();
    backend.fail_nth_capture(3);
    let result = render(&mut filter, &mut backend);

    assert_eq!(result, Err(RenderError::CaptureFailed));
    let written = backend.written_targets();
    assert_eq!(written.len(), 2);
    match filter.output_texture(&backend) {
        None => {}
        Some(TextureRef::Target(slot)) => {
            assert!(!written.contains(&slot), "output slot {slot} was overwritten by an aborted frame")
        }
        Some(other) => panic!("unexpected output texture {other:?}"),
    }
    assert_eq!(backend.blend_depth(), 0);

    // The next complete frame publishes a fresh output.
    assert!(render(&mut filter, &mut backend).is_ok());
    assert!(filter.output_texture(&backend).is_some());
}

#[test]
fn single_pass_capture_failure_keeps_the_previous_output() {
    let mut backend = RecordingBackend::new();
    let mut filter = BlurFilter::new(config(BlurFamily::Gaussian, BlurVariant::Zoom));

    render(&mut filter, &mut backend).unwrap();
    let output = filter.output_texture(&backend);
    assert!(output.is_some());

    backend.fail_nth_capture(1);
    assert_eq!(render(&mut filter, &mut backend), Err(RenderError::CaptureFailed));
    assert_eq!(filter.output_texture(&backend), output);
}

#[test]
fn resolver_tracks_consecutive_load_failures() {
    let mut backend = RecordingBackend::new();
    backend.fail_program("box_radial");
    let mut filter = BlurFilter::new(config(BlurFamily::Box, BlurVariant::Zoom));

    for _ in 0..3 {
        assert!(matches!(
            render(&mut filter, &mut backend),
            Err(RenderError::ProgramUnavailable { .. })
        ));
    }
    assert_eq!(filter.resolver().failed_attempts(ProgramId::BoxRadial), 3);
    assert!(!filter.resolver().is_loaded(ProgramId::BoxRadial));

    backend.restore_program("box_radial");
    render(&mut filter, &mut backend).unwrap();
    assert_eq!(filter.resolver().failed_attempts(ProgramId::BoxRadial), 0);
    assert!(filter.resolver().is_loaded(ProgramId::BoxRadial));
}

#[test]
fn reset_programs_forces_a_reload() {
    let mut backend = RecordingBackend::new();
    let mut filter = BlurFilter::new(config(BlurFamily::Gaussian, BlurVariant::Motion));

    render(&mut filter, &mut backend).unwrap();
    render(&mut filter, &mut backend).unwrap();
    assert_eq!(backend.program_loads("gaussian_motion"), 1);

    filter.reset_programs();
    assert!(!filter.resolver().is_loaded(ProgramId::GaussianMotion));

    let stats = render(&mut filter, &mut backend).unwrap();
    assert_eq!(stats.program, ProgramId::GaussianMotion);
    assert_eq!(backend.program_loads("gaussian_motion"), 2);
}

#[test]
fn every_pass_draws_with_straight_alpha_and_restores_blend_state() {
    let mut backend = RecordingBackend::new();
    let mut filter = BlurFilter::new(config(BlurFamily::Box, BlurVariant::TiltShift).with_passes(2));

    render(&mut filter, &mut backend).unwrap();

    let draws = backend.draws();
    assert_eq!(draws.len(), 4);
    for draw in draws {
        assert_eq!(draw.blend, Some(BlendState::STRAIGHT_ALPHA_OVER));
        assert_eq!((draw.width, draw.height), (CANVAS_WIDTH, CANVAS_HEIGHT));
    }
    assert_eq!(backend.blend_depth(), 0);
}

#[test]
fn gaussian_passes_upload_the_sampled_kernel() {
    let mut backend = RecordingBackend::new();
    let mut filter = BlurFilter::new(config(BlurFamily::Gaussian, BlurVariant::Area).with_radius(2.5));

    render(&mut filter, &mut backend).unwrap();

    let kernel = *filter.kernel();
    for draw in backend.draws() {
        assert_eq!(
            draw.params.get("weight"),
            Some(&RecordedValue::Bytes(kernel.weight_bytes().to_vec()))
        );
        assert_eq!(
            draw.params.get("offset"),
            Some(&RecordedValue::Bytes(kernel.offset_bytes().to_vec()))
        );
        assert_eq!(
            draw.params.get("kernel_size"),
            Some(&RecordedValue::Int(kernel.effective_len() as i32))
        );
    }
}

#[test]
fn box_passes_do_not_upload_a_kernel() {
    let mut backend = RecordingBackend::new();
    let mut filter = BlurFilter::new(config(BlurFamily::Box, BlurVariant::Area));

    render(&mut filter, &mut backend).unwrap();

    for draw in backend.draws() {
        assert!(!draw.params.contains_key("weight"));
        assert!(!draw.params.contains_key("kernel_size"));
    }
}

#[test]
fn kernel_is_resampled_only_when_the_radius_changes() {
    let mut backend = RecordingBackend::new();
    let gaussian = config(BlurFamily::Gaussian, BlurVariant::Area).with_radius(3.0);
    let mut filter = BlurFilter::new(gaussian.clone());
    let table = *filter.kernel();

    render(&mut filter, &mut backend).unwrap();
    render(&mut filter, &mut backend).unwrap();
    assert_eq!(filter.kernel_sampler().resample_count(), 1);
    assert_eq!(*filter.kernel(), table);

    filter.update(gaussian.with_radius(5.0));
    render(&mut filter, &mut backend).unwrap();
    assert_eq!(filter.kernel_sampler().resample_count(), 2);
    assert_ne!(*filter.kernel(), table);
}

#[test]
fn unit_direction_is_uploaded_only_when_the_program_declares_it() {
    let directional = config(BlurFamily::Gaussian, BlurVariant::Directional).with_angle(180.0);

    let mut backend = RecordingBackend::new();
    let mut filter = BlurFilter::new(directional.clone());
    render(&mut filter, &mut backend).unwrap();
    assert_no_failures(check_draw(
        "gaussian_1d without dir",
        backend.draws()[0],
        &[
            ParamExpectation::Unset("dir"),
            ParamExpectation::Vec2("texel_step", [-1.0 / CANVAS_WIDTH as f32, 0.0]),
        ],
    ));

    let mut backend = RecordingBackend::new();
    let mut params = builtin_params("gaussian_1d").unwrap();
    params.push(ParamInfo {
        name: "dir".to_owned(),
        ty: ParamType::Vec2,
    });
    backend.override_params("gaussian_1d", params);
    let mut filter = BlurFilter::new(directional);
    render(&mut filter, &mut backend).unwrap();
    assert_no_failures(check_draw(
        "gaussian_1d with dir",
        backend.draws()[0],
        &[ParamExpectation::Vec2("dir", [-1.0, 0.0])],
    ));
}

#[test]
fn resizing_reallocates_both_targets() {
    let mut backend = RecordingBackend::new();
    let mut filter = BlurFilter::new(config(BlurFamily::Box, BlurVariant::Area));

    render(&mut filter, &mut backend).unwrap();
    render(&mut filter, &mut backend).unwrap();
    assert_eq!(backend.targets_created(), 2);

    filter.set_size(32, 24);
    render(&mut filter, &mut backend).unwrap();
    assert_eq!(backend.targets_created(), 4);
    assert!(backend
        .draws()
        .iter()
        .rev()
        .take(2)
        .all(|draw| (draw.width, draw.height) == (32, 24)));
}

#[test]
fn background_compositor_output_feeds_the_first_pass() {
    let mut backend = RecordingBackend::new();
    let mut compositor = TextureBackgroundCompositor::<RecordingBackend>::new();
    compositor.set_background(Some(TextureRef::External(9)));
    let mut filter = BlurFilter::new(config(BlurFamily::Box, BlurVariant::Area));

    let stats = filter
        .render(&mut backend, &mut compositor, Some(&INPUT))
        .unwrap();

    assert_eq!(stats.passes, 2);
    assert_eq!(backend.capture_cycles(), 3);

    let composite_draws = backend.draws_with("composite");
    assert_eq!(composite_draws.len(), 2);
    assert_eq!(composite_draws[0].image(), Some(TextureRef::External(9)));
    assert_eq!(composite_draws[0].blend, Some(BlendState::REPLACE));
    assert_eq!(composite_draws[1].image(), Some(INPUT));
    assert_eq!(composite_draws[1].blend, Some(BlendState::STRAIGHT_ALPHA_OVER));

    let composite_target = composite_draws[1].target.unwrap();
    let blur_draws = backend.draws_with(ProgramId::Box1d.source_name());
    assert_eq!(blur_draws[0].image(), Some(TextureRef::Target(composite_target)));
    assert_ne!(blur_draws[0].target, Some(composite_target));
}

struct UnavailableCompositor;

impl BackgroundCompositor<RecordingBackend> for UnavailableCompositor {
    fn composite_against_background(
        &mut self,
        _backend: &mut RecordingBackend,
        _input: &TextureRef,
        _config: &BlurConfig,
    ) -> Option<TextureRef> {
        None
    }
}

#[test]
fn unavailable_composite_skips_the_frame() {
    let mut backend = RecordingBackend::new();
    let scenario = gaussian_zoom();
    let mut filter = BlurFilter::new(scenario.config);

    let result = filter.render(&mut backend, &mut UnavailableCompositor, Some(&INPUT));

    assert_eq!(result, Err(RenderError::CompositeUnavailable));
    assert_eq!(backend.capture_cycles(), 0);
    assert_eq!(backend.targets_created(), 0);
}
