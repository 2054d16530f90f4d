//! End-to-end book building against the software renderer.

use brickbook::{
    ApproximateMetrics, BookSettings, Diagnostic, DimensionSource, Instructions, ModelError,
    PartDimensions, StepKind,
};
use brickbook_ir::{ModelArchive, ModelFile, ModelLine, PartLine, INHERIT_COLOR};
use brickbook_render::{Command, RenderBackend, SoftwareRenderer};

/// Flat-on camera, so pixel sizes equal model sizes.
fn flat_settings(sizes: &[u32]) -> BookSettings {
    let mut settings = BookSettings::default();
    settings.measure.view_x_degrees = 0.0;
    settings.measure.view_y_degrees = 0.0;
    settings.measure.surface_sizes = sizes.to_vec();
    settings
}

fn block(name: &str, half_w: f64, half_h: f64) -> ModelFile {
    ModelFile::new(name).with_lines(vec![ModelLine::rect(
        INHERIT_COLOR,
        -half_w,
        -half_h,
        half_w,
        half_h,
        0.0,
    )])
}

fn parts() -> ModelArchive {
    ModelArchive::new()
        .with_file("3001.dat", block("Brick 2 x 4", 20.0, 12.0))
        .with_file("3003.dat", block("Brick 2 x 2", 10.0, 12.0))
}

#[test]
fn test_two_parts_one_step() {
    let archive = parts().with_file(
        "m.ldr",
        ModelFile::new("M").with_lines(vec![
            ModelLine::part(PartLine::new("3001.dat").with_color(4).at(-30.0, 0.0, 0.0)),
            ModelLine::part(PartLine::new("3003.dat").with_color(1).at(30.0, 0.0, 0.0)),
        ]),
    );
    let mut book = Instructions::load(&archive, "m.ldr", flat_settings(&[128, 256])).unwrap();
    let mut renderer = SoftwareRenderer::new();
    book.compile(&mut renderer).unwrap();
    let source = book.init_dimensions(&mut renderer, None).unwrap();
    book.init_layout(&ApproximateMetrics);

    assert_eq!(source, DimensionSource::Measured);
    assert!(book.diagnostics().is_empty());

    let model = book.model();
    assert_eq!(model.steps.len(), 1);
    let step = &model.steps[0];
    assert_eq!(step.csi.lists().len(), 1);

    let entries = step.pli.entries();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.count == 1));
    assert!(entries[0].corner.x < entries[1].corner.x);

    let registry = book.registry();
    let brick = registry.lookup("3001.dat").unwrap();
    let small = registry.lookup("3003.dat").unwrap();
    assert_eq!(entries[0].part, brick);
    assert_eq!(registry[brick].dimensions().width, 40);
    assert_eq!(registry[small].dimensions().width, 20);

    let csi = step.csi.measured().unwrap();
    assert_eq!((csi.width, csi.height), (90, 24));
    assert!(step.csi.page_box.is_some());
    assert!(step.number_anchor.y > step.pli.bounds.height);
}

#[test]
fn test_buffer_exchange_lists() {
    let archive = parts().with_file(
        "m.ldr",
        ModelFile::new("M").with_lines(vec![
            ModelLine::part(PartLine::new("3001.dat")),
            ModelLine::Step,
            ModelLine::BufferStore { buffer: 5 },
            ModelLine::part(PartLine::new("3003.dat")),
            ModelLine::part(PartLine::new("3003.dat")),
            ModelLine::Step,
            ModelLine::BufferRetrieve { buffer: 5 },
            ModelLine::part(PartLine::new("3001.dat")),
            ModelLine::Step,
            ModelLine::part(PartLine::new("3001.dat")),
        ]),
    );
    let mut book = Instructions::load(&archive, "m.ldr", BookSettings::default()).unwrap();
    let mut renderer = SoftwareRenderer::new();
    book.compile(&mut renderer).unwrap();
    assert!(book.diagnostics().is_empty());

    let small = book.registry().lookup("3003.dat").unwrap();
    let small_list = book.registry()[small].list().unwrap();
    let steps = &book.model().steps;
    assert_eq!(steps.len(), 4);

    // Step 2: one list without buffer 5 (nothing drawn), one with it.
    let lists = steps[1].csi.lists();
    assert_eq!(lists.len(), 2);
    assert!(lists[0].1.is_empty());
    assert_eq!(lists[1].1.entries()[0].buffer, 5);
    assert!(renderer.commands(lists[0].0).unwrap().is_empty());
    assert_eq!(
        renderer.commands(lists[1].0).unwrap(),
        &[Command::CallList(small_list), Command::CallList(small_list)]
    );
    assert_eq!(
        renderer.commands(steps[1].csi.cumulative_list().unwrap()).unwrap(),
        &[Command::CallList(lists[1].0)]
    );

    // Buffer retrieved: later steps only see the default configuration.
    for step in &steps[2..] {
        assert_eq!(step.csi.lists().len(), 1);
    }
    let cumulative = renderer
        .commands(steps[3].csi.cumulative_list().unwrap())
        .unwrap();
    let expected: Vec<Command> = steps
        .iter()
        .map(|s| Command::CallList(s.csi.base_list().unwrap()))
        .collect();
    assert_eq!(cumulative, expected.as_slice());
    assert!(!cumulative.contains(&Command::CallList(lists[1].0)));
}

#[test]
fn test_buffer_protocol_violation_is_reported() {
    let archive = parts().with_file(
        "m.ldr",
        ModelFile::new("M").with_lines(vec![
            ModelLine::BufferStore { buffer: 1 },
            ModelLine::BufferStore { buffer: 2 },
            ModelLine::part(PartLine::new("3001.dat")),
            ModelLine::Step,
            ModelLine::BufferRetrieve { buffer: 1 },
            ModelLine::part(PartLine::new("3003.dat")),
        ]),
    );
    let book = Instructions::load(&archive, "m.ldr", BookSettings::default()).unwrap();
    assert_eq!(
        book.diagnostics().entries(),
        &[Diagnostic::BufferProtocol {
            file: "m.ldr".into(),
            step: 2,
            requested: 1,
            top: Some(2),
        }]
    );
    // Stack unchanged: step 2 still sees both buffers.
    assert_eq!(book.model().steps[1].csi.buffers.len(), 2);
}

#[test]
fn test_retrieve_after_parts_orphans_them() {
    let archive = parts().with_file(
        "m.ldr",
        ModelFile::new("M").with_lines(vec![
            ModelLine::part(PartLine::new("3001.dat")),
            ModelLine::Step,
            ModelLine::BufferStore { buffer: 5 },
            ModelLine::part(PartLine::new("3003.dat")),
            ModelLine::BufferRetrieve { buffer: 5 },
        ]),
    );
    let mut book = Instructions::load(&archive, "m.ldr", BookSettings::default()).unwrap();
    assert_eq!(
        book.diagnostics().entries(),
        &[Diagnostic::BufferOrdering {
            file: "m.ldr".into(),
            step: 2,
            buffer: 5,
        }]
    );

    let mut renderer = SoftwareRenderer::new();
    book.compile(&mut renderer).unwrap();
    let small = book.registry().lookup("3003.dat").unwrap();
    let small_list = book.registry()[small].list().unwrap();

    // The step ends with an empty stack, so the buffered part is never drawn.
    let step = &book.model().steps[1];
    assert!(step.csi.buffers.is_empty());
    assert_eq!(step.csi.lists().len(), 1);
    assert_eq!(step.placements.len(), 1);
    assert!(renderer.commands(step.csi.base_list().unwrap()).unwrap().is_empty());
    let cumulative = renderer.commands(step.csi.cumulative_list().unwrap()).unwrap();
    assert!(!cumulative.contains(&Command::CallList(small_list)));
}

#[test]
fn test_stale_cache_recomputes_everything() {
    let dir = tempfile::tempdir().unwrap();
    let archive = parts().with_file(
        "m.ldr",
        ModelFile::new("M").with_lines(vec![
            ModelLine::part(PartLine::new("3001.dat")),
            ModelLine::Step,
            ModelLine::part(PartLine::new("3003.dat").at(0.0, -24.0, 0.0)),
        ]),
    );
    let settings = flat_settings(&[128]);
    let mut renderer = SoftwareRenderer::new();

    let mut first = Instructions::load(&archive, "m.ldr", settings.clone()).unwrap();
    first.compile(&mut renderer).unwrap();
    assert_eq!(
        first.init_dimensions(&mut renderer, Some(dir.path())).unwrap(),
        DimensionSource::Measured
    );
    let cache_path = dir.path().join("PartDimensions_m.ldr.cache");
    let original = std::fs::read_to_string(&cache_path).unwrap();
    assert_eq!(original.lines().count(), first.elements().len());

    // A valid cache is adopted without rendering.
    let mut second = Instructions::load(&archive, "m.ldr", settings.clone()).unwrap();
    let mut idle = SoftwareRenderer::new();
    assert!(matches!(
        second.init_dimensions(&mut idle, Some(dir.path())).unwrap(),
        DimensionSource::Cache { .. }
    ));
    assert!(idle.surface_history().is_empty());
    assert_eq!(second.dimension_cache(), original);

    // A single unknown filename poisons the whole file.
    let tampered = format!("{original}p 3001.dat 777 777 0 0 0 0\np 9999.dat 1 1 0 0 0 0\n");
    let mut third = Instructions::load(&archive, "m.ldr", settings.clone()).unwrap();
    let err = third.load_dimension_cache(&tampered).unwrap_err();
    assert!(matches!(err, ModelError::StaleCache(_)));
    assert!(third.registry().iter().all(|(_, def)| def.measured().is_none()));

    std::fs::write(&cache_path, &tampered).unwrap();
    let mut fourth = Instructions::load(&archive, "m.ldr", settings).unwrap();
    let mut renderer = SoftwareRenderer::new();
    fourth.compile(&mut renderer).unwrap();
    assert_eq!(
        fourth.init_dimensions(&mut renderer, Some(dir.path())).unwrap(),
        DimensionSource::Measured
    );
    assert_eq!(
        fourth
            .diagnostics()
            .count(|d| matches!(d, Diagnostic::StaleCache { .. })),
        1
    );
    let brick = fourth.registry().lookup("3001.dat").unwrap();
    assert_eq!(fourth.registry()[brick].dimensions().width, 40);
    assert_eq!(std::fs::read_to_string(&cache_path).unwrap(), original);
}

#[test]
fn test_never_fitting_part_stays_degenerate() {
    let archive = parts()
        .with_file("huge.dat", block("Baseplate", 500.0, 500.0))
        .with_file(
            "m.ldr",
            ModelFile::new("M").with_lines(vec![
                ModelLine::part(PartLine::new("3001.dat")),
                ModelLine::part(PartLine::new("huge.dat")),
            ]),
        );
    let mut book = Instructions::load(&archive, "m.ldr", flat_settings(&[64, 128])).unwrap();
    let mut renderer = SoftwareRenderer::new();
    book.compile(&mut renderer).unwrap();
    book.init_dimensions(&mut renderer, None).unwrap();
    book.init_layout(&ApproximateMetrics);

    let registry = book.registry();
    let huge = registry.lookup("huge.dat").unwrap();
    let brick = registry.lookup("3001.dat").unwrap();
    assert!(registry[huge].measured().is_none());
    assert_eq!(registry[huge].dimensions(), PartDimensions::DEGENERATE);
    assert_eq!(registry[brick].dimensions().width, 40);

    let diags = book.diagnostics();
    assert!(diags.entries().contains(&Diagnostic::MeasurementOverflow {
        element: "huge.dat".into(),
        largest_surface: 128,
    }));
    assert!(diags.entries().contains(&Diagnostic::UnmeasuredPart {
        part: "huge.dat".into(),
    }));

    let report = book.report();
    let measure = report.measure.as_ref().unwrap();
    assert!(measure.failures.contains(&"huge.dat".to_string()));
    assert_eq!(measure.tiers, vec![64, 128]);

    let entries = book.model().steps[0].pli.entries();
    assert_eq!(entries.len(), 2);
    assert!(entries[1].corner.x > entries[0].corner.x);
    assert_eq!(renderer.live_surfaces(), 0);
}

#[test]
fn test_failed_measurement_is_not_cached() {
    let dir = tempfile::tempdir().unwrap();
    let archive = parts()
        .with_file("huge.dat", block("Baseplate", 500.0, 500.0))
        .with_file(
            "m.ldr",
            ModelFile::new("M").with_lines(vec![
                ModelLine::part(PartLine::new("3001.dat")),
                ModelLine::part(PartLine::new("huge.dat")),
            ]),
        );
    let cache_path = dir.path().join("PartDimensions_m.ldr.cache");

    for run in 0..2 {
        let mut book = Instructions::load(&archive, "m.ldr", flat_settings(&[64, 128])).unwrap();
        let mut renderer = SoftwareRenderer::new();
        book.compile(&mut renderer).unwrap();
        let source = book.init_dimensions(&mut renderer, Some(dir.path())).unwrap();
        book.init_layout(&ApproximateMetrics);

        assert_eq!(source, DimensionSource::Measured, "run {run}");
        let huge = book.registry().lookup("huge.dat").unwrap();
        assert!(book.registry()[huge].measured().is_none(), "run {run}");

        let diags = book.diagnostics();
        assert!(diags.entries().contains(&Diagnostic::MeasurementOverflow {
            element: "huge.dat".into(),
            largest_surface: 128,
        }));
        assert!(diags.entries().contains(&Diagnostic::UnmeasuredPart {
            part: "huge.dat".into(),
        }));
        let stale = diags.count(|d| matches!(d, Diagnostic::StaleCache { .. }));
        assert_eq!(stale, run, "run {run}");

        let cache = std::fs::read_to_string(&cache_path).unwrap();
        assert!(cache.contains("p 3001.dat 40 24"));
        assert!(!cache.contains("huge.dat"));
    }
}

#[test]
fn test_tiers_escalate_only_as_needed() {
    let archive = parts()
        .with_file("wide.dat", block("Plate 1 x 10", 40.0, 4.0))
        .with_file(
            "m.ldr",
            ModelFile::new("M").with_lines(vec![ModelLine::part(PartLine::new("wide.dat"))]),
        );
    let mut book = Instructions::load(&archive, "m.ldr", flat_settings(&[64, 128, 256])).unwrap();
    let mut renderer = SoftwareRenderer::new();
    book.compile(&mut renderer).unwrap();
    let report = book.measure(&mut renderer).unwrap();

    assert_eq!(report.tiers, vec![64, 128]);
    assert_eq!(renderer.surface_history(), &[(64, 64), (128, 128)]);
    assert!(report.failures.is_empty());
    let wide = book.registry().lookup("wide.dat").unwrap();
    let d = book.registry()[wide].dimensions();
    assert_eq!((d.width, d.height), (80, 8));
}

#[test]
fn test_template_step() {
    let mut lines = Vec::new();
    for i in 0..3 {
        lines.push(ModelLine::part(PartLine::new("3001.dat").at(0.0, f64::from(i) * -24.0, 0.0)));
        lines.push(ModelLine::part(PartLine::new("3003.dat").at(40.0, f64::from(i) * -24.0, 0.0)));
        lines.push(ModelLine::Step);
    }
    let archive = parts().with_file("m.ldr", ModelFile::new("M").with_lines(lines));
    let mut book = Instructions::load(&archive, "m.ldr", flat_settings(&[256])).unwrap();
    let mut renderer = SoftwareRenderer::new();
    book.compile(&mut renderer).unwrap();
    book.init_dimensions(&mut renderer, None).unwrap();
    book.init_layout(&ApproximateMetrics);
    let lists_before = renderer.list_count();

    let template = book.build_template(&mut renderer, &ApproximateMetrics).unwrap();
    assert_eq!(template.kind, StepKind::Template);
    assert_eq!(template.number, 0);
    assert_eq!(template.placements.len(), 5);
    assert!(template.csi.measured().is_some());
    assert!(template.csi.page_box.is_some());
    assert_eq!(template.pli.len(), 2);
    assert!(renderer.list_count() > lists_before);
    assert_eq!(renderer.surface_history().last(), Some(&(512, 512)));

    let report = book.report();
    assert_eq!(report.template.as_ref().map(|t| t.number), Some(0));
    assert_eq!(report.steps.len(), 3);
    let json = report.to_json().unwrap();
    assert!(json.contains("\"model\": \"m.ldr\""));
}

#[test]
fn test_missing_root_model() {
    let err = Instructions::load(&parts(), "nope.ldr", BookSettings::default()).unwrap_err();
    assert!(matches!(err, ModelError::NotFound(_)));
}
