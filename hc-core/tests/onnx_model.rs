use std::path::Path;

use hc_core::{
    ErrorKind, InputSize, MeasurementPipeline, OnnxSegmentationModel, PreprocessConfig,
    SegmentationModel, prepare,
};
use hc_utils::{
    AppSettings,
    fixtures::{centered_disk_mask, png_bytes, synthetic_scan},
};

/// Single Identity node, `input` -> `output`, both `[1, 1, 256, 256]` f32.
const IDENTITY_MODEL: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../fixtures/models/identity_1x1x256x256.onnx"
);

#[test]
fn identity_graph_loads_and_echoes_its_input() -> anyhow::Result<()> {
    let model = OnnxSegmentationModel::load(IDENTITY_MODEL, InputSize::default())?;
    assert_eq!(model.path(), Path::new(IDENTITY_MODEL));
    assert_eq!(model.input_size(), Some(InputSize::new(256, 256)));

    let input = prepare(&synthetic_scan(320, 240), &PreprocessConfig::default())?;
    let raw = model.segment(&input)?;
    assert_eq!(raw.shape(), &[1, 1, 256, 256]);
    assert_eq!(
        raw.values().iter().copied().collect::<Vec<f32>>(),
        input.tensor().iter().copied().collect::<Vec<f32>>()
    );
    Ok(())
}

#[test]
fn identity_graph_measures_a_disc_end_to_end() -> anyhow::Result<()> {
    let model = OnnxSegmentationModel::load(IDENTITY_MODEL, InputSize::default())?;
    let pipeline = MeasurementPipeline::new(std::sync::Arc::new(model), Default::default())?;

    // The echoed disc is 1.0 inside and 0.0 outside, so the mask is the disc itself.
    let result = pipeline.run(&png_bytes(&centered_disk_mask(256, 50))?)?;
    assert!(
        (result.circumference() - 332.0488).abs() < 0.01,
        "circumference {}",
        result.circumference()
    );
    assert_eq!(result.contour_count(), 1);
    assert_eq!(result.area(), 7862.0);
    assert_eq!(result.mask_size(), (256, 256));
    Ok(())
}

#[test]
fn settings_can_name_the_model_file() -> anyhow::Result<()> {
    let settings = AppSettings {
        model_path: Some(IDENTITY_MODEL.into()),
        ..Default::default()
    };
    let pipeline = MeasurementPipeline::from_settings(&settings)?;
    assert_eq!(pipeline.config().preprocess.input_size, InputSize::default());

    let err = pipeline
        .run(&png_bytes(&image::GrayImage::new(256, 256))?)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoContour);
    Ok(())
}

#[test]
fn settings_pointing_at_missing_model_refuse_to_start() {
    let settings = AppSettings {
        model_path: Some("models/definitely-not-here.onnx".into()),
        ..Default::default()
    };
    let err = MeasurementPipeline::from_settings(&settings).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CapabilityUnavailable);
    assert!(err.is_fatal());
}
