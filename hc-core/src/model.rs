//! The segmentation capability consumed by the pipeline.
//!
//! The pipeline only relies on [`SegmentationModel`]: a synchronous,
//! read-only `ModelInput -> RawMask` function. [`OnnxSegmentationModel`] is the
//! bundled implementation backed by `tract-onnx`; [`FnSegmentationModel`]
//! adapts closures so hosts and tests can plug in anything else.

use std::{
    borrow::Cow,
    fmt,
    path::{Path, PathBuf},
};

use log::{debug, warn};
use ndarray::{Array2, ArrayD, Axis, IxDyn};
use tract_onnx::prelude::*;

use crate::error::{MeasureError, Result};
use crate::preprocess::{InputSize, ModelInput};

type RunnableModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A loaded segmentation model.
///
/// Implementations must not mutate internal parameters in [`segment`](Self::segment);
/// one instance is shared by every concurrent request.
pub trait SegmentationModel: Send + Sync + fmt::Debug {
    /// Produce the raw mask for one `[1, 1, H, W]` input.
    fn segment(&self, input: &ModelInput) -> Result<RawMask>;

    /// Spatial size the model was built for, when it declares one.
    fn input_size(&self) -> Option<InputSize> {
        None
    }
}

/// Untouched model output: probabilities or class scores over the input grid.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMask {
    values: ArrayD<f32>,
}

impl RawMask {
    pub fn new(values: ArrayD<f32>) -> Self {
        Self { values }
    }

    /// Build from a flat buffer; a length mismatch is a post-processing failure.
    pub fn from_shape_vec(shape: &[usize], data: Vec<f32>) -> Result<Self> {
        let len = data.len();
        ArrayD::from_shape_vec(IxDyn(shape), data)
            .map(Self::new)
            .map_err(|_| {
                MeasureError::Postprocess(format!(
                    "model output of {len} values does not fit shape {shape:?}"
                ))
            })
    }

    /// Frame a single `H x W` plane as `[1, 1, H, W]`.
    pub fn from_plane(plane: Array2<f32>) -> Self {
        let values = plane
            .insert_axis(Axis(0))
            .insert_axis(Axis(0))
            .into_dyn();
        Self { values }
    }

    pub fn values(&self) -> &ArrayD<f32> {
        &self.values
    }

    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }
}

/// ONNX segmentation network executed with `tract-onnx`.
pub struct OnnxSegmentationModel {
    runnable: RunnableModel,
    input_size: InputSize,
    path: PathBuf,
}

impl fmt::Debug for OnnxSegmentationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnnxSegmentationModel")
            .field("path", &self.path)
            .field("input_size", &self.input_size)
            .finish()
    }
}

impl OnnxSegmentationModel {
    /// Load the graph with its input pinned to `[1, 1, H, W]`.
    ///
    /// The optimized plan is tried first; graphs the optimizer rejects fall back
    /// to the decluttered plan. Any failure is
    /// [`MeasureError::CapabilityUnavailable`].
    pub fn load<P: AsRef<Path>>(model_path: P, input_size: InputSize) -> Result<Self> {
        let path = model_path.as_ref();
        if !path.is_file() {
            return Err(MeasureError::CapabilityUnavailable(format!(
                "model file not found: {}",
                path.display()
            )));
        }

        let runnable = match load_runnable_model(path, input_size, true) {
            Ok(model) => {
                debug!(
                    "segmentation model {} optimized for {}",
                    path.display(),
                    input_size
                );
                model
            }
            Err(opt_err) => {
                warn!(
                    "segmentation model {} failed optimized load ({opt_err:#}); falling back to decluttered graph",
                    path.display()
                );
                load_runnable_model(path, input_size, false).map_err(|e| {
                    MeasureError::CapabilityUnavailable(format!(
                        "failed to load ONNX graph {}: {e:#} (optimized load: {opt_err})",
                        path.display()
                    ))
                })?
            }
        };

        Ok(Self {
            runnable,
            input_size,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SegmentationModel for OnnxSegmentationModel {
    fn segment(&self, input: &ModelInput) -> Result<RawMask> {
        let shape = input.shape();
        let array = input.tensor();
        let data: Cow<'_, [f32]> = match array.as_slice() {
            Some(slice) => Cow::Borrowed(slice),
            None => Cow::Owned(array.iter().copied().collect()),
        };
        let tensor = Tensor::from_shape(&shape, &data[..])
            .map_err(|e| MeasureError::Inference(format!("failed to build input tensor: {e}")))?;

        let outputs = self
            .runnable
            .run(tvec![tensor.into()])
            .map_err(|e| MeasureError::Inference(format!("{e:#}")))?;
        let output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| MeasureError::Inference("model produced no outputs".into()))?
            .into_tensor();

        let output = output
            .cast_to::<f32>()
            .map_err(|e| MeasureError::Postprocess(format!("model output is not numeric: {e}")))?;
        let values = output
            .as_slice::<f32>()
            .map_err(|e| MeasureError::Postprocess(format!("model output is not contiguous: {e}")))?;
        RawMask::from_shape_vec(output.shape(), values.to_vec())
    }

    fn input_size(&self) -> Option<InputSize> {
        Some(self.input_size)
    }
}

fn load_runnable_model(
    path: &Path,
    input_size: InputSize,
    optimized: bool,
) -> TractResult<RunnableModel> {
    let fact = f32::fact([
        1usize,
        1,
        input_size.height as usize,
        input_size.width as usize,
    ]);
    let model = tract_onnx::onnx()
        .model_for_path(path)?
        .with_input_fact(0, fact.into())?;

    if optimized {
        model.into_optimized()?.into_runnable()
    } else {
        model.into_typed()?.into_decluttered()?.into_runnable()
    }
}

/// Adapts a closure into a [`SegmentationModel`].
pub struct FnSegmentationModel<F> {
    func: F,
    input_size: Option<InputSize>,
}

impl<F> FnSegmentationModel<F>
where
    F: Fn(&ModelInput) -> Result<RawMask> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self {
            func,
            input_size: None,
        }
    }

    /// Declare the spatial size the closure expects.
    pub fn with_input_size(mut self, size: InputSize) -> Self {
        self.input_size = Some(size);
        self
    }
}

impl<F> fmt::Debug for FnSegmentationModel<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSegmentationModel")
            .field("input_size", &self.input_size)
            .finish_non_exhaustive()
    }
}

impl<F> SegmentationModel for FnSegmentationModel<F>
where
    F: Fn(&ModelInput) -> Result<RawMask> + Send + Sync,
{
    fn segment(&self, input: &ModelInput) -> Result<RawMask> {
        (self.func)(input)
    }

    fn input_size(&self) -> Option<InputSize> {
        self.input_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use ndarray::Array4;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn loading_missing_model_is_unavailable() {
        let err = OnnxSegmentationModel::load("missing.onnx", InputSize::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapabilityUnavailable);
        assert!(err.to_string().contains("missing.onnx"));
    }

    #[test]
    fn invalid_model_is_unavailable() {
        let mut temp = NamedTempFile::new().expect("temp file");
        temp.write_all(b"not a real onnx file").expect("write");

        let err = OnnxSegmentationModel::load(temp.path(), InputSize::default())
            .expect_err("invalid ONNX should fail");
        assert_eq!(err.kind(), ErrorKind::CapabilityUnavailable);
        assert!(err.is_fatal());
    }

    #[test]
    fn raw_mask_shape_mismatch_is_postprocess_error() {
        let err = RawMask::from_shape_vec(&[1, 1, 4, 4], vec![0.0; 15]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Postprocess);
    }

    #[test]
    fn closure_model_passes_input_through() {
        let model = FnSegmentationModel::new(|input: &ModelInput| {
            Ok(RawMask::from_plane(input.plane().to_owned()))
        })
        .with_input_size(InputSize::new(4, 2));
        assert_eq!(model.input_size(), Some(InputSize::new(4, 2)));

        let input = ModelInput::from_array(Array4::from_elem((1, 1, 2, 4), 0.25)).unwrap();
        let mask = model.segment(&input).unwrap();
        assert_eq!(mask.shape(), &[1, 1, 2, 4]);
        assert!(mask.values().iter().all(|&v| v == 0.25));
    }
}
