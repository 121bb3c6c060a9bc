use crate::core::errors::OCRError;
use ndarray::{ArrayBase, ArrayD, Data, Dimension, IxDyn};
use ort::session::{SessionInputValue, SessionOutputs};
use ort::value::{Tensor, TensorRef};

fn dims_of(shape: &[usize]) -> Vec<i64> {
    shape.iter().map(|&d| d as i64).collect()
}

/// Converts an f32 array of any rank into an owned session input.
pub fn f32_input<S, D>(array: &ArrayBase<S, D>) -> Result<SessionInputValue<'static>, OCRError>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    let data: Vec<f32> = array.iter().copied().collect();
    let tensor = Tensor::from_array((dims_of(array.shape()), data))?;
    Ok(tensor.into())
}

/// Binds an f32 array to a session input without copying its buffer.
///
/// Arrays that are not contiguous in standard layout are copied instead.
pub fn f32_view<S, D>(array: &ArrayBase<S, D>) -> Result<SessionInputValue<'_>, OCRError>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    match array.as_slice() {
        Some(data) => {
            let tensor = TensorRef::from_array_view((dims_of(array.shape()), data))?;
            Ok(tensor.into())
        }
        None => f32_input(array),
    }
}

/// Converts an i64 array of any rank into an owned session input.
pub fn i64_input<S, D>(array: &ArrayBase<S, D>) -> Result<SessionInputValue<'static>, OCRError>
where
    S: Data<Elem = i64>,
    D: Dimension,
{
    let data: Vec<i64> = array.iter().copied().collect();
    let tensor = Tensor::from_array((dims_of(array.shape()), data))?;
    Ok(tensor.into())
}

/// A one-element boolean input, the shape control-flow flags are exported with.
pub fn bool_input(value: bool) -> Result<SessionInputValue<'static>, OCRError> {
    let tensor = Tensor::from_array((vec![1i64], vec![value]))?;
    Ok(tensor.into())
}

/// Owned f32 outputs of one graph run, in declared output order.
#[derive(Debug, Clone)]
pub struct OrtOutputs {
    model_name: String,
    tensors: Vec<(String, ArrayD<f32>)>,
}

impl OrtOutputs {
    /// Builds an output set from already materialized tensors.
    pub fn from_tensors(model_name: &str, tensors: Vec<(String, ArrayD<f32>)>) -> Self {
        Self {
            model_name: model_name.to_string(),
            tensors,
        }
    }

    pub(super) fn extract(
        model_name: &str,
        output_names: &[&str],
        outputs: &SessionOutputs<'_>,
        input_shape: &[usize],
    ) -> Result<Self, OCRError> {
        let mut tensors = Vec::with_capacity(output_names.len());
        for name in output_names {
            let (shape, data) = outputs[*name]
                .try_extract_tensor::<f32>()
                .map_err(|e| {
                    OCRError::model_inference(
                        model_name,
                        "output_extraction",
                        input_shape,
                        format!("Failed to extract output tensor '{}' as f32", name),
                        e,
                    )
                })?;
            let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
            let array = ArrayD::from_shape_vec(IxDyn(&dims), data.to_vec())?;
            tensors.push((name.to_string(), array));
        }
        Ok(Self::from_tensors(model_name, tensors))
    }

    /// Number of outputs.
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// Returns true when the graph produced no outputs.
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Removes and returns the output called `name`.
    pub fn take(&mut self, name: &str) -> Result<ArrayD<f32>, OCRError> {
        let position = self
            .tensors
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| OCRError::InvalidInput {
                message: format!("Model '{}' produced no output '{}'", self.model_name, name),
            })?;
        Ok(self.tensors.swap_remove(position).1)
    }

    /// Consumes the set and returns the first declared output.
    pub fn into_first(self) -> Result<ArrayD<f32>, OCRError> {
        self.tensors
            .into_iter()
            .next()
            .map(|(_, array)| array)
            .ok_or_else(|| OCRError::InvalidInput {
                message: format!("Model '{}' produced no outputs", self.model_name),
            })
    }
}
