use safetensors::tensor::{Dtype, TensorView};

use crate::{TrainErr, error::Result};

/// The name and shape of a group of consecutive parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSpec {
    pub name: String,
    pub shape: Vec<usize>,
}

impl TensorSpec {
    pub fn new(name: impl Into<String>, shape: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }

    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Serializes a flat parameter buffer as a safetensors blob with one F32 tensor per spec.
///
/// # Arguments
/// * `specs` - The parameter groups, in buffer order.
/// * `params` - The flat parameter buffer.
///
/// # Returns
/// The serialized blob or an error if the specs don't cover the buffer exactly.
pub fn serialize_state(specs: &[TensorSpec], params: &[f32]) -> Result<Vec<u8>> {
    let total: usize = specs.iter().map(TensorSpec::len).sum();

    if total != params.len() {
        return Err(TrainErr::SizeMismatch {
            what: "state dict",
            got: total,
            expected: params.len(),
        });
    }

    let bytes: &[u8] = bytemuck::cast_slice(params);
    let mut offset = 0;
    let mut views = Vec::with_capacity(specs.len());

    for spec in specs {
        let len = spec.len() * size_of::<f32>();
        let view = TensorView::new(Dtype::F32, spec.shape.clone(), &bytes[offset..offset + len])
            .map_err(|e| TrainErr::Serialization(format!("{}: {e}", spec.name)))?;

        views.push((spec.name.clone(), view));
        offset += len;
    }

    safetensors::serialize(views, &None).map_err(|e| TrainErr::Serialization(e.to_string()))
}
