use ndarray::{Array2, ArrayView4, Ix2};
use rand::{SeedableRng, rngs::StdRng};

use super::{BackIter, FrontIter, Mode, Model, ParamsId, TensorSpec, layers::Layer};
use crate::{TrainErr, device::Device, error::Result};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
///
/// Owns the flat parameter buffer of all its layers and the gradient buffer of the same
/// length.
pub struct Sequential {
    layers: Vec<Layer>,
    params: Vec<f32>,
    grad: Vec<f32>,
    mode: Mode,
    device: Device,
    id: ParamsId,
}

impl Sequential {
    /// Creates a new `Sequential` with freshly initialized parameters.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    /// * `seed` - Seed of the parameter initialization.
    ///
    /// # Returns
    /// A new `Sequential` in training mode or an error if any layer fails to initialize.
    pub fn new<I>(layers: I, seed: u64) -> Result<Self>
    where
        I: IntoIterator<Item = Layer>,
    {
        let layers: Vec<Layer> = layers.into_iter().collect();
        let size = layers.iter().map(Layer::size).sum();
        let mut params = vec![0.; size];
        let mut rng = StdRng::seed_from_u64(seed);

        let mut rest = params.as_mut_slice();
        for layer in &layers {
            let (head, tail) = rest.split_at_mut(layer.size());
            layer.init(head, &mut rng)?;
            rest = tail;
        }

        Ok(Self {
            layers,
            params,
            grad: vec![0.; size],
            mode: Mode::default(),
            device: Device::default(),
            id: ParamsId::next(),
        })
    }

    /// Returns the amount of layers.
    pub fn depth(&self) -> usize {
        self.layers.len()
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.params.len()
    }

    fn params_id(&self) -> ParamsId {
        self.id
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn device(&self) -> Device {
        self.device
    }

    fn to_device(&mut self, device: Device) {
        self.device = device;
    }

    fn forward(&mut self, x: ArrayView4<f32>) -> Result<Array2<f32>> {
        let mut front = FrontIter::new(&self.params);
        let mut x = x.to_owned().into_dyn();

        for layer in self.layers.iter_mut() {
            let params = front.take(layer.size())?;
            x = layer.forward(params, x, self.mode)?;
        }

        Ok(x.into_dimensionality::<Ix2>()?)
    }

    fn backward(&mut self, d: Array2<f32>) -> Result<()> {
        if !self.mode.tracks_gradients() {
            return Err(TrainErr::GradientsDisabled);
        }

        let mut back = BackIter::new(&self.params, &mut self.grad);
        let mut d = d.into_dyn();

        for layer in self.layers.iter_mut().rev() {
            let (params, grad) = back.take(layer.size())?;
            d = layer.backward(params, grad, d)?;
        }

        Ok(())
    }

    fn params(&self) -> &[f32] {
        &self.params
    }

    fn params_and_grad(&mut self) -> (&mut [f32], &mut [f32]) {
        (&mut self.params, &mut self.grad)
    }

    fn tensors(&self) -> Vec<TensorSpec> {
        self.layers
            .iter()
            .enumerate()
            .flat_map(|(i, layer)| layer.tensors(&format!("layers.{i}")))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array4, array};

    fn tiny(seed: u64) -> Sequential {
        Sequential::new(
            [
                Layer::conv2d(1, 2, 3, 1, 1).unwrap(),
                Layer::relu(),
                Layer::max_pool(),
                Layer::flatten(),
                Layer::dense((2 * 2 * 2, 3)),
            ],
            seed,
        )
        .unwrap()
    }

    #[test]
    fn forward_yields_one_row_of_scores_per_image() {
        let mut model = tiny(1);
        let x = Array4::<f32>::ones((5, 1, 4, 4));

        let scores = model.forward(x.view()).unwrap();

        assert_eq!(scores.dim(), (5, 3));
        assert_eq!(model.size(), (2 * 9 + 2) + (8 + 1) * 3);
    }

    #[test]
    fn same_seed_same_parameters() {
        assert_eq!(tiny(4).params(), tiny(4).params());
        assert_ne!(tiny(4).params(), tiny(5).params());
    }

    #[test]
    fn every_model_has_its_own_identity() {
        assert_ne!(tiny(1).params_id(), tiny(1).params_id());
    }

    #[test]
    fn backward_is_refused_in_evaluation_mode() {
        let mut model = tiny(1);
        model.set_mode(Mode::Evaluation);
        let x = Array4::<f32>::ones((1, 1, 4, 4));
        model.forward(x.view()).unwrap();

        assert!(matches!(
            model.backward(Array2::zeros((1, 3))),
            Err(TrainErr::GradientsDisabled)
        ));
    }

    #[test]
    fn backward_accumulates_and_zero_grad_clears() {
        let mut model = Sequential::new([Layer::flatten(), Layer::dense((2, 1))], 0).unwrap();
        let x = array![[[[1., 2.]]]];

        for _ in 0..2 {
            model.forward(x.view()).unwrap();
            model.backward(array![[1.]]).unwrap();
        }
        assert_eq!(model.params_and_grad().1, [2., 4., 2.]);

        model.zero_grad();
        assert!(model.params_and_grad().1.iter().all(|&g| g == 0.));
    }

    #[test]
    fn tensor_names_follow_layer_positions() {
        let names: Vec<_> = tiny(0).tensors().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            [
                "layers.0.weight",
                "layers.0.bias",
                "layers.4.weight",
                "layers.4.bias"
            ]
        );
    }
}
