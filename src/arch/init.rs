use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::{TrainErr, error::Result};

/// Fills `params` using Kaiming normal initialization.
///
/// # Arguments
/// * `rng` - A random number generator.
/// * `params` - The weights to overwrite.
/// * `fan_in` - The number of input units feeding each output unit.
///
/// # Returns
/// An error if the calculated standard deviation is not finite.
pub fn kaiming<R: Rng>(rng: &mut R, params: &mut [f32], fan_in: usize) -> Result<()> {
    let std_dev = (2. / fan_in.max(1) as f32).sqrt();
    let normal = Normal::new(0., std_dev)
        .map_err(|e| TrainErr::InvalidConfig(format!("kaiming initialization: {e}")))?;

    for w in params.iter_mut() {
        *w = normal.sample(rng);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn seeded_initialization_is_reproducible() {
        let mut a = [0.; 16];
        let mut b = [0.; 16];

        kaiming(&mut StdRng::seed_from_u64(7), &mut a, 4).unwrap();
        kaiming(&mut StdRng::seed_from_u64(7), &mut b, 4).unwrap();

        assert_eq!(a, b);
        assert!(a.iter().any(|&w| w != 0.));
    }
}
