/// The phase a model is operating in.
///
/// Every layer reads the mode on its forward pass: in `Training` activations are cached for
/// the backward pass and dropout is active, in `Evaluation` nothing is cached, dropout is the
/// identity and backward passes are refused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    #[default]
    Training,
    Evaluation,
}

impl Mode {
    /// Whether forward passes in this mode keep what's needed to compute gradients.
    pub fn tracks_gradients(self) -> bool {
        matches!(self, Mode::Training)
    }
}
