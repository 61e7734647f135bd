/// Scalar multipliers for `out = alpha * A @ B + beta * out`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GemmOptions {
    /// Scale applied to the product.
    pub alpha: f32,
    /// Scale applied to the existing contents of the output.
    pub beta: f32,
}

impl GemmOptions {
    pub fn new(alpha: f32, beta: f32) -> Self {
        GemmOptions { alpha, beta }
    }
}

impl Default for GemmOptions {
    /// Plain multiplication: `alpha = 1`, `beta = 0`.
    fn default() -> Self {
        GemmOptions {
            alpha: 1.0,
            beta: 0.0,
        }
    }
}
