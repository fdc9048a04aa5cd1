pub mod error;
pub mod random;

pub use error::GeneratorError;
pub use random::{RandomGenerator, RandomGeneratorSettings, DEFAULT_ALPHABET};

use snip_core::ShortCode;

/// Trait for generating short codes.
///
/// Implementations are pure generators that don't interact with storage.
/// A generated candidate is not guaranteed to be unique; the caller checks
/// availability and retries on collision.
pub trait Generator: Send + Sync + 'static {
    type Output: Into<ShortCode>;

    /// Produces the next candidate code.
    fn generate(&self) -> Self::Output;
}

impl<G: Generator + ?Sized> Generator for std::sync::Arc<G> {
    type Output = G::Output;

    fn generate(&self) -> Self::Output {
        (**self).generate()
    }
}
