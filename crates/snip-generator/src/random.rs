use crate::error::GeneratorError;
use crate::Generator;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use snip_core::shortcode::{MAX_LENGTH, MIN_LENGTH};
use snip_core::ShortCode;
use std::collections::HashSet;
use typed_builder::TypedBuilder;

/// Upper and lower case ASCII letters plus digits, 62 distinct characters.
pub const DEFAULT_ALPHABET: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Clone, TypedBuilder)]
pub struct RandomGeneratorSettings {
    /// Number of characters in every generated code. Must be a length
    /// [`ShortCode::new`] accepts, so every generated code can be resolved.
    #[builder(default = 7)]
    length: usize,
    /// Characters to draw from. Must be non-empty, duplicate-free and limited
    /// to characters valid in a short code.
    #[builder(default = DEFAULT_ALPHABET.to_string(), setter(into))]
    alphabet: String,
}

impl Default for RandomGeneratorSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Produces fixed-length codes with each character drawn independently and
/// uniformly from the configured alphabet.
///
/// The random source belongs to the generator instance, so a seeded
/// generator is fully deterministic.
pub struct RandomGenerator<R = StdRng> {
    rng: Mutex<R>,
    alphabet: Box<[u8]>,
    length: usize,
}

impl RandomGenerator<StdRng> {
    /// Creates a generator seeded from the operating system.
    pub fn new(settings: RandomGeneratorSettings) -> Result<Self, GeneratorError> {
        Self::with_rng(settings, StdRng::from_entropy())
    }

    /// Creates a deterministic generator from a fixed seed.
    pub fn seeded(settings: RandomGeneratorSettings, seed: u64) -> Result<Self, GeneratorError> {
        Self::with_rng(settings, StdRng::seed_from_u64(seed))
    }
}

impl<R: RngCore> RandomGenerator<R> {
    /// Creates a generator drawing from the given random source.
    pub fn with_rng(settings: RandomGeneratorSettings, rng: R) -> Result<Self, GeneratorError> {
        if !(MIN_LENGTH..=MAX_LENGTH).contains(&settings.length) {
            return Err(GeneratorError::InvalidLength {
                length: settings.length,
                min: MIN_LENGTH,
                max: MAX_LENGTH,
            });
        }
        let alphabet = validate_alphabet(&settings.alphabet)?;

        Ok(Self {
            rng: Mutex::new(rng),
            alphabet,
            length: settings.length,
        })
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn alphabet(&self) -> &[u8] {
        &self.alphabet
    }

    /// Draws the next candidate code.
    pub fn next_candidate(&self) -> ShortCode {
        let mut rng = self.rng.lock();
        let code: String = (0..self.length)
            .map(|_| self.alphabet[rng.gen_range(0..self.alphabet.len())] as char)
            .collect();
        ShortCode::new_unchecked(code)
    }
}

fn validate_alphabet(alphabet: &str) -> Result<Box<[u8]>, GeneratorError> {
    if alphabet.is_empty() {
        return Err(GeneratorError::EmptyAlphabet);
    }

    let mut seen = HashSet::with_capacity(alphabet.len());
    for c in alphabet.chars() {
        if !ShortCode::is_valid_char(c) {
            return Err(GeneratorError::InvalidCharacter(c));
        }
        if !seen.insert(c) {
            return Err(GeneratorError::DuplicateCharacter(c));
        }
    }

    Ok(alphabet.as_bytes().into())
}

impl<R> std::fmt::Debug for RandomGenerator<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomGenerator")
            .field("length", &self.length)
            .field("alphabet", &String::from_utf8_lossy(&self.alphabet))
            .finish_non_exhaustive()
    }
}

impl<R: RngCore + Send + 'static> Generator for RandomGenerator<R> {
    type Output = ShortCode;

    fn generate(&self) -> Self::Output {
        self.next_candidate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn settings(length: usize) -> RandomGeneratorSettings {
        RandomGeneratorSettings::builder().length(length).build()
    }

    #[test]
    fn default_alphabet_is_62_distinct_characters() {
        let distinct: HashSet<char> = DEFAULT_ALPHABET.chars().collect();
        assert_eq!(DEFAULT_ALPHABET.len(), 62);
        assert_eq!(distinct.len(), 62);
    }

    #[test]
    fn generates_codes_of_configured_length_from_alphabet() {
        let generator = RandomGenerator::seeded(settings(9), 7).unwrap();

        for _ in 0..100 {
            let code = generator.generate();
            assert_eq!(code.len(), 9);
            assert!(code.as_str().chars().all(|c| DEFAULT_ALPHABET.contains(c)));
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let a = RandomGenerator::seeded(settings(7), 42).unwrap();
        let b = RandomGenerator::seeded(settings(7), 42).unwrap();

        let left: Vec<_> = (0..10).map(|_| a.generate()).collect();
        let right: Vec<_> = (0..10).map(|_| b.generate()).collect();
        assert_eq!(left, right);
    }

    #[test]
    fn different_seeds_diverge() {
        let a = RandomGenerator::seeded(settings(12), 1).unwrap();
        let b = RandomGenerator::seeded(settings(12), 2).unwrap();

        assert_ne!(a.generate(), b.generate());
    }

    #[test]
    fn every_character_is_reachable() {
        let generator = RandomGenerator::seeded(
            RandomGeneratorSettings::builder()
                .length(3)
                .alphabet("abcd")
                .build(),
            3,
        )
        .unwrap();

        let mut counts: HashMap<char, usize> = HashMap::new();
        for _ in 0..2_000 {
            for c in generator.generate().as_str().chars() {
                *counts.entry(c).or_default() += 1;
            }
        }

        assert_eq!(counts.len(), 4);
        // Each bucket expects 1500; a loose bound keeps this stable across seeds.
        assert!(counts.values().all(|&n| (1300..=1700).contains(&n)));
    }

    #[test]
    fn rejects_invalid_settings() {
        let err = RandomGenerator::new(settings(0)).unwrap_err();
        assert_eq!(
            err,
            GeneratorError::InvalidLength {
                length: 0,
                min: 3,
                max: 32
            }
        );

        let err = RandomGenerator::new(RandomGeneratorSettings::builder().alphabet("").build())
            .unwrap_err();
        assert_eq!(err, GeneratorError::EmptyAlphabet);

        let err = RandomGenerator::new(RandomGeneratorSettings::builder().alphabet("abca").build())
            .unwrap_err();
        assert_eq!(err, GeneratorError::DuplicateCharacter('a'));

        let err = RandomGenerator::new(RandomGeneratorSettings::builder().alphabet("abé").build())
            .unwrap_err();
        assert_eq!(err, GeneratorError::InvalidCharacter('é'));

        let err = RandomGenerator::new(RandomGeneratorSettings::builder().alphabet("ab!").build())
            .unwrap_err();
        assert_eq!(err, GeneratorError::InvalidCharacter('!'));
    }

    #[test]
    fn length_must_be_a_resolvable_code_length() {
        for length in [1, 2, 33] {
            let err = RandomGenerator::new(settings(length)).unwrap_err();
            assert!(matches!(err, GeneratorError::InvalidLength { .. }), "{length}");
        }

        for length in [3, 32] {
            let generator = RandomGenerator::seeded(settings(length), 9).unwrap();
            let code = generator.generate();
            assert_eq!(ShortCode::new(code.as_str()), Ok(code));
        }
    }

    #[test]
    fn generator_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RandomGenerator>();
    }

    #[tokio::test]
    async fn concurrent_generation() {
        let generator = Arc::new(RandomGenerator::seeded(settings(7), 11).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = Arc::clone(&generator);
                tokio::spawn(async move {
                    (0..100).map(|_| generator.generate()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut total = 0;
        for handle in handles {
            let codes = handle.await.unwrap();
            assert!(codes.iter().all(|c| c.len() == 7));
            total += codes.len();
        }
        assert_eq!(total, 800);
    }
}
