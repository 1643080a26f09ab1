use rand::Rng;

use crate::encoder::is_sampled;

/// Decides whether a sample taken at `sample_rate` should be delivered.
///
/// Full-rate samples are always delivered without touching the generator. Otherwise, a uniform value in `[0, 1)` is
/// drawn and the sample is delivered if that value is at or below the rate.
pub(crate) fn accept<R>(rng: &mut R, sample_rate: f64) -> bool
where
    R: Rng + ?Sized,
{
    if !is_sampled(sample_rate) {
        return true;
    }

    rng.random::<f64>() <= sample_rate
}

/// Decides whether a sample should be delivered, using the calling thread's generator.
pub(crate) fn should_deliver(sample_rate: f64) -> bool {
    accept(&mut rand::rng(), sample_rate)
}
