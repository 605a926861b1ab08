//! Aggregation over stored per-event values.
//!
//! These functions hold no state. Stores call them after every append so
//! derived values are always recomputed from the full persisted sequence,
//! never patched incrementally.

/// Arithmetic mean of `values`, or `0.0` for an empty slice.
///
/// Summation runs in slice order, so the same sequence always yields the
/// same bits.
pub fn mean(values: &[f64]) -> f64 {
  if values.is_empty() {
    return 0.0;
  }
  let sum = values.iter().fold(0.0_f64, |acc, v| acc + v);
  sum / values.len() as f64
}

/// Number of recorded events.
pub fn count<T>(values: &[T]) -> u64 { values.len() as u64 }

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mean_of_empty_is_zero() {
    assert_eq!(mean(&[]), 0.0);
  }

  #[test]
  fn mean_of_single_value() {
    assert_eq!(mean(&[3.0]), 3.0);
  }

  #[test]
  fn mean_of_pair() {
    assert_eq!(mean(&[1.0, 5.0]), 3.0);
  }

  #[test]
  fn mean_is_bit_identical_across_runs() {
    let values = [4.1, 2.7, 3.3, 1.9, 5.0, 4.4, 2.2];
    let first = mean(&values).to_bits();
    for _ in 0..10 {
      assert_eq!(mean(&values).to_bits(), first);
    }
  }

  #[test]
  fn mean_sums_in_append_order() {
    let values = [0.1, 0.2, 0.3, 4.0];
    let expected = (((0.1 + 0.2) + 0.3) + 4.0) / 4.0;
    assert_eq!(mean(&values).to_bits(), f64::to_bits(expected));
  }

  #[test]
  fn count_reports_length() {
    assert_eq!(count::<u8>(&[]), 0);
    assert_eq!(count(&["a", "b", "c"]), 3);
  }
}
