//! Set arithmetic - volume, estimated one-rep max, personal records

use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// One logged set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetRecord {
    pub reps: u32,
    pub weight: f64,
}

/// Parses `REPSxWEIGHT`, e.g. `8x72.5`
impl FromStr for SetRecord {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (reps, weight) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| anyhow!("expected REPSxWEIGHT, got {s:?}"))?;
        Ok(SetRecord {
            reps: reps.trim().parse().with_context(|| format!("bad reps in {s:?}"))?,
            weight: weight.trim().parse().with_context(|| format!("bad weight in {s:?}"))?,
        })
    }
}

/// Brzycki estimate; the formula breaks down at 37+ reps, where the weight itself is returned
pub fn estimate_one_rep_max(weight: f64, reps: u32) -> f64 {
    if reps >= 37 {
        return weight;
    }
    weight * (36.0 / (37.0 - f64::from(reps)))
}

/// Total volume (reps * weight) across sets
pub fn total_volume(sets: &[SetRecord]) -> f64 {
    sets.iter().map(|s| f64::from(s.reps) * s.weight).sum()
}

/// A first result is always a record
pub fn is_personal_record(current_volume: f64, previous_best: Option<f64>) -> bool {
    match previous_best {
        Some(best) if best > 0.0 => current_volume > best,
        _ => true,
    }
}

/// Best estimated 1RM across sets
pub fn best_one_rep_max(sets: &[SetRecord]) -> Option<f64> {
    sets.iter()
        .map(|s| estimate_one_rep_max(s.weight, s.reps))
        .max_by(f64::total_cmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(reps: u32, weight: f64) -> SetRecord {
        SetRecord { reps, weight }
    }

    #[test]
    fn test_one_rep_max_single_rep() {
        assert!((estimate_one_rep_max(100.0, 1) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_one_rep_max_five_reps() {
        // 100 * 36 / 32 = 112.5
        assert!((estimate_one_rep_max(100.0, 5) - 112.5).abs() < 1e-9);
    }

    #[test]
    fn test_one_rep_max_high_reps() {
        assert_eq!(estimate_one_rep_max(40.0, 37), 40.0);
        assert_eq!(estimate_one_rep_max(40.0, 50), 40.0);
    }

    #[test]
    fn test_total_volume() {
        let sets = vec![set(10, 60.0), set(8, 70.0), set(6, 80.0)];
        // 600 + 560 + 480
        assert_eq!(total_volume(&sets), 1640.0);
    }

    #[test]
    fn test_total_volume_empty() {
        assert_eq!(total_volume(&[]), 0.0);
    }

    #[test]
    fn test_personal_record() {
        assert!(is_personal_record(500.0, None));
        assert!(is_personal_record(500.0, Some(0.0)));
        assert!(is_personal_record(501.0, Some(500.0)));
        assert!(!is_personal_record(500.0, Some(500.0)));
        assert!(!is_personal_record(400.0, Some(500.0)));
    }

    #[test]
    fn test_parse_set() {
        assert_eq!("8x72.5".parse::<SetRecord>().unwrap(), set(8, 72.5));
        assert_eq!(" 5 X 100 ".parse::<SetRecord>().unwrap(), set(5, 100.0));
        assert!("8@70".parse::<SetRecord>().is_err());
        assert!("ax70".parse::<SetRecord>().is_err());
    }

    #[test]
    fn test_best_one_rep_max() {
        assert_eq!(best_one_rep_max(&[]), None);
        let best = best_one_rep_max(&[set(1, 100.0), set(5, 100.0)]).unwrap();
        assert!((best - 112.5).abs() < 1e-9);
    }
}
