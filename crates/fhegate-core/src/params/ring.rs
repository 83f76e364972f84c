//! Ring dimension selection from the HE security standard tables

use super::enums::SecurityLevel;
use crate::error::{EngineError, EngineResult};

const MIN_RING_DIM: u64 = 16;
const MAX_RING_DIM: u64 = 1 << 17;

/// Ring dimensions covered by the tables, smallest first
const DIMS: [u64; 8] = [1024, 2048, 4096, 8192, 16384, 32768, 65536, 131072];

/// Largest log2(Q*P) allowed per ring dimension, indexed like [`DIMS`]
fn max_log_q(level: SecurityLevel) -> Option<&'static [u32; 8]> {
    match level {
        SecurityLevel::Std128Classic => Some(&[27, 54, 109, 218, 438, 881, 1772, 3544]),
        SecurityLevel::Std192Classic => Some(&[19, 37, 75, 152, 305, 611, 1228, 2456]),
        SecurityLevel::Std256Classic => Some(&[14, 29, 58, 118, 237, 476, 956, 1912]),
        SecurityLevel::Std128Quantum => Some(&[25, 51, 101, 202, 411, 827, 1658, 3316]),
        SecurityLevel::Std192Quantum => Some(&[17, 35, 70, 141, 284, 571, 1145, 2290]),
        SecurityLevel::Std256Quantum => Some(&[13, 27, 54, 109, 220, 443, 889, 1778]),
        SecurityLevel::NotSet => None,
    }
}

/// Smallest ring dimension that keeps `log_q` bits of modulus secure
pub fn min_secure_ring_dim(level: SecurityLevel, log_q: u32) -> EngineResult<Option<u64>> {
    let Some(table) = max_log_q(level) else {
        return Ok(None);
    };
    DIMS.iter()
        .zip(table.iter())
        .find(|(_, &max)| log_q <= max)
        .map(|(&dim, _)| Some(dim))
        .ok_or_else(|| {
            EngineError::InvalidParameter(format!(
                "no ring dimension up to {MAX_RING_DIM} supports {log_q} modulus bits at {level:?}"
            ))
        })
}

/// Resolve the ring dimension for a parameter set
///
/// An explicit dimension is validated against the security table; zero
/// means derive one. `min_for_slots` is the smallest dimension that still
/// holds the requested batch.
pub fn resolve_ring_dim(
    level: SecurityLevel,
    explicit: u64,
    log_q: u32,
    min_for_slots: u64,
) -> EngineResult<u64> {
    let secure = min_secure_ring_dim(level, log_q)?;

    if explicit != 0 {
        if !explicit.is_power_of_two() || !(MIN_RING_DIM..=MAX_RING_DIM).contains(&explicit) {
            return Err(EngineError::InvalidParameter(format!(
                "ring dimension {explicit} must be a power of two in {MIN_RING_DIM}..={MAX_RING_DIM}"
            )));
        }
        if let Some(secure) = secure {
            if explicit < secure {
                return Err(EngineError::InvalidParameter(format!(
                    "ring dimension {explicit} is below the secure minimum {secure} for {log_q} modulus bits at {level:?}"
                )));
            }
        }
        if explicit < min_for_slots {
            return Err(EngineError::InvalidParameter(format!(
                "ring dimension {explicit} cannot hold the requested batch"
            )));
        }
        return Ok(explicit);
    }

    let floor = min_for_slots.max(MIN_RING_DIM).next_power_of_two();
    let dim = secure.map_or(floor, |s| s.max(floor));
    if dim > MAX_RING_DIM {
        return Err(EngineError::InvalidParameter(format!(
            "batch needs ring dimension {dim}, above the maximum {MAX_RING_DIM}"
        )));
    }
    Ok(dim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_dim_grows_with_modulus() {
        let small = min_secure_ring_dim(SecurityLevel::Std128Classic, 100).unwrap();
        let large = min_secure_ring_dim(SecurityLevel::Std128Classic, 400).unwrap();
        assert_eq!(small, Some(4096));
        assert_eq!(large, Some(16384));
    }

    #[test]
    fn test_not_set_uses_batch() {
        let dim = resolve_ring_dim(SecurityLevel::NotSet, 0, 10_000, 16).unwrap();
        assert_eq!(dim, 16);
        let dim = resolve_ring_dim(SecurityLevel::NotSet, 0, 10_000, 24).unwrap();
        assert_eq!(dim, 32);
    }

    #[test]
    fn test_explicit_dim_validated() {
        assert!(resolve_ring_dim(SecurityLevel::NotSet, 1000, 100, 1).is_err());
        assert!(resolve_ring_dim(SecurityLevel::Std128Classic, 1024, 400, 1).is_err());
        assert_eq!(
            resolve_ring_dim(SecurityLevel::NotSet, 4096, 400, 1).unwrap(),
            4096
        );
    }

    #[test]
    fn test_modulus_too_large() {
        assert!(min_secure_ring_dim(SecurityLevel::Std256Classic, 5000).is_err());
    }
}
