use serde::{Deserialize, Serialize};

use crate::binfhe::BinFheParamSet;
use crate::error::{EngineError, EngineResult};
use crate::params::SecurityLevel;

/// Largest modulus the CKKS-to-FHEW extraction may target
pub const MAX_LARGE_PREC_MOD_BITS: u32 = 60;

/// Configuration of the CKKS/FHEW bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchSwchParams {
    pub security_level_ckks: SecurityLevel,
    pub security_level_fhew: BinFheParamSet,
    /// Slots of the CKKS ciphertexts crossing the bridge; 0 means all
    pub num_slots_ckks: u32,
    /// Values extracted or compared; 0 means `num_slots_ckks`
    pub num_values: u32,
    /// Bits of the large-precision LWE modulus `Q`
    pub ctxt_mod_size_fhew_large_prec: u32,
    pub compute_argmin: bool,
    pub use_alt_argmin: bool,
    pub arbitrary_function_evaluation: bool,
    pub one_hot_encoding: bool,
}

impl Default for SchSwchParams {
    fn default() -> Self {
        SchSwchParams {
            security_level_ckks: SecurityLevel::Std128Classic,
            security_level_fhew: BinFheParamSet::Std128,
            num_slots_ckks: 0,
            num_values: 0,
            ctxt_mod_size_fhew_large_prec: 25,
            compute_argmin: false,
            use_alt_argmin: false,
            arbitrary_function_evaluation: false,
            one_hot_encoding: true,
        }
    }
}

impl SchSwchParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_security_level_ckks(&mut self, level: SecurityLevel) {
        self.security_level_ckks = level;
    }

    /// Only the classic FHEW presets (TOY through STD256Q_4) are accepted
    pub fn set_security_level_fhew(&mut self, preset: BinFheParamSet) -> EngineResult<()> {
        if !preset.is_classic() {
            return Err(EngineError::InvalidParameter(format!(
                "{preset:?} is not a FHEW preset usable for scheme switching"
            )));
        }
        self.security_level_fhew = preset;
        Ok(())
    }

    pub fn set_num_slots_ckks(&mut self, slots: u32) -> EngineResult<()> {
        if slots != 0 && !slots.is_power_of_two() {
            return Err(EngineError::InvalidParameter(format!(
                "CKKS slot count {slots} must be zero or a power of two"
            )));
        }
        self.num_slots_ckks = slots;
        Ok(())
    }

    pub fn set_num_values(&mut self, values: u32) {
        self.num_values = values;
    }

    pub fn set_ctxt_mod_size_fhew_large_prec(&mut self, bits: u32) -> EngineResult<()> {
        if !(2..=MAX_LARGE_PREC_MOD_BITS).contains(&bits) {
            return Err(EngineError::OutOfRange(format!(
                "large-precision modulus size {bits} (expected 2..={MAX_LARGE_PREC_MOD_BITS})"
            )));
        }
        self.ctxt_mod_size_fhew_large_prec = bits;
        Ok(())
    }

    pub fn set_compute_argmin(&mut self, on: bool) {
        self.compute_argmin = on;
    }

    pub fn set_use_alt_argmin(&mut self, on: bool) {
        self.use_alt_argmin = on;
    }

    pub fn set_arbitrary_function_evaluation(&mut self, on: bool) {
        self.arbitrary_function_evaluation = on;
    }

    pub fn set_one_hot_encoding(&mut self, on: bool) {
        self.one_hot_encoding = on;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = SchSwchParams::new();
        assert!(p.one_hot_encoding);
        assert_eq!(p.ctxt_mod_size_fhew_large_prec, 25);
        assert_eq!(p.security_level_fhew, BinFheParamSet::Std128);
    }

    #[test]
    fn test_rejects_non_classic_fhew_preset() {
        let mut p = SchSwchParams::new();
        assert!(p.set_security_level_fhew(BinFheParamSet::Toy).is_ok());
        assert!(p
            .set_security_level_fhew(BinFheParamSet::Std128Lmkcdey)
            .is_err());
        assert_eq!(p.security_level_fhew, BinFheParamSet::Toy);
    }

    #[test]
    fn test_slot_and_modulus_ranges() {
        let mut p = SchSwchParams::new();
        assert!(p.set_num_slots_ckks(6).is_err());
        assert!(p.set_num_slots_ckks(8).is_ok());
        assert!(p.set_ctxt_mod_size_fhew_large_prec(61).is_err());
        assert!(p.set_ctxt_mod_size_fhew_large_prec(20).is_ok());
    }
}
