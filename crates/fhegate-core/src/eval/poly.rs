use num_complex::Complex64;

use crate::ciphertext::{Ciphertext, CiphertextData};
use crate::context::CryptoContext;
use crate::error::{EngineError, EngineResult};
use crate::params::{Feature, ScalingTechnique, Scheme};
use crate::plaintext::SlotValues;

/// Levels a Paterson-Stockmeyer style evaluation of `degree` consumes
pub(crate) fn poly_depth(degree: usize) -> u32 {
    if degree == 0 {
        0
    } else {
        usize::BITS - degree.leading_zeros()
    }
}

impl CryptoContext {
    /// Evaluate `sum(coefficients[i] * x^i)` slot-wise (CKKS)
    pub fn eval_poly(&self, ct: &Ciphertext, coefficients: &[f64]) -> EngineResult<Ciphertext> {
        self.require(Feature::AdvancedShe, "EvalPoly")?;
        self.require_scheme(Scheme::Ckks, "EvalPoly")?;
        self.check_operand(ct)?;
        if coefficients.is_empty() {
            return Err(EngineError::InvalidParameter(
                "EvalPoly needs at least one coefficient".into(),
            ));
        }
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(EngineError::InvalidParameter(
                "polynomial coefficients must be finite".into(),
            ));
        }
        self.require_mult_key(ct.key_tag(), "EvalPoly")?;
        let technique = self.params().ckks().map(|p| p.scaling_technique);
        if technique == Some(ScalingTechnique::NoRescale) {
            return Err(EngineError::Fault(
                "polynomial evaluation needs rescaling, which NORESCALE disables".into(),
            ));
        }

        let data = ct.data();
        let levels = poly_depth(coefficients.len() - 1);
        let start = data.level + (data.noise_scale_degree - 1);
        let level = start + levels;
        if level > self.multiplicative_depth() {
            return Err(EngineError::Fault(format!(
                "polynomial of degree {} needs {levels} levels from level {start}, depth is {}",
                coefficients.len() - 1,
                self.multiplicative_depth()
            )));
        }

        let SlotValues::Complex(values) = &data.slots else {
            return Err(EngineError::Fault("CKKS ciphertext without complex slots".into()));
        };
        let evaluated = values
            .iter()
            .map(|&x| {
                coefficients
                    .iter()
                    .rev()
                    .fold(Complex64::new(0.0, 0.0), |acc, &c| acc * x + c)
            })
            .collect();

        Ok(Ciphertext::new(CiphertextData {
            slots: SlotValues::Complex(evaluated),
            level,
            noise_scale_degree: 1,
            depth_used: data.depth_used + levels,
            ..data.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParameterSet, SecurityLevel};

    #[test]
    fn test_poly_depth() {
        assert_eq!(poly_depth(0), 0);
        assert_eq!(poly_depth(1), 1);
        assert_eq!(poly_depth(2), 2);
        assert_eq!(poly_depth(3), 2);
        assert_eq!(poly_depth(4), 3);
        assert_eq!(poly_depth(7), 3);
    }

    #[test]
    fn test_eval_poly_values_and_depth() {
        let mut params = ParameterSet::new(Scheme::Ckks);
        params.set_security_level(SecurityLevel::NotSet);
        params.set_batch_size(8).unwrap();
        params.set_multiplicative_depth(2).unwrap();
        let cc = CryptoContext::new(params).unwrap();
        cc.enable(0x01 | 0x02 | 0x08 | 0x10).unwrap();
        let kp = cc.key_gen().unwrap();
        cc.eval_mult_key_gen(kp.private_key().unwrap()).unwrap();
        let ct = cc
            .encrypt(&kp, &cc.make_ckks_packed_plaintext(&[0.5, -1.0]).unwrap())
            .unwrap();

        // 1 + 2x + 3x^2
        let out = cc.eval_poly(&ct, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(out.level(), 2);
        let dec = cc.decrypt(kp.private_key().unwrap(), &out).unwrap();
        let v = dec.plaintext.real_packed_values().unwrap();
        assert!((v[0] - 2.75).abs() < 1e-6);
        assert!((v[1] - 2.0).abs() < 1e-6);

        assert!(matches!(
            cc.eval_poly(&ct, &[1.0, 1.0, 1.0, 1.0, 1.0]),
            Err(EngineError::Fault(_))
        ));
    }
}
