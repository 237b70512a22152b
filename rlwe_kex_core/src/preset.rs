use serde::{Deserialize, Serialize};

use crate::error::KexError;
use crate::ring::{DEFAULT_BOUND, RingParams};
use crate::sampler::{Sampler, StructuralRange};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterSet {
    /// `q = 1543, n = 16, b = 3`.
    Compact,
    /// `q = 3079, n = 32, b = 5`.
    Reference,
    /// `q = 12289, n = 64, b = 5`.
    Wide,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KexPreset {
    pub set: ParameterSet,
    pub params: RingParams,
    pub structural_range: StructuralRange,
}

impl KexPreset {
    pub fn sampler(&self) -> Sampler {
        Sampler::new(self.params).with_range(self.structural_range)
    }

    /// Replaces individual ring parameters, re-validating the result.
    pub fn with_overrides(
        mut self,
        modulus: Option<i64>,
        degree: Option<usize>,
        bound: Option<i64>,
    ) -> Result<Self, KexError> {
        self.params = RingParams::new(
            modulus.unwrap_or(self.params.modulus),
            degree.unwrap_or(self.params.degree),
            bound.unwrap_or(self.params.bound),
        )?;
        Ok(self)
    }

    pub fn with_structural_range(mut self, range: StructuralRange) -> Self {
        self.structural_range = range;
        self
    }
}

const PRESET_COMPACT: KexPreset = KexPreset {
    set: ParameterSet::Compact,
    params: RingParams {
        modulus: 1543,
        degree: 16,
        bound: 3,
    },
    structural_range: StructuralRange::Inclusive,
};

const PRESET_REFERENCE: KexPreset = KexPreset {
    set: ParameterSet::Reference,
    params: RingParams {
        modulus: 3079,
        degree: 32,
        bound: DEFAULT_BOUND,
    },
    structural_range: StructuralRange::Inclusive,
};

const PRESET_WIDE: KexPreset = KexPreset {
    set: ParameterSet::Wide,
    params: RingParams {
        modulus: 12289,
        degree: 64,
        bound: DEFAULT_BOUND,
    },
    structural_range: StructuralRange::Inclusive,
};

static ALL_PRESETS: [KexPreset; 3] = [PRESET_COMPACT, PRESET_REFERENCE, PRESET_WIDE];

pub fn kex_preset(set: ParameterSet) -> KexPreset {
    match set {
        ParameterSet::Compact => PRESET_COMPACT,
        ParameterSet::Reference => PRESET_REFERENCE,
        ParameterSet::Wide => PRESET_WIDE,
    }
}

pub fn all_presets() -> &'static [KexPreset] {
    &ALL_PRESETS
}
