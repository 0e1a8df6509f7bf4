//! Agent privilege tier (§3, GLOSSARY).

use serde::{Deserialize, Serialize};

/// Coarse privilege/size class controlling capability auto-injection,
/// default image, and default PVC size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Legionary,
    Centurion,
    Tribune,
}

crate::simple_display! {
    Tier {
        Legionary => "legionary",
        Centurion => "centurion",
        Tribune => "tribune",
    }
}

impl Tier {
    /// Rank used for the admission policy's "maximum tier" check:
    /// legionary < centurion < tribune.
    pub fn rank(self) -> u8 {
        match self {
            Tier::Legionary => 0,
            Tier::Centurion => 1,
            Tier::Tribune => 2,
        }
    }

    /// Centurion and tribune are "agentic": they run the agentic runtime
    /// image and mount `/inbox` on the PVC to allow reincarnation (§4.5, GLOSSARY).
    pub fn is_agentic(self) -> bool {
        matches!(self, Tier::Centurion | Tier::Tribune)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "legionary" => Some(Tier::Legionary),
            "centurion" => Some(Tier::Centurion),
            "tribune" => Some(Tier::Tribune),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "tier_tests.rs"]
mod tests;
