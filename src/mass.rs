//! Effective masses for reactions between two bodies.

use crate::prelude::*;

/// The parts of a [`Character`] that decide how hard it is to push.
#[derive(Clone, Copy, Reflect, Debug, PartialEq)]
pub struct MassProfile {
    pub weight: f32,
    pub bump_dampen: f32,
    pub infinite_weight: bool,
    pub hovering: bool,
}

impl From<&Character> for MassProfile {
    fn from(cfg: &Character) -> Self {
        Self {
            weight: cfg.weight,
            bump_dampen: cfg.bump_dampen,
            infinite_weight: cfg.infinite_weight,
            hovering: cfg.is_hovering(),
        }
    }
}

#[derive(Clone, Copy, Reflect, Debug, PartialEq)]
pub enum BodyMass {
    Finite(f32),
    Infinite,
}

impl BodyMass {
    pub fn is_infinite(self) -> bool {
        matches!(self, Self::Infinite)
    }
}

impl MassProfile {
    pub fn mass(&self) -> BodyMass {
        if self.hovering || self.infinite_weight || self.bump_dampen == 0.0 {
            return BodyMass::Infinite;
        }
        let mass = self.weight / self.bump_dampen;
        if mass.is_finite() {
            BodyMass::Finite(mass.max(0.0))
        } else {
            BodyMass::Infinite
        }
    }
}

/// Effective masses of `a` and `b` against each other.
///
/// Two weightless bodies both count as 1. A weightless body against a finite one dominates.
/// Swapping the arguments swaps the result.
pub fn mass_pair(a: &MassProfile, b: &MassProfile) -> (BodyMass, BodyMass) {
    match (a.mass(), b.mass()) {
        (BodyMass::Finite(wa), BodyMass::Finite(wb)) if wa == 0.0 && wb == 0.0 => {
            (BodyMass::Finite(1.0), BodyMass::Finite(1.0))
        }
        (BodyMass::Finite(wa), mb @ BodyMass::Finite(_)) if wa == 0.0 => (BodyMass::Infinite, mb),
        (ma @ BodyMass::Finite(_), BodyMass::Finite(wb)) if wb == 0.0 => (ma, BodyMass::Infinite),
        pair => pair,
    }
}

/// Share of a rider's floor acceleration that is passed back into its platform.
pub fn reaction_share(rider: &MassProfile, platform: &MassProfile) -> f32 {
    match mass_pair(rider, platform) {
        (_, BodyMass::Infinite) => 0.0,
        (BodyMass::Infinite, BodyMass::Finite(_)) => 1.0,
        (BodyMass::Finite(wr), BodyMass::Finite(wp)) => {
            let total = wr + wp;
            if total > 0.0 { wr / total } else { 0.0 }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(weight: f32, bump_dampen: f32) -> MassProfile {
        MassProfile {
            weight,
            bump_dampen,
            infinite_weight: false,
            hovering: false,
        }
    }

    #[test]
    fn pair_is_symmetric() {
        let bodies = [
            body(100.0, 0.5),
            body(0.0, 0.5),
            body(40.0, 0.0),
            MassProfile {
                hovering: true,
                ..body(10.0, 1.0)
            },
            MassProfile {
                infinite_weight: true,
                ..body(10.0, 1.0)
            },
        ];
        for a in &bodies {
            for b in &bodies {
                let (wa, wb) = mass_pair(a, b);
                let (wb2, wa2) = mass_pair(b, a);
                assert_eq!(wa, wa2, "{a:?} vs {b:?}");
                assert_eq!(wb, wb2, "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn weight_over_dampen() {
        assert_eq!(body(100.0, 0.5).mass(), BodyMass::Finite(200.0));
        assert!(body(100.0, 0.0).mass().is_infinite());
    }

    #[test]
    fn weightless_pairs() {
        let (a, b) = mass_pair(&body(0.0, 1.0), &body(0.0, 0.3));
        assert_eq!((a, b), (BodyMass::Finite(1.0), BodyMass::Finite(1.0)));

        let (a, b) = mass_pair(&body(0.0, 1.0), &body(50.0, 1.0));
        assert_eq!((a, b), (BodyMass::Infinite, BodyMass::Finite(50.0)));
    }

    #[test]
    fn reaction_share_splits_by_mass() {
        let share = reaction_share(&body(100.0, 1.0), &body(300.0, 1.0));
        assert!((share - 0.25).abs() < 1e-6);
        assert_eq!(reaction_share(&body(100.0, 1.0), &body(300.0, 0.0)), 0.0);
    }
}
