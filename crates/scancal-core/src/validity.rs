//! Validity of images, camera pairs and calibration sets.
//!
//! Pair validity is derived, never assigned: it is a pure function of the
//! two images' validity and whether their files exist when evaluated.
//!
//! | Precedence | Condition                               | Pair         |
//! |------------|-----------------------------------------|--------------|
//! | 1          | left or right image not in the set      | `Uncaptured` |
//! | 2          | left or right image file absent on disk | `Missing`    |
//! | 3          | either image `Invalid`                  | `Invalid`    |
//! | 4          | both images `Valid`                     | `Valid`      |
//! | 5          | otherwise                               | `Pending`    |

use std::fmt;

use serde::{Deserialize, Serialize};

/// Calibration readiness of an image, pair or set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Validity {
    /// File absent on disk.
    Missing,
    /// File present, content not yet validated.
    #[default]
    Pending,
    Valid,
    Invalid,
    /// Image not part of the set definition (pairs only).
    Uncaptured,
}

impl Validity {
    /// Whether a pair in this state has both images available for preview.
    pub fn is_selectable(self) -> bool {
        !matches!(self, Validity::Missing | Validity::Uncaptured)
    }
}

impl fmt::Display for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Validity::Missing => "missing",
            Validity::Pending => "pending",
            Validity::Valid => "valid",
            Validity::Invalid => "invalid",
            Validity::Uncaptured => "uncaptured",
        };
        f.write_str(label)
    }
}

/// What the state machine knows about one image at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageObservation {
    pub validity: Validity,
    pub file_exists: bool,
}

/// Filesystem existence check used during evaluation.
pub trait ImageProbe: Send + Sync {
    fn image_exists(&self, set_name: &str, file_name: &str) -> bool;
}

/// Validity of a pair given its two images (`None` = not in the set).
pub fn pair_validity(left: Option<ImageObservation>, right: Option<ImageObservation>) -> Validity {
    let (Some(left), Some(right)) = (left, right) else {
        return Validity::Uncaptured;
    };
    if !left.file_exists || !right.file_exists {
        return Validity::Missing;
    }
    match (left.validity, right.validity) {
        (Validity::Invalid, _) | (_, Validity::Invalid) => Validity::Invalid,
        (Validity::Valid, Validity::Valid) => Validity::Valid,
        _ => Validity::Pending,
    }
}

/// Overall status of a set from its pair vector.
///
/// Any `Invalid` pair wins regardless of position. `Missing` and `Uncaptured`
/// pairs are ignored; a set with nothing else rolls up to `Pending`.
pub fn roll_up(pairs: &[Validity]) -> Validity {
    let mut overall = Validity::Missing;
    for pair in pairs {
        match pair {
            Validity::Invalid => return Validity::Invalid,
            Validity::Pending => overall = Validity::Pending,
            Validity::Valid => {
                if overall != Validity::Pending {
                    overall = Validity::Valid;
                }
            }
            Validity::Missing | Validity::Uncaptured => continue,
        }
    }
    match overall {
        Validity::Valid => Validity::Valid,
        _ => Validity::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMAGE_STATES: [Validity; 4] = [
        Validity::Missing,
        Validity::Pending,
        Validity::Valid,
        Validity::Invalid,
    ];

    fn obs(validity: Validity, file_exists: bool) -> Option<ImageObservation> {
        Some(ImageObservation {
            validity,
            file_exists,
        })
    }

    /// Reference table written out case by case.
    fn expected(left: Option<ImageObservation>, right: Option<ImageObservation>) -> Validity {
        match (left, right) {
            (None, _) | (_, None) => Validity::Uncaptured,
            (Some(l), Some(r)) if !l.file_exists || !r.file_exists => Validity::Missing,
            (Some(l), Some(r))
                if l.validity == Validity::Invalid || r.validity == Validity::Invalid =>
            {
                Validity::Invalid
            }
            (Some(l), Some(r))
                if l.validity == Validity::Valid && r.validity == Validity::Valid =>
            {
                Validity::Valid
            }
            _ => Validity::Pending,
        }
    }

    #[test]
    fn pair_rule_is_total() {
        let mut sides: Vec<Option<ImageObservation>> = vec![None];
        for state in IMAGE_STATES {
            sides.push(obs(state, true));
            sides.push(obs(state, false));
        }

        let mut checked = 0;
        for &left in &sides {
            for &right in &sides {
                assert_eq!(
                    pair_validity(left, right),
                    expected(left, right),
                    "left={left:?} right={right:?}"
                );
                checked += 1;
            }
        }
        assert_eq!(checked, 81);
    }

    #[test]
    fn pair_rule_spot_checks() {
        assert_eq!(pair_validity(None, obs(Validity::Valid, true)), Validity::Uncaptured);
        // uncaptured outranks a missing file on the other side
        assert_eq!(pair_validity(obs(Validity::Valid, false), None), Validity::Uncaptured);
        // a missing file outranks an invalid image
        assert_eq!(
            pair_validity(obs(Validity::Invalid, true), obs(Validity::Valid, false)),
            Validity::Missing
        );
        assert_eq!(
            pair_validity(obs(Validity::Invalid, true), obs(Validity::Pending, true)),
            Validity::Invalid
        );
        assert_eq!(
            pair_validity(obs(Validity::Valid, true), obs(Validity::Valid, true)),
            Validity::Valid
        );
        assert_eq!(
            pair_validity(obs(Validity::Valid, true), obs(Validity::Pending, true)),
            Validity::Pending
        );
        // stale Missing state with the file now present is treated as pending
        assert_eq!(
            pair_validity(obs(Validity::Missing, true), obs(Validity::Valid, true)),
            Validity::Pending
        );
    }

    #[test]
    fn rollup_examples() {
        use Validity::*;
        assert_eq!(roll_up(&[Valid, Pending]), Pending);
        assert_eq!(roll_up(&[Pending, Valid]), Pending);
        assert_eq!(roll_up(&[Valid, Invalid]), Invalid);
        assert_eq!(roll_up(&[Invalid, Valid]), Invalid);
        assert_eq!(roll_up(&[Pending, Invalid, Valid]), Invalid);
        assert_eq!(roll_up(&[Missing, Uncaptured]), Pending);
        assert_eq!(roll_up(&[Valid, Missing, Valid]), Valid);
        assert_eq!(roll_up(&[]), Pending);
    }

    #[test]
    fn selectable_excludes_absent_pairs() {
        assert!(Validity::Pending.is_selectable());
        assert!(Validity::Invalid.is_selectable());
        assert!(!Validity::Missing.is_selectable());
        assert!(!Validity::Uncaptured.is_selectable());
    }
}
