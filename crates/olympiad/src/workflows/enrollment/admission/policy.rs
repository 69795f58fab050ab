use std::collections::BTreeSet;

use crate::identity::Cpf;
use crate::registry::{Enrollment, EnrollmentKey, Level};

use super::config::{AdmissionPolicy, MedalistExemption};

/// Seat decision for one candidate, before anything is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SeatDecision {
    Exempt,
    Available { counted: u32 },
    Full { counted: u32 },
}

/// Seats at `level` that count against the quota: medalists are left out, as
/// is the enrollment being moved when `moving` is set.
pub(crate) fn counted_seats(
    existing: &[Enrollment],
    level: Level,
    medalists: &BTreeSet<Cpf>,
    moving: Option<&EnrollmentKey>,
) -> u32 {
    let counted = existing
        .iter()
        .filter(|enrollment| enrollment.level == level)
        .filter(|enrollment| !medalists.contains(&enrollment.student))
        .filter(|enrollment| moving.map_or(true, |key| &enrollment.key() != key))
        .count();
    u32::try_from(counted).unwrap_or(u32::MAX)
}

pub(crate) fn decide(
    policy: &AdmissionPolicy,
    candidate: &Cpf,
    medalists: &BTreeSet<Cpf>,
    counted: u32,
) -> SeatDecision {
    if policy.medalists == MedalistExemption::PriorEditionAwardees && medalists.contains(candidate)
    {
        return SeatDecision::Exempt;
    }
    if counted < policy.quota_per_level {
        SeatDecision::Available { counted }
    } else {
        SeatDecision::Full { counted }
    }
}
