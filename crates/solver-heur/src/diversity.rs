use std::collections::BTreeSet;

use types::SchedulingSolution;

/// Most solutions a diversified set keeps.
pub const MAX_DIVERSE_SOLUTIONS: usize = 5;

/// `1 - identical / sections`, over the sections either solution schedules.
/// A section counts as identical when both bind it to the same teacher, room
/// and slot.
pub fn solution_difference(a: &SchedulingSolution, b: &SchedulingSolution) -> f64 {
    let sections: BTreeSet<_> = a
        .assignments()
        .iter()
        .chain(b.assignments())
        .map(|x| x.section_id)
        .collect();
    if sections.is_empty() {
        return 0.0;
    }
    let identical = sections
        .iter()
        .filter(|&&s| match (a.for_section(s).next(), b.for_section(s).next()) {
            (Some(x), Some(y)) => x.same_binding(y),
            _ => false,
        })
        .count();
    1.0 - identical as f64 / sections.len() as f64
}

/// Mean pairwise difference. Fewer than two solutions count as fully diverse.
pub fn average_difference(solutions: &[&SchedulingSolution]) -> f64 {
    let mut total = 0.0;
    let mut pairs = 0usize;
    for (i, a) in solutions.iter().enumerate() {
        for b in &solutions[i + 1..] {
            total += solution_difference(a, b);
            pairs += 1;
        }
    }
    if pairs == 0 {
        1.0
    } else {
        total / pairs as f64
    }
}

/// Greedy max-min selection. The first candidate is always kept; each next
/// pick is the one farthest from everything kept so far, and selection stops
/// once that distance no longer exceeds `min_difference`.
pub fn diversify(
    candidates: Vec<SchedulingSolution>,
    min_difference: f64,
    requested: usize,
) -> Vec<SchedulingSolution> {
    let cap = requested.min(MAX_DIVERSE_SOLUTIONS);
    let mut pool = candidates;
    if pool.is_empty() || cap == 0 {
        return Vec::new();
    }
    let mut kept = vec![pool.remove(0)];
    while kept.len() < cap && !pool.is_empty() {
        let (pos, distance) = pool
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let nearest = kept
                    .iter()
                    .map(|k| solution_difference(c, k))
                    .fold(f64::INFINITY, f64::min);
                (i, nearest)
            })
            .fold((0, f64::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best });
        if distance <= min_difference {
            break;
        }
        kept.push(pool.swap_remove(pos));
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use sched_core::testing::{raw, Fixture};

    #[test]
    fn difference_counts_identical_sections() {
        let p = Fixture::new().sections(4).teachers(2).classrooms(2).timeslots(4).build();
        let a = raw(&p, &[(1, 1, 1, 1), (2, 2, 2, 1), (3, 1, 1, 2), (4, 2, 2, 2)]);
        let b = raw(&p, &[(1, 1, 1, 1), (2, 2, 2, 1), (3, 1, 1, 3), (4, 2, 1, 2)]);
        assert_eq!(solution_difference(&a, &a), 0.0);
        assert!((solution_difference(&a, &b) - 0.5).abs() < 1e-9);

        let partial = raw(&p, &[(1, 1, 1, 1)]);
        assert!((solution_difference(&a, &partial) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn diversify_drops_near_duplicates_and_caps() {
        let p = Fixture::new().sections(2).teachers(2).classrooms(2).timeslots(8).build();
        let mut candidates = Vec::new();
        for slot in 1..=8u32 {
            candidates.push(raw(&p, &[(1, 1, 1, slot), (2, 2, 2, slot)]));
            candidates.push(raw(&p, &[(1, 1, 1, slot), (2, 2, 2, slot)]));
        }
        let kept = diversify(candidates.clone(), 0.1, 10);
        assert_eq!(kept.len(), MAX_DIVERSE_SOLUTIONS);
        for (i, a) in kept.iter().enumerate() {
            for b in &kept[i + 1..] {
                assert!(solution_difference(a, b) > 0.1);
            }
        }
        assert_eq!(diversify(candidates, 0.1, 2).len(), 2);
    }

    #[test]
    fn identical_candidates_collapse_to_one() {
        let p = Fixture::new().sections(1).teachers(1).classrooms(1).timeslots(1).build();
        let s = raw(&p, &[(1, 1, 1, 1)]);
        let kept = diversify(vec![s.clone(), s.clone(), s], 0.1, 3);
        assert_eq!(kept.len(), 1);
        assert_eq!(average_difference(&[&kept[0]]), 1.0);
    }
}
