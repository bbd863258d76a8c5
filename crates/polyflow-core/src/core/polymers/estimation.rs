use super::error::MorphologyError;
use crate::core::monomers::group::MonomerGroup;

/// Total atom count of a chain with `repeat_count` interior units plus all terminal
/// monomers of the group.
///
/// Interior units cycle through [`MonomerGroup::interior_cycle`], so a copolymer's
/// count is weighted by how often each monomer appears in the repeat sequence.
pub fn estimate_chain_atom_count(group: &MonomerGroup, repeat_count: usize) -> usize {
    let terminal: usize = group
        .templates()
        .filter(|t| t.valence() == 1)
        .map(|t| t.atom_count())
        .sum();
    let cycle = group.interior_cycle();
    if cycle.is_empty() {
        return terminal;
    }
    terminal
        + (0..repeat_count)
            .map(|i| cycle[i % cycle.len()].atom_count())
            .sum::<usize>()
}

/// Largest repeat count whose chain, including both termini, has at most
/// `max_chain_len` atoms.
///
/// # Errors
///
/// Returns [`MorphologyError::NoInteriorMonomer`] when the group has nothing to
/// repeat, and [`MorphologyError::BudgetTooSmall`] when even a single repeat unit
/// plus the termini exceeds the budget.
pub fn estimate_dop_lower(group: &MonomerGroup, max_chain_len: usize) -> Result<usize, MorphologyError> {
    let cycle = group.interior_cycle();
    if cycle.is_empty() {
        return Err(MorphologyError::NoInteriorMonomer);
    }

    let mut total = estimate_chain_atom_count(group, 0);
    let mut repeats = 0;
    loop {
        let next = cycle[repeats % cycle.len()].atom_count();
        if total + next > max_chain_len {
            break;
        }
        total += next;
        repeats += 1;
    }

    if repeats == 0 {
        return Err(MorphologyError::BudgetTooSmall {
            budget: max_chain_len,
            required: total + cycle[0].atom_count(),
        });
    }
    Ok(repeats)
}
