//! Algorithms for uniform random sampling without replacement. These are written to be generic
//! over the container type so household member lists and population index ranges share them.

use crate::rand::seq::index::sample as choose_range;
use crate::rand::Rng;

/// Sample multiple random elements uniformly without replacement from a container of known
/// length. If more samples are requested than there are elements, every element is returned
/// (in random order of selection, then container order).
///
/// We do not assume the container is randomly indexable, only that it can be iterated over.
pub fn sample_multiple_from_known_length<I, R, T>(rng: &mut R, iter: I, requested: usize) -> Vec<T>
where
    R: Rng,
    I: IntoIterator<Item = T>,
    I::IntoIter: ExactSizeIterator,
{
    let iter = iter.into_iter();
    let requested = requested.min(iter.len());
    if requested == 0 {
        return Vec::new();
    }
    let mut indexes = Vec::with_capacity(requested);
    indexes.extend(choose_range(rng, iter.len(), requested));
    indexes.sort_unstable();
    let mut index_iterator = indexes.into_iter();
    let mut next_idx = index_iterator.next();
    let mut selected = Vec::with_capacity(requested);

    for (idx, item) in iter.enumerate() {
        if Some(idx) == next_idx {
            selected.push(item);
            next_idx = index_iterator.next();
            if next_idx.is_none() {
                break;
            }
        }
    }

    selected
}

/// Sample `requested` distinct indexes uniformly from `0..length`, skipping `excluded`. The
/// result is capped at `length - 1` when `excluded` is in range.
///
/// Used to draw contacts from the whole population without materializing the candidate list.
pub fn sample_indexes_excluding<R: Rng>(
    rng: &mut R,
    length: usize,
    excluded: usize,
    requested: usize,
) -> Vec<usize> {
    let pool = if excluded < length { length - 1 } else { length };
    let requested = requested.min(pool);
    if requested == 0 {
        return Vec::new();
    }
    choose_range(rng, pool, requested)
        .into_iter()
        .map(|idx| {
            if excluded < length && idx >= excluded {
                idx + 1
            } else {
                idx
            }
        })
        .collect()
}
