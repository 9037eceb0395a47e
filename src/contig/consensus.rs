//! Consensus calling for a single column.

use crate::sequence::GAP;

/// Calls the consensus base of one column from the bases of the reads
/// covering it. `qualities`, when given, is parallel to `bases`.
pub trait ConsensusCaller {
    fn call(&self, bases: &[u8], qualities: Option<&[u8]>) -> u8;
}

impl<F> ConsensusCaller for F
where
    F: Fn(&[u8], Option<&[u8]>) -> u8,
{
    fn call(&self, bases: &[u8], qualities: Option<&[u8]>) -> u8 {
        self(bases, qualities)
    }
}

/// Majority vote, weighted by quality when qualities are supplied.
///
/// Ties go to the first of `A C G T *` and then to the lowest byte value;
/// a column with no bases is called `N`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MostFrequentBase;

const PREFERRED: [u8; 5] = [b'A', b'C', b'G', b'T', GAP];

impl ConsensusCaller for MostFrequentBase {
    fn call(&self, bases: &[u8], qualities: Option<&[u8]>) -> u8 {
        let mut votes = [0u64; 256];
        for (i, &b) in bases.iter().enumerate() {
            let weight = match qualities {
                Some(q) => q.get(i).copied().unwrap_or(0) as u64,
                None => 1,
            };
            votes[b.to_ascii_uppercase() as usize] += weight;
        }

        let others = (0..=255u8).filter(|b| !PREFERRED.contains(b));
        PREFERRED
            .into_iter()
            .chain(others)
            .fold(None, |best: Option<(u8, u64)>, b| {
                let v = votes[b as usize];
                match best {
                    Some((_, bv)) if bv >= v => best,
                    _ if v > 0 => Some((b, v)),
                    _ => best,
                }
            })
            .map(|(b, _)| b)
            .unwrap_or(b'N')
    }
}
