//! Plurality voting over classifier verdicts.

/// Pick the value occurring most often in `verdicts`.
///
/// Values are compared by equality only. Among values with the same maximal
/// count the one encountered first wins, so with an even number of voters a
/// tie goes to the earliest verdict. Returns the winner and its vote count, or
/// `None` when there are no verdicts.
pub fn plurality<T: PartialEq>(verdicts: &[T]) -> Option<(&T, usize)> {
    let mut tally: Vec<(&T, usize)> = Vec::new();

    for verdict in verdicts {
        match tally.iter_mut().find(|entry| entry.0 == verdict) {
            Some(entry) => entry.1 += 1,
            None => tally.push((verdict, 1)),
        }
    }

    let mut winner: Option<(&T, usize)> = None;
    for (verdict, count) in tally {
        // Strictly greater: earlier entries keep ties.
        if winner.is_none_or(|(_, best)| count > best) {
            winner = Some((verdict, count));
        }
    }
    winner
}
