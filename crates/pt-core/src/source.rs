//! Input boundary: where photon records come from.

use crate::record::PhotonRecord;

/// A finite stream of photon records, terminated by exhaustion.
///
/// The engine never generates or validates photon trajectories itself; it
/// only drains sources. Any `IntoIterator<Item = PhotonRecord>` is a source,
/// so a `Vec`, a channel receiver or a file reader's record iterator can be
/// handed to a table directly.
pub trait EventSource {
    /// Iterator over the records.
    type Records: Iterator<Item = PhotonRecord>;

    /// Consume the source.
    fn records(self) -> Self::Records;
}

impl<I> EventSource for I
where
    I: IntoIterator<Item = PhotonRecord>,
{
    type Records = I::IntoIter;

    fn records(self) -> Self::Records {
        self.into_iter()
    }
}
