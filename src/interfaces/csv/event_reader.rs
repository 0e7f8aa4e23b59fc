use crate::domain::event::Event;
use crate::error::{AdvanceError, Result};
use std::io::Read;

/// Reads lifecycle events from a CSV source.
///
/// Wraps `csv::Reader` and provides an iterator over `Result<Event>`,
/// trimming whitespace and tolerating short rows so a malformed line
/// surfaces as an error without stopping the stream.
pub struct EventReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> EventReader<R> {
    /// Creates a new `EventReader` from any `Read` source (e.g. File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes events.
    pub fn events(self) -> impl Iterator<Item = Result<Event>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(AdvanceError::from))
    }
}
