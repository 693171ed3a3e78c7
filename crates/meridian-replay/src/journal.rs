//! JSON-lines event journal.

use std::io::Write;

use meridian_core::Event;
use tracing::error;

use crate::error::ReplayError;

/// Drain `events` until the engine closes the ring, writing one JSON
/// object per line to `out` when given.
///
/// The ring is always drained to the end, even after a write error, so the
/// engine thread is never left blocked on a full ring. The first error is
/// returned once the stream is finished.
pub fn write_journal<I, W>(events: I, mut out: Option<W>) -> Result<u64, ReplayError>
where
    I: IntoIterator<Item = Event>,
    W: Write,
{
    let mut count = 0u64;
    let mut failure = None;

    for event in events {
        count += 1;
        if let Some(writer) = out.as_mut() {
            if let Err(err) = write_event(writer, &event) {
                error!(sequence = event.sequence, error = %err, "journal write failed");
                failure = Some(err);
                out = None;
            }
        }
    }

    if let Some(mut writer) = out {
        writer.flush()?;
    }
    match failure {
        Some(err) => Err(err),
        None => Ok(count),
    }
}

fn write_event<W: Write>(writer: &mut W, event: &Event) -> Result<(), ReplayError> {
    serde_json::to_writer(&mut *writer, event)?;
    writer.write_all(b"\n")?;
    Ok(())
}
