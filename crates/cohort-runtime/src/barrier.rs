//! Full barrier built on the out-of-band broadcast.

use cohort_config::WaitPolicy;
use tracing::debug;

use crate::oob::{BarrierGate, OobChannel, OobError};
use crate::progress::ProgressEngine;

/// Blocks until the coordinator confirms every peer reached `gate`.
///
/// The broadcast carries no payload; it exists only to rendezvous. The call
/// succeeds only when the delivered notification names `gate`.
///
/// # Errors
///
/// Returns the channel's error, [`OobError::MissingNotification`] when the
/// broadcast returns without delivering, or
/// [`OobError::UnexpectedNotification`] when another gate is delivered.
pub fn synchronise(
    oob: &dyn OobChannel,
    gate: BarrierGate,
    progress: &dyn ProgressEngine,
    policy: WaitPolicy,
) -> Result<(), OobError> {
    let mut observed = None;
    oob.xcast(
        gate,
        &[],
        &mut |received: BarrierGate, _payload: &[u8]| {
            observed.get_or_insert(received);
        },
        progress,
        policy,
    )?;
    match observed {
        Some(received) if received == gate => {
            debug!(target: "cohort_runtime::barrier", %gate, "barrier released");
            Ok(())
        }
        Some(received) => Err(OobError::UnexpectedNotification {
            expected: gate,
            received,
        }),
        None => Err(OobError::MissingNotification { gate }),
    }
}
