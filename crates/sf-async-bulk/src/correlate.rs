//! Pairing decoded outcomes with the records that produced them.

use crate::codec::RawOutcome;
use crate::error::{Error, ErrorKind, Result};
use crate::result::BatchResultRecord;
use crate::types::Record;

/// Zip `outcomes` with `inputs` by position.
///
/// With no known input (batches rediscovered from the service) the records
/// carry no back-reference and no length check is possible.
pub fn correlate(inputs: Option<&[Record]>, outcomes: Vec<RawOutcome>) -> Result<Vec<BatchResultRecord>> {
    match inputs {
        Some(inputs) => {
            if inputs.len() != outcomes.len() {
                return Err(Error::new(ErrorKind::Correlation {
                    expected: inputs.len(),
                    actual: outcomes.len(),
                }));
            }
            Ok(outcomes
                .into_iter()
                .zip(inputs)
                .map(|(outcome, input)| to_record(outcome, Some(input.clone())))
                .collect())
        }
        None => Ok(outcomes
            .into_iter()
            .map(|outcome| to_record(outcome, None))
            .collect()),
    }
}

fn to_record(outcome: RawOutcome, input: Option<Record>) -> BatchResultRecord {
    BatchResultRecord {
        id: outcome.id,
        success: outcome.success,
        created: outcome.created,
        error: if outcome.success { None } else { outcome.error },
        input,
    }
}
