use std::fmt;

use serde::Serialize;

use crate::bridge::Bridge;
use crate::chat::Reply;
use crate::error::AppError;
use crate::lights::{ControlOutcome, DeviceController};
use crate::tools::Operation;

/// Result of routing one reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "dispatch", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Free-text reply; nothing to do.
    NoAction,
    Applied { outcome: ControlOutcome },
    /// The model called an operation we do not declare.
    Ignored { operation: String },
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchOutcome::NoAction => Ok(()),
            DispatchOutcome::Applied { outcome } => write!(f, "{outcome}"),
            DispatchOutcome::Ignored { operation } => {
                write!(f, "Ignored unrecognized operation: {operation}")
            }
        }
    }
}

/// Route a reply to the controller. Arguments are passed through as the
/// model produced them.
pub async fn dispatch<B: Bridge>(
    reply: &Reply,
    controller: &DeviceController<B>,
) -> Result<DispatchOutcome, AppError> {
    let Reply::Invocation(operation) = reply else {
        return Ok(DispatchOutcome::NoAction);
    };

    let outcome = match operation {
        Operation::TurnOnOrOff { light_name, on } => controller.set_power(light_name, *on).await?,
        Operation::SetBrightness {
            light_name,
            brightness,
        } => controller.set_brightness(light_name, *brightness).await?,
        Operation::Unrecognized { name, arguments } => {
            tracing::warn!(operation = %name, %arguments, "ignoring unrecognized invocation");
            return Ok(DispatchOutcome::Ignored {
                operation: name.clone(),
            });
        }
    };

    Ok(DispatchOutcome::Applied { outcome })
}
