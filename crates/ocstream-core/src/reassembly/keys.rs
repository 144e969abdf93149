// Key grammar of the interface sensors.
//
//   __prefix__ value:  /interfaces/interface[name='ge-0/0/0']/
//   queue key:         out-queue[queue-number=3]/pkts

use super::ReassemblyError;
use crate::model::QUEUE_SLOTS;

pub const PREFIX_KEY: &str = "__prefix__";
pub const QUEUE_KEY_PREFIX: &str = "out-queue";

const NAME_OPEN: &str = "name='";
const NAME_CLOSE: &str = "']";

/// Extract the entity name from a boundary marker value.
pub fn parse_prefix_name(value: &str) -> Result<&str, ReassemblyError> {
    let malformed = || ReassemblyError::MalformedPrefix {
        value: value.to_owned(),
    };

    let start = value.find(NAME_OPEN).ok_or_else(malformed)? + NAME_OPEN.len();
    let rest = &value[start..];
    let end = rest.find(NAME_CLOSE).ok_or_else(malformed)?;
    Ok(&rest[..end])
}

/// Split a queue key into its slot index and metric name.
pub fn parse_queue_key(key: &str) -> Result<(usize, &str), ReassemblyError> {
    let malformed = |reason: &'static str| ReassemblyError::MalformedQueueKey {
        key: key.to_owned(),
        reason,
    };

    let (_, after_eq) = key.split_once('=').ok_or_else(|| malformed("missing '='"))?;
    let (index, after_bracket) = after_eq
        .split_once(']')
        .ok_or_else(|| malformed("missing ']'"))?;
    let queue: usize = index
        .trim()
        .parse()
        .map_err(|_| malformed("queue number is not an integer"))?;
    if queue >= QUEUE_SLOTS {
        return Err(malformed("queue number out of range"));
    }
    let metric = after_bracket
        .strip_prefix('/')
        .filter(|m| !m.is_empty())
        .ok_or_else(|| malformed("missing metric name"))?;

    Ok((queue, metric))
}
