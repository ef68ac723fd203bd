//! Chunk id arguments
//!
//! Accepted forms: decimal (`7459`), prefixed hex (`0x1d23`) and the
//! canonical queue key (`l2_1d23`). Bare hex is rejected because `10` would
//! be ambiguous. A queue key keeps its level tag until the configured level
//! is known, and must match it.

use upq_types::{ChunkId, ChunkKey, IdParseError, LevelTag};

/// Chunk id as given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChunkArg {
    level: Option<LevelTag>,
    id: ChunkId,
}

impl ChunkArg {
    /// Chunk id under the configured `level`
    ///
    /// Rejects a queue key written for another level instead of silently
    /// retargeting it.
    pub(crate) fn resolve(&self, level: &LevelTag) -> Result<ChunkId, IdParseError> {
        match &self.level {
            Some(given) if given != level => Err(IdParseError::InvalidLevelTag(format!(
                "{given} (configured level is {level})"
            ))),
            _ => Ok(self.id),
        }
    }
}

pub(crate) fn parse_chunk_arg(text: &str) -> Result<ChunkArg, IdParseError> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return ChunkId::from_hex(hex).map(|id| ChunkArg { level: None, id });
    }
    if text.contains(upq_types::ids::CHUNK_KEY_SEPARATOR) {
        let key = text.parse::<ChunkKey>()?;
        return Ok(ChunkArg {
            level: Some(key.level().clone()),
            id: key.id(),
        });
    }
    text.parse::<u32>()
        .map(|raw| ChunkArg {
            level: None,
            id: ChunkId::new(raw),
        })
        .map_err(|_| IdParseError::InvalidDecimal(text.to_string()))
}

/// Resolve every argument against `level`, failing on the first mismatch
pub(crate) fn resolve_all<'a, I>(args: I, level: &LevelTag) -> Result<Vec<ChunkId>, IdParseError>
where
    I: IntoIterator<Item = &'a ChunkArg>,
{
    args.into_iter().map(|arg| arg.resolve(level)).collect()
}
