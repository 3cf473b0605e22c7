//! How hard a write tries to reach stable storage before it reports success.

/// Controls syncing around the temp-file + rename write.
///
/// Both policies keep the rename-over step, so a reader never sees a half
/// written file. They differ in what survives a power loss.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Durability {
    /// fsync the temp file before the rename and the directory after it.
    #[default]
    Fsync,
    /// Rename only and leave flushing to the OS. Faster, still crash-safe
    /// against process death but not against power loss.
    Buffered,
}

impl Durability {
    pub(crate) fn syncs(self) -> bool {
        matches!(self, Durability::Fsync)
    }
}
