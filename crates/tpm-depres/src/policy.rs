//! The resolver's version-selection bias policies (spec §4.5).

/// Controls the bias term `b` in the scoring formula, i.e. how strongly the
/// solver prefers newer versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Policy {
    /// Prefer the already-installed version; only move when forced.
    #[default]
    KeepNewer,
    /// Prefer the newest satisfying version for every package.
    Upgrade,
    /// Like `Upgrade`, but cubically prefers the newest version on
    /// user-selected packages while leaving pulled-in dependencies alone.
    StrongSelectiveUpgrade,
}
