//! Identity of known backend clients.
//!
//! Backend clients are in-process feature daemons that own part of the
//! configuration tree. The set is closed and compiled in: a connection
//! that names anything else is rejected at subscribe time.
//!
//! An adapter that has not yet identified itself carries `Option<ClientId>`
//! set to `None`; there is no sentinel variant, and all matches over
//! `ClientId` are exhaustive.

use std::fmt;

/// A known backend client.
///
/// `ClientId` doubles as a dense index: [`ClientId::index`] is stable and
/// contiguous in `0..ClientId::COUNT`, so per-client state can live in a
/// plain array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClientId {
    /// The static-route daemon.
    Staticd,
}

impl ClientId {
    /// Number of known backend clients.
    pub const COUNT: usize = 1;

    /// Every known client, in index order.
    pub const ALL: [Self; Self::COUNT] = [Self::Staticd];

    /// The client's wire name, as carried in a subscribe request.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Staticd => "staticd",
        }
    }

    /// Resolves a wire name to a client id.
    ///
    /// Returns `None` for unknown names; the name↔id mapping is bijective
    /// on known names.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.name() == name)
    }

    /// Dense index for per-client tables.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Staticd => 0,
        }
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
