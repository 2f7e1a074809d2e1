use std::collections::BTreeSet;

/// Prefixes that mark a binding as intended for mutation.
pub const MARKERS: [&str; 2] = ["mut", "Mut"];

pub const BLANK: &str = "_";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mutability {
    Mutable,
    Immutable,
}

impl Mutability {
    pub fn of(name: &str) -> Self {
        if MARKERS.iter().any(|marker| name.starts_with(marker)) {
            Mutability::Mutable
        } else {
            Mutability::Immutable
        }
    }

    pub fn is_mutable(self) -> bool {
        self == Mutability::Mutable
    }
}

/// Decides which names take part in naming checks at all.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamingPolicy {
    exempt: BTreeSet<String>,
}

impl NamingPolicy {
    pub fn new(exempt: impl IntoIterator<Item = String>) -> Self {
        Self {
            exempt: exempt.into_iter().collect(),
        }
    }

    pub fn is_exempt(&self, name: &str) -> bool {
        name == BLANK || self.exempt.contains(name)
    }

    /// `None` for exempt names, which are neither tagged nor reported.
    pub fn tag(&self, name: &str) -> Option<Mutability> {
        if self.is_exempt(name) {
            None
        } else {
            Some(Mutability::of(name))
        }
    }

    /// True when `name` takes part in checks and is not marked mutable.
    pub fn violates(&self, name: &str) -> bool {
        self.tag(name) == Some(Mutability::Immutable)
    }
}
