//! Statistics markers shared by kernels, bases and the Matsubara transform.

/// Particle statistics of a kernel or basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statistics {
    Fermionic,
    Bosonic,
}

impl Statistics {
    pub fn is_fermionic(self) -> bool {
        matches!(self, Statistics::Fermionic)
    }

    pub fn is_bosonic(self) -> bool {
        matches!(self, Statistics::Bosonic)
    }

    /// ζ in the Matsubara frequency ω_n = (2n + ζ)π/β: 1 for fermions,
    /// 0 for bosons.
    pub fn zeta(self) -> i64 {
        match self {
            Statistics::Fermionic => 1,
            Statistics::Bosonic => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Statistics::Fermionic => "fermionic",
            Statistics::Bosonic => "bosonic",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statistics_helpers() {
        assert!(Statistics::Fermionic.is_fermionic());
        assert!(!Statistics::Fermionic.is_bosonic());
        assert_eq!(Statistics::Fermionic.zeta(), 1);
        assert_eq!(Statistics::Bosonic.zeta(), 0);
        assert_eq!(Statistics::Bosonic.as_str(), "bosonic");
    }
}
