//! Port triple allocation.
//!
//! Every environment gets three consecutive ports `(b, b+1, b+2)` for its
//! api, app and db roles. The allocator picks the lowest base `b` in the
//! configured inclusive range whose triple does not intersect any port
//! already held by another environment.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, StagingState};

/// Inclusive port range the allocator may hand out from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    /// Default range used when no configuration overrides it.
    pub const DEFAULT: PortRange = PortRange {
        start: 4001,
        end: 4099,
    };

    pub fn new(start: u16, end: u16) -> Result<Self, DomainError> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.start == 0 {
            return Err(DomainError::InvalidPortRange {
                start: self.start,
                end: self.end,
                reason: "port 0 cannot be reserved".into(),
            });
        }
        if self.start > self.end {
            return Err(DomainError::InvalidPortRange {
                start: self.start,
                end: self.end,
                reason: "start is greater than end".into(),
            });
        }
        Ok(())
    }

    pub fn contains(&self, port: u16) -> bool {
        (self.start..=self.end).contains(&port)
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Contiguous `{api, app, db}` block reserved for one environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortTriple {
    pub api: u16,
    pub app: u16,
    pub db: u16,
}

impl PortTriple {
    /// `(base, base+1, base+2)`. Callers guarantee `base <= u16::MAX - 2`.
    pub const fn starting_at(base: u16) -> Self {
        Self {
            api: base,
            app: base + 1,
            db: base + 2,
        }
    }

    pub fn ports(&self) -> [u16; 3] {
        [self.api, self.app, self.db]
    }
}

impl fmt::Display for PortTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "api={} app={} db={}", self.api, self.app, self.db)
    }
}

/// Find the first fully free triple in `range` given the current state.
///
/// The result is not persisted here; the caller must write it into a record
/// before another allocation can see it as taken.
pub fn allocate_ports(state: &StagingState, range: PortRange) -> Result<PortTriple, DomainError> {
    range.validate()?;
    let in_use = state.ports_in_use();

    // u32 arithmetic: `end` may sit right at u16::MAX.
    let (start, end) = (u32::from(range.start), u32::from(range.end));
    (start..)
        .take_while(|base| base + 2 <= end)
        .filter_map(|base| u16::try_from(base).ok())
        .map(PortTriple::starting_at)
        .find(|triple| triple.ports().iter().all(|p| !in_use.contains(p)))
        .ok_or(DomainError::NoFreePorts {
            start: range.start,
            end: range.end,
        })
}
