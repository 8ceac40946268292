//! Platform version parsing and the add-on update gate

use std::fmt;
use std::str::FromStr;

/// A `major.minor.patch` platform version. Ordering is numeric per
/// component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let mut component = |name: &str| -> Result<u32, String> {
            parts
                .next()
                .ok_or_else(|| format!("missing {name} component in '{s}'"))?
                .parse::<u32>()
                .map_err(|_| format!("invalid {name} component in '{s}'"))
        };

        let major = component("major")?;
        let minor = component("minor")?;
        let patch = component("patch")?;
        if parts.next().is_some() {
            return Err(format!("too many components in '{s}'"));
        }

        Ok(Version {
            major,
            minor,
            patch,
        })
    }
}

/// Oldest platform version whose clusters receive add-on updates
pub const ADDON_CUTOFF_VERSION: Version = Version::new(4, 7, 0);

/// Whether the add-on should be updated for a cluster reporting
/// `running_version`. The string comes from untrusted persisted state,
/// so an unparsable value means "do not update" rather than an error.
pub fn should_update_addon(running_version: &str) -> bool {
    match running_version.parse::<Version>() {
        Ok(version) => version >= ADDON_CUTOFF_VERSION,
        Err(_) => false,
    }
}
