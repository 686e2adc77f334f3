//! Result records.
//!
//! Each record renders as one line, fields separated by `::` and container
//! lists by `:`.

use std::fmt;

/// The same logical path in several containers. Only the first is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    /// Container whose copy wins.
    pub priority: String,
    pub path: String,
    /// Containers whose copies are never loaded, in load order.
    pub overridden: Vec<String>,
}

/// A same-named file of the same path type under a different sub-path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shadow {
    pub priority: String,
    pub priority_path: String,
    /// The path that loses the lookup.
    pub path: String,
    /// Containers holding `path`, in load order.
    pub containers: Vec<String>,
}

/// Byte-identical copies of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identical {
    /// Path of the first copy in load order.
    pub path: String,
    pub holders: Vec<Holder>,
}

/// One member of an [`Identical`] group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holder {
    pub container: String,
    /// Set when this copy lives under a different path than the first.
    pub path: Option<String>,
}

/// Anything the resolver reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    Override(Override),
    Shadow(Shadow),
    Identical(Identical),
}

impl fmt::Display for Override {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "override {}::{}::{}",
            self.priority,
            self.path,
            self.overridden.join(":")
        )
    }
}

impl fmt::Display for Shadow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "shadow {}::{}::{}::{}",
            self.priority,
            self.priority_path,
            self.path,
            self.containers.join(":")
        )
    }
}

impl fmt::Display for Holder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}:{}", self.container, path),
            None => f.write_str(&self.container),
        }
    }
}

impl fmt::Display for Identical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "identical {}::", self.path)?;
        for (i, holder) in self.holders.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", holder)?;
        }
        Ok(())
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::Override(o) => o.fmt(f),
            Finding::Shadow(s) => s.fmt(f),
            Finding::Identical(i) => i.fmt(f),
        }
    }
}
