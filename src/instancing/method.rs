// src/instancing/method.rs
//! Rendering strategy selector.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How the generated instances reach the GPU.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// One container holding the templates plus per-instance transforms.
    #[default]
    Batched,
    /// One static mesh with every instance transform baked into the vertices.
    Merged,
}

impl Method {
    pub const ALL: [Method; 2] = [Method::Batched, Method::Merged];

    /// The other variant. Used by the control panel toggle.
    pub fn toggled(self) -> Self {
        match self {
            Method::Batched => Method::Merged,
            Method::Merged => Method::Batched,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Method::Batched => "BATCHED",
            Method::Merged => "MERGED",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggling_twice_is_identity() {
        for m in Method::ALL {
            assert_ne!(m.toggled(), m);
            assert_eq!(m.toggled().toggled(), m);
        }
    }

    #[test]
    fn labels_match_panel_text() {
        assert_eq!(Method::Batched.to_string(), "BATCHED");
        assert_eq!(Method::Merged.to_string(), "MERGED");
        assert_eq!(Method::default(), Method::Batched);
    }
}
