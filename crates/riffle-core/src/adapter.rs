/// Upper bound on click+snapshot cycles before a convergence run is declared
/// stuck. Generous next to real chapter lengths.
pub const DEFAULT_MAX_CYCLES: usize = 256;

/// How a site exposes its page images.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Page images are embedded as resource references in the loaded markup.
    Static { container_selector: String },
    /// Pages render onto canvases and must be paged through with forward
    /// clicks until no new content appears.
    Convergence {
        forward_selector: String,
        max_cycles: usize,
    },
}

/// Per-site descriptor binding a host to its ready signal and resolution
/// strategy. Each supported site gets a bespoke entry; there is no generic
/// fallback.
#[derive(Debug, Clone)]
pub struct Adapter {
    pub host: String,
    pub ready_selector: String,
    pub resolution: Resolution,
}

/// Closed set of site adapters, looked up by exact host match.
pub struct Registry {
    adapters: Vec<Adapter>,
}

impl Registry {
    pub fn new(adapters: Vec<Adapter>) -> Self {
        Self { adapters }
    }

    /// The sites with working adapters. Supporting a new site means adding an
    /// entry here, not widening a branch somewhere else.
    pub fn builtin() -> Self {
        Self::new(vec![
            // Viewer keeps a temporary blob URL in each comic container once
            // the images have loaded.
            Adapter {
                host: "ciao.shogakukan.co.jp".into(),
                ready_selector: ".c-viewer__comic".into(),
                resolution: Resolution::Static {
                    container_selector: ".c-viewer__comic".into(),
                },
            },
            // Viewer paints spreads onto canvases; content only appears as
            // the forward control is clicked.
            Adapter {
                host: "tonarinoyj.jp".into(),
                ready_selector: ".page-image".into(),
                resolution: Resolution::Convergence {
                    forward_selector: ".page-navigation-forward".into(),
                    max_cycles: DEFAULT_MAX_CYCLES,
                },
            },
        ])
    }

    pub fn lookup(&self, host: &str) -> Option<&Adapter> {
        self.adapters.iter().find(|a| a.host == host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_hosts_resolve() {
        let registry = Registry::builtin();
        assert!(matches!(
            registry.lookup("ciao.shogakukan.co.jp").map(|a| &a.resolution),
            Some(Resolution::Static { .. })
        ));
        assert!(matches!(
            registry.lookup("tonarinoyj.jp").map(|a| &a.resolution),
            Some(Resolution::Convergence { .. })
        ));
    }

    #[test]
    fn unknown_host_has_no_adapter() {
        let registry = Registry::builtin();
        assert!(registry.lookup("example.com").is_none());
        // No subdomain or partial matching.
        assert!(registry.lookup("www.tonarinoyj.jp").is_none());
    }
}
