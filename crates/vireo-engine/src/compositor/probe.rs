/// Tells whether the compositor service is installed on this system.
///
/// Consulted once, before the compositor runtime is touched.
pub trait CapabilityProbe: Send + Sync {
    fn is_available(&self) -> bool;
}

impl<F> CapabilityProbe for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_available(&self) -> bool {
        self()
    }
}

/// Capability present when any candidate service package is installed.
#[derive(Debug, Clone, Default)]
pub struct PackageProbe {
    pub candidates: Vec<String>,
    pub installed: Vec<String>,
}

impl PackageProbe {
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
            installed: Vec::new(),
        }
    }

    pub fn with_installed<I, S>(mut self, installed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.installed = installed.into_iter().map(Into::into).collect();
        self
    }
}

impl CapabilityProbe for PackageProbe {
    fn is_available(&self) -> bool {
        let found = self
            .candidates
            .iter()
            .find(|c| self.installed.iter().any(|i| i == *c));
        match found {
            Some(package) => {
                log::debug!("compositor service {package} present");
                true
            }
            None => {
                log::info!("no compositor service installed (looked for {:?})", self.candidates);
                false
            }
        }
    }
}
