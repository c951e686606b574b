//! Static lookup table: one entry per Uri.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Result;
use crate::invoker::Invoker;
use crate::resolver::ResolutionStep;
use crate::resolver::Resolver;
use crate::uri::Uri;
use crate::wrapper::Package;
use crate::wrapper::Wrapper;

#[derive(Clone)]
pub enum StaticEntry {
    Redirect(Uri),
    Wrapper(Arc<dyn Wrapper>),
    Package(Arc<dyn Package>),
}

#[derive(Clone, Default)]
pub struct StaticResolver {
    entries: BTreeMap<Uri, StaticEntry>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `uri`, replacing any earlier entry for it.
    pub fn insert(&mut self, uri: Uri, entry: StaticEntry) -> Option<StaticEntry> {
        self.entries.insert(uri, entry)
    }

    pub fn get(&self, uri: &Uri) -> Option<&StaticEntry> {
        self.entries.get(uri)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(Uri, StaticEntry)> for StaticResolver {
    fn from_iter<I: IntoIterator<Item = (Uri, StaticEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Resolver for StaticResolver {
    fn try_resolve(&self, uri: &Uri, _invoker: &dyn Invoker) -> Result<ResolutionStep> {
        let step = match self.entries.get(uri) {
            Some(StaticEntry::Redirect(to)) => ResolutionStep::Uri(to.clone()),
            Some(StaticEntry::Wrapper(wrapper)) => ResolutionStep::Wrapper(wrapper.clone()),
            Some(StaticEntry::Package(package)) => ResolutionStep::Package(package.clone()),
            None => ResolutionStep::NotFound,
        };
        Ok(step)
    }
}
