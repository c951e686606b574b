use std::sync::Arc;

use crate::error::Result;
use crate::invoker::Invoker;
use crate::resolver::ResolutionStep;
use crate::resolver::Resolver;
use crate::uri::Uri;
use crate::wrapper::Package;
use crate::wrapper::Wrapper;

pub struct RedirectResolver {
    from: Uri,
    to: Uri,
}

impl RedirectResolver {
    pub fn new(from: Uri, to: Uri) -> Self {
        Self { from, to }
    }
}

impl Resolver for RedirectResolver {
    fn try_resolve(&self, uri: &Uri, _invoker: &dyn Invoker) -> Result<ResolutionStep> {
        if *uri == self.from {
            return Ok(ResolutionStep::Uri(self.to.clone()));
        }
        Ok(ResolutionStep::NotFound)
    }
}

pub struct PackageResolver {
    uri: Uri,
    package: Arc<dyn Package>,
}

impl PackageResolver {
    pub fn new(uri: Uri, package: Arc<dyn Package>) -> Self {
        Self { uri, package }
    }
}

impl Resolver for PackageResolver {
    fn try_resolve(&self, uri: &Uri, _invoker: &dyn Invoker) -> Result<ResolutionStep> {
        if *uri == self.uri {
            return Ok(ResolutionStep::Package(self.package.clone()));
        }
        Ok(ResolutionStep::NotFound)
    }
}

pub struct WrapperResolver {
    uri: Uri,
    wrapper: Arc<dyn Wrapper>,
}

impl WrapperResolver {
    pub fn new(uri: Uri, wrapper: Arc<dyn Wrapper>) -> Self {
        Self { uri, wrapper }
    }
}

impl Resolver for WrapperResolver {
    fn try_resolve(&self, uri: &Uri, _invoker: &dyn Invoker) -> Result<ResolutionStep> {
        if *uri == self.uri {
            return Ok(ResolutionStep::Wrapper(self.wrapper.clone()));
        }
        Ok(ResolutionStep::NotFound)
    }
}
