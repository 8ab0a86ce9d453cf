//! Module fetching: turning a requested version into a storable module.

use async_trait::async_trait;
use tracing::debug;

use super::{FetchError, FetchRequest, FetchResult, FetchResultExt, ResolvedModule};
use crate::latest::modfile;
use crate::model::{Module, ModuleInfo};
use crate::origin::{Origin, ProxyOrigin};

/// Resolves and fetches module versions.
///
/// Implementations own archive download and source processing; the
/// orchestrator only sees resolved versions, costs and finished modules.
#[async_trait]
pub trait ModuleFetcher: Send + Sync {
    /// Resolves the requested version and estimates its processing cost.
    async fn resolve(&self, request: &FetchRequest) -> Result<ResolvedModule, FetchError>;

    /// Fetches and processes the resolved version.
    async fn fetch(
        &self,
        request: &FetchRequest,
        resolved: &ResolvedModule,
    ) -> Result<FetchResult, FetchError>;
}

/// Metadata-only fetcher backed by the module proxy.
///
/// Reads version info, archive size and the module definition file. It
/// yields modules without packages.
pub struct ProxyModuleFetcher {
    origin: ProxyOrigin,
}

impl ProxyModuleFetcher {
    pub fn new(origin: ProxyOrigin) -> Self {
        Self { origin }
    }

    fn origin_for(&self, request: &FetchRequest) -> ProxyOrigin {
        if request.disable_origin_fetch {
            self.origin.with_fetch_disabled()
        } else {
            self.origin.clone()
        }
    }
}

#[async_trait]
impl ModuleFetcher for ProxyModuleFetcher {
    async fn resolve(&self, request: &FetchRequest) -> Result<ResolvedModule, FetchError> {
        let origin = self.origin_for(request);
        let info = origin
            .info(&request.module_path, &request.requested_version)
            .await
            .context("origin.info")?;
        let size = origin
            .zip_size(&request.module_path, &info.version)
            .await
            .context("origin.zip_size")?;

        debug!(
            module_path = %request.module_path,
            requested = %request.requested_version,
            resolved = %info.version,
            size,
            "Resolved module version"
        );
        Ok(ResolvedModule {
            version: info.version,
            commit_time: info.time,
            approximate_cost: size,
        })
    }

    async fn fetch(
        &self,
        request: &FetchRequest,
        resolved: &ResolvedModule,
    ) -> Result<FetchResult, FetchError> {
        let contents = self
            .origin_for(request)
            .mod_file(&request.module_path, &resolved.version)
            .await
            .context("origin.mod_file")?;
        let file = modfile::parse(&contents);
        build_result(request, resolved, file.module_path)
    }
}

/// Checks the declared path against the requested one and assembles the
/// result. Shared by fetchers that read the module definition file.
pub fn build_result(
    request: &FetchRequest,
    resolved: &ResolvedModule,
    declared_path: Option<String>,
) -> Result<FetchResult, FetchError> {
    if let Some(declared) = &declared_path {
        if declared != &request.module_path {
            return Err(FetchError::AlternativeModule {
                requested: request.module_path.clone(),
                declared: declared.clone(),
            });
        }
    }

    let mut info = ModuleInfo::new(&request.module_path, &resolved.version);
    info.commit_time = resolved.commit_time;
    info.has_go_mod = declared_path.is_some();
    info.declared_path = declared_path.clone();

    Ok(FetchResult {
        module: Module {
            info,
            packages: Vec::new(),
        },
        package_states: Vec::new(),
        has_go_mod: declared_path.is_some(),
        declared_path,
    })
}
