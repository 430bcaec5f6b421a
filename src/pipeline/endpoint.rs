/*
 * Responsibility
 * - Explicit endpoint registration: (method, path) -> handler + optional AuthConf
 * - Startup validation (duplicate routes, unknown policy names) before anything is served
 * - Conversion to an axum Router whose routes all go through `dispatch`
 */
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Request, State, rejection::PathRejection},
    http::Method,
    routing::{MethodFilter, MethodRouter},
};
use thiserror::Error;

use crate::pipeline::Handler;
use crate::pipeline::dispatch::dispatch;
use crate::services::authz::{AuthConf, PolicyRegistry};
use crate::state::AppState;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("duplicate route: {method} {path}")]
    DuplicateRoute { method: Method, path: String },

    #[error("route {method} {path} requires unknown policy {policy:?}")]
    UnknownPolicy {
        method: Method,
        path: String,
        policy: String,
    },

    #[error("unsupported method for route {path}: {method}")]
    UnsupportedMethod { method: Method, path: String },
}

pub struct Endpoint {
    method: Method,
    path: String,
    handler: Box<dyn Handler>,
    auth: Option<AuthConf>,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

impl Endpoint {
    pub fn new(method: Method, path: impl Into<String>, handler: impl Handler) -> Self {
        Self {
            method,
            path: path.into(),
            handler: Box::new(handler),
            auth: None,
        }
    }

    pub fn get(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::GET, path, handler)
    }

    pub fn post(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::POST, path, handler)
    }

    /// Require `conf` to pass before the handler runs.
    pub fn with_auth(mut self, conf: AuthConf) -> Self {
        self.auth = Some(conf);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn auth(&self) -> Option<&AuthConf> {
        self.auth.as_ref()
    }

    pub fn handler(&self) -> &dyn Handler {
        self.handler.as_ref()
    }
}

#[derive(Debug, Default)]
pub struct EndpointTable {
    endpoints: Vec<Endpoint>,
}

impl EndpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    /// Check every endpoint against `registry`, then build the router.
    ///
    /// Fails on the first duplicate `(method, path)` or unknown policy name.
    pub fn into_router(self, registry: &PolicyRegistry) -> Result<Router<AppState>, PipelineError> {
        let mut seen: HashSet<(Method, String)> = HashSet::new();
        let mut by_path: BTreeMap<String, MethodRouter<AppState>> = BTreeMap::new();

        for endpoint in self.endpoints {
            let method = endpoint.method.clone();
            let path = endpoint.path.clone();

            if !seen.insert((method.clone(), path.clone())) {
                return Err(PipelineError::DuplicateRoute { method, path });
            }

            if let Some(conf) = &endpoint.auth {
                if !registry.contains(conf.policy()) {
                    return Err(PipelineError::UnknownPolicy {
                        method,
                        path,
                        policy: conf.policy().to_string(),
                    });
                }
            }

            let filter = MethodFilter::try_from(method.clone()).map_err(|_| {
                PipelineError::UnsupportedMethod {
                    method: method.clone(),
                    path: path.clone(),
                }
            })?;

            let endpoint = Arc::new(endpoint);
            let handler = move |State(state): State<AppState>,
                                params: Result<Path<HashMap<String, String>>, PathRejection>,
                                req: Request| {
                let endpoint = endpoint.clone();
                async move {
                    let params = params.map(|Path(p)| p).unwrap_or_default();
                    dispatch(&endpoint, &state, params, req).await
                }
            };

            let routes = by_path.remove(&path).unwrap_or_else(MethodRouter::new);
            by_path.insert(path, routes.on(filter, handler));
        }

        Ok(by_path
            .into_iter()
            .fold(Router::new(), |router, (path, routes)| router.route(&path, routes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{BoxFuture, HandlerResult, RequestContext};
    use crate::services::authz::PolicyRegistryBuilder;
    use crate::services::authz::engine::no_resources;
    use crate::services::authz::policies::{AUTHENTICATED, AnyAuthenticated};

    fn noop<'a>(_ctx: &'a mut RequestContext, _state: &'a AppState) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async { Ok(serde_json::Value::Null) })
    }

    fn registry() -> PolicyRegistry {
        PolicyRegistryBuilder::new()
            .register(AUTHENTICATED, AnyAuthenticated)
            .unwrap()
            .freeze()
    }

    #[test]
    fn duplicate_route_is_rejected() {
        let result = EndpointTable::new()
            .add(Endpoint::get("/a", noop))
            .add(Endpoint::get("/a", noop))
            .into_router(&registry());

        assert_eq!(
            result.err(),
            Some(PipelineError::DuplicateRoute {
                method: Method::GET,
                path: "/a".to_string(),
            })
        );
    }

    #[test]
    fn same_path_different_methods_is_fine() {
        let result = EndpointTable::new()
            .add(Endpoint::get("/a", noop))
            .add(Endpoint::post("/a", noop))
            .into_router(&registry());

        assert!(result.is_ok());
    }

    #[test]
    fn unknown_policy_is_rejected_at_startup() {
        let result = EndpointTable::new()
            .add(Endpoint::get("/a", noop).with_auth(AuthConf::new("owns-all", no_resources)))
            .into_router(&registry());

        assert_eq!(
            result.err(),
            Some(PipelineError::UnknownPolicy {
                method: Method::GET,
                path: "/a".to_string(),
                policy: "owns-all".to_string(),
            })
        );
    }

    #[test]
    fn known_policy_is_accepted() {
        let endpoint =
            Endpoint::get("/a", noop).with_auth(AuthConf::new(AUTHENTICATED, no_resources));
        assert_eq!(endpoint.auth().map(AuthConf::policy), Some(AUTHENTICATED));

        let result = EndpointTable::new().add(endpoint).into_router(&registry());

        assert!(result.is_ok());
    }
}
