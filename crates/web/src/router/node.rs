use crate::handler::BoxHandler;
use crate::router::pattern::Segment;
use crate::router::{Params, Route};
use http::Method;
use std::collections::HashMap;
use std::sync::Arc;

pub(crate) struct Endpoint {
    pub(crate) method: Method,
    pub(crate) handler: BoxHandler,
    pub(crate) route: Arc<Route>,
}

/// One level of the route tree.
///
/// A node has at most one parameter child and one catch-all child; parameter names live on
/// the [`Route`], so `/u/:id` and `/u/:uid` share the same parameter child.
#[derive(Default)]
pub(crate) struct Node {
    statics: HashMap<String, Node>,
    param: Option<Box<Node>>,
    catch_all: Option<Box<Node>>,
    endpoints: Vec<Endpoint>,
}

impl Node {
    /// Walks (and creates) the path of `segments`, returning the terminal node.
    pub(crate) fn insert(&mut self, segments: &[Segment]) -> &mut Node {
        let mut node = self;
        for segment in segments {
            node = match segment {
                Segment::Static(label) => node.statics.entry(label.clone()).or_default(),
                Segment::Param(_) => node.param.get_or_insert_with(Box::default),
                Segment::CatchAll(_) => node.catch_all.get_or_insert_with(Box::default),
            };
        }
        node
    }

    pub(crate) fn endpoint(&self, method: &Method) -> Option<&Endpoint> {
        self.endpoints.iter().find(|endpoint| endpoint.method == *method)
    }

    pub(crate) fn push_endpoint(&mut self, endpoint: Endpoint) {
        self.endpoints.push(endpoint);
    }

    /// Depth-first search for an endpoint of `method`.
    ///
    /// `rest` is the remaining path without its leading slash, `None` once the path is
    /// consumed. Children are tried static first, then parameter, then catch-all; a failed
    /// branch rolls its captures back. Every terminal reached without a matching method adds
    /// its methods to `allowed`, so a miss leaves the full `Allow` list there.
    pub(crate) fn search<'n>(
        &'n self,
        rest: Option<&str>,
        method: &Method,
        params: &mut Params,
        allowed: &mut Vec<Method>,
    ) -> Option<&'n Endpoint> {
        let Some(rest) = rest else {
            return self.terminal(method, allowed);
        };

        let (segment, remainder) = match rest.split_once('/') {
            Some((segment, remainder)) => (segment, Some(remainder)),
            None => (rest, None),
        };

        if let Some(child) = self.statics.get(segment) {
            if let Some(endpoint) = child.search(remainder, method, params, allowed) {
                return Some(endpoint);
            }
        }

        if let Some(child) = self.param.as_deref() {
            if !segment.is_empty() {
                let mark = params.len();
                params.push(segment);
                if let Some(endpoint) = child.search(remainder, method, params, allowed) {
                    return Some(endpoint);
                }
                params.truncate(mark);
            }
        }

        if let Some(child) = self.catch_all.as_deref() {
            if !rest.is_empty() {
                let endpoint = child.terminal(method, allowed);
                if endpoint.is_some() {
                    params.push(rest);
                }
                return endpoint;
            }
        }

        None
    }

    fn terminal(&self, method: &Method, allowed: &mut Vec<Method>) -> Option<&Endpoint> {
        let endpoint = self.endpoint(method);
        if endpoint.is_none() {
            for endpoint in &self.endpoints {
                if !allowed.contains(&endpoint.method) {
                    allowed.push(endpoint.method.clone());
                }
            }
        }
        endpoint
    }
}
