//! The steps recorded by resolution, replayed by instantiation.

use tracing::debug;

use super::{Callable, CallableRef, KwdValue};
use crate::errors::{Error, Result};
use crate::eval_context::EvalContext;
use crate::kernels::{KernelBuilder, KernelRequest};
use crate::types::{Type, TypeVars};

/// One resolved call: which callable, on what, returning what.
#[derive(Debug, Clone)]
pub struct CallNode {
    callable: CallableRef,
    src_tps: Vec<Type>,
    dst_tp: Type,
}

impl CallNode {
    pub fn callable(&self) -> &CallableRef {
        &self.callable
    }

    pub fn src_tps(&self) -> &[Type] {
        &self.src_tps
    }

    pub fn dst_tp(&self) -> &Type {
        &self.dst_tp
    }
}

/// Resolved calls in the order their `resolve` began, so that a parent
/// always precedes its children.
#[derive(Debug, Default)]
pub struct CallGraph {
    nodes: Vec<CallNode>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[CallNode] {
        &self.nodes
    }

    /// Records a node for `callable` and resolves it. On failure the node and
    /// everything recorded beneath it are removed.
    pub fn resolve(
        &mut self,
        callable: &CallableRef,
        caller: Option<&dyn Callable>,
        dst_tp: Option<&Type>,
        src_tps: &[Type],
        kwds: &[(&str, KwdValue)],
        tp_vars: &mut TypeVars,
    ) -> Result<Type> {
        let index = self.nodes.len();
        self.nodes.push(CallNode {
            callable: callable.clone(),
            src_tps: src_tps.to_vec(),
            dst_tp: Type::default(),
        });
        match callable.resolve(self, caller, dst_tp, src_tps, kwds, tp_vars) {
            Ok(ret) => {
                debug!(
                    callable = callable.name(),
                    caller = caller.map(|c| c.name()),
                    %ret,
                    "resolved call step"
                );
                self.nodes[index].dst_tp = ret.clone();
                Ok(ret)
            }
            Err(e) => {
                self.nodes.truncate(index);
                Err(e)
            }
        }
    }

    pub fn cursor(&self) -> CallCursor<'_> {
        CallCursor {
            graph: self,
            next: 0,
        }
    }
}

/// Walks a [`CallGraph`] during instantiation.
#[derive(Debug)]
pub struct CallCursor<'g> {
    graph: &'g CallGraph,
    next: usize,
}

impl<'g> CallCursor<'g> {
    pub fn is_finished(&self) -> bool {
        self.next >= self.graph.nodes.len()
    }

    /// Instantiates the next recorded step.
    #[allow(clippy::too_many_arguments)]
    pub fn instantiate_next(
        &mut self,
        ckb: &mut KernelBuilder,
        dst_tp: &Type,
        dst_meta: &[u8],
        src_tps: &[Type],
        src_metas: &[&[u8]],
        kernreq: KernelRequest,
        kwds: &[(&str, KwdValue)],
        tp_vars: &TypeVars,
        ectx: &EvalContext,
    ) -> Result<()> {
        let graph: &'g CallGraph = self.graph;
        let node = graph.nodes.get(self.next).ok_or_else(|| {
            Error::Builder(format!(
                "call graph has {} steps, all of them already instantiated",
                graph.nodes.len()
            ))
        })?;
        self.next += 1;
        node.callable.instantiate(
            self, ckb, dst_tp, dst_meta, src_tps, src_metas, kernreq, kwds, tp_vars, ectx,
        )
    }
}
