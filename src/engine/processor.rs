// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The processor tree: leaves composed with `Sequence` and `Parallel`.
//!
//! All execution rules live in [`Processor::execute`]:
//!
//! - **Leaf**: runs its device operation once and records the outcome.
//! - **Sequence**: runs children in insertion order; a child starts only after
//!   its predecessor's device call has returned. A failed or timed-out child
//!   does not stop later ones.
//! - **Parallel**: spawns every child as its own tokio task at once and waits
//!   for all of them.
//!
//! ```text
//! Parallel
//! ├── Sequence            (one shared bus: serialized)
//! │   ├── read L1
//! │   ├── read L2
//! │   └── read L3
//! └── Parallel            (independent gateways)
//!     ├── read P1
//!     └── read P2
//! ```

use futures::future::{BoxFuture, FutureExt};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::engine::context::ExecContext;
use crate::engine::flow::Flow;
use crate::engine::leaf::{Leaf, ReadExec, TaskValue, WriteExec};
use crate::engine::TaskId;
use crate::observability::messages::engine::ParallelBranchFailed;
use crate::observability::messages::StructuredLog;

/// A node of the processor tree.
pub enum Processor<V> {
    Leaf(Leaf<V>),
    Sequence(Sequence<V>),
    Parallel(Parallel<V>),
}

impl<V: TaskValue> Processor<V> {
    /// Execute this subtree. Resolves once every leaf below it is terminal,
    /// or once cancellation stops it from starting further leaves.
    pub(crate) fn execute(self, ctx: Arc<ExecContext>) -> BoxFuture<'static, ()> {
        async move {
            match self {
                Processor::Leaf(leaf) => leaf.execute(&ctx).await,
                Processor::Sequence(sequence) => {
                    for child in sequence.children {
                        if ctx.is_cancelled() {
                            break;
                        }
                        child.execute(Arc::clone(&ctx)).await;
                    }
                }
                Processor::Parallel(parallel) => {
                    let mut branches = JoinSet::new();
                    for child in parallel.children {
                        branches.spawn(child.execute(Arc::clone(&ctx)));
                    }
                    let branch_count = branches.len();
                    while let Some(joined) = branches.join_next().await {
                        if let Err(e) = joined {
                            ParallelBranchFailed {
                                branch_count,
                                panicked: e.is_panic(),
                                error: &e,
                            }
                            .log();
                        }
                    }
                }
            }
        }
        .boxed()
    }

    /// Every leaf below this node, depth-first in insertion order.
    pub fn leaves(&self) -> Vec<Leaf<V>> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves(&self, out: &mut Vec<Leaf<V>>) {
        match self {
            Processor::Leaf(leaf) => out.push(leaf.clone()),
            Processor::Sequence(Sequence { children }) | Processor::Parallel(Parallel { children }) => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }

    /// Declare the await set on this root and turn it into a runnable flow.
    pub fn awaiting<I, T>(self, tasks: I) -> Flow<V>
    where
        I: IntoIterator<Item = T>,
        T: Into<TaskId>,
    {
        Flow::new(self).awaiting(tasks)
    }

    /// Await every leaf in the tree.
    pub fn await_all(self) -> Flow<V> {
        Flow::await_all(self)
    }
}

impl<V: TaskValue> Display for Processor<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let (name, children) = match self {
            Processor::Leaf(leaf) => return write!(f, "{}", leaf.id()),
            Processor::Sequence(sequence) => ("Sequence", &sequence.children),
            Processor::Parallel(parallel) => ("Parallel", &parallel.children),
        };
        write!(f, "{}[", name)?;
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", child)?;
        }
        write!(f, "]")
    }
}

macro_rules! composite {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        pub struct $name<V> {
            children: Vec<Processor<V>>,
        }

        impl<V: TaskValue> $name<V> {
            pub fn new() -> Self {
                Self {
                    children: Vec::new(),
                }
            }

            /// Append a child: a leaf handle or another composite.
            pub fn add(mut self, child: impl Into<Processor<V>>) -> Self {
                self.children.push(child.into());
                self
            }

            pub fn len(&self) -> usize {
                self.children.len()
            }

            pub fn is_empty(&self) -> bool {
                self.children.is_empty()
            }

            /// Declare the await set on this root and turn it into a runnable flow.
            pub fn awaiting<I, T>(self, tasks: I) -> Flow<V>
            where
                I: IntoIterator<Item = T>,
                T: Into<TaskId>,
            {
                Processor::from(self).awaiting(tasks)
            }

            /// Await every leaf in the tree.
            pub fn await_all(self) -> Flow<V> {
                Processor::from(self).await_all()
            }
        }

        impl<V: TaskValue> Default for $name<V> {
            fn default() -> Self {
                Self::new()
            }
        }

        impl<V> From<$name<V>> for Processor<V> {
            fn from(node: $name<V>) -> Self {
                Processor::$name(node)
            }
        }
    };
}

composite!(Sequence, "Runs its children one after another, in insertion order.");
composite!(Parallel, "Starts all of its children at once, each on its own task.");

impl<V> From<Leaf<V>> for Processor<V> {
    fn from(leaf: Leaf<V>) -> Self {
        Processor::Leaf(leaf)
    }
}

impl<V> From<&Leaf<V>> for Processor<V> {
    fn from(leaf: &Leaf<V>) -> Self {
        Processor::Leaf(leaf.clone())
    }
}

impl<V> From<ReadExec<V>> for Processor<V> {
    fn from(task: ReadExec<V>) -> Self {
        Processor::Leaf((*task).clone())
    }
}

impl<V> From<&ReadExec<V>> for Processor<V> {
    fn from(task: &ReadExec<V>) -> Self {
        Processor::Leaf((**task).clone())
    }
}

impl<V> From<WriteExec<V>> for Processor<V> {
    fn from(task: WriteExec<V>) -> Self {
        Processor::Leaf((*task).clone())
    }
}

impl<V> From<&WriteExec<V>> for Processor<V> {
    fn from(task: &WriteExec<V>) -> Self {
        Processor::Leaf((**task).clone())
    }
}

impl<V: TaskValue> From<&Leaf<V>> for TaskId {
    fn from(leaf: &Leaf<V>) -> Self {
        leaf.id()
    }
}

impl<V: TaskValue> From<&ReadExec<V>> for TaskId {
    fn from(task: &ReadExec<V>) -> Self {
        task.id()
    }
}

impl<V: TaskValue> From<&WriteExec<V>> for TaskId {
    fn from(task: &WriteExec<V>) -> Self {
        task.id()
    }
}
