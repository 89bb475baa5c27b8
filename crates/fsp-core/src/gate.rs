// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Concurrency gate serializing every operation on a volume
//!
//! The gate is a single mutual-exclusion lock around the volume context.
//! Entering acquires it (without timeout); the returned guard leaves on
//! drop, so early returns and error paths release the lock too. Read-only
//! operations are not distinguished from mutating ones.
//!
//! A volume that needs more parallelism can swap this for a reader/writer or
//! path-sharded policy as long as table mutations stay atomic with respect
//! to reads of the same path.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::request::OperationKind;

pub struct OperationGate<T> {
    context: Mutex<T>,
}

impl<T> OperationGate<T> {
    pub fn new(context: T) -> Self {
        Self {
            context: Mutex::new(context),
        }
    }

    /// Acquire exclusive access to the volume context for one operation.
    pub fn enter(&self, kind: OperationKind) -> GateGuard<'_, T> {
        self.acquire(kind.as_str())
    }

    /// Acquire the gate for caller code that drives the operation table
    /// itself instead of going through the dispatcher.
    pub fn lock(&self) -> GateGuard<'_, T> {
        self.acquire("direct")
    }

    fn acquire(&self, label: &'static str) -> GateGuard<'_, T> {
        // Handlers never leave the context half-mutated across a panic
        // point, so a poisoned lock is still safe to reuse.
        let guard = self.context.lock().unwrap_or_else(PoisonError::into_inner);
        trace!(target: "fsp::gate", op = label, "enter operation");
        GateGuard { guard, label }
    }

    pub fn into_inner(self) -> T {
        self.context.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive access to a volume context; dropping it leaves the gate.
pub struct GateGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    label: &'static str,
}

impl<T> GateGuard<'_, T> {
    /// Name of the operation holding the gate.
    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl<T> Deref for GateGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for GateGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for GateGuard<'_, T> {
    fn drop(&mut self) {
        trace!(target: "fsp::gate", op = self.label, "leave operation");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn guard_releases_on_early_return() {
        fn bump(gate: &OperationGate<u32>, fail: bool) -> Result<(), ()> {
            let mut ctx = gate.enter(OperationKind::Create);
            *ctx += 1;
            if fail {
                return Err(());
            }
            *ctx += 100;
            Ok(())
        }

        let gate = OperationGate::new(0u32);
        assert!(bump(&gate, true).is_err());
        // Would deadlock if the guard had not been dropped.
        let ctx = gate.enter(OperationKind::Open);
        assert_eq!(*ctx, 1);
        assert_eq!(ctx.label(), "open");
    }

    #[test]
    fn gate_admits_one_operation_at_a_time() {
        let gate = Arc::new(OperationGate::new(Vec::<usize>::new()));
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..8)
            .map(|i| {
                let gate = Arc::clone(&gate);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let mut ctx = gate.enter(OperationKind::Create);
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        ctx.push(i);
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        let gate = Arc::try_unwrap(gate).ok().expect("workers joined");
        assert_eq!(gate.into_inner().len(), 400);
    }

    #[test]
    fn gate_survives_panicking_operation() {
        let gate = Arc::new(OperationGate::new(7u32));
        let panicking = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                let _ctx = gate.enter(OperationKind::Close);
                panic!("handler bug");
            })
        };
        assert!(panicking.join().is_err());
        assert_eq!(*gate.enter(OperationKind::Open), 7);
    }
}
