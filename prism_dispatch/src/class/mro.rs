//! C3 linearization.
//!
//! Computes the ancestor order of a class from its declared bases. Each base
//! contributes its own, previously computed order through a [`ClassLookup`].
//!
//! ```text
//!   L[N(B1, B2)] = N + merge(L[B1], L[B2], [B1, B2])
//! ```
//!
//! `merge` repeatedly takes the first list head that does not appear in the
//! tail of any other list. When no such head exists the hierarchy is
//! inconsistent.

use super::{ClassId, Mro};
use crate::error::{DispatchError, DispatchResult};
use crate::symbol::Symbol;
use std::collections::VecDeque;
use std::sync::Arc;

/// Source of previously computed orders and class names.
pub trait ClassLookup {
    /// The computed order of `class`, or `None` if unknown.
    fn mro_of(&self, class: ClassId) -> Option<Arc<[ClassId]>>;

    /// The name of `class`, used for diagnostics.
    fn name_of(&self, class: ClassId) -> Option<Symbol>;
}

/// Compute the order of `class` given its declared `bases`.
///
/// The result starts with `class`. With no bases the result is `[class]`;
/// adding the implicit root is the caller's business.
///
/// Never mutates anything; failures leave the caller's state untouched.
pub fn linearize<L>(class: ClassId, bases: &[ClassId], lookup: &L) -> DispatchResult<Mro>
where
    L: ClassLookup + ?Sized,
{
    if bases.contains(&class) {
        return Err(DispatchError::Cycle {
            class: display_name(lookup, class),
        });
    }

    let mut result = Mro::new();
    result.push(class);

    if bases.is_empty() {
        return Ok(result);
    }

    // Fast path: single inheritance is a prefix.
    if let [base] = bases {
        let base_mro = lookup
            .mro_of(*base)
            .ok_or(DispatchError::UnknownClass(base.raw()))?;
        for &ancestor in base_mro.iter() {
            if ancestor == class {
                return Err(DispatchError::Cycle {
                    class: display_name(lookup, class),
                });
            }
            result.push(ancestor);
        }
        return Ok(result);
    }

    let mut lists: Vec<VecDeque<ClassId>> = Vec::with_capacity(bases.len() + 1);
    for &base in bases {
        let base_mro = lookup
            .mro_of(base)
            .ok_or(DispatchError::UnknownClass(base.raw()))?;
        lists.push(base_mro.iter().copied().collect());
    }
    lists.push(bases.iter().copied().collect());

    loop {
        lists.retain(|list| !list.is_empty());
        if lists.is_empty() {
            return Ok(result);
        }

        let head = lists
            .iter()
            .filter_map(|list| list.front().copied())
            .find(|candidate| !in_any_tail(&lists, *candidate));

        let Some(head) = head else {
            return Err(inconsistent(&lists, lookup));
        };

        if result.contains(&head) {
            return Err(DispatchError::Cycle {
                class: display_name(lookup, head),
            });
        }

        result.push(head);
        for list in lists.iter_mut() {
            if list.front() == Some(&head) {
                list.pop_front();
            }
        }
    }
}

#[inline]
fn in_any_tail(lists: &[VecDeque<ClassId>], candidate: ClassId) -> bool {
    lists
        .iter()
        .any(|list| list.iter().skip(1).any(|&c| c == candidate))
}

fn inconsistent<L>(lists: &[VecDeque<ClassId>], lookup: &L) -> DispatchError
where
    L: ClassLookup + ?Sized,
{
    let mut heads: Vec<ClassId> = Vec::with_capacity(lists.len());
    for head in lists.iter().filter_map(|list| list.front().copied()) {
        if !heads.contains(&head) {
            heads.push(head);
        }
    }

    let head = heads
        .first()
        .map(|&id| display_name(lookup, id))
        .unwrap_or_default();
    let blocking = heads
        .iter()
        .skip(1)
        .map(|&id| display_name(lookup, id))
        .collect();

    tracing::debug!(head = %head, ?blocking, "linearization failed");
    DispatchError::InconsistentHierarchy { head, blocking }
}

fn display_name<L>(lookup: &L, class: ClassId) -> String
where
    L: ClassLookup + ?Sized,
{
    lookup
        .name_of(class)
        .map(|name| name.as_str().to_owned())
        .unwrap_or_else(|| class.to_string())
}

// =============================================================================
// Tests
// =============================================================================
