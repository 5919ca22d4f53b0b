//! Orders a batch so parents come before children, and allocates instances.

use crate::definition::{Definition, DefinitionState};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::value::PrototypeRef;
use log::debug;
use std::collections::HashMap;

/// Returns batch indices such that a definition never precedes the definition
/// it inherits from within the batch. Parents outside the batch impose no order.
///
/// Every definition on an inheritance cycle gets a `CyclicInheritance` error,
/// is marked [`DefinitionState::Excluded`] and is left out of the order.
pub fn order(definitions: &mut [Definition], diagnostics: &mut Diagnostics) -> Vec<usize> {
    // A later duplicate id shadows an earlier one, as in the definition table.
    let by_id: HashMap<&str, usize> = definitions
        .iter()
        .enumerate()
        .map(|(i, d)| (d.id.as_str(), i))
        .collect();
    let parents: Vec<Option<usize>> = definitions
        .iter()
        .map(|d| d.inherits.as_deref().and_then(|p| by_id.get(p).copied()))
        .collect();

    let mut done = vec![false; definitions.len()];
    let mut cyclic = vec![false; definitions.len()];
    let mut in_stack: Vec<usize> = Vec::new();
    let mut sorted = Vec::with_capacity(definitions.len());

    for i in 0..definitions.len() {
        visit(i, &parents, &mut done, &mut cyclic, &mut in_stack, &mut sorted);
    }

    for (i, definition) in definitions.iter().enumerate() {
        if cyclic[i] {
            let path = cycle_path(definitions, &parents, i);
            let location = definition.location();
            diagnostics.error(
                DiagnosticKind::CyclicInheritance,
                &location.file,
                location.line,
                format!("'{}' inherits from itself: {}", definition.id, path),
            );
        }
    }
    for (i, definition) in definitions.iter_mut().enumerate() {
        if cyclic[i] {
            definition.state = DefinitionState::Excluded;
        }
    }
    let sorted: Vec<usize> = sorted.into_iter().filter(|&i| !cyclic[i]).collect();
    debug!(
        "ordered {} definitions ({} excluded by cycles)",
        sorted.len(),
        definitions.len() - sorted.len()
    );
    sorted
}

fn visit(
    i: usize,
    parents: &[Option<usize>],
    done: &mut [bool],
    cyclic: &mut [bool],
    in_stack: &mut Vec<usize>,
    sorted: &mut Vec<usize>,
) {
    if done[i] {
        return;
    }
    if let Some(pos) = in_stack.iter().position(|&x| x == i) {
        for &member in &in_stack[pos..] {
            cyclic[member] = true;
        }
        return;
    }
    in_stack.push(i);
    if let Some(parent) = parents[i] {
        visit(parent, parents, done, cyclic, in_stack, sorted);
    }
    in_stack.pop();
    done[i] = true;
    sorted.push(i);
}

fn cycle_path(definitions: &[Definition], parents: &[Option<usize>], start: usize) -> String {
    let mut path = vec![definitions[start].id.as_str()];
    let mut next = parents[start];
    while let Some(p) = next {
        path.push(definitions[p].id.as_str());
        if p == start {
            break;
        }
        next = parents[p];
    }
    path.join(" \u{2192} ")
}

/// Allocates an instance, with its id set and no fields written, for every
/// concrete definition, in batch order. Runs before any field is applied so
/// that references can point forward.
pub fn allocate(definitions: &mut [Definition]) -> Vec<PrototypeRef> {
    let mut allocated = Vec::new();
    for definition in definitions.iter_mut() {
        if definition.is_abstract || definition.state == DefinitionState::Excluded {
            continue;
        }
        let descriptor = definition.descriptor();
        let instance = PrototypeRef::new(
            definition.id.clone(),
            descriptor.clone(),
            descriptor.default_fields(),
        );
        definition.instance = Some(instance.clone());
        definition.state = DefinitionState::Allocated;
        allocated.push(instance);
    }
    debug!("allocated {} prototypes", allocated.len());
    allocated
}
