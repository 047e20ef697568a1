//! Graph analysis over validated scenarios
//!
//! Produces warnings only; a scenario with unreachable steps or
//! input-free cycles is still executable.

use crate::error::Warning;
use crate::model::Scenario;
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;
use std::collections::HashSet;

/// Build the step graph (edges to `$end`/`$escalate` are omitted)
fn step_graph(scenario: &Scenario) -> DiGraphMap<&str, ()> {
    let mut graph = DiGraphMap::new();
    for step in scenario.steps() {
        graph.add_node(step.id.as_str());
    }
    for step in scenario.steps() {
        for target in step.kind.targets() {
            if let Some(next) = target.step() {
                graph.add_edge(step.id.as_str(), next.as_str(), ());
            }
        }
    }
    graph
}

/// Steps reachable from the entry, including the entry itself
#[must_use]
pub fn reachable(scenario: &Scenario) -> HashSet<&str> {
    let graph = step_graph(scenario);
    let mut seen = HashSet::new();
    let mut dfs = Dfs::new(&graph, scenario.entry().as_str());
    while let Some(node) = dfs.next(&graph) {
        seen.insert(node);
    }
    seen
}

/// Cycles (strongly connected components) that contain no `input` step
///
/// Each cycle is returned as a sorted list of step ids.
#[must_use]
pub fn input_free_cycles(scenario: &Scenario) -> Vec<Vec<String>> {
    let graph = step_graph(scenario);
    let mut cycles: Vec<Vec<String>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|component| match component.as_slice() {
            [single] => graph.contains_edge(single, single),
            _ => true,
        })
        .filter(|component| {
            component.iter().all(|id| {
                scenario
                    .step(&(*id).into())
                    .is_some_and(|s| !s.kind.is_input())
            })
        })
        .map(|component| {
            let mut ids: Vec<String> = component.into_iter().map(str::to_string).collect();
            ids.sort();
            ids
        })
        .collect();
    cycles.sort();
    cycles
}

/// All graph warnings: unreachable steps then input-free cycles
#[must_use]
pub fn analyze(scenario: &Scenario) -> Vec<Warning> {
    let seen = reachable(scenario);
    let mut warnings: Vec<Warning> = scenario
        .steps()
        .iter()
        .filter(|s| !seen.contains(s.id.as_str()))
        .map(|s| Warning::Unreachable {
            step: s.id.to_string(),
        })
        .collect();

    warnings.extend(
        input_free_cycles(scenario)
            .into_iter()
            .map(|steps| Warning::CycleWithoutInput { steps }),
    );
    warnings
}
