use std::collections::BTreeMap;

use glob::Pattern;

use crate::config::{DynamicRule, RoleSpec};
use crate::graph::GraphStore;
use crate::graph::edge::EdgeKind;
use crate::parser::FileRecord;
use crate::parser::facts::CallFact;
use crate::resolver::SymbolTable;

/// One matched call site: the component it lives in and the string key it
/// carries.
#[derive(Debug)]
struct Finding {
    component: String,
    key: String,
}

/// Dynamic-behavior pass: correlate string-keyed producer and consumer call
/// sites declared in configuration, emitting `DynamicBehavior` edges labeled
/// with the shared key.
///
/// Rule order is significant here — a later rule re-labels the edge an
/// earlier rule emitted on the same (producer, consumer) pair. Unmatched
/// keys produce no edge and no error.
pub fn correlate(
    graph: &mut GraphStore,
    table: &SymbolTable,
    records: &[FileRecord],
    rules: &[DynamicRule],
    warnings: &mut Vec<String>,
) -> usize {
    // (producer, consumer) -> label; later rules overwrite earlier labels.
    // BTreeMap keeps edge insertion deterministic.
    let mut edges: BTreeMap<(String, String), String> = BTreeMap::new();

    for rule in rules {
        let producers = collect_findings(table, records, &rule.producer, rule, warnings);
        let consumers = collect_findings(table, records, &rule.consumer, rule, warnings);

        for producer in &producers {
            for consumer in &consumers {
                if producer.key != consumer.key || producer.component == consumer.component {
                    continue;
                }
                edges.insert(
                    (producer.component.clone(), consumer.component.clone()),
                    producer.key.clone(),
                );
            }
        }
    }

    let mut added = 0;
    for ((producer, consumer), label) in edges {
        if graph.add_edge_by_name(&producer, &consumer, EdgeKind::DynamicBehavior { label }) {
            added += 1;
        }
    }
    added
}

/// All call sites matching one role spec, with their extracted keys.
fn collect_findings(
    table: &SymbolTable,
    records: &[FileRecord],
    spec: &RoleSpec,
    rule: &DynamicRule,
    warnings: &mut Vec<String>,
) -> Vec<Finding> {
    let pattern = match Pattern::new(&spec.callee_pattern) {
        Ok(p) => p,
        Err(err) => {
            warnings.push(format!(
                "dynamic rule `{}`: invalid pattern `{}`: {err}",
                rule.name, spec.callee_pattern
            ));
            return Vec::new();
        }
    };
    if spec.key_arg.is_none() && spec.key_kwarg.is_none() {
        warnings.push(format!(
            "dynamic rule `{}`: role has neither key_arg nor key_kwarg",
            rule.name
        ));
        return Vec::new();
    }

    let mut findings = Vec::new();
    for record in records {
        for call in &record.calls {
            if !pattern.matches(&table.resolve(&record.module, &call.callee)) {
                continue;
            }
            let Some(key) = extract_key(call, spec) else {
                continue;
            };
            let Some(component) = table.component_of_scope(&record.module, &call.scope) else {
                continue;
            };
            findings.push(Finding { component, key });
        }
    }
    findings
}

/// The literal string key of a call site, per the role spec. `None` (no
/// literal at that position) simply means the site does not participate.
fn extract_key(call: &CallFact, spec: &RoleSpec) -> Option<String> {
    if let Some(index) = spec.key_arg
        && let Some((_, value)) = call.str_args.iter().find(|(i, _)| *i == index)
    {
        return Some(value.clone());
    }
    if let Some(ref kwarg) = spec.key_kwarg
        && let Some((_, value)) = call.kw_str_args.iter().find(|(k, _)| k == kwarg)
    {
        return Some(value.clone());
    }
    None
}
