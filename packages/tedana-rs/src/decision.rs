//! Decision tree engine
//!
//! A [`DecisionTree`] is an ordered list of [`DecisionNode`]s. The engine folds
//! the metrics table through the nodes one at a time: each node reads a
//! snapshot and returns a new one, so every intermediate state can be
//! inspected and recorded in the status table. Manual overrides run before the
//! first node and lock their components; no later node reads or writes a
//! locked component.

use crate::config::EngineConfig;
use crate::error::{Result, TedanaError};
use crate::metrics::{Component, MetricsTable, COMPONENT_COLUMN};
use crate::overrides::{ManualOverrides, MANUAL_RATIONALE, MANUAL_TAG};
use crate::types::{Classification, ComponentSet, Diagnosed, Diagnostic};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

pub const NO_ACCEPTED_WARNING: &str = "No accepted components remaining after manual classification!";

const INITIAL_STATUS_COLUMN: &str = "initialized classification";
const MANUAL_STATUS_COLUMN: &str = "manual";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterEqual,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessEqual,
}

impl Comparison {
    /// NaN on either side never satisfies a comparison.
    pub fn holds(self, left: f64, right: f64) -> bool {
        match self {
            Comparison::Greater => left > right,
            Comparison::GreaterEqual => left >= right,
            Comparison::Less => left < right,
            Comparison::LessEqual => left <= right,
        }
    }
}

/// One side of a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    /// Per-component metric column
    Metric(String),
    /// Value computed by an earlier `calc_*` node
    Cross(String),
    Value(f64),
}

fn unit_scale() -> f64 {
    1.0
}

fn is_unit_scale(scale: &f64) -> bool {
    *scale == 1.0
}

/// `left_scale * left  op  right_scale * right`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub left: Operand,
    #[serde(default = "unit_scale", skip_serializing_if = "is_unit_scale")]
    pub left_scale: f64,
    pub op: Comparison,
    pub right: Operand,
    #[serde(default = "unit_scale", skip_serializing_if = "is_unit_scale")]
    pub right_scale: f64,
}

impl Condition {
    pub fn new(left: Operand, op: Comparison, right: Operand) -> Self {
        Self {
            left,
            left_scale: 1.0,
            op,
            right,
            right_scale: 1.0,
        }
    }

    pub fn with_right_scale(mut self, scale: f64) -> Self {
        self.right_scale = scale;
        self
    }
}

/// A single step of a decision tree.
///
/// `decide_comps` restricts a node to components currently in one of the
/// listed classifications; an empty list means every unlocked component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionNode {
    ManualClassify {
        new_classification: Classification,
        #[serde(default)]
        decide_comps: Vec<Classification>,
        #[serde(default)]
        tag: Option<String>,
        rationale: String,
        #[serde(default)]
        clear_tags: bool,
    },
    LeftOpRight {
        conditions: Vec<Condition>,
        if_true: Classification,
        /// `None` leaves components failing the test unchanged.
        #[serde(default)]
        if_false: Option<Classification>,
        #[serde(default)]
        decide_comps: Vec<Classification>,
        #[serde(default)]
        tag_if_true: Option<String>,
        #[serde(default)]
        tag_if_false: Option<String>,
        rationale: String,
    },
    VarianceLessThanThresholds {
        metric: String,
        single_comp_threshold: f64,
        all_comp_threshold: f64,
        if_true: Classification,
        #[serde(default)]
        if_false: Option<Classification>,
        #[serde(default)]
        decide_comps: Vec<Classification>,
        #[serde(default)]
        tag_if_true: Option<String>,
        rationale: String,
    },
    CalcMedian {
        metric: String,
        label: String,
        #[serde(default)]
        decide_comps: Vec<Classification>,
    },
    CalcElbow {
        metric: String,
        label: String,
        #[serde(default)]
        decide_comps: Vec<Classification>,
    },
}

/// Table state between two nodes
#[derive(Debug, Clone)]
struct Snapshot {
    table: MetricsTable,
    cross: BTreeMap<String, f64>,
}

/// What a node did
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeReport {
    pub node: usize,
    pub kind: &'static str,
    pub n_true: usize,
    pub n_false: usize,
    /// Components whose classification this node wrote
    pub classified: Vec<usize>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, f64>,
}

impl NodeReport {
    fn new(node: usize, kind: &'static str) -> Self {
        Self {
            node,
            kind,
            n_true: 0,
            n_false: 0,
            classified: Vec::new(),
            outputs: BTreeMap::new(),
        }
    }
}

impl DecisionNode {
    pub fn kind(&self) -> &'static str {
        match self {
            DecisionNode::ManualClassify { .. } => "manual_classify",
            DecisionNode::LeftOpRight { .. } => "left_op_right",
            DecisionNode::VarianceLessThanThresholds { .. } => "variance_less_than_thresholds",
            DecisionNode::CalcMedian { .. } => "calc_median",
            DecisionNode::CalcElbow { .. } => "calc_elbow",
        }
    }

    fn decide_comps(&self) -> &[Classification] {
        match self {
            DecisionNode::ManualClassify { decide_comps, .. }
            | DecisionNode::LeftOpRight { decide_comps, .. }
            | DecisionNode::VarianceLessThanThresholds { decide_comps, .. }
            | DecisionNode::CalcMedian { decide_comps, .. }
            | DecisionNode::CalcElbow { decide_comps, .. } => decide_comps.as_slice(),
        }
    }

    fn operands(&self) -> Vec<&Operand> {
        match self {
            DecisionNode::LeftOpRight { conditions, .. } => conditions
                .iter()
                .flat_map(|c| [&c.left, &c.right])
                .collect(),
            _ => Vec::new(),
        }
    }

    fn metric_inputs(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .operands()
            .into_iter()
            .filter_map(|o| match o {
                Operand::Metric(name) => Some(name.as_str()),
                _ => None,
            })
            .collect();
        match self {
            DecisionNode::VarianceLessThanThresholds { metric, .. }
            | DecisionNode::CalcMedian { metric, .. }
            | DecisionNode::CalcElbow { metric, .. } => names.push(metric),
            _ => {}
        }
        names
    }

    fn cross_inputs(&self) -> Vec<&str> {
        self.operands()
            .into_iter()
            .filter_map(|o| match o {
                Operand::Cross(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    fn cross_output(&self) -> Option<&str> {
        match self {
            DecisionNode::CalcMedian { label, .. } | DecisionNode::CalcElbow { label, .. } => {
                Some(label.as_str())
            }
            _ => None,
        }
    }

    fn eligible(&self, table: &MetricsTable, locked: &ComponentSet) -> Vec<usize> {
        let decide = self.decide_comps();
        table
            .iter()
            .filter(|c| !locked.contains(&c.index))
            .filter(|c| decide.is_empty() || decide.contains(&c.classification))
            .map(|c| c.index)
            .collect()
    }

    fn metric_values(
        &self,
        table: &MetricsTable,
        indices: &[usize],
        metric: &str,
        node: usize,
    ) -> Result<Vec<(usize, f64)>> {
        indices
            .iter()
            .map(|&i| {
                table
                    .get(i)
                    .and_then(|c| c.metric(metric))
                    .map(|v| (i, v))
                    .ok_or_else(|| TedanaError::UnknownMetric {
                        node,
                        kind: "metric",
                        name: metric.to_string(),
                    })
            })
            .collect()
    }

    fn apply(&self, node: usize, state: &Snapshot, locked: &ComponentSet) -> Result<(Snapshot, NodeReport)> {
        let mut next = state.clone();
        let mut report = NodeReport::new(node, self.kind());
        let eligible = self.eligible(&state.table, locked);

        match self {
            DecisionNode::ManualClassify {
                new_classification,
                tag,
                rationale,
                clear_tags,
                ..
            } => {
                for &i in &eligible {
                    if let Some(c) = next.table.get_mut(i) {
                        if *clear_tags {
                            c.tags.clear();
                        }
                        c.classify(*new_classification, rationale, tag.as_deref());
                        report.classified.push(i);
                    }
                }
                report.n_true = eligible.len();
            }

            DecisionNode::LeftOpRight {
                conditions,
                if_true,
                if_false,
                tag_if_true,
                tag_if_false,
                rationale,
                ..
            } => {
                for &i in &eligible {
                    let mut passed = true;
                    if let Some(component) = state.table.get(i) {
                        for condition in conditions {
                            let left = operand_value(&condition.left, component, &state.cross, node)?;
                            let right = operand_value(&condition.right, component, &state.cross, node)?;
                            if !condition
                                .op
                                .holds(condition.left_scale * left, condition.right_scale * right)
                            {
                                passed = false;
                                break;
                            }
                        }
                    }
                    let Some(c) = next.table.get_mut(i) else { continue };
                    if passed {
                        report.n_true += 1;
                        c.classify(*if_true, rationale, tag_if_true.as_deref());
                        report.classified.push(i);
                    } else {
                        report.n_false += 1;
                        if let Some(class) = if_false {
                            c.classify(*class, rationale, tag_if_false.as_deref());
                            report.classified.push(i);
                        }
                    }
                }
            }

            DecisionNode::VarianceLessThanThresholds {
                metric,
                single_comp_threshold,
                all_comp_threshold,
                if_true,
                if_false,
                tag_if_true,
                rationale,
                ..
            } => {
                let mut low: Vec<(usize, f64)> = self
                    .metric_values(&state.table, &eligible, metric, node)?
                    .into_iter()
                    .filter(|(_, v)| *v < *single_comp_threshold)
                    .collect();
                low.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

                let mut total = 0.0;
                let mut selected = BTreeSet::new();
                for (i, value) in low {
                    if total + value < *all_comp_threshold {
                        total += value;
                        selected.insert(i);
                    }
                }
                report.outputs.insert(format!("{} selected sum", metric), total);

                for &i in &eligible {
                    let Some(c) = next.table.get_mut(i) else { continue };
                    if selected.contains(&i) {
                        report.n_true += 1;
                        c.classify(*if_true, rationale, tag_if_true.as_deref());
                        report.classified.push(i);
                    } else {
                        report.n_false += 1;
                        if let Some(class) = if_false {
                            c.classify(*class, rationale, None);
                            report.classified.push(i);
                        }
                    }
                }
            }

            DecisionNode::CalcMedian { metric, label, .. } => {
                let values: Vec<f64> = self
                    .metric_values(&state.table, &eligible, metric, node)?
                    .into_iter()
                    .map(|(_, v)| v)
                    .collect();
                let value = median(&values);
                next.cross.insert(label.clone(), value);
                report.outputs.insert(label.clone(), value);
            }

            DecisionNode::CalcElbow { metric, label, .. } => {
                let values: Vec<f64> = self
                    .metric_values(&state.table, &eligible, metric, node)?
                    .into_iter()
                    .map(|(_, v)| v)
                    .collect();
                let value = elbow(&values);
                next.cross.insert(label.clone(), value);
                report.outputs.insert(label.clone(), value);
            }
        }

        log::debug!(
            "Node {} ({}): {} true, {} false, {} classified",
            node,
            report.kind,
            report.n_true,
            report.n_false,
            report.classified.len()
        );
        Ok((next, report))
    }
}

fn operand_value(
    operand: &Operand,
    component: &Component,
    cross: &BTreeMap<String, f64>,
    node: usize,
) -> Result<f64> {
    match operand {
        Operand::Value(v) => Ok(*v),
        Operand::Metric(name) => component.metric(name).ok_or_else(|| TedanaError::UnknownMetric {
            node,
            kind: "metric",
            name: name.clone(),
        }),
        Operand::Cross(name) => cross.get(name).copied().ok_or_else(|| TedanaError::UnknownMetric {
            node,
            kind: "cross-component metric",
            name: name.clone(),
        }),
    }
}

/// Median of the finite values; NaN when there are none.
pub fn median(values: &[f64]) -> f64 {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return f64::NAN;
    }
    finite.sort_by(f64::total_cmp);
    let mid = finite.len() / 2;
    if finite.len() % 2 == 0 {
        (finite[mid - 1] + finite[mid]) / 2.0
    } else {
        finite[mid]
    }
}

/// Elbow of the descending-sorted curve: the point farthest from the line
/// joining its first and last points.
pub fn elbow(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| b.total_cmp(a));
    match sorted.len() {
        0 => return f64::NAN,
        1 | 2 => return sorted[0],
        _ => {}
    }

    let n = sorted.len();
    let (bx, by) = ((n - 1) as f64, sorted[n - 1] - sorted[0]);
    let norm = (bx * bx + by * by).sqrt();
    let (ux, uy) = (bx / norm, by / norm);

    let mut best = 0;
    let mut best_distance = f64::MIN;
    for (i, value) in sorted.iter().enumerate() {
        let (px, py) = (i as f64, value - sorted[0]);
        let projection = px * ux + py * uy;
        let (dx, dy) = (px - projection * ux, py - projection * uy);
        let distance = (dx * dx + dy * dy).sqrt();
        if distance > best_distance {
            best_distance = distance;
            best = i;
        }
    }
    sorted[best]
}

/// An ordered, named list of decision nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub nodes: Vec<DecisionNode>,
}

impl DecisionTree {
    pub fn new(name: impl Into<String>, description: impl Into<String>, nodes: Vec<DecisionNode>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            nodes,
        }
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(TedanaError::read_file(path))?;
        let tree: DecisionTree =
            serde_json::from_str(&text).map_err(TedanaError::json_file(path))?;
        log::info!(
            "Loaded decision tree '{}' ({} nodes) from {}",
            tree.name,
            tree.nodes.len(),
            path.display()
        );
        Ok(tree)
    }

    /// Every metric must be a table column and every cross-component metric
    /// must be produced by an earlier node.
    pub fn check_references(&self, table: &MetricsTable) -> Result<()> {
        let mut defined: BTreeSet<&str> = BTreeSet::new();
        for (position, node) in self.nodes.iter().enumerate() {
            if let Some(name) = node.metric_inputs().into_iter().find(|m| !table.has_column(m)) {
                return Err(TedanaError::UnknownMetric {
                    node: position,
                    kind: "metric",
                    name: name.to_string(),
                });
            }
            if let Some(name) = node.cross_inputs().into_iter().find(|m| !defined.contains(m)) {
                return Err(TedanaError::UnknownMetric {
                    node: position,
                    kind: "cross-component metric",
                    name: name.to_string(),
                });
            }
            if let Some(label) = node.cross_output() {
                defined.insert(label);
            }
        }
        Ok(())
    }
}

/// Classification of every component after every step
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusTable {
    labels: BTreeMap<usize, String>,
    columns: Vec<String>,
    cells: BTreeMap<usize, Vec<Classification>>,
}

impl StatusTable {
    fn record(&mut self, column: impl Into<String>, table: &MetricsTable) {
        self.columns.push(column.into());
        for component in table.iter() {
            self.labels
                .entry(component.index)
                .or_insert_with(|| component.label.clone());
            self.cells
                .entry(component.index)
                .or_default()
                .push(component.classification);
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Classification history of one component, one entry per column
    pub fn history(&self, index: usize) -> Option<&[Classification]> {
        self.cells.get(&index).map(Vec::as_slice)
    }

    pub fn to_tsv_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(Vec::new());
        let mut header = vec![COMPONENT_COLUMN.to_string()];
        header.extend(self.columns.iter().cloned());
        writer.write_record(&header)?;
        for (index, cells) in &self.cells {
            let mut row = vec![self.labels.get(index).cloned().unwrap_or_default()];
            row.extend(cells.iter().map(|c| c.to_string()));
            writer.write_record(&row)?;
        }
        writer
            .into_inner()
            .map_err(|e| TedanaError::IoError(e.into_error()))
    }
}

/// Result of running a decision tree
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    pub table: MetricsTable,
    pub cross_metrics: BTreeMap<String, f64>,
    pub reports: Vec<NodeReport>,
    pub status: StatusTable,
    pub tree: DecisionTree,
}

#[derive(Serialize)]
struct NodeRecord<'a> {
    parameters: &'a DecisionNode,
    report: &'a NodeReport,
}

#[derive(Serialize)]
struct TreeRecord<'a> {
    tree_id: &'a str,
    info: &'a str,
    manual: Option<&'a NodeReport>,
    nodes: Vec<NodeRecord<'a>>,
    classification_counts: BTreeMap<&'static str, usize>,
}

#[derive(Serialize)]
struct CrossComponentRecord<'a> {
    #[serde(flatten)]
    metrics: &'a BTreeMap<String, f64>,
    n_components: usize,
    n_accepted: usize,
    n_rejected: usize,
    n_ignored: usize,
}

impl DecisionOutcome {
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        [
            Classification::Accepted,
            Classification::Rejected,
            Classification::Ignored,
        ]
        .into_iter()
        .map(|c| (c.as_str(), self.table.count(c)))
        .collect()
    }

    fn manual_report(&self) -> Option<&NodeReport> {
        self.reports.first().filter(|r| r.kind == MANUAL_STATUS_COLUMN)
    }

    fn node_reports(&self) -> &[NodeReport] {
        match self.manual_report() {
            Some(_) => &self.reports[1..],
            None => &self.reports,
        }
    }

    pub fn decision_tree_json(&self) -> Result<Vec<u8>> {
        let record = TreeRecord {
            tree_id: &self.tree.name,
            info: &self.tree.description,
            manual: self.manual_report(),
            nodes: self
                .tree
                .nodes
                .iter()
                .zip(self.node_reports())
                .map(|(parameters, report)| NodeRecord { parameters, report })
                .collect(),
            classification_counts: self.counts(),
        };
        Ok(serde_json::to_vec_pretty(&record)?)
    }

    pub fn cross_component_json(&self) -> Result<Vec<u8>> {
        let record = CrossComponentRecord {
            metrics: &self.cross_metrics,
            n_components: self.table.len(),
            n_accepted: self.table.count(Classification::Accepted),
            n_rejected: self.table.count(Classification::Rejected),
            n_ignored: self.table.count(Classification::Ignored),
        };
        Ok(serde_json::to_vec_pretty(&record)?)
    }
}

pub struct DecisionEngine {
    tree: DecisionTree,
    config: EngineConfig,
}

impl DecisionEngine {
    pub fn new(tree: DecisionTree, config: EngineConfig) -> Self {
        Self { tree, config }
    }

    pub fn tree(&self) -> &DecisionTree {
        &self.tree
    }

    /// Run manual overrides then every node, in order.
    ///
    /// All validation happens before the first mutation.
    pub fn run(&self, table: &MetricsTable, overrides: &ManualOverrides) -> Result<Diagnosed<DecisionOutcome>> {
        overrides.check_against(table)?;
        self.tree.check_references(table)?;

        log::info!(
            "Running decision tree '{}' ({} nodes) on {} components",
            self.tree.name,
            self.tree.nodes.len(),
            table.len()
        );

        let locked = overrides.locked();
        let mut status = StatusTable::default();
        let mut reports = Vec::with_capacity(self.tree.nodes.len() + 1);
        status.record(INITIAL_STATUS_COLUMN, table);

        let mut state = Snapshot {
            table: table.clone(),
            cross: BTreeMap::new(),
        };

        if !overrides.is_empty() {
            let (next, report) = apply_overrides(&state, overrides);
            status.record(MANUAL_STATUS_COLUMN, &next.table);
            reports.push(report);
            state = next;
        }

        for (position, node) in self.tree.nodes.iter().enumerate() {
            let (next, report) = node.apply(position, &state, &locked)?;
            status.record(format!("Node {}", position), &next.table);
            reports.push(report);
            state = next;
        }

        if self.config.require_final_classification {
            let unresolved: Vec<usize> = state
                .table
                .iter()
                .filter(|c| !c.classification.is_final())
                .map(|c| c.index)
                .collect();
            if !unresolved.is_empty() {
                return Err(TedanaError::UnresolvedComponents(unresolved));
            }
        }

        let mut diagnostics = Vec::new();
        let n_accepted = state.table.count(Classification::Accepted);
        if n_accepted == 0 && self.config.warn_on_no_accepted {
            log::warn!("{}", NO_ACCEPTED_WARNING);
            diagnostics.push(Diagnostic::warning(NO_ACCEPTED_WARNING));
        }

        let summary = format!(
            "{} accepted, {} rejected, {} ignored of {} components",
            n_accepted,
            state.table.count(Classification::Rejected),
            state.table.count(Classification::Ignored),
            state.table.len()
        );
        log::info!("{}", summary);
        diagnostics.push(Diagnostic::info(summary));

        Ok(Diagnosed::with_diagnostics(
            DecisionOutcome {
                table: state.table,
                cross_metrics: state.cross,
                reports,
                status,
                tree: self.tree.clone(),
            },
            diagnostics,
        ))
    }
}

fn apply_overrides(state: &Snapshot, overrides: &ManualOverrides) -> (Snapshot, NodeReport) {
    let mut next = state.clone();
    let mut report = NodeReport::new(0, MANUAL_STATUS_COLUMN);
    let decisions = overrides
        .accept()
        .iter()
        .map(|i| (*i, Classification::Accepted))
        .chain(overrides.reject().iter().map(|i| (*i, Classification::Rejected)))
        .collect::<BTreeMap<usize, Classification>>();

    for (index, class) in decisions {
        if let Some(c) = next.table.get_mut(index) {
            c.classify(class, MANUAL_RATIONALE, Some(MANUAL_TAG));
            report.classified.push(index);
            match class {
                Classification::Accepted => report.n_true += 1,
                _ => report.n_false += 1,
            }
        }
    }
    log::info!(
        "Manually accepted {:?}, manually rejected {:?}",
        overrides.accept(),
        overrides.reject()
    );
    (next, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[(f64, f64, f64)]) -> MetricsTable {
        let mut table = MetricsTable::new(vec![
            "kappa".to_string(),
            "rho".to_string(),
            "variance explained".to_string(),
        ]);
        for (i, (kappa, rho, varex)) in rows.iter().enumerate() {
            table
                .insert(
                    Component::new(i, format!("ICA_{:02}", i))
                        .with_metric("kappa", *kappa)
                        .with_metric("rho", *rho)
                        .with_metric("variance explained", *varex),
                )
                .unwrap();
        }
        table
    }

    fn rho_over_kappa_tree() -> DecisionTree {
        DecisionTree::new(
            "test",
            "reject rho > kappa, accept the rest",
            vec![
                DecisionNode::LeftOpRight {
                    conditions: vec![Condition::new(
                        Operand::Metric("rho".into()),
                        Comparison::Greater,
                        Operand::Metric("kappa".into()),
                    )],
                    if_true: Classification::Rejected,
                    if_false: Some(Classification::Accepted),
                    decide_comps: vec![Classification::Unclassified],
                    tag_if_true: Some("Unlikely BOLD".into()),
                    tag_if_false: Some("Likely BOLD".into()),
                    rationale: "rho>kappa".into(),
                },
            ],
        )
    }

    #[test]
    fn test_left_op_right() {
        let engine = DecisionEngine::new(rho_over_kappa_tree(), EngineConfig::default());
        let input = table(&[(50.0, 10.0, 5.0), (10.0, 50.0, 5.0)]);
        let outcome = engine.run(&input, &ManualOverrides::none()).unwrap().value;

        let c0 = outcome.table.get(0).unwrap();
        assert_eq!(c0.classification, Classification::Accepted);
        assert_eq!(c0.rationale, vec!["rho>kappa"]);
        assert_eq!(c0.tags, vec!["Likely BOLD"]);
        assert_eq!(outcome.table.get(1).unwrap().classification, Classification::Rejected);
        assert_eq!(outcome.reports[0].n_true, 1);
        assert_eq!(outcome.reports[0].n_false, 1);
    }

    #[test]
    fn test_manual_overrides_are_final() {
        let engine = DecisionEngine::new(rho_over_kappa_tree(), EngineConfig::default());
        let input = table(&[(50.0, 10.0, 5.0), (10.0, 50.0, 5.0), (30.0, 1.0, 2.0)]);
        let overrides = ManualOverrides::new([1].into(), [0].into()).unwrap();
        let outcome = engine.run(&input, &overrides).unwrap().value;

        let c0 = outcome.table.get(0).unwrap();
        assert_eq!(c0.classification, Classification::Rejected);
        assert_eq!(c0.rationale, vec![MANUAL_RATIONALE]);
        assert_eq!(c0.tags, vec![MANUAL_TAG]);
        assert_eq!(outcome.table.get(1).unwrap().classification, Classification::Accepted);
        assert_eq!(outcome.table.get(2).unwrap().classification, Classification::Accepted);
        assert_eq!(outcome.status.columns(), &[INITIAL_STATUS_COLUMN, "manual", "Node 0"]);
    }

    #[test]
    fn test_out_of_range_override_fails_before_running() {
        let engine = DecisionEngine::new(rho_over_kappa_tree(), EngineConfig::default());
        let input = table(&[(50.0, 10.0, 5.0)]);
        let overrides = ManualOverrides::new([4].into(), Default::default()).unwrap();
        let err = engine.run(&input, &overrides).unwrap_err();
        assert!(matches!(err, TedanaError::ComponentsOutOfRange { .. }));
    }

    #[test]
    fn test_unresolved_components_error() {
        let tree = DecisionTree::new("empty", "", Vec::new());
        let engine = DecisionEngine::new(tree, EngineConfig::default());
        let err = engine
            .run(&table(&[(1.0, 1.0, 1.0), (2.0, 1.0, 1.0)]), &ManualOverrides::none())
            .unwrap_err();
        match err {
            TedanaError::UnresolvedComponents(indices) => assert_eq!(indices, vec![0, 1]),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_no_accepted_warns_but_succeeds() {
        let tree = DecisionTree::new("empty", "", Vec::new());
        let engine = DecisionEngine::new(tree, EngineConfig::default());
        let overrides = ManualOverrides::new(Default::default(), [0, 1].into()).unwrap();
        let result = engine
            .run(&table(&[(1.0, 1.0, 1.0), (2.0, 1.0, 1.0)]), &overrides)
            .unwrap();
        assert!(result.has_warning(NO_ACCEPTED_WARNING));
        assert_eq!(result.value.table.count(Classification::Rejected), 2);
    }

    #[test]
    fn test_unknown_metric_reported() {
        let tree = DecisionTree::new(
            "bad",
            "",
            vec![DecisionNode::CalcMedian {
                metric: "nonexistent".into(),
                label: "x".into(),
                decide_comps: Vec::new(),
            }],
        );
        let engine = DecisionEngine::new(tree, EngineConfig::default());
        let err = engine
            .run(&table(&[(1.0, 1.0, 1.0)]), &ManualOverrides::none())
            .unwrap_err();
        assert!(err.to_string().contains("nonexistent"));
    }

    #[test]
    fn test_undefined_cross_metric_reported() {
        let tree = DecisionTree::new(
            "bad",
            "",
            vec![DecisionNode::LeftOpRight {
                conditions: vec![Condition::new(
                    Operand::Metric("kappa".into()),
                    Comparison::Greater,
                    Operand::Cross("kappa_elbow".into()),
                )],
                if_true: Classification::Accepted,
                if_false: None,
                decide_comps: Vec::new(),
                tag_if_true: None,
                tag_if_false: None,
                rationale: "x".into(),
            }],
        );
        let err = tree.check_references(&table(&[(1.0, 1.0, 1.0)])).unwrap_err();
        assert!(err.to_string().contains("kappa_elbow"));
    }

    #[test]
    fn test_variance_thresholds() {
        let tree = DecisionTree::new(
            "low variance",
            "",
            vec![
                DecisionNode::VarianceLessThanThresholds {
                    metric: "variance explained".into(),
                    single_comp_threshold: 0.1,
                    all_comp_threshold: 0.1,
                    if_true: Classification::Accepted,
                    if_false: Some(Classification::Rejected),
                    decide_comps: Vec::new(),
                    tag_if_true: Some("Low variance".into()),
                    rationale: "low_variance".into(),
                },
            ],
        );
        let engine = DecisionEngine::new(tree, EngineConfig::default());
        // 0.05 and 0.08 are both below 0.1 but only 0.05 fits under the total.
        let input = table(&[(1.0, 1.0, 0.08), (1.0, 1.0, 0.05), (1.0, 1.0, 3.0)]);
        let outcome = engine.run(&input, &ManualOverrides::none()).unwrap().value;
        assert_eq!(
            outcome.table.indices_with(Classification::Accepted),
            ComponentSet::from([1])
        );
        assert_eq!(
            outcome.table.indices_with(Classification::Rejected),
            ComponentSet::from([0, 2])
        );
    }

    #[test]
    fn test_median_and_elbow() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
        assert!(median(&[]).is_nan());

        // Sharp drop after the second value.
        let values = [100.0, 90.0, 10.0, 9.0, 8.0, 7.0];
        assert_eq!(elbow(&values), 10.0);
        assert_eq!(elbow(&[5.0]), 5.0);
        assert!(elbow(&[]).is_nan());
    }

    #[test]
    fn test_tree_json_round_trip() {
        let tree = rho_over_kappa_tree();
        let json = serde_json::to_string(&tree).unwrap();
        assert!(json.contains("\"kind\":\"left_op_right\""));
        assert!(json.contains("\"op\":\">\""));
        let parsed: DecisionTree = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, tree);
    }

    #[test]
    fn test_nan_metric_fails_comparison() {
        let engine = DecisionEngine::new(rho_over_kappa_tree(), EngineConfig::default());
        let input = table(&[(f64::NAN, 10.0, 5.0)]);
        let outcome = engine.run(&input, &ManualOverrides::none()).unwrap().value;
        assert_eq!(outcome.table.get(0).unwrap().classification, Classification::Accepted);
    }
}
