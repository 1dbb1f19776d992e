//! Built-in decision trees

use crate::decision::{Comparison, Condition, DecisionNode, DecisionTree, Operand};
use crate::error::{Result, TedanaError};
use crate::metrics::names;
use crate::types::Classification;
use std::path::Path;

pub const MINIMAL: &str = "minimal";
pub const MANUAL_ONLY: &str = "manual_only";

const LIKELY_BOLD: &str = "Likely BOLD";
const UNLIKELY_BOLD: &str = "Unlikely BOLD";
const LOW_VARIANCE: &str = "Low variance";

/// Name and one-line description of every built-in tree
pub const BUILTIN_TREES: &[(&str, &str)] = &[
    (
        MINIMAL,
        "Kappa/rho thresholding with dice, t-statistic and low-variance rules",
    ),
    (
        MANUAL_ONLY,
        "No automatic nodes; only manual accept/reject decisions are applied",
    ),
];

/// Look up a built-in tree by name.
pub fn builtin_tree(name: &str) -> Result<DecisionTree> {
    match name {
        MINIMAL => Ok(minimal_tree()),
        MANUAL_ONLY => Ok(manual_only_tree()),
        other => Err(TedanaError::UnknownTree(other.to_string())),
    }
}

/// A built-in name, or a path to a JSON tree file.
pub fn resolve_tree(name_or_path: &str) -> Result<DecisionTree> {
    if BUILTIN_TREES.iter().any(|(name, _)| *name == name_or_path) {
        return builtin_tree(name_or_path);
    }
    let path = Path::new(name_or_path);
    if path.is_file() {
        DecisionTree::from_json_file(path)
    } else {
        Err(TedanaError::UnknownTree(name_or_path.to_string()))
    }
}

pub fn manual_only_tree() -> DecisionTree {
    DecisionTree::new(MANUAL_ONLY, BUILTIN_TREES[1].1, Vec::new())
}

fn metric(name: &str) -> Operand {
    Operand::Metric(name.to_string())
}

fn cross(name: &str) -> Operand {
    Operand::Cross(name.to_string())
}

fn reject_if(conditions: Vec<Condition>, rationale: &str) -> DecisionNode {
    DecisionNode::LeftOpRight {
        conditions,
        if_true: Classification::Rejected,
        if_false: None,
        decide_comps: vec![Classification::Unclassified],
        tag_if_true: Some(UNLIKELY_BOLD.to_string()),
        tag_if_false: None,
        rationale: rationale.to_string(),
    }
}

pub fn minimal_tree() -> DecisionTree {
    let varex_above_median = Condition::new(
        metric(names::VARIANCE_EXPLAINED),
        Comparison::Greater,
        cross("median_varex"),
    );

    let nodes = vec![
        DecisionNode::ManualClassify {
            new_classification: Classification::Unclassified,
            decide_comps: Vec::new(),
            tag: None,
            rationale: "reset".to_string(),
            clear_tags: true,
        },
        reject_if(
            vec![Condition::new(
                metric(names::RHO),
                Comparison::Greater,
                metric(names::KAPPA),
            )],
            "rho>kappa",
        ),
        reject_if(
            vec![
                Condition::new(
                    metric(names::COUNTSIG_FS0),
                    Comparison::Greater,
                    metric(names::COUNTSIG_FT2),
                ),
                Condition::new(
                    metric(names::COUNTSIG_FT2),
                    Comparison::Greater,
                    Operand::Value(0.0),
                ),
            ],
            "countsigFS0>countsigFT2",
        ),
        DecisionNode::CalcMedian {
            metric: names::VARIANCE_EXPLAINED.to_string(),
            label: "median_varex".to_string(),
            decide_comps: Vec::new(),
        },
        reject_if(
            vec![
                Condition::new(
                    metric(names::DICE_FS0),
                    Comparison::Greater,
                    metric(names::DICE_FT2),
                ),
                varex_above_median.clone(),
            ],
            "dice_FS0>dice_FT2",
        ),
        reject_if(
            vec![
                Condition::new(
                    Operand::Value(0.0),
                    Comparison::Greater,
                    metric(names::SIGNAL_NOISE_T),
                ),
                varex_above_median,
            ],
            "signal-noise_t<0",
        ),
        DecisionNode::CalcElbow {
            metric: names::KAPPA.to_string(),
            label: "kappa_elbow".to_string(),
            decide_comps: Vec::new(),
        },
        DecisionNode::LeftOpRight {
            conditions: vec![Condition::new(
                metric(names::KAPPA),
                Comparison::GreaterEqual,
                cross("kappa_elbow"),
            )],
            if_true: Classification::ProvisionalAccept,
            if_false: Some(Classification::ProvisionalReject),
            decide_comps: vec![Classification::Unclassified],
            tag_if_true: None,
            tag_if_false: None,
            rationale: "kappa>=elbow".to_string(),
        },
        DecisionNode::LeftOpRight {
            conditions: vec![Condition::new(
                metric(names::KAPPA),
                Comparison::Greater,
                metric(names::RHO),
            )
            .with_right_scale(2.0)],
            if_true: Classification::Accepted,
            if_false: Some(Classification::ProvisionalReject),
            decide_comps: vec![Classification::ProvisionalAccept],
            tag_if_true: Some(LIKELY_BOLD.to_string()),
            tag_if_false: None,
            rationale: "kappa>2rho".to_string(),
        },
        DecisionNode::VarianceLessThanThresholds {
            metric: names::VARIANCE_EXPLAINED.to_string(),
            single_comp_threshold: 0.1,
            all_comp_threshold: 1.0,
            if_true: Classification::Accepted,
            if_false: None,
            decide_comps: vec![Classification::ProvisionalReject],
            tag_if_true: Some(LOW_VARIANCE.to_string()),
            rationale: "low_variance".to_string(),
        },
        DecisionNode::ManualClassify {
            new_classification: Classification::Accepted,
            decide_comps: vec![Classification::ProvisionalAccept],
            tag: Some(LIKELY_BOLD.to_string()),
            rationale: "resolve_accept".to_string(),
            clear_tags: false,
        },
        DecisionNode::ManualClassify {
            new_classification: Classification::Rejected,
            decide_comps: vec![
                Classification::ProvisionalReject,
                Classification::Unclassified,
            ],
            tag: Some(UNLIKELY_BOLD.to_string()),
            rationale: "resolve_reject".to_string(),
            clear_tags: false,
        },
    ];

    DecisionTree::new(MINIMAL, BUILTIN_TREES[0].1, nodes)
}
