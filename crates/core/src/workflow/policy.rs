use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::approval::ApprovalState;
use crate::errors::DomainError;

/// Which state edges `set_state` may take.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TransitionPolicy {
    /// Any parseable target state is accepted from any current state.
    #[default]
    Permissive,
    Restricted(BTreeSet<(ApprovalState, ApprovalState)>),
}

impl TransitionPolicy {
    /// Builds a restricted policy from `FROM->TO` entries. An empty list keeps
    /// the permissive policy.
    pub fn from_edges<I, S>(edges: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut allowed = BTreeSet::new();
        for edge in edges {
            let (from, to) = parse_edge(edge.as_ref())?;
            allowed.insert((from, to));
        }

        if allowed.is_empty() {
            return Ok(Self::Permissive);
        }
        Ok(Self::Restricted(allowed))
    }

    pub fn allows(&self, from: ApprovalState, to: ApprovalState) -> bool {
        match self {
            Self::Permissive => true,
            Self::Restricted(allowed) => allowed.contains(&(from, to)),
        }
    }

    pub fn check(&self, from: ApprovalState, to: ApprovalState) -> Result<(), DomainError> {
        if self.allows(from, to) {
            return Ok(());
        }
        Err(DomainError::IllegalTransition { from, to })
    }
}

fn parse_edge(edge: &str) -> Result<(ApprovalState, ApprovalState), DomainError> {
    let (from, to) = edge.split_once("->").ok_or_else(|| DomainError::UnknownValue {
        kind: "transition edge",
        value: edge.to_string(),
    })?;
    Ok((from.parse()?, to.parse()?))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelBehavior {
    /// Hide the jewelry and annotate the request; state and confirm stay.
    #[default]
    PreserveState,
    /// Additionally move the request to CANCELLED and clear confirm.
    MarkCancelled,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkflowPolicy {
    pub transitions: TransitionPolicy,
    pub cancel: CancelBehavior,
}
